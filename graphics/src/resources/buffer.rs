//! GPU buffer resource.

use std::sync::{Arc, Weak};

use crate::backend::GpuBuffer;
use crate::device::GraphicsDevice;
use crate::types::{BufferDescriptor, BufferUsage};

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are reference-counted.
/// They hold a weak reference back to their parent device.
pub struct Buffer {
    device: Weak<GraphicsDevice>,
    descriptor: BufferDescriptor,
    gpu_handle: GpuBuffer,
}

impl Buffer {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: BufferDescriptor,
        gpu_handle: GpuBuffer,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu_handle,
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Backend handle.
    pub fn gpu_handle(&self) -> &GpuBuffer {
        &self.gpu_handle
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);

/// Byte ranges for a buffer-to-buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCopyRegion {
    /// Offset into the source buffer.
    pub src_offset: u64,
    /// Offset into the destination buffer.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

impl BufferCopyRegion {
    /// Copy `size` bytes from offset 0 to offset 0.
    pub fn whole(size: u64) -> Self {
        Self {
            src_offset: 0,
            dst_offset: 0,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;

    use super::*;

    fn buffer(size: u64, usage: BufferUsage) -> Buffer {
        let gpu = GpuBuffer::Dummy(Arc::new(RwLock::new(vec![0; size as usize])));
        Buffer::new(Weak::new(), BufferDescriptor::new(size, usage), gpu)
    }

    #[test]
    fn test_buffer_debug() {
        let buffer = buffer(1024, BufferUsage::VERTEX);
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("1024"));
    }

    #[test]
    fn test_buffer_accessors() {
        let buffer = buffer(2048, BufferUsage::INDEX);
        assert_eq!(buffer.size(), 2048);
        assert_eq!(buffer.usage(), BufferUsage::INDEX);
        assert!(buffer.label().is_none());
        assert!(buffer.device().is_none());
    }
}
