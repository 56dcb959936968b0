//! Graphics device.
//!
//! The [`GraphicsDevice`] is the interface the arenas and the frame
//! multiplexer talk to: buffer creation, host writes, immediate copies,
//! readback, and deferred release of retired buffers.
//! It is created by [`GraphicsInstance::create_device`].

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::backend::BufferCopy;
use crate::error::GraphicsError;
use crate::instance::GraphicsInstance;
use crate::resources::{Buffer, BufferCopyRegion, DeferredRelease};
use crate::types::{BufferDescriptor, COPY_ALIGNMENT};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum buffer size.
    pub max_buffer_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

/// A graphics device for creating and filling GPU buffers.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across threads.
/// Resource tracking and the deferred release queues use interior mutability.
///
/// # Example
///
/// ```
/// use meshpool_graphics::{
///     BackendType, BufferDescriptor, BufferUsage, GraphicsInstance, InstanceParameters,
/// };
///
/// let instance = GraphicsInstance::with_parameters(
///     InstanceParameters::new().with_backend(BackendType::Dummy),
/// )
/// .unwrap();
/// let device = instance.create_device().unwrap();
///
/// let buffer = device
///     .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX | BufferUsage::COPY_SRC))
///     .unwrap();
/// device.write_buffer(&buffer, 0, &[1, 2, 3, 4]).unwrap();
/// assert_eq!(device.read_buffer(&buffer, 0, 4).unwrap(), vec![1, 2, 3, 4]);
/// ```
pub struct GraphicsDevice {
    instance: Arc<GraphicsInstance>,
    name: String,
    capabilities: DeviceCapabilities,
    frames_in_flight: usize,
    buffers: RwLock<Vec<Weak<Buffer>>>,
    deferred: Mutex<DeferredRelease>,
}

impl GraphicsDevice {
    pub(crate) fn new(
        instance: Arc<GraphicsInstance>,
        name: String,
        capabilities: DeviceCapabilities,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            instance,
            name,
            capabilities,
            frames_in_flight,
            buffers: RwLock::new(Vec::new()),
            deferred: Mutex::new(DeferredRelease::new(frames_in_flight)),
        }
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Number of frames the CPU may record ahead of the GPU.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size exceeds device limits or allocation fails.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let gpu_handle = self.instance.backend().create_buffer(descriptor)?;
        let buffer = Arc::new(Buffer::new(
            Arc::downgrade(self),
            descriptor.clone(),
            gpu_handle,
        ));

        self.buffers.write().push(Arc::downgrade(&buffer));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Write bytes into a buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `offset` is not 4-byte
    /// aligned or the write runs past the end of the buffer.
    pub fn write_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if offset % COPY_ALIGNMENT != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "write offset {offset} is not {COPY_ALIGNMENT}-byte aligned"
            )));
        }
        check_range(buffer, offset, data.len() as u64)?;

        self.instance
            .backend()
            .write_buffer(buffer.gpu_handle(), offset, data)
    }

    /// Copy between two buffers and block until the copy has completed.
    ///
    /// All regions are recorded into a single submission.
    ///
    /// # Errors
    ///
    /// Returns an error if a region is out of bounds or misaligned, or the
    /// submission fails.
    pub fn copy_buffer_immediate(
        &self,
        src: &Buffer,
        dst: &Buffer,
        regions: &[BufferCopyRegion],
    ) -> Result<(), GraphicsError> {
        let mut copies = Vec::with_capacity(regions.len());
        for region in regions {
            if region.src_offset % COPY_ALIGNMENT != 0
                || region.dst_offset % COPY_ALIGNMENT != 0
                || region.size % COPY_ALIGNMENT != 0
            {
                return Err(GraphicsError::InvalidParameter(format!(
                    "copy {region:?} is not {COPY_ALIGNMENT}-byte aligned"
                )));
            }
            check_range(src, region.src_offset, region.size)?;
            check_range(dst, region.dst_offset, region.size)?;

            copies.push(BufferCopy {
                src: src.gpu_handle(),
                src_offset: region.src_offset,
                dst: dst.gpu_handle(),
                dst_offset: region.dst_offset,
                size: region.size,
            });
        }

        log::trace!(
            "GraphicsDevice: immediate copy {:?} -> {:?} ({} region(s))",
            src.label(),
            dst.label(),
            copies.len()
        );

        self.instance.backend().execute_copies(&copies)
    }

    /// Read bytes back from a buffer. Blocks until the GPU is done with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds or the readback fails.
    pub fn read_buffer(
        &self,
        buffer: &Buffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        check_range(buffer, offset, size)?;
        self.instance
            .backend()
            .read_buffer(buffer.gpu_handle(), offset, size)
    }

    /// Hand a buffer to the deferred release queues.
    ///
    /// The buffer stays alive for [`frames_in_flight`](Self::frames_in_flight)
    /// more calls to [`advance_frame`](Self::advance_frame).
    pub fn retire_buffer(&self, buffer: Arc<Buffer>) {
        self.deferred.lock().retire(buffer);
    }

    /// Mark a frame boundary. Releases buffers retired `frames_in_flight`
    /// frames ago and returns how many were released.
    pub fn advance_frame(&self) -> usize {
        meshpool_core::frame_mark!();
        self.deferred.lock().advance()
    }

    /// Release every retired buffer now. Only call when the GPU is idle.
    pub fn flush_retired(&self) -> usize {
        self.deferred.lock().flush()
    }

    /// Number of retired buffers waiting for release.
    pub fn pending_release_count(&self) -> usize {
        self.deferred.lock().pending()
    }

    /// Get the number of live buffers created by this device.
    pub fn buffer_count(&self) -> usize {
        self.buffers
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Clean up dead weak references to released buffers.
    pub fn cleanup_dead_resources(&self) {
        self.buffers.write().retain(|w| w.strong_count() > 0);
    }
}

fn check_range(buffer: &Buffer, offset: u64, size: u64) -> Result<(), GraphicsError> {
    match offset.checked_add(size) {
        Some(end) if end <= buffer.size() => Ok(()),
        _ => Err(GraphicsError::InvalidParameter(format!(
            "range {offset}+{size} out of bounds for buffer {:?} of {} bytes",
            buffer.label(),
            buffer.size()
        ))),
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("frames_in_flight", &self.frames_in_flight)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{BackendType, InstanceParameters};
    use crate::types::BufferUsage;

    fn create_test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::with_parameters(
            InstanceParameters::new().with_backend(BackendType::Dummy),
        )
        .unwrap();
        instance.create_device().unwrap()
    }

    fn copyable(size: u64) -> BufferDescriptor {
        BufferDescriptor::new(size, BufferUsage::COPY_SRC | BufferUsage::COPY_DST)
    }

    #[test]
    fn test_create_buffer() {
        let device = create_test_device();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
            .unwrap();
        assert_eq!(buffer.size(), 1024);
        assert_eq!(device.buffer_count(), 1);
        assert!(buffer.device().is_some());
    }

    #[test]
    fn test_create_buffer_zero_size() {
        let device = create_test_device();
        let result = device.create_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_buffer_too_large() {
        let device = create_test_device();
        let size = device.capabilities().max_buffer_size + 1;
        let result = device.create_buffer(&BufferDescriptor::new(size, BufferUsage::VERTEX));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_write_bounds_and_alignment() {
        let device = create_test_device();
        let buffer = device.create_buffer(&copyable(16)).unwrap();

        assert!(device.write_buffer(&buffer, 12, &[0; 4]).is_ok());
        assert!(device.write_buffer(&buffer, 12, &[0; 8]).is_err());
        assert!(device.write_buffer(&buffer, 2, &[0; 4]).is_err());
    }

    #[test]
    fn test_copy_buffer_immediate() {
        let device = create_test_device();
        let src = device.create_buffer(&copyable(8)).unwrap();
        let dst = device.create_buffer(&copyable(16)).unwrap();
        device.write_buffer(&src, 0, &[7; 8]).unwrap();

        device
            .copy_buffer_immediate(
                &src,
                &dst,
                &[BufferCopyRegion {
                    src_offset: 0,
                    dst_offset: 8,
                    size: 8,
                }],
            )
            .unwrap();

        let bytes = device.read_buffer(&dst, 0, 16).unwrap();
        assert_eq!(&bytes[..8], &[0; 8]);
        assert_eq!(&bytes[8..], &[7; 8]);
    }

    #[test]
    fn test_copy_out_of_bounds() {
        let device = create_test_device();
        let src = device.create_buffer(&copyable(8)).unwrap();
        let dst = device.create_buffer(&copyable(8)).unwrap();
        let result = device.copy_buffer_immediate(&src, &dst, &[BufferCopyRegion::whole(16)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_retired_buffer_released_after_frames_in_flight() {
        let device = create_test_device();
        let buffer = device.create_buffer(&copyable(8)).unwrap();
        device.retire_buffer(buffer);
        assert_eq!(device.buffer_count(), 1);

        for _ in 0..device.frames_in_flight() - 1 {
            assert_eq!(device.advance_frame(), 0);
        }
        assert_eq!(device.advance_frame(), 1);
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.pending_release_count(), 0);
    }

    #[test]
    fn test_resource_cleanup() {
        let device = create_test_device();
        {
            let _buffer = device
                .create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
                .unwrap();
            assert_eq!(device.buffer_count(), 1);
        }
        device.cleanup_dead_resources();
        assert_eq!(device.buffer_count(), 0);
    }
}
