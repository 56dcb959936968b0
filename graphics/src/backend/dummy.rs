//! Dummy GPU backend for testing and development.
//!
//! Buffers live in host memory, so writes, copies and readbacks behave like
//! they would on a device. This is what lets arena growth and per-frame
//! isolation be verified without GPU hardware.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

use super::{BufferCopy, GpuBackend, GpuBuffer};

/// Default buffer size limit, matching common desktop limits (1 GB).
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 1 << 30;

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    max_buffer_size: u64,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Override the maximum buffer size.
    pub fn with_max_buffer_size(mut self, max_buffer_size: u64) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    fn storage(buffer: &GpuBuffer) -> Result<&Arc<RwLock<Vec<u8>>>, GraphicsError> {
        match buffer {
            GpuBuffer::Dummy(data) => Ok(data),
            #[cfg(feature = "wgpu-backend")]
            _ => Err(GraphicsError::InvalidParameter(
                "buffer does not belong to the dummy backend".to_string(),
            )),
        }
    }

    fn check_range(len: usize, offset: u64, size: u64) -> Result<(), GraphicsError> {
        match offset.checked_add(size) {
            Some(end) if end <= len as u64 => Ok(()),
            _ => Err(GraphicsError::InvalidParameter(format!(
                "range {offset}+{size} out of bounds for buffer of {len} bytes"
            ))),
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        if descriptor.size > self.max_buffer_size {
            return Err(GraphicsError::OutOfMemory);
        }
        Ok(GpuBuffer::Dummy(Arc::new(RwLock::new(vec![
            0u8;
            descriptor.size as usize
        ]))))
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: write_buffer offset={} len={}",
            offset,
            data.len()
        );
        let mut storage = Self::storage(buffer)?.write();
        Self::check_range(storage.len(), offset, data.len() as u64)?;
        let start = offset as usize;
        storage[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn execute_copies(&self, copies: &[BufferCopy<'_>]) -> Result<(), GraphicsError> {
        log::trace!("DummyBackend: executing {} copies", copies.len());
        for copy in copies {
            let src = Self::storage(copy.src)?;
            let dst = Self::storage(copy.dst)?;
            let size = copy.size as usize;
            let src_start = copy.src_offset as usize;
            let dst_start = copy.dst_offset as usize;

            if Arc::ptr_eq(src, dst) {
                let mut storage = dst.write();
                Self::check_range(storage.len(), copy.src_offset, copy.size)?;
                Self::check_range(storage.len(), copy.dst_offset, copy.size)?;
                storage.copy_within(src_start..src_start + size, dst_start);
            } else {
                let source = src.read();
                let mut target = dst.write();
                Self::check_range(source.len(), copy.src_offset, copy.size)?;
                Self::check_range(target.len(), copy.dst_offset, copy.size)?;
                target[dst_start..dst_start + size]
                    .copy_from_slice(&source[src_start..src_start + size]);
            }
        }
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        log::trace!("DummyBackend: read_buffer offset={} size={}", offset, size);
        let storage = Self::storage(buffer)?.read();
        Self::check_range(storage.len(), offset, size)?;
        let start = offset as usize;
        Ok(storage[start..start + size as usize].to_vec())
    }
}
