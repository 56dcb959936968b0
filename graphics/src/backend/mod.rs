//! GPU backend abstraction layer.
//!
//! The arenas only need a handful of device operations: create a buffer,
//! write bytes into it, run a batch of buffer-to-buffer copies to completion,
//! and read bytes back. Each backend implements the [`GpuBackend`] trait
//! over those operations.
//!
//! # Available Backends
//!
//! - `dummy` (always built): Host-memory backend for tests and headless tools
//! - `wgpu_backend` (feature `wgpu-backend`, on by default): Cross-platform backend using wgpu

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub mod dummy;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::instance::BackendType;
use crate::types::BufferDescriptor;

/// Handle to a GPU buffer resource.
#[derive(Clone)]
pub enum GpuBuffer {
    /// Dummy backend buffer, backed by host memory.
    Dummy(Arc<RwLock<Vec<u8>>>),
    /// wgpu backend buffer
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Arc<wgpu::Buffer>),
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(data) => f
                .debug_struct("GpuBuffer::Dummy")
                .field("len", &data.read().len())
                .finish(),
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(buffer) => f.debug_tuple("GpuBuffer::Wgpu").field(buffer).finish(),
        }
    }
}

/// One buffer-to-buffer copy command.
#[derive(Debug, Clone, Copy)]
pub struct BufferCopy<'a> {
    /// Source buffer.
    pub src: &'a GpuBuffer,
    /// Byte offset into the source.
    pub src_offset: u64,
    /// Destination buffer.
    pub dst: &'a GpuBuffer,
    /// Byte offset into the destination.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Largest buffer the backend can create, in bytes.
    fn max_buffer_size(&self) -> u64;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Write data to a buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Record the copies into one submission and block until the GPU has
    /// finished executing them.
    fn execute_copies(&self, copies: &[BufferCopy<'_>]) -> Result<(), GraphicsError>;

    /// Read data from a buffer.
    ///
    /// This is a blocking operation that waits for the GPU to finish.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64)
    -> Result<Vec<u8>, GraphicsError>;
}

/// Create the backend requested by `backend_type`.
///
/// [`BackendType::Auto`] prefers wgpu and falls back to the dummy backend.
pub fn create_backend(backend_type: BackendType) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    match backend_type {
        BackendType::Dummy => {
            log::info!("Using dummy backend");
            Ok(Arc::new(dummy::DummyBackend::new()))
        }
        BackendType::Wgpu => create_wgpu_backend(),
        BackendType::Auto => match create_wgpu_backend() {
            Ok(backend) => Ok(backend),
            Err(e) => {
                log::warn!("Failed to create wgpu backend: {}", e);
                log::info!("Using dummy backend");
                Ok(Arc::new(dummy::DummyBackend::new()))
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    let backend = wgpu_backend::WgpuBackend::new()?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    Err(GraphicsError::InitializationFailed(
        "wgpu backend not compiled in (enable the `wgpu-backend` feature)".to_string(),
    ))
}
