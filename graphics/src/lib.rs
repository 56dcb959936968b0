//! # meshpool graphics
//!
//! Packs many small meshes into a few large device buffers and hands out
//! stable handles to them.
//!
//! ## Overview
//!
//! - [`ArenaBuffer`] - Growable device buffer that sub-allocates [`BufferRegion`]s
//! - [`BufferRegistry`] - One [`RecordTable`] per [`GeometryKey`] (layout + topology + index format)
//! - [`RecordTable`] - Maps [`MeshHandle`]s to the vertex and index regions of each mesh
//! - [`DrawList`] - Compiles visible meshes into indirect draw entries ([`GpuBufferEntry`])
//! - [`FrameMultiplexer`] - N physical instances of per-frame buffers, one per frame in flight
//!
//! Device access goes through [`GraphicsInstance`] and [`GraphicsDevice`],
//! backed by wgpu or by a host-memory dummy backend for tests.
//!
//! ## Example
//!
//! ```
//! use meshpool_graphics::generators::{generate_cube, generate_quad};
//! use meshpool_graphics::{BufferRegistry, DrawList, GraphicsInstance, RegistryConfig};
//!
//! # use meshpool_graphics::{BackendType, InstanceParameters};
//! let device = GraphicsInstance::with_parameters(
//!     InstanceParameters::new().with_backend(BackendType::Dummy),
//! )
//! .unwrap()
//! .create_device()
//! .unwrap();
//! let mut registry = BufferRegistry::new(device, RegistryConfig::default()).unwrap();
//!
//! let (quads, a) = registry.add_mesh(&generate_quad(1.0, 1.0)).unwrap();
//! let (_, b) = registry.add_mesh(&generate_quad(0.5, 0.5)).unwrap();
//! let (cubes, _) = registry.add_mesh(&generate_cube(1.0)).unwrap();
//! assert_ne!(quads, cubes);
//!
//! let mut draws = DrawList::new();
//! draws.compile(&registry[quads], &[a, b]);
//! assert_eq!(draws.len(), 2);
//!
//! let (vertex_buffer, index_buffer) = registry[quads].buffers();
//! # let _ = (vertex_buffer, index_buffer);
//! ```

pub mod arena;
pub mod backend;
pub mod device;
pub mod draw;
pub mod error;
pub mod frame;
pub mod instance;
pub mod records;
pub mod registry;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use arena::{ArenaBuffer, ArenaConfig, ArenaStats, BufferRegion};
pub use backend::GpuBackend;
pub use backend::dummy::DummyBackend;
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use draw::{DrawList, GpuBufferEntry};
pub use error::{ArenaError, GraphicsError};
pub use frame::{Frame, FrameBufferKey, FrameMultiplexer, PerFrameBufferHandle};
pub use instance::{BackendType, GraphicsInstance, InstanceParameters};
pub use records::{BufferEntry, MeshHandle, RecordTable};
pub use registry::{BufferHandle, BufferRegistry, GeometryKey, RegistryConfig};
pub use resources::Buffer;
pub use types::{BufferDescriptor, BufferUsage};

pub use meshpool_core::mesh::{
    GeometryData, IndexFormat, PrimitiveTopology, VertexAttribute, VertexAttributeFormat,
    VertexAttributeSemantic, VertexLayout, generators,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once at startup.
pub fn init() {
    log::info!("meshpool graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
