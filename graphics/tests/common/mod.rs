//! Common utilities for integration tests.
//!
//! Tests are parameterized over [`Backend`] with `rstest`; a backend that is
//! not compiled in or has no adapter on this machine is skipped.

use std::sync::Arc;

use meshpool_graphics::{
    ArenaConfig, BackendType, BufferDescriptor, BufferRegistry, BufferUsage, GraphicsDevice,
    GraphicsInstance, InstanceParameters, RegistryConfig,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Host-memory backend.
    Dummy,
    /// WebGPU backend (via wgpu).
    WebGpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            #[cfg(feature = "wgpu-backend")]
            Backend::WebGpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::WebGpu => false,
        }
    }

    /// Convert to InstanceParameters for creating a GraphicsInstance.
    pub fn to_instance_parameters(self) -> InstanceParameters {
        match self {
            Backend::Dummy => InstanceParameters::new().with_backend(BackendType::Dummy),
            Backend::WebGpu => InstanceParameters::new().with_backend(BackendType::Wgpu),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Instance and device for one test.
pub struct TestContext {
    #[allow(dead_code)]
    pub backend: Backend,
    #[allow(dead_code)]
    pub instance: Arc<GraphicsInstance>,
    pub device: Arc<GraphicsDevice>,
}

impl TestContext {
    /// Create a context for `backend` with the default frames in flight.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_parameters(backend, backend.to_instance_parameters())
    }

    /// Create a context with an explicit frames-in-flight count.
    #[allow(dead_code)]
    pub fn with_frames_in_flight(backend: Backend, frames: usize) -> Option<Self> {
        Self::with_parameters(
            backend,
            backend.to_instance_parameters().with_frames_in_flight(frames),
        )
    }

    fn with_parameters(backend: Backend, params: InstanceParameters) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }

        let instance = GraphicsInstance::with_parameters(params).ok()?;
        let device = instance.create_device().ok()?;

        Some(Self {
            backend,
            instance,
            device,
        })
    }

    /// Registry with small arenas so tests exercise growth.
    #[allow(dead_code)]
    pub fn small_registry(&self, vertex_capacity: u64, index_capacity: u64) -> BufferRegistry {
        let config = RegistryConfig::default()
            .with_vertex(ArenaConfig::vertex().with_initial_capacity(vertex_capacity))
            .with_index(ArenaConfig::index().with_initial_capacity(index_capacity));
        BufferRegistry::new(self.device.clone(), config).expect("Failed to create registry")
    }

    /// Descriptor for a per-frame indirect-argument buffer.
    #[allow(dead_code)]
    pub fn indirect_descriptor(&self, size: u64) -> BufferDescriptor {
        BufferDescriptor::new(
            size,
            BufferUsage::INDIRECT | BufferUsage::COPY_DST | BufferUsage::COPY_SRC,
        )
        .with_label("draw_args")
    }
}

// ============================================================================
// Test Data Generators
// ============================================================================

/// Generate test data pattern for buffer tests.
#[allow(dead_code)]
pub fn generate_test_pattern(size: usize, seed: u8) -> Vec<u8> {
    (0..size).map(|i| (i as u8).wrapping_add(seed)).collect()
}
