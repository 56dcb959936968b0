//! Graphics instance.
//!
//! The [`GraphicsInstance`] is the top-level entry point for the graphics system.
//! It owns the GPU backend and creates [`GraphicsDevice`]s.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{self, GpuBackend};
use crate::device::{DeviceCapabilities, GraphicsDevice};
use crate::error::GraphicsError;

/// Default number of frames the CPU may record ahead of the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Which backend the instance should create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendType {
    /// Use wgpu when available, otherwise fall back to the dummy backend.
    #[default]
    Auto,
    /// Host-memory backend; always available.
    Dummy,
    /// wgpu backend; fails if no adapter is found.
    Wgpu,
}

/// Parameters for creating a [`GraphicsInstance`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InstanceParameters {
    /// Backend selection.
    pub backend: BackendType,
    /// Number of frames in flight. Retired buffers are kept alive this many frames.
    pub frames_in_flight: usize,
    /// Optional cap on buffer size, below the backend's own limit.
    pub max_buffer_size: Option<u64>,
}

impl Default for InstanceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::Auto,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            max_buffer_size: None,
        }
    }
}

impl InstanceParameters {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight;
        self
    }

    /// Cap the size of any single buffer.
    pub fn with_max_buffer_size(mut self, max_buffer_size: u64) -> Self {
        self.max_buffer_size = Some(max_buffer_size);
        self
    }
}

/// The graphics instance owns the backend and tracks the devices created from it.
///
/// Devices keep their instance alive; the instance only holds weak
/// references back, so dropping the last device handle releases both.
///
/// # Thread Safety
///
/// `GraphicsInstance` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```
/// use meshpool_graphics::{BackendType, GraphicsInstance, InstanceParameters};
///
/// let instance = GraphicsInstance::with_parameters(
///     InstanceParameters::new().with_backend(BackendType::Dummy),
/// )
/// .unwrap();
/// let device = instance.create_device().unwrap();
/// assert_eq!(device.frames_in_flight(), 3);
/// ```
pub struct GraphicsInstance {
    self_ref: RwLock<Weak<GraphicsInstance>>,
    devices: RwLock<Vec<Weak<GraphicsDevice>>>,
    backend: Arc<dyn GpuBackend>,
    parameters: InstanceParameters,
}

impl GraphicsInstance {
    /// Create a new graphics instance with default parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the graphics system cannot be initialized.
    pub fn new() -> Result<Arc<Self>, GraphicsError> {
        Self::with_parameters(InstanceParameters::default())
    }

    /// Create a new graphics instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the requested
    /// backend cannot be created.
    pub fn with_parameters(parameters: InstanceParameters) -> Result<Arc<Self>, GraphicsError> {
        log::info!("Creating GraphicsInstance ({:?})", parameters.backend);

        validate_parameters(&parameters)?;
        let backend = backend::create_backend(parameters.backend)?;
        Self::from_backend(backend, parameters)
    }

    /// Create an instance on an already constructed backend.
    ///
    /// `parameters.backend` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid.
    pub fn with_backend(
        backend: Arc<dyn GpuBackend>,
        parameters: InstanceParameters,
    ) -> Result<Arc<Self>, GraphicsError> {
        validate_parameters(&parameters)?;
        Self::from_backend(backend, parameters)
    }

    fn from_backend(
        backend: Arc<dyn GpuBackend>,
        parameters: InstanceParameters,
    ) -> Result<Arc<Self>, GraphicsError> {
        log::info!("Using GPU backend: {}", backend.name());

        let instance = Arc::new(Self {
            self_ref: RwLock::new(Weak::new()),
            devices: RwLock::new(Vec::new()),
            backend,
            parameters,
        });

        *instance.self_ref.write() = Arc::downgrade(&instance);

        Ok(instance)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Parameters the instance was created with.
    pub fn parameters(&self) -> &InstanceParameters {
        &self.parameters
    }

    fn arc_self(&self) -> Option<Arc<GraphicsInstance>> {
        self.self_ref.read().upgrade()
    }

    /// Create a graphics device.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation fails.
    pub fn create_device(&self) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        let instance = self.arc_self().ok_or_else(|| {
            GraphicsError::ResourceCreationFailed("instance has been dropped".to_string())
        })?;

        let backend_limit = self.backend.max_buffer_size();
        let capabilities = DeviceCapabilities {
            max_buffer_size: self
                .parameters
                .max_buffer_size
                .map_or(backend_limit, |cap| cap.min(backend_limit)),
        };

        log::info!(
            "Creating device on {} (max buffer size {})",
            self.backend.name(),
            capabilities.max_buffer_size
        );

        let device = Arc::new(GraphicsDevice::new(
            instance,
            self.backend.name().to_string(),
            capabilities,
            self.parameters.frames_in_flight,
        ));

        let mut devices = self.devices.write();
        devices.retain(|d| d.strong_count() > 0);
        devices.push(Arc::downgrade(&device));

        Ok(device)
    }

    /// Get the live devices created by this instance.
    pub fn devices(&self) -> Vec<Arc<GraphicsDevice>> {
        self.devices.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Get the number of live devices created by this instance.
    pub fn device_count(&self) -> usize {
        self.devices
            .read()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }
}

fn validate_parameters(parameters: &InstanceParameters) -> Result<(), GraphicsError> {
    if parameters.frames_in_flight == 0 {
        return Err(GraphicsError::InvalidParameter(
            "frames_in_flight must be at least 1".to_string(),
        ));
    }
    Ok(())
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("backend", &self.backend.name())
            .field("device_count", &self.device_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsInstance: Send, Sync);
