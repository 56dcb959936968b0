//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and WebGPU. It runs headless: no surface is created.

use std::sync::Arc;

use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, BufferUsage, COPY_ALIGNMENT, align_up};

use super::{BufferCopy, GpuBackend, GpuBuffer};

const WAIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend.
    pub fn new() -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}"))
        })?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("meshpool device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    fn wgpu_buffer(buffer: &GpuBuffer) -> Result<&wgpu::Buffer, GraphicsError> {
        match buffer {
            GpuBuffer::Wgpu(buffer) => Ok(buffer.as_ref()),
            _ => Err(GraphicsError::InvalidParameter(
                "buffer does not belong to the wgpu backend".to_string(),
            )),
        }
    }

    fn wait_for(&self, submission: wgpu::SubmissionIndex) -> Result<(), GraphicsError> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(WAIT_TIMEOUT),
            })
            .map(|_| ())
            .map_err(|e| GraphicsError::Internal(format!("device poll failed: {e}")))
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: align_up(descriptor.size, COPY_ALIGNMENT),
            usage: convert_buffer_usage(descriptor.usage),
            mapped_at_creation: false,
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!(
                "wgpu: failed to create buffer {:?} ({} bytes): {}",
                descriptor.label,
                descriptor.size,
                error
            );
            return Err(GraphicsError::OutOfMemory);
        }

        Ok(GpuBuffer::Wgpu(Arc::new(buffer)))
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let buffer = Self::wgpu_buffer(buffer)?;
        if data.len() as u64 % COPY_ALIGNMENT == 0 {
            self.queue.write_buffer(buffer, offset, data);
        } else {
            // Queue writes must be a multiple of 4 bytes.
            let mut padded = data.to_vec();
            padded.resize(align_up(data.len() as u64, COPY_ALIGNMENT) as usize, 0);
            self.queue.write_buffer(buffer, offset, &padded);
        }
        Ok(())
    }

    fn execute_copies(&self, copies: &[BufferCopy<'_>]) -> Result<(), GraphicsError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("immediate copy encoder"),
            });

        for copy in copies {
            encoder.copy_buffer_to_buffer(
                Self::wgpu_buffer(copy.src)?,
                copy.src_offset,
                Self::wgpu_buffer(copy.dst)?,
                copy.dst_offset,
                copy.size,
            );
        }

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_for(submission)
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        let source = Self::wgpu_buffer(buffer)?;

        // Copies must start and end on 4-byte boundaries.
        let start = offset - offset % COPY_ALIGNMENT;
        let end = align_up(offset + size, COPY_ALIGNMENT);
        let staging_size = end - start;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read staging buffer"),
            size: staging_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read buffer encoder"),
            });
        encoder.copy_buffer_to_buffer(source, start, &staging, 0, staging_size);
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wait_for(submission)?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(GraphicsError::Internal(format!("buffer map failed: {e}")));
            }
            Err(_) => return Err(GraphicsError::DeviceLost),
        }

        let skip = (offset - start) as usize;
        let data = slice.get_mapped_range()[skip..skip + size as usize].to_vec();
        staging.unmap();

        Ok(data)
    }
}

fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();

    if usage.contains(BufferUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        result |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::STORAGE) {
        result |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        result |= wgpu::BufferUsages::INDIRECT;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }
    if usage.contains(BufferUsage::MAP_READ) {
        result |= wgpu::BufferUsages::MAP_READ;
    }
    if usage.contains(BufferUsage::MAP_WRITE) {
        result |= wgpu::BufferUsages::MAP_WRITE;
    }

    result
}
