//! Frame multiplexing of per-frame buffers.
//!
//! With N frames in flight the CPU records frame `k + 1` while the GPU still
//! reads frame `k`. Any buffer the CPU rewrites every frame (draw lists,
//! per-draw uniforms) therefore needs N physical instances. A
//! [`FrameMultiplexer`] creates them under one logical
//! [`PerFrameBufferHandle`], and each [`Frame`] resolves that handle to its
//! own instance only.
//!
//! ```
//! use meshpool_graphics::{BufferDescriptor, BufferUsage, FrameMultiplexer, GraphicsInstance};
//!
//! # use meshpool_graphics::{BackendType, InstanceParameters};
//! let device = GraphicsInstance::with_parameters(
//!     InstanceParameters::new().with_backend(BackendType::Dummy),
//! )
//! .unwrap()
//! .create_device()
//! .unwrap();
//! let mut mux = FrameMultiplexer::new(device.clone());
//!
//! let draws = mux
//!     .register_per_frame_buffer(&BufferDescriptor::new(
//!         256,
//!         BufferUsage::INDIRECT | BufferUsage::COPY_DST,
//!     ))
//!     .unwrap();
//!
//! let mut frames = mux.create_frames();
//! let keys: Vec<_> = frames
//!     .iter_mut()
//!     .map(|frame| frame.register_buffer(&mux, draws))
//!     .collect();
//!
//! let frame = &frames[0];
//! device
//!     .write_buffer(frame.buffer_handle(keys[0]), 0, &[1, 0, 0, 0])
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use meshpool_core::handle::SlotMap;
use meshpool_core::new_handle_type;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::BufferDescriptor;

new_handle_type! {
    /// Logical handle to a buffer with one physical instance per frame slot.
    pub struct PerFrameBufferHandle;
}

/// Frame-local key returned by [`Frame::register_buffer`].
///
/// Only valid with the frame that issued it. Frame ids are unique within one
/// multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameBufferKey {
    frame_id: u64,
    index: u32,
}

impl FrameBufferKey {
    /// Id of the frame that issued this key.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

struct PerFrameBuffer {
    descriptor: BufferDescriptor,
    instances: Vec<Arc<Buffer>>,
}

/// Creates per-frame buffers and the [`Frame`]s that resolve them.
pub struct FrameMultiplexer {
    token: Arc<()>,
    next_frame_id: AtomicU64,
    device: Arc<GraphicsDevice>,
    frame_count: usize,
    buffers: SlotMap<PerFrameBufferHandle, PerFrameBuffer>,
}

impl FrameMultiplexer {
    /// Create a multiplexer with one slot per device frame in flight.
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        let frame_count = device.frames_in_flight().max(1);
        Self {
            token: Arc::new(()),
            next_frame_id: AtomicU64::new(0),
            device,
            frame_count,
            buffers: SlotMap::new(),
        }
    }

    /// Create a multiplexer with an explicit slot count.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `frame_count` is zero.
    pub fn with_frame_count(
        device: Arc<GraphicsDevice>,
        frame_count: usize,
    ) -> Result<Self, GraphicsError> {
        if frame_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frame count cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            token: Arc::new(()),
            next_frame_id: AtomicU64::new(0),
            device,
            frame_count,
            buffers: SlotMap::new(),
        })
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Number of frame slots (N).
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Number of registered per-frame buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Create N independent device buffers behind one logical handle.
    ///
    /// Instance `i` is labelled `"{label}[i]"`.
    ///
    /// # Errors
    ///
    /// Returns an error if any instance cannot be created. Instances created
    /// before the failure are dropped.
    pub fn register_per_frame_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<PerFrameBufferHandle, GraphicsError> {
        let base = descriptor.label.as_deref().unwrap_or("per_frame");
        let instances = (0..self.frame_count)
            .map(|slot| {
                let instance = descriptor.clone().with_label(format!("{base}[{slot}]"));
                self.device.create_buffer(&instance)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let handle = self.buffers.insert(PerFrameBuffer {
            descriptor: descriptor.clone(),
            instances,
        });

        log::debug!(
            "FrameMultiplexer: registered {} ({} x {} bytes)",
            handle,
            self.frame_count,
            descriptor.size
        );

        Ok(handle)
    }

    /// Descriptor a per-frame buffer was registered with.
    pub fn descriptor(&self, handle: PerFrameBufferHandle) -> Option<&BufferDescriptor> {
        self.buffers.get(handle).map(|buffer| &buffer.descriptor)
    }

    /// Physical instance of `handle` for `slot`.
    pub fn instance(&self, handle: PerFrameBufferHandle, slot: usize) -> Option<&Arc<Buffer>> {
        self.buffers
            .get(handle)
            .and_then(|buffer| buffer.instances.get(slot))
    }

    /// Create the frame for one slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below [`frame_count`](Self::frame_count).
    pub fn create_frame(&self, slot: usize) -> Frame {
        assert!(
            slot < self.frame_count,
            "frame slot {slot} out of range for {} frames",
            self.frame_count
        );
        Frame {
            id: self.next_frame_id.fetch_add(1, Ordering::Relaxed),
            multiplexer: Arc::clone(&self.token),
            slot,
            buffers: Vec::new(),
        }
    }

    /// Create one frame per slot, in slot order.
    pub fn create_frames(&self) -> Vec<Frame> {
        (0..self.frame_count).map(|slot| self.create_frame(slot)).collect()
    }
}

impl std::fmt::Debug for FrameMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameMultiplexer")
            .field("frame_count", &self.frame_count)
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

/// One frame slot's view of the per-frame buffers.
///
/// Register every per-frame buffer the frame uses when it is built, then
/// resolve keys while recording.
#[derive(Debug)]
pub struct Frame {
    id: u64,
    multiplexer: Arc<()>,
    slot: usize,
    buffers: Vec<Arc<Buffer>>,
}

impl Frame {
    /// Id of this frame, unique among frames of its multiplexer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Slot index in `0..N`.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of registered buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Bind this frame's instance of `handle` and return a key for it.
    ///
    /// # Panics
    ///
    /// Panics if `mux` did not create this frame or does not know `handle`.
    pub fn register_buffer(
        &mut self,
        mux: &FrameMultiplexer,
        handle: PerFrameBufferHandle,
    ) -> FrameBufferKey {
        assert!(
            Arc::ptr_eq(&mux.token, &self.multiplexer),
            "frame {} was created by another multiplexer",
            self.id
        );
        let Some(instance) = mux.instance(handle, self.slot) else {
            panic!("{handle} is not registered with this multiplexer");
        };

        let index = self.buffers.len() as u32;
        self.buffers.push(Arc::clone(instance));

        FrameBufferKey {
            frame_id: self.id,
            index,
        }
    }

    /// Resolve a key to this frame's buffer.
    ///
    /// # Panics
    ///
    /// Panics if the key was issued by another frame or was never issued.
    pub fn buffer_handle(&self, key: FrameBufferKey) -> &Arc<Buffer> {
        assert_eq!(
            key.frame_id, self.id,
            "buffer key belongs to frame {}, not frame {}",
            key.frame_id, self.id
        );
        match self.buffers.get(key.index as usize) {
            Some(buffer) => buffer,
            None => panic!("buffer key {} was never registered with frame {}", key.index, self.id),
        }
    }

    /// Like [`buffer_handle`](Self::buffer_handle), but returns `None` instead of panicking.
    pub fn try_buffer_handle(&self, key: FrameBufferKey) -> Option<&Arc<Buffer>> {
        if key.frame_id != self.id {
            return None;
        }
        self.buffers.get(key.index as usize)
    }
}
