//! Buffer usage flags and descriptors shared by the device and the arenas.

mod buffer;

pub use buffer::{BufferDescriptor, BufferUsage, COPY_ALIGNMENT, align_up};
