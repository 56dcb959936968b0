//! GPU resources.
//!
//! - [`Buffer`] - GPU memory buffer created by [`GraphicsDevice`]
//! - [`DeferredRelease`] - Keeps retired buffers alive until in-flight frames are done
//!
//! Buffers are reference-counted with [`Arc`] and can be shared across threads.
//! Each buffer holds a weak reference back to its parent device.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod deferred;

pub use buffer::{Buffer, BufferCopyRegion};
pub use deferred::DeferredRelease;
