//! Deferred release of retired buffers.
//!
//! Command lists recorded for earlier frames may still reference a buffer
//! after the CPU side has replaced it (an arena that just grew, for example).
//! Dropping the last reference right away would free memory the GPU is still
//! reading. Instead the buffer is parked in the current frame's queue and
//! released once the frame pipeline has come back around to that queue.
//!
//! ```text
//!  retire(buf) ──► [ frame 0 ] [ frame 1 ] [ frame 2 ]
//!                      ▲ current
//!  advance()   ──► rotate, then drop everything in the new current queue
//! ```

use std::sync::Arc;

use super::Buffer;

/// Frame-indexed queues of buffers waiting to be released.
#[derive(Debug)]
pub struct DeferredRelease {
    queues: Vec<Vec<Arc<Buffer>>>,
    current: usize,
}

impl DeferredRelease {
    /// Create queues for `frames_in_flight` frames (at least one).
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            queues: (0..frames_in_flight.max(1)).map(|_| Vec::new()).collect(),
            current: 0,
        }
    }

    /// Number of frames a retired buffer is kept alive for.
    pub fn frames_in_flight(&self) -> usize {
        self.queues.len()
    }

    /// Park `buffer` until the current frame slot comes around again.
    pub fn retire(&mut self, buffer: Arc<Buffer>) {
        log::trace!(
            "DeferredRelease: retiring {:?} ({} bytes) in slot {}",
            buffer.label(),
            buffer.size(),
            self.current
        );
        self.queues[self.current].push(buffer);
    }

    /// Move to the next frame slot and release everything parked there.
    ///
    /// Returns the number of buffers released.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.queues.len();
        let released = std::mem::take(&mut self.queues[self.current]);
        if !released.is_empty() {
            log::debug!(
                "DeferredRelease: releasing {} buffer(s) from slot {}",
                released.len(),
                self.current
            );
        }
        released.len()
    }

    /// Number of buffers still waiting.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    /// Release everything immediately.
    ///
    /// Only safe once the GPU is idle.
    pub fn flush(&mut self) -> usize {
        self.queues.iter_mut().map(|queue| queue.drain(..).count()).sum()
    }
}
