//! Error types.
//!
//! [`GraphicsError`] is returned by the device boundary (instance, device,
//! backends). [`ArenaError`] is returned by the arena, record table and
//! registry; it wraps a [`GraphicsError`] when a device call fails underneath.

use std::fmt;

use crate::arena::BufferRegion;
use crate::records::MeshHandle;

/// Errors that can occur at the device boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// The GPU device was lost.
    DeviceLost,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

/// Errors returned by arena allocation and mesh bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaError {
    /// The request does not fit and the arena is not allowed to grow.
    OutOfArenaSpace {
        /// Requested size in bytes (after alignment).
        requested: u64,
        /// Arena capacity in bytes.
        capacity: u64,
    },
    /// The region is not a live allocation of this arena (double free or foreign region).
    InvalidRegion(BufferRegion),
    /// The mesh handle is stale or was never issued by this table.
    UnknownHandle(MeshHandle),
    /// Creating or filling the larger buffer failed; the arena is unchanged.
    GrowthFailed(GraphicsError),
    /// Zero-byte allocations are rejected.
    EmptyAllocation,
    /// The arena configuration is invalid.
    InvalidConfig(String),
    /// The geometry does not match the table it was added to, or is malformed.
    InvalidGeometry(String),
    /// A device write or readback on the arena buffer failed.
    Device(GraphicsError),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfArenaSpace {
                requested,
                capacity,
            } => write!(
                f,
                "out of arena space: {requested} bytes requested, capacity {capacity}"
            ),
            Self::InvalidRegion(region) => {
                write!(f, "invalid region {}+{}", region.offset, region.size)
            }
            Self::UnknownHandle(handle) => write!(f, "unknown mesh handle {handle}"),
            Self::GrowthFailed(err) => write!(f, "arena growth failed: {err}"),
            Self::EmptyAllocation => write!(f, "zero-size allocation"),
            Self::InvalidConfig(msg) => write!(f, "invalid arena config: {msg}"),
            Self::InvalidGeometry(msg) => write!(f, "invalid geometry: {msg}"),
            Self::Device(err) => write!(f, "arena device access failed: {err}"),
        }
    }
}

impl std::error::Error for ArenaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::GrowthFailed(err) | Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_arena_error_display() {
        let err = ArenaError::OutOfArenaSpace {
            requested: 512,
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "out of arena space: 512 bytes requested, capacity 1024"
        );

        let err = ArenaError::InvalidRegion(BufferRegion::new(300, 100));
        assert_eq!(err.to_string(), "invalid region 300+100");
    }

    #[test]
    fn test_arena_error_source() {
        let err = ArenaError::GrowthFailed(GraphicsError::OutOfMemory);
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "out of GPU memory");

        assert!(ArenaError::EmptyAllocation.source().is_none());
    }
}
