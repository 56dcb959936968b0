//! # meshpool core
//!
//! GPU-agnostic building blocks shared by the meshpool graphics crate:
//!
//! - [`handle`] - Generational handles and the [`SlotMap`](handle::SlotMap) that issues them
//! - [`mesh`] - CPU-side geometry ([`GeometryData`](mesh::GeometryData)) and vertex layouts
//! - [`profiling`] - Optional Tracy instrumentation macros

pub mod handle;
pub mod mesh;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
