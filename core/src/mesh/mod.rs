//! CPU-side geometry types and generators.
//!
//! - [`VertexLayout`] - Interleaved vertex format (stride + attributes)
//! - [`GeometryData`] - Raw vertex and index bytes for one mesh
//! - [`generators`] - Common shapes (quad, cube)
//!
//! These types are re-exported by `meshpool-graphics`, which packs
//! [`GeometryData`] into device arenas.

mod data;
pub mod generators;
mod layout;

pub use data::{GeometryData, IndexFormat, PrimitiveTopology};
pub use layout::{VertexAttribute, VertexAttributeFormat, VertexAttributeSemantic, VertexLayout};
