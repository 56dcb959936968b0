//! CPU-side geometry data.
//!
//! This module provides:
//! - [`PrimitiveTopology`] - How vertices are assembled into primitives
//! - [`IndexFormat`] - Index data format (u16 or u32)
//! - [`GeometryData`] - Raw vertex and index bytes for one mesh

use std::sync::Arc;

use super::layout::VertexLayout;

/// Primitive topology describing how vertices are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveTopology {
    /// Each vertex is a separate point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Vertices form a connected strip of lines.
    LineStrip,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Vertices form a connected strip of triangles.
    TriangleStrip,
}

/// Index format for indexed drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexFormat {
    /// 16-bit unsigned integers (max 65535 vertices).
    #[default]
    Uint16,
    /// 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Get the size in bytes of each index.
    pub fn size(&self) -> u32 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// Raw geometry for one mesh: an interleaved vertex stream and an index stream.
///
/// `GeometryData` is what gets packed into the vertex and index arenas. The
/// byte streams are stored as-is; [`validate`](Self::validate) checks that
/// they agree with the declared counts before upload.
///
/// ```
/// use meshpool_core::mesh::{GeometryData, IndexFormat, VertexLayout};
///
/// let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
/// let geometry = GeometryData::new(VertexLayout::position_only())
///     .with_vertices(&positions)
///     .with_indices_u16(&[0, 1, 2])
///     .with_label("triangle");
///
/// assert_eq!(geometry.vertex_count(), 3);
/// assert_eq!(geometry.index_format(), IndexFormat::Uint16);
/// assert!(geometry.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct GeometryData {
    layout: Arc<VertexLayout>,
    topology: PrimitiveTopology,
    vertex_data: Vec<u8>,
    vertex_count: u32,
    index_data: Vec<u8>,
    index_format: IndexFormat,
    index_count: u32,
    label: Option<String>,
}

impl GeometryData {
    /// Create empty triangle-list geometry with the given layout.
    pub fn new(layout: Arc<VertexLayout>) -> Self {
        Self {
            layout,
            topology: PrimitiveTopology::TriangleList,
            vertex_data: Vec::new(),
            vertex_count: 0,
            index_data: Vec::new(),
            index_format: IndexFormat::Uint16,
            index_count: 0,
            label: None,
        }
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the vertex stream from typed vertices.
    ///
    /// The vertex count is derived from the byte length and the layout stride.
    pub fn with_vertices<V: bytemuck::Pod>(mut self, vertices: &[V]) -> Self {
        self.vertex_data = bytemuck::cast_slice(vertices).to_vec();
        self.vertex_count = (self.vertex_data.len() / self.layout.stride.max(1) as usize) as u32;
        self
    }

    /// Set the vertex stream from raw bytes and an explicit count.
    pub fn with_vertex_bytes(mut self, data: Vec<u8>, count: u32) -> Self {
        self.vertex_data = data;
        self.vertex_count = count;
        self
    }

    /// Set 16-bit indices.
    pub fn with_indices_u16(mut self, indices: &[u16]) -> Self {
        self.index_data = bytemuck::cast_slice(indices).to_vec();
        self.index_format = IndexFormat::Uint16;
        self.index_count = indices.len() as u32;
        self
    }

    /// Set 32-bit indices.
    pub fn with_indices_u32(mut self, indices: &[u32]) -> Self {
        self.index_data = bytemuck::cast_slice(indices).to_vec();
        self.index_format = IndexFormat::Uint32;
        self.index_count = indices.len() as u32;
        self
    }

    /// Set the index stream from raw bytes.
    pub fn with_index_bytes(mut self, data: Vec<u8>, format: IndexFormat, count: u32) -> Self {
        self.index_data = data;
        self.index_format = format;
        self.index_count = count;
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the vertex layout.
    pub fn layout(&self) -> &Arc<VertexLayout> {
        &self.layout
    }

    /// Get the primitive topology.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Raw vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertex_data
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Raw index bytes.
    pub fn index_bytes(&self) -> &[u8] {
        &self.index_data
    }

    /// Index format.
    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    /// Number of indices.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Get the label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Number of primitives described by the index stream.
    pub fn primitive_count(&self) -> u32 {
        match self.topology {
            PrimitiveTopology::PointList => self.index_count,
            PrimitiveTopology::LineList => self.index_count / 2,
            PrimitiveTopology::LineStrip => self.index_count.saturating_sub(1),
            PrimitiveTopology::TriangleList => self.index_count / 3,
            PrimitiveTopology::TriangleStrip => self.index_count.saturating_sub(2),
        }
    }

    /// Check that both streams are non-empty and match their declared counts.
    pub fn validate(&self) -> Result<(), String> {
        self.layout.validate()?;

        if self.vertex_count == 0 || self.vertex_data.is_empty() {
            return Err("geometry has no vertices".to_string());
        }
        if self.index_count == 0 || self.index_data.is_empty() {
            return Err("geometry has no indices".to_string());
        }

        let expected_vertex_bytes = self.vertex_count as usize * self.layout.stride as usize;
        if self.vertex_data.len() != expected_vertex_bytes {
            return Err(format!(
                "vertex stream is {} bytes, expected {} ({} vertices x stride {})",
                self.vertex_data.len(),
                expected_vertex_bytes,
                self.vertex_count,
                self.layout.stride
            ));
        }

        let expected_index_bytes = self.index_count as usize * self.index_format.size() as usize;
        if self.index_data.len() != expected_index_bytes {
            return Err(format!(
                "index stream is {} bytes, expected {} ({} indices x {:?})",
                self.index_data.len(),
                expected_index_bytes,
                self.index_count,
                self.index_format
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for GeometryData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryData")
            .field("label", &self.label)
            .field("topology", &self.topology)
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .field("index_format", &self.index_format)
            .field("stride", &self.layout.stride)
            .finish()
    }
}
