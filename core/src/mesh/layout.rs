//! Vertex layout definitions.
//!
//! A [`VertexLayout`] describes one interleaved vertex stream: the stride
//! between vertices and the attributes packed into each vertex.
//!
//! Layouts take part in structural buffer keys, so equality and hashing
//! look only at the structure (stride and attributes). The debug label is
//! ignored: two layouts that differ only by label share geometry buffers.
//!
//! ```
//! use meshpool_core::mesh::{VertexAttribute, VertexLayout};
//!
//! let a = VertexLayout::new(20)
//!     .with_attribute(VertexAttribute::position(0))
//!     .with_attribute(VertexAttribute::texcoord0(12))
//!     .with_label("sprite");
//! let b = VertexLayout::position_uv();
//! assert_eq!(a, *b);
//! ```

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexAttributeSemantic {
    /// Vertex position (typically float3).
    Position,
    /// Vertex normal (typically float3).
    Normal,
    /// Texture coordinates set 0 (typically float2).
    TexCoord0,
    /// Vertex color (typically float4 or unorm4).
    Color,
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexAttributeFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Uint | Self::Unorm8x4 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// A single vertex attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexAttribute {
    /// Semantic meaning of this attribute.
    pub semantic: VertexAttributeSemantic,
    /// Data format of this attribute.
    pub format: VertexAttributeFormat,
    /// Byte offset within the vertex.
    pub offset: u32,
}

impl VertexAttribute {
    /// Create a new vertex attribute.
    pub fn new(semantic: VertexAttributeSemantic, format: VertexAttributeFormat, offset: u32) -> Self {
        Self {
            semantic,
            format,
            offset,
        }
    }

    /// Create a position attribute (float3).
    pub fn position(offset: u32) -> Self {
        Self::new(
            VertexAttributeSemantic::Position,
            VertexAttributeFormat::Float3,
            offset,
        )
    }

    /// Create a normal attribute (float3).
    pub fn normal(offset: u32) -> Self {
        Self::new(
            VertexAttributeSemantic::Normal,
            VertexAttributeFormat::Float3,
            offset,
        )
    }

    /// Create a texcoord0 attribute (float2).
    pub fn texcoord0(offset: u32) -> Self {
        Self::new(
            VertexAttributeSemantic::TexCoord0,
            VertexAttributeFormat::Float2,
            offset,
        )
    }

    /// Create a color attribute (float4).
    pub fn color(offset: u32) -> Self {
        Self::new(
            VertexAttributeSemantic::Color,
            VertexAttributeFormat::Float4,
            offset,
        )
    }

    /// End offset of this attribute within the vertex.
    pub fn end(&self) -> u32 {
        self.offset + self.format.size()
    }
}

/// Interleaved vertex layout.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexLayout {
    /// Stride in bytes between consecutive vertices.
    pub stride: u32,
    /// Attributes packed into each vertex.
    pub attributes: Vec<VertexAttribute>,
    /// Debug label. Not part of the layout's identity.
    pub label: Option<String>,
}

impl VertexLayout {
    /// Create a layout with the given stride and no attributes.
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
            label: None,
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Position only (12 bytes).
    pub fn position_only() -> Arc<Self> {
        Arc::new(
            Self::new(12)
                .with_attribute(VertexAttribute::position(0))
                .with_label("position_only"),
        )
    }

    /// Position + texcoord (20 bytes).
    pub fn position_uv() -> Arc<Self> {
        Arc::new(
            Self::new(20)
                .with_attribute(VertexAttribute::position(0))
                .with_attribute(VertexAttribute::texcoord0(12))
                .with_label("position_uv"),
        )
    }

    /// Position + normal + texcoord (32 bytes).
    pub fn position_normal_uv() -> Arc<Self> {
        Arc::new(
            Self::new(32)
                .with_attribute(VertexAttribute::position(0))
                .with_attribute(VertexAttribute::normal(12))
                .with_attribute(VertexAttribute::texcoord0(24))
                .with_label("position_normal_uv"),
        )
    }

    /// Find the attribute with the given semantic.
    pub fn find_attribute(&self, semantic: VertexAttributeSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Check that the stride is non-zero and every attribute fits inside it.
    pub fn validate(&self) -> Result<(), String> {
        if self.stride == 0 {
            return Err("vertex stride cannot be zero".to_string());
        }
        if let Some(attribute) = self.attributes.iter().find(|a| a.end() > self.stride) {
            return Err(format!(
                "attribute {:?} ends at byte {} past stride {}",
                attribute.semantic,
                attribute.end(),
                self.stride
            ));
        }
        Ok(())
    }
}

impl PartialEq for VertexLayout {
    fn eq(&self, other: &Self) -> bool {
        self.stride == other.stride && self.attributes == other.attributes
    }
}

impl Eq for VertexLayout {}

impl Hash for VertexLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stride.hash(state);
        self.attributes.hash(state);
    }
}
