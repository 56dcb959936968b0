//! Buffer types and descriptors.

use bitflags::bitflags;

/// Alignment required for buffer copy offsets and sizes, in bytes.
pub const COPY_ALIGNMENT: u64 = 4;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer is mappable for CPU access.
        const MAP_READ = 1 << 7;
        /// Buffer is mappable for CPU write.
        const MAP_WRITE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Same descriptor with a different size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` need not be a power of two (vertex strides often are not).
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up_power_of_two() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_align_up_stride() {
        // lcm(20, 4) == 20
        assert_eq!(align_up(21, 20), 40);
        assert_eq!(align_up(60, 12), 60);
        assert_eq!(align_up(61, 12), 72);
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = BufferDescriptor::new(1024, BufferUsage::VERTEX | BufferUsage::COPY_DST)
            .with_label("vertices")
            .with_size(2048);
        assert_eq!(desc.size, 2048);
        assert_eq!(desc.label.as_deref(), Some("vertices"));
        assert!(desc.usage.contains(BufferUsage::COPY_DST));
    }
}
