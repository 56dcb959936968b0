//! Indirect draw compilation.
//!
//! Turns a list of visible [`MeshHandle`]s into packed [`GpuBufferEntry`]
//! records, one per mesh, ready to be uploaded as an indirect-argument buffer
//! and consumed by `draw_indexed_indirect` against the table's buffers.

use meshpool_core::profiling::profile_scope;

use crate::records::{BufferEntry, MeshHandle, RecordTable};

/// One indexed indirect draw.
///
/// Field order and width match the GPU's indexed indirect argument layout,
/// so a slice of entries can be uploaded verbatim.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuBufferEntry {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Always 1.
    pub instance_count: u32,
    /// First index, in index units from the start of the index buffer.
    pub first_index: u32,
    /// Added to each index; in vertex units from the start of the vertex buffer.
    pub base_vertex: i32,
    /// Position of this entry in its draw list. Shaders can use it to look
    /// up per-draw data.
    pub first_instance: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<GpuBufferEntry>(), 20);
static_assertions::const_assert_eq!(std::mem::align_of::<GpuBufferEntry>(), 4);

impl GpuBufferEntry {
    /// Size in bytes of one entry.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Convert a byte-addressed entry into element units.
    ///
    /// `stride` and `index_size` must divide the entry's offsets, which
    /// table arenas guarantee through their alignment. Returns `None` when
    /// the first index does not fit in a `u32` or the base vertex in an `i32`.
    pub fn from_entry(
        entry: &BufferEntry,
        stride: u32,
        index_size: u32,
        draw_index: u32,
    ) -> Option<Self> {
        debug_assert_eq!(entry.vertex_offset % u64::from(stride), 0);
        debug_assert_eq!(entry.index_offset % u64::from(index_size), 0);

        Some(Self {
            index_count: entry.index_count,
            instance_count: 1,
            first_index: u32::try_from(entry.index_offset / u64::from(index_size)).ok()?,
            base_vertex: i32::try_from(entry.vertex_offset / u64::from(stride)).ok()?,
            first_instance: draw_index,
        })
    }
}

/// Reusable list of compiled draws.
///
/// Keep one per frame and recompile it every frame; the allocation is reused.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    entries: Vec<GpuBufferEntry>,
    skipped: usize,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            skipped: 0,
        }
    }

    /// Replace the list's contents with draws for `meshes`.
    ///
    /// Handles that are not live in `table` are skipped, so a visibility list
    /// may safely mention meshes that were removed since it was built. Meshes
    /// whose offsets cannot be expressed in draw arguments are skipped too.
    /// Entries keep the relative order of the live handles and
    /// `first_instance` numbers them from zero.
    ///
    /// Returns the number of entries written.
    pub fn compile(&mut self, table: &RecordTable, meshes: &[MeshHandle]) -> usize {
        profile_scope!("draw_compile");

        self.clear();
        self.entries.reserve(meshes.len());

        let stride = table.key().layout.stride;
        let index_size = table.key().index_format.size();

        for &handle in meshes {
            let Ok(entry) = table.entry(handle) else {
                self.skipped += 1;
                continue;
            };
            let draw = u32::try_from(self.entries.len())
                .ok()
                .and_then(|draw_index| {
                    GpuBufferEntry::from_entry(entry, stride, index_size, draw_index)
                });
            match draw {
                Some(draw) => self.entries.push(draw),
                None => {
                    log::warn!(
                        "DrawList: {} at vertex offset {} / index offset {} is out of draw range",
                        handle,
                        entry.vertex_offset,
                        entry.index_offset
                    );
                    self.skipped += 1;
                }
            }
        }

        if self.skipped > 0 {
            log::debug!(
                "DrawList: skipped {} of {} handles not in table",
                self.skipped,
                meshes.len()
            );
        }

        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.skipped = 0;
    }

    pub fn entries(&self) -> &[GpuBufferEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles dropped by the last [`compile`](Self::compile).
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Entries as raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }

    /// Size in bytes of [`as_bytes`](Self::as_bytes).
    pub fn byte_size(&self) -> u64 {
        self.entries.len() as u64 * GpuBufferEntry::SIZE
    }

    pub fn into_entries(self) -> Vec<GpuBufferEntry> {
        self.entries
    }
}

impl RecordTable {
    /// Compile `meshes` into indirect draw entries.
    ///
    /// Unknown handles are skipped. See [`DrawList::compile`], which avoids
    /// allocating a new vector each call.
    pub fn get_gpu_buffer_entries(&self, meshes: &[MeshHandle]) -> Vec<GpuBufferEntry> {
        let mut list = DrawList::with_capacity(meshes.len());
        list.compile(self, meshes);
        list.into_entries()
    }
}
