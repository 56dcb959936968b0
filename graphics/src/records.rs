//! Mesh records: where each mesh's bytes live.
//!
//! A [`RecordTable`] owns a vertex arena and an index arena for one
//! [`GeometryKey`] and maps stable [`MeshHandle`]s to the [`BufferEntry`]
//! describing a mesh's two regions. Handles stay valid across arena growth
//! because regions never move.

use std::sync::Arc;

use meshpool_core::handle::SlotMap;
use meshpool_core::mesh::GeometryData;
use meshpool_core::new_handle_type;
use meshpool_core::profiling::profile_function;

use crate::arena::{ArenaBuffer, ArenaConfig, BufferRegion, lcm};
use crate::device::GraphicsDevice;
use crate::error::ArenaError;
use crate::registry::GeometryKey;
use crate::resources::Buffer;

new_handle_type! {
    /// Stable handle to a mesh stored in a [`RecordTable`].
    ///
    /// A removed mesh's handle is never handed out again.
    pub struct MeshHandle;
}

/// Storage location of one mesh inside its table's two arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferEntry {
    /// Byte offset of the vertex data in the vertex arena.
    pub vertex_offset: u64,
    /// Size of the vertex data in bytes.
    pub vertex_size: u64,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Byte offset of the index data in the index arena.
    pub index_offset: u64,
    /// Size of the index data in bytes.
    pub index_size: u64,
    /// Number of indices.
    pub index_count: u32,
}

impl BufferEntry {
    /// Vertex region in the vertex arena.
    pub fn vertex_region(&self) -> BufferRegion {
        BufferRegion::new(self.vertex_offset, self.vertex_size)
    }

    /// Index region in the index arena.
    pub fn index_region(&self) -> BufferRegion {
        BufferRegion::new(self.index_offset, self.index_size)
    }
}

/// Mesh records for one geometry key.
pub struct RecordTable {
    key: GeometryKey,
    vertex_arena: ArenaBuffer,
    index_arena: ArenaBuffer,
    entries: SlotMap<MeshHandle, BufferEntry>,
}

impl RecordTable {
    /// Create a table and its two arenas.
    ///
    /// The vertex arena's alignment is widened to a multiple of the vertex
    /// stride and the index arena's to a multiple of the index size, so
    /// region offsets convert exactly to vertex and index numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the key's layout is invalid or an arena cannot be created.
    pub fn new(
        device: Arc<GraphicsDevice>,
        key: GeometryKey,
        vertex_config: ArenaConfig,
        index_config: ArenaConfig,
    ) -> Result<Self, ArenaError> {
        key.layout.validate().map_err(ArenaError::InvalidGeometry)?;

        let stride = u64::from(key.layout.stride);
        let index_size = u64::from(key.index_format.size());

        let vertex_alignment = lcm(vertex_config.alignment, stride);
        let index_alignment = lcm(index_config.alignment, index_size);

        let vertex_arena = ArenaBuffer::new(
            Arc::clone(&device),
            vertex_config.with_alignment(vertex_alignment),
        )?;
        let index_arena = ArenaBuffer::new(device, index_config.with_alignment(index_alignment))?;

        log::debug!(
            "RecordTable: created for stride {} {:?} {:?}",
            key.layout.stride,
            key.topology,
            key.index_format
        );

        Ok(Self {
            key,
            vertex_arena,
            index_arena,
            entries: SlotMap::new(),
        })
    }

    /// Structural key of the geometry this table accepts.
    pub fn key(&self) -> &GeometryKey {
        &self.key
    }

    /// Pack a mesh's vertex and index streams into the arenas.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::InvalidGeometry`] if the geometry is malformed or its
    ///   layout, topology or index format differ from the table's key.
    /// - Any arena error from either insert. A failed index insert releases
    ///   the vertex region again, so nothing leaks.
    pub fn add_mesh(&mut self, geometry: &GeometryData) -> Result<MeshHandle, ArenaError> {
        profile_function!();

        geometry.validate().map_err(ArenaError::InvalidGeometry)?;
        if !self.key.matches(geometry) {
            return Err(ArenaError::InvalidGeometry(format!(
                "geometry {:?} does not match table key (stride {}, {:?}, {:?})",
                geometry.label(),
                self.key.layout.stride,
                self.key.topology,
                self.key.index_format
            )));
        }

        let vertex_region = self.vertex_arena.insert_data(geometry.vertex_bytes())?;
        let index_region = match self.index_arena.insert_data(geometry.index_bytes()) {
            Ok(region) => region,
            Err(err) => {
                if let Err(rollback) = self.vertex_arena.remove_data(vertex_region) {
                    log::error!("RecordTable: vertex rollback failed: {}", rollback);
                }
                return Err(err);
            }
        };

        let entry = BufferEntry {
            vertex_offset: vertex_region.offset,
            vertex_size: vertex_region.size,
            vertex_count: geometry.vertex_count(),
            index_offset: index_region.offset,
            index_size: index_region.size,
            index_count: geometry.index_count(),
        };
        let handle = self.entries.insert(entry);

        log::trace!(
            "RecordTable: added {:?} as {} ({} vertices, {} indices)",
            geometry.label(),
            handle,
            entry.vertex_count,
            entry.index_count
        );

        Ok(handle)
    }

    /// Remove a mesh and free both of its regions.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownHandle`] if the handle is not live.
    pub fn remove_mesh(&mut self, handle: MeshHandle) -> Result<(), ArenaError> {
        profile_function!();

        let entry = self
            .entries
            .remove(handle)
            .ok_or(ArenaError::UnknownHandle(handle))?;

        self.vertex_arena.remove_data(entry.vertex_region())?;
        self.index_arena.remove_data(entry.index_region())?;

        log::trace!("RecordTable: removed {}", handle);
        Ok(())
    }

    /// Look up a mesh's entry.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnknownHandle`] if the handle is not live.
    pub fn entry(&self, handle: MeshHandle) -> Result<&BufferEntry, ArenaError> {
        self.entries
            .get(handle)
            .ok_or(ArenaError::UnknownHandle(handle))
    }

    /// Whether the handle refers to a live mesh.
    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Number of live meshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no meshes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over live meshes.
    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &BufferEntry)> {
        self.entries.iter()
    }

    /// The current vertex and index device buffers, in that order.
    ///
    /// Either may be replaced by growth on the next [`add_mesh`](Self::add_mesh).
    pub fn buffers(&self) -> (&Arc<Buffer>, &Arc<Buffer>) {
        (self.vertex_arena.buffer(), self.index_arena.buffer())
    }

    /// The vertex arena.
    pub fn vertex_arena(&self) -> &ArenaBuffer {
        &self.vertex_arena
    }

    /// The index arena.
    pub fn index_arena(&self) -> &ArenaBuffer {
        &self.index_arena
    }
}

impl std::fmt::Debug for RecordTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordTable")
            .field("stride", &self.key.layout.stride)
            .field("topology", &self.key.topology)
            .field("index_format", &self.key.index_format)
            .field("meshes", &self.entries.len())
            .field("vertex_arena", &self.vertex_arena)
            .field("index_arena", &self.index_arena)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use meshpool_core::mesh::generators::{generate_cube, generate_quad};
    use meshpool_core::mesh::{IndexFormat, PrimitiveTopology, VertexLayout};

    use super::*;
    use crate::instance::{BackendType, GraphicsInstance, InstanceParameters};

    fn device() -> Arc<GraphicsDevice> {
        let _ = env_logger::builder().is_test(true).try_init();
        GraphicsInstance::with_parameters(InstanceParameters::new().with_backend(BackendType::Dummy))
            .unwrap()
            .create_device()
            .unwrap()
    }

    fn table_for(geometry: &GeometryData, vertex: ArenaConfig, index: ArenaConfig) -> RecordTable {
        RecordTable::new(device(), GeometryKey::of(geometry), vertex, index).unwrap()
    }

    fn quad_table() -> RecordTable {
        table_for(
            &generate_quad(1.0, 1.0),
            ArenaConfig::vertex().with_initial_capacity(1024),
            ArenaConfig::index().with_initial_capacity(256),
        )
    }

    #[test]
    fn test_add_mesh_records_regions() {
        let mut table = quad_table();
        let quad = generate_quad(1.0, 1.0);

        let first = table.add_mesh(&quad).unwrap();
        let second = table.add_mesh(&quad).unwrap();
        assert_ne!(first, second);

        let entry = *table.entry(second).unwrap();
        assert_eq!(entry.vertex_offset, 80);
        assert_eq!(entry.vertex_size, 80);
        assert_eq!(entry.vertex_count, 4);
        assert_eq!(entry.index_offset, 12);
        assert_eq!(entry.index_size, 12);
        assert_eq!(entry.index_count, 6);

        assert_eq!(
            table.vertex_arena().read_region(entry.vertex_region()).unwrap(),
            quad.vertex_bytes()
        );
        assert_eq!(
            table.index_arena().read_region(entry.index_region()).unwrap(),
            quad.index_bytes()
        );
    }

    #[test]
    fn test_remove_mesh() {
        let mut table = quad_table();
        let handle = table.add_mesh(&generate_quad(1.0, 1.0)).unwrap();

        table.remove_mesh(handle).unwrap();
        assert!(!table.contains(handle));
        assert_eq!(table.entry(handle), Err(ArenaError::UnknownHandle(handle)));
        assert_eq!(table.remove_mesh(handle), Err(ArenaError::UnknownHandle(handle)));
        assert!(table.get_gpu_buffer_entries(&[handle]).is_empty());
        assert_eq!(table.vertex_arena().used_bytes(), 0);
        assert_eq!(table.index_arena().used_bytes(), 0);
    }

    #[test]
    fn test_handles_not_reused() {
        let mut table = quad_table();
        let quad = generate_quad(1.0, 1.0);
        let old = table.add_mesh(&quad).unwrap();
        table.remove_mesh(old).unwrap();
        let new = table.add_mesh(&quad).unwrap();

        assert_ne!(old, new);
        assert!(table.entry(old).is_err());
        assert!(table.entry(new).is_ok());
    }

    #[test]
    fn test_mismatched_geometry_rejected() {
        let mut table = quad_table();
        let cube = generate_cube(1.0);
        assert!(matches!(
            table.add_mesh(&cube),
            Err(ArenaError::InvalidGeometry(_))
        ));

        let lines = generate_quad(1.0, 1.0).with_topology(PrimitiveTopology::LineList);
        assert!(table.add_mesh(&lines).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_vertex_offsets_are_stride_aligned() {
        let positions = [[0.0f32; 3]; 3];
        let triangle = GeometryData::new(VertexLayout::position_only())
            .with_vertices(&positions)
            .with_indices_u16(&[0, 1, 2]);
        let mut table = table_for(
            &triangle,
            ArenaConfig::vertex().with_initial_capacity(1024),
            ArenaConfig::index().with_initial_capacity(256),
        );

        assert_eq!(table.vertex_arena().alignment(), 12);
        assert_eq!(table.index_arena().alignment(), 4);

        for _ in 0..5 {
            let handle = table.add_mesh(&triangle).unwrap();
            let entry = table.entry(handle).unwrap();
            assert_eq!(entry.vertex_offset % 12, 0);
            assert_eq!(entry.index_offset % 2, 0);
        }
    }

    #[test]
    fn test_failed_index_insert_rolls_back_vertices() {
        let quad = generate_quad(1.0, 1.0);
        let mut table = table_for(
            &quad,
            ArenaConfig::vertex().with_initial_capacity(1024),
            ArenaConfig::index()
                .with_initial_capacity(16)
                .with_growth(false),
        );

        table.add_mesh(&quad).unwrap();
        let err = table.add_mesh(&quad).unwrap_err();
        assert!(matches!(err, ArenaError::OutOfArenaSpace { .. }));

        assert_eq!(table.len(), 1);
        assert_eq!(table.vertex_arena().region_count(), 1);
        assert_eq!(table.vertex_arena().used_bytes(), 80);
    }

    #[test]
    fn test_u32_indices() {
        let quad = generate_quad(1.0, 1.0).with_indices_u32(&[0, 1, 2, 2, 3, 0]);
        let mut table = table_for(&quad, ArenaConfig::vertex(), ArenaConfig::index());
        assert_eq!(table.key().index_format, IndexFormat::Uint32);

        let handle = table.add_mesh(&quad).unwrap();
        assert_eq!(table.entry(handle).unwrap().index_size, 24);
    }

    #[test]
    fn test_buffers_follow_growth() {
        let quad = generate_quad(1.0, 1.0);
        let mut table = table_for(
            &quad,
            ArenaConfig::vertex().with_initial_capacity(80),
            ArenaConfig::index().with_initial_capacity(64),
        );
        let before = Arc::clone(table.buffers().0);

        let handles: Vec<_> = (0..8).map(|_| table.add_mesh(&quad).unwrap()).collect();
        let after = table.buffers().0;

        assert!(!Arc::ptr_eq(&before, after));
        assert!(after.size() >= 8 * 80);
        for handle in handles {
            let entry = table.entry(handle).unwrap();
            assert_eq!(
                table.vertex_arena().read_region(entry.vertex_region()).unwrap(),
                quad.vertex_bytes()
            );
        }
    }
}
