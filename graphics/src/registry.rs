//! Buffer registry: one [`RecordTable`] per geometry kind.
//!
//! Meshes that share a vertex layout, topology and index format can be drawn
//! from the same pair of buffers, so they share a table. The registry finds
//! or creates that table from a structural [`GeometryKey`].

use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use meshpool_core::handle::SlotMap;
use meshpool_core::mesh::{GeometryData, IndexFormat, PrimitiveTopology, VertexLayout};
use meshpool_core::new_handle_type;

use crate::arena::ArenaConfig;
use crate::device::GraphicsDevice;
use crate::error::ArenaError;
use crate::records::{MeshHandle, RecordTable};

new_handle_type! {
    /// Handle to a [`RecordTable`] owned by a [`BufferRegistry`].
    pub struct BufferHandle;
}

/// Structural description of a geometry kind.
///
/// Two keys are equal when their layouts have the same stride and
/// attributes, regardless of which `Arc` holds them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub layout: Arc<VertexLayout>,
    pub topology: PrimitiveTopology,
    pub index_format: IndexFormat,
}

impl GeometryKey {
    pub fn new(
        layout: Arc<VertexLayout>,
        topology: PrimitiveTopology,
        index_format: IndexFormat,
    ) -> Self {
        Self {
            layout,
            topology,
            index_format,
        }
    }

    /// The key a piece of geometry belongs under.
    pub fn of(geometry: &GeometryData) -> Self {
        Self::new(
            Arc::clone(geometry.layout()),
            geometry.topology(),
            geometry.index_format(),
        )
    }

    /// Whether `geometry` can be stored under this key.
    pub fn matches(&self, geometry: &GeometryData) -> bool {
        *self.layout == **geometry.layout()
            && self.topology == geometry.topology()
            && self.index_format == geometry.index_format()
    }
}

/// Arena settings applied to every table a registry creates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    pub vertex: ArenaConfig,
    pub index: ArenaConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            vertex: ArenaConfig::vertex(),
            index: ArenaConfig::index(),
        }
    }
}

impl RegistryConfig {
    pub fn with_vertex(mut self, vertex: ArenaConfig) -> Self {
        self.vertex = vertex;
        self
    }

    pub fn with_index(mut self, index: ArenaConfig) -> Self {
        self.index = index;
        self
    }

    /// Check both arena configs.
    pub fn validate(&self) -> Result<(), ArenaError> {
        self.vertex.validate()?;
        self.index.validate()
    }
}

/// Owns every [`RecordTable`] and maps geometry keys to them.
///
/// ```
/// use meshpool_graphics::{BufferRegistry, GeometryKey, GraphicsInstance, RegistryConfig};
/// use meshpool_graphics::generators::generate_quad;
///
/// # use meshpool_graphics::{BackendType, InstanceParameters};
/// let device = GraphicsInstance::with_parameters(
///     InstanceParameters::new().with_backend(BackendType::Dummy),
/// )
/// .unwrap()
/// .create_device()
/// .unwrap();
/// let mut registry = BufferRegistry::new(device, RegistryConfig::default()).unwrap();
///
/// let quad = generate_quad(1.0, 1.0);
/// let table = registry.get_or_create(&GeometryKey::of(&quad)).unwrap();
/// let mesh = registry[table].add_mesh(&quad).unwrap();
/// assert!(registry[table].contains(mesh));
///
/// // The same key resolves to the same table.
/// assert_eq!(registry.get_or_create(&GeometryKey::of(&quad)).unwrap(), table);
/// ```
pub struct BufferRegistry {
    device: Arc<GraphicsDevice>,
    config: RegistryConfig,
    keys: HashMap<GeometryKey, BufferHandle>,
    tables: SlotMap<BufferHandle, RecordTable>,
}

impl BufferRegistry {
    /// Create an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if either arena config is invalid.
    pub fn new(device: Arc<GraphicsDevice>, config: RegistryConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            device,
            config,
            keys: HashMap::new(),
            tables: SlotMap::new(),
        })
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Find the table for `key`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a new table's arenas cannot be created. Nothing is
    /// registered in that case.
    pub fn get_or_create(&mut self, key: &GeometryKey) -> Result<BufferHandle, ArenaError> {
        if let Some(&handle) = self.keys.get(key) {
            return Ok(handle);
        }

        let table = RecordTable::new(
            Arc::clone(&self.device),
            key.clone(),
            self.config.vertex.clone(),
            self.config.index.clone(),
        )?;
        let handle = self.tables.insert(table);
        self.keys.insert(key.clone(), handle);

        log::debug!(
            "BufferRegistry: new table {} for stride {} {:?} {:?}",
            handle,
            key.layout.stride,
            key.topology,
            key.index_format
        );

        Ok(handle)
    }

    /// Store a mesh in the table for its key, creating the table if needed.
    pub fn add_mesh(
        &mut self,
        geometry: &GeometryData,
    ) -> Result<(BufferHandle, MeshHandle), ArenaError> {
        let table = self.get_or_create(&GeometryKey::of(geometry))?;
        let mesh = self.tables[table].add_mesh(geometry)?;
        Ok((table, mesh))
    }

    /// The table registered for `key`, without creating one.
    pub fn find(&self, key: &GeometryKey) -> Option<BufferHandle> {
        self.keys.get(key).copied()
    }

    pub fn get(&self, handle: BufferHandle) -> Option<&RecordTable> {
        self.tables.get(handle)
    }

    pub fn get_mut(&mut self, handle: BufferHandle) -> Option<&mut RecordTable> {
        self.tables.get_mut(handle)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate over all tables.
    pub fn iter(&self) -> impl Iterator<Item = (BufferHandle, &RecordTable)> {
        self.tables.iter()
    }
}

/// Panics if the handle was not issued by this registry.
impl Index<BufferHandle> for BufferRegistry {
    type Output = RecordTable;

    fn index(&self, handle: BufferHandle) -> &RecordTable {
        match self.tables.get(handle) {
            Some(table) => table,
            None => panic!("{handle} is not registered"),
        }
    }
}

/// Panics if the handle was not issued by this registry.
impl IndexMut<BufferHandle> for BufferRegistry {
    fn index_mut(&mut self, handle: BufferHandle) -> &mut RecordTable {
        match self.tables.get_mut(handle) {
            Some(table) => table,
            None => panic!("{handle} is not registered"),
        }
    }
}

impl std::fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("device", &self.device.name())
            .field("tables", &self.tables.len())
            .finish()
    }
}
