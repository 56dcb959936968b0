//! The arena buffer: one growable device buffer carved into regions.

use std::collections::BTreeMap;
use std::sync::Arc;

use meshpool_core::profiling::{profile_message, profile_plot, profile_scope};

use crate::device::GraphicsDevice;
use crate::error::{ArenaError, GraphicsError};
use crate::resources::{Buffer, BufferCopyRegion};
use crate::types::{BufferDescriptor, BufferUsage, COPY_ALIGNMENT, align_up};

use super::config::ArenaConfig;
use super::free_list::FreeList;

/// A claimed span of arena bytes.
///
/// `size` is the number of bytes the caller inserted. The arena may reserve
/// a little more behind it to keep the next region aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferRegion {
    /// Byte offset from the start of the arena buffer.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}

impl BufferRegion {
    /// Create a region.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the region.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Snapshot of an arena's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArenaStats {
    /// Current capacity in bytes.
    pub capacity: u64,
    /// Bytes held by live regions, including alignment padding.
    pub used_bytes: u64,
    /// Number of live regions.
    pub live_regions: usize,
    /// Number of holes below the tail.
    pub holes: usize,
    /// Bytes in holes below the tail.
    pub hole_bytes: u64,
    /// First byte past the highest live region.
    pub tail: u64,
    /// Number of times the arena has grown.
    pub growth_count: u32,
}

impl ArenaStats {
    /// `used_bytes / capacity`.
    pub fn load_factor(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.capacity as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveBlock {
    size: u64,
    reserved: u64,
}

/// A device buffer that packs variable-length byte streams.
///
/// Regions are placed first-fit into holes left by removed regions, else at
/// the tail. When an insert would push the load above the configured
/// threshold, or would not fit at all, the arena grows first: a larger buffer
/// is created, the whole old buffer is copied into it with a blocking copy,
/// and the old buffer is handed to the device's deferred release queues.
/// Offsets never move, so every outstanding [`BufferRegion`] stays valid.
///
/// All mutation goes through `&mut self`; one producer owns the arena.
///
/// ```
/// use meshpool_graphics::{
///     ArenaBuffer, ArenaConfig, BackendType, GraphicsInstance, InstanceParameters,
/// };
///
/// let instance = GraphicsInstance::with_parameters(
///     InstanceParameters::new().with_backend(BackendType::Dummy),
/// )
/// .unwrap();
/// let device = instance.create_device().unwrap();
///
/// let mut arena = ArenaBuffer::new(device, ArenaConfig::new(1024)).unwrap();
/// let region = arena.insert_data(&[1, 2, 3, 4]).unwrap();
/// assert_eq!(region.offset, 0);
/// assert_eq!(arena.read_region(region).unwrap(), vec![1, 2, 3, 4]);
///
/// arena.remove_data(region).unwrap();
/// assert!(arena.remove_data(region).is_err());
/// ```
pub struct ArenaBuffer {
    device: Arc<GraphicsDevice>,
    config: ArenaConfig,
    buffer: Arc<Buffer>,
    capacity: u64,
    free_list: FreeList,
    live: BTreeMap<u64, LiveBlock>,
    used: u64,
    growth_count: u32,
}

impl ArenaBuffer {
    /// Create an arena and its first device buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] for a bad config and
    /// [`ArenaError::Device`] if the buffer cannot be created.
    pub fn new(device: Arc<GraphicsDevice>, config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;

        let capacity = align_up(config.initial_capacity, COPY_ALIGNMENT);
        let mut descriptor = BufferDescriptor::new(
            capacity,
            config.usage | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
        );
        if let Some(label) = &config.label {
            descriptor = descriptor.with_label(label.clone());
        }

        let buffer = device.create_buffer(&descriptor).map_err(ArenaError::Device)?;

        log::debug!(
            "ArenaBuffer {:?}: created with capacity {} (alignment {})",
            config.label,
            capacity,
            config.alignment
        );

        Ok(Self {
            device,
            config,
            buffer,
            capacity,
            free_list: FreeList::new(),
            live: BTreeMap::new(),
            used: 0,
            growth_count: 0,
        })
    }

    /// Copy `bytes` into a free region and return it.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::EmptyAllocation`] for an empty slice.
    /// - [`ArenaError::OutOfArenaSpace`] if the bytes do not fit and growth is disabled.
    /// - [`ArenaError::GrowthFailed`] if a larger buffer could not be created or filled.
    /// - [`ArenaError::Device`] if the write itself fails; no region is kept.
    pub fn insert_data(&mut self, bytes: &[u8]) -> Result<BufferRegion, ArenaError> {
        profile_scope!("arena_insert");

        if bytes.is_empty() {
            return Err(ArenaError::EmptyAllocation);
        }

        let size = bytes.len() as u64;
        let reserved = align_up(size, self.config.alignment);

        self.reserve(reserved)?;

        let offset = self
            .free_list
            .allocate(reserved, self.capacity)
            .ok_or(ArenaError::OutOfArenaSpace {
                requested: reserved,
                capacity: self.capacity,
            })?;

        if let Err(err) = self.device.write_buffer(&self.buffer, offset, bytes) {
            self.free_list.release(offset, reserved);
            return Err(ArenaError::Device(err));
        }

        self.live.insert(offset, LiveBlock { size, reserved });
        self.used += reserved;

        log::trace!(
            "ArenaBuffer {:?}: inserted {} bytes at {} ({} reserved, {}/{} used)",
            self.config.label,
            size,
            offset,
            reserved,
            self.used,
            self.capacity
        );
        profile_plot!("arena_used_bytes", self.used);

        Ok(BufferRegion::new(offset, size))
    }

    /// Return a region to the free list. Memory is neither zeroed nor compacted.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidRegion`] if `region` is not a live region
    /// of this arena, including when it was already removed.
    pub fn remove_data(&mut self, region: BufferRegion) -> Result<(), ArenaError> {
        if !self.contains(region) {
            return Err(ArenaError::InvalidRegion(region));
        }
        let Some(block) = self.live.remove(&region.offset) else {
            return Err(ArenaError::InvalidRegion(region));
        };

        self.free_list.release(region.offset, block.reserved);
        self.used -= block.reserved;

        log::trace!(
            "ArenaBuffer {:?}: removed {} bytes at {}",
            self.config.label,
            region.size,
            region.offset
        );

        Ok(())
    }

    /// Make sure `reserved` more bytes can be placed, growing if needed.
    fn reserve(&mut self, reserved: u64) -> Result<(), ArenaError> {
        let mut target = self.capacity;
        while !self.accepts(reserved, target) {
            if !self.config.allow_growth {
                if self.free_list.fits(reserved, target) {
                    // Over the threshold but still room: fill up.
                    break;
                }
                return Err(ArenaError::OutOfArenaSpace {
                    requested: reserved,
                    capacity: self.capacity,
                });
            }

            match self.next_capacity(target) {
                Some(next) => target = next,
                None if self.free_list.fits(reserved, target) => break,
                None => {
                    return Err(ArenaError::GrowthFailed(GraphicsError::OutOfMemory));
                }
            }
        }

        if target > self.capacity {
            self.grow_to(target)?;
        }
        Ok(())
    }

    /// Whether `reserved` bytes fit in `capacity` without crossing the threshold.
    fn accepts(&self, reserved: u64, capacity: u64) -> bool {
        let projected = (self.used + reserved) as f64 / capacity as f64;
        self.free_list.fits(reserved, capacity) && projected <= self.config.growth_threshold
    }

    /// The capacity after one growth step, or `None` at the device limit.
    fn next_capacity(&self, capacity: u64) -> Option<u64> {
        let limit = self.device.capabilities().max_buffer_size / COPY_ALIGNMENT * COPY_ALIGNMENT;
        if capacity >= limit {
            return None;
        }
        let scaled = (capacity as f64 * self.config.growth_factor).ceil() as u64;
        let next = align_up(scaled.max(capacity + 1), COPY_ALIGNMENT);
        Some(next.min(limit))
    }

    fn grow_to(&mut self, new_capacity: u64) -> Result<(), ArenaError> {
        profile_scope!("arena_grow");

        let descriptor = self.buffer.descriptor().clone().with_size(new_capacity);
        let new_buffer = self
            .device
            .create_buffer(&descriptor)
            .map_err(ArenaError::GrowthFailed)?;

        self.device
            .copy_buffer_immediate(
                &self.buffer,
                &new_buffer,
                &[BufferCopyRegion::whole(self.capacity)],
            )
            .map_err(ArenaError::GrowthFailed)?;

        let old = std::mem::replace(&mut self.buffer, new_buffer);
        self.device.retire_buffer(old);

        log::debug!(
            "ArenaBuffer {:?}: grew {} -> {} bytes ({} used)",
            self.config.label,
            self.capacity,
            new_capacity,
            self.used
        );

        self.capacity = new_capacity;
        self.growth_count += 1;
        profile_plot!("arena_capacity", self.capacity);
        profile_message!("arena grew");

        Ok(())
    }

    /// Read a live region back from the device.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidRegion`] if the region is not live.
    pub fn read_region(&self, region: BufferRegion) -> Result<Vec<u8>, ArenaError> {
        if !self.contains(region) {
            return Err(ArenaError::InvalidRegion(region));
        }
        self.device
            .read_buffer(&self.buffer, region.offset, region.size)
            .map_err(ArenaError::Device)
    }

    /// Whether `region` is a live region of this arena.
    pub fn contains(&self, region: BufferRegion) -> bool {
        self.live
            .get(&region.offset)
            .is_some_and(|block| block.size == region.size)
    }

    /// The current device buffer.
    ///
    /// Replaced on growth: re-fetch after every insert instead of caching it.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// The device that owns the buffer.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// The arena's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Region alignment in bytes.
    pub fn alignment(&self) -> u64 {
        self.config.alignment
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes held by live regions, including alignment padding.
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    /// `used_bytes / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.used as f64 / self.capacity as f64
    }

    /// Number of times the arena has grown.
    pub fn growth_count(&self) -> u32 {
        self.growth_count
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.live.len()
    }

    /// Live regions in offset order.
    pub fn live_regions(&self) -> impl Iterator<Item = BufferRegion> + '_ {
        self.live
            .iter()
            .map(|(&offset, block)| BufferRegion::new(offset, block.size))
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity,
            used_bytes: self.used,
            live_regions: self.live.len(),
            holes: self.free_list.hole_count(),
            hole_bytes: self.free_list.hole_bytes(),
            tail: self.free_list.tail(),
            growth_count: self.growth_count,
        }
    }
}

impl std::fmt::Debug for ArenaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("label", &self.config.label)
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("regions", &self.live.len())
            .field("growth_count", &self.growth_count)
            .finish()
    }
}

static_assertions::assert_impl_all!(ArenaBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use rstest::rstest;

    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::backend::{BufferCopy, GpuBackend, GpuBuffer};
    use crate::instance::{BackendType, GraphicsInstance, InstanceParameters};

    fn device() -> Arc<GraphicsDevice> {
        let _ = env_logger::builder().is_test(true).try_init();
        GraphicsInstance::with_parameters(InstanceParameters::new().with_backend(BackendType::Dummy))
            .unwrap()
            .create_device()
            .unwrap()
    }

    fn arena(capacity: u64) -> ArenaBuffer {
        ArenaBuffer::new(device(), ArenaConfig::new(capacity)).unwrap()
    }

    /// Host-memory backend whose allocations and copies can be switched to fail.
    #[derive(Default)]
    struct FaultyBackend {
        inner: DummyBackend,
        fail_create: AtomicBool,
        fail_copy: AtomicBool,
    }

    impl GpuBackend for FaultyBackend {
        fn name(&self) -> &'static str {
            "Faulty Backend"
        }

        fn max_buffer_size(&self) -> u64 {
            self.inner.max_buffer_size()
        }

        fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
            if self.fail_create.load(Ordering::Relaxed) {
                return Err(GraphicsError::OutOfMemory);
            }
            self.inner.create_buffer(descriptor)
        }

        fn write_buffer(
            &self,
            buffer: &GpuBuffer,
            offset: u64,
            data: &[u8],
        ) -> Result<(), GraphicsError> {
            self.inner.write_buffer(buffer, offset, data)
        }

        fn execute_copies(&self, copies: &[BufferCopy<'_>]) -> Result<(), GraphicsError> {
            if self.fail_copy.load(Ordering::Relaxed) {
                return Err(GraphicsError::DeviceLost);
            }
            self.inner.execute_copies(copies)
        }

        fn read_buffer(
            &self,
            buffer: &GpuBuffer,
            offset: u64,
            size: u64,
        ) -> Result<Vec<u8>, GraphicsError> {
            self.inner.read_buffer(buffer, offset, size)
        }
    }

    fn faulty_arena(capacity: u64) -> (Arc<FaultyBackend>, ArenaBuffer) {
        let backend = Arc::new(FaultyBackend::default());
        let instance =
            GraphicsInstance::with_backend(backend.clone(), InstanceParameters::new()).unwrap();
        let device = instance.create_device().unwrap();
        let arena = ArenaBuffer::new(device, ArenaConfig::new(capacity)).unwrap();
        (backend, arena)
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_reuse_hole_then_grow() {
        let mut arena = arena(1024);
        let a = arena.insert_data(&pattern(300, 1)).unwrap();
        let b = arena.insert_data(&pattern(300, 2)).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 300);

        arena.remove_data(a).unwrap();
        let c = arena.insert_data(&pattern(300, 3)).unwrap();
        assert_eq!(c.offset, 0);

        let d = arena.insert_data(&pattern(500, 4)).unwrap();
        assert!(arena.capacity() >= 1536);
        assert_eq!(arena.capacity(), 1536);
        assert_eq!(d.offset, 600);
        assert_eq!(arena.growth_count(), 1);

        assert!(arena.contains(b));
        assert_eq!(arena.read_region(b).unwrap(), pattern(300, 2));
        assert_eq!(arena.read_region(c).unwrap(), pattern(300, 3));
        assert_eq!(arena.read_region(d).unwrap(), pattern(500, 4));
    }

    #[test]
    fn test_growth_preserves_all_bytes() {
        let mut arena = arena(256);
        let regions: Vec<_> = (0..16)
            .map(|i| (arena.insert_data(&pattern(60, i)).unwrap(), i))
            .collect();
        assert!(arena.growth_count() > 0);

        for (region, seed) in regions {
            assert_eq!(arena.read_region(region).unwrap(), pattern(60, seed));
        }
    }

    #[test]
    fn test_growth_retires_old_buffer() {
        let mut arena = arena(64);
        let old = Arc::downgrade(arena.buffer());
        arena.insert_data(&pattern(128, 0)).unwrap();

        assert!(old.upgrade().is_some(), "old buffer released too early");
        assert_eq!(arena.device().pending_release_count(), 1);

        for _ in 0..arena.device().frames_in_flight() {
            arena.device().advance_frame();
        }
        assert!(old.upgrade().is_none());
    }

    #[test]
    fn test_double_free_is_invalid_region() {
        let mut arena = arena(1024);
        let a = arena.insert_data(&pattern(10, 0)).unwrap();
        arena.remove_data(a).unwrap();
        assert_eq!(arena.remove_data(a), Err(ArenaError::InvalidRegion(a)));
    }

    #[test]
    fn test_foreign_region_is_invalid() {
        let mut arena = arena(1024);
        let a = arena.insert_data(&pattern(16, 0)).unwrap();
        let wrong_size = BufferRegion::new(a.offset, 8);
        assert!(matches!(
            arena.remove_data(wrong_size),
            Err(ArenaError::InvalidRegion(_))
        ));
        assert!(arena.remove_data(BufferRegion::new(512, 16)).is_err());
        assert!(arena.contains(a));
    }

    #[test]
    fn test_empty_insert() {
        let mut arena = arena(1024);
        assert_eq!(arena.insert_data(&[]), Err(ArenaError::EmptyAllocation));
    }

    #[test]
    fn test_no_growth_out_of_space() {
        let config = ArenaConfig::new(256).with_growth(false);
        let mut arena = ArenaBuffer::new(device(), config).unwrap();

        // Over the threshold is fine while it still fits.
        arena.insert_data(&pattern(240, 0)).unwrap();
        let err = arena.insert_data(&pattern(32, 0)).unwrap_err();
        assert_eq!(
            err,
            ArenaError::OutOfArenaSpace {
                requested: 32,
                capacity: 256
            }
        );
        assert_eq!(arena.capacity(), 256);
    }

    #[test]
    fn test_growth_limited_by_device() {
        let instance = GraphicsInstance::with_parameters(
            InstanceParameters::new()
                .with_backend(BackendType::Dummy)
                .with_max_buffer_size(512),
        )
        .unwrap();
        let device = instance.create_device().unwrap();
        let mut arena = ArenaBuffer::new(device, ArenaConfig::new(256)).unwrap();

        arena.insert_data(&pattern(400, 0)).unwrap();
        assert_eq!(arena.capacity(), 512);

        let err = arena.insert_data(&pattern(200, 0)).unwrap_err();
        assert_eq!(err, ArenaError::GrowthFailed(GraphicsError::OutOfMemory));
        assert_eq!(arena.region_count(), 1);
    }

    #[rstest]
    #[case::allocation(true, false, GraphicsError::OutOfMemory)]
    #[case::copy(false, true, GraphicsError::DeviceLost)]
    fn test_failed_growth_leaves_arena_unchanged(
        #[case] fail_create: bool,
        #[case] fail_copy: bool,
        #[case] cause: GraphicsError,
    ) {
        let (backend, mut arena) = faulty_arena(64);
        let a = arena.insert_data(&pattern(32, 1)).unwrap();
        let buffer = Arc::clone(arena.buffer());
        let before = arena.stats();

        backend.fail_create.store(fail_create, Ordering::Relaxed);
        backend.fail_copy.store(fail_copy, Ordering::Relaxed);
        assert_eq!(
            arena.insert_data(&pattern(64, 2)),
            Err(ArenaError::GrowthFailed(cause))
        );

        assert_eq!(arena.stats(), before);
        assert!(Arc::ptr_eq(arena.buffer(), &buffer));
        assert_eq!(arena.device().pending_release_count(), 0);
        assert_eq!(arena.read_region(a).unwrap(), pattern(32, 1));

        backend.fail_create.store(false, Ordering::Relaxed);
        backend.fail_copy.store(false, Ordering::Relaxed);
        let b = arena.insert_data(&pattern(64, 2)).unwrap();
        assert_eq!(arena.growth_count(), 1);
        assert_eq!(arena.read_region(a).unwrap(), pattern(32, 1));
        assert_eq!(arena.read_region(b).unwrap(), pattern(64, 2));
    }

    #[test]
    fn test_alignment_padding() {
        let config = ArenaConfig::new(1024).with_alignment(12);
        let mut arena = ArenaBuffer::new(device(), config).unwrap();
        let a = arena.insert_data(&pattern(5, 0)).unwrap();
        let b = arena.insert_data(&pattern(24, 0)).unwrap();
        assert_eq!(a, BufferRegion::new(0, 5));
        assert_eq!(b.offset, 12);
        assert_eq!(arena.used_bytes(), 36);
    }

    #[test]
    fn test_used_never_exceeds_capacity() {
        let mut arena = arena(128);
        let mut live = Vec::new();
        for step in 0..200u32 {
            let len = 4 + (step * 37 % 97) as usize;
            if step % 3 == 2 && !live.is_empty() {
                let region = live.remove((step as usize * 7) % live.len());
                arena.remove_data(region).unwrap();
            } else {
                live.push(arena.insert_data(&pattern(len, step as u8)).unwrap());
            }

            let stats = arena.stats();
            let live_sum: u64 = arena.live_regions().map(|r| r.size).sum();
            assert!(live_sum <= stats.used_bytes);
            assert!(stats.used_bytes <= stats.capacity);
            assert!(stats.tail <= stats.capacity);
            assert_eq!(stats.used_bytes + stats.hole_bytes, stats.tail);
        }
    }

    #[test]
    fn test_freed_tail_is_reclaimed() {
        let mut arena = arena(1024);
        let a = arena.insert_data(&pattern(100, 0)).unwrap();
        let b = arena.insert_data(&pattern(100, 0)).unwrap();
        arena.remove_data(b).unwrap();
        arena.remove_data(a).unwrap();

        let stats = arena.stats();
        assert_eq!(stats.tail, 0);
        assert_eq!(stats.holes, 0);
        assert_eq!(stats.used_bytes, 0);
        assert_eq!(stats.load_factor(), 0.0);
    }
}
