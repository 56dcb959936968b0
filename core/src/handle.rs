//! Generational handles.
//!
//! A handle is an `(index, generation)` pair. The index addresses a slot in a
//! [`SlotMap`]; the generation is bumped every time the slot is vacated, so a
//! handle that outlived its value can never observe whatever is stored in the
//! slot next.
//!
//! Handle types are declared with [`new_handle_type!`], which keeps distinct
//! handle kinds from being mixed up at compile time:
//!
//! ```
//! use meshpool_core::handle::SlotMap;
//! use meshpool_core::new_handle_type;
//!
//! new_handle_type! {
//!     /// Handle to a test resource.
//!     pub struct ThingHandle;
//! }
//!
//! let mut things = SlotMap::<ThingHandle, &str>::new();
//! let a = things.insert("a");
//! assert_eq!(things.get(a), Some(&"a"));
//!
//! things.remove(a);
//! let b = things.insert("b");
//! // Same slot, new generation: the stale handle misses.
//! assert_eq!(a.index(), b.index());
//! assert_eq!(things.get(a), None);
//! ```

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Key type usable with [`SlotMap`].
///
/// Implemented by every type declared with [`new_handle_type!`].
pub trait Key: Copy + Eq + Hash + fmt::Debug {
    /// Build a key from its raw parts.
    fn from_parts(index: u32, generation: u32) -> Self;

    /// Slot index.
    fn index(&self) -> u32;

    /// Generation of the slot when this key was issued.
    fn generation(&self) -> u32;
}

/// Declare a generational handle type.
///
/// The generated type is `Copy + Eq + Hash + Ord`, prints as
/// `Name(index@generation)` and implements [`Key`].
#[macro_export]
macro_rules! new_handle_type {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// Slot index of this handle.
            pub fn index(&self) -> u32 {
                self.index
            }

            /// Generation of this handle.
            pub fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl $crate::handle::Key for $name {
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            fn index(&self) -> u32 {
                self.index
            }

            fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({}@{})", stringify!($name), self.index, self.generation)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

pub use new_handle_type;

struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// Dense storage addressed by generational keys.
///
/// Vacated slots are recycled. A slot whose generation counter is exhausted
/// is retired instead of recycled, so a key is never issued twice.
pub struct SlotMap<K: Key, V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: Key, V> SlotMap<K, V> {
    /// Create an empty slot map.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Create an empty slot map with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a value and return its key.
    pub fn insert(&mut self, value: V) -> K {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            return K::from_parts(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).expect("slot map index overflow");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_parts(index, 0)
    }

    /// Remove the value addressed by `key`.
    ///
    /// Returns `None` if the key is stale or was never issued by this map.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }

        let value = slot.value.take()?;
        self.len -= 1;

        if slot.generation == u32::MAX {
            log::debug!("SlotMap: retiring exhausted slot {}", key.index());
        } else {
            slot.generation += 1;
            self.free.push(key.index());
        }

        Some(value)
    }

    /// Get a reference to the value addressed by `key`.
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable reference to the value addressed by `key`.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether `key` addresses a live value.
    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over live `(key, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (K::from_parts(index as u32, slot.generation), value))
        })
    }

    /// Iterate over live `(key, value)` pairs with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (K::from_parts(index as u32, generation), value))
        })
    }

    /// Iterate over live values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

impl<K: Key, V> Default for SlotMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Panics if `key` is stale or was never issued by this map.
impl<K: Key, V> Index<K> for SlotMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("{key:?} is not in the slot map"),
        }
    }
}

/// Panics if `key` is stale or was never issued by this map.
impl<K: Key, V> IndexMut<K> for SlotMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut V {
        match self.get_mut(key) {
            Some(value) => value,
            None => panic!("{key:?} is not in the slot map"),
        }
    }
}

impl<K: Key, V: fmt::Debug> fmt::Debug for SlotMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    new_handle_type! {
        struct TestHandle;
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let a = map.insert(10);
        let b = map.insert(20);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(a), Some(&10));
        assert_eq!(map.get(b), Some(&20));
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_invalidates_key() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let a = map.insert(10);

        assert_eq!(map.remove(a), Some(10));
        assert_eq!(map.get(a), None);
        assert_eq!(map.remove(a), None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_reused_slot_bumps_generation() {
        let mut map = SlotMap::<TestHandle, &str>::new();
        let old = map.insert("old");
        map.remove(old);
        let new = map.insert("new");

        assert_eq!(old.index(), new.index());
        assert_eq!(new.generation(), old.generation() + 1);
        assert_eq!(map.get(old), None);
        assert_eq!(map.get(new), Some(&"new"));
    }

    #[test]
    fn test_stale_key_cannot_remove_new_value() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let old = map.insert(1);
        map.remove(old);
        let new = map.insert(2);

        assert_eq!(map.remove(old), None);
        assert_eq!(map.get(new), Some(&2));
    }

    #[test]
    fn test_foreign_index_misses() {
        let map = SlotMap::<TestHandle, u32>::new();
        let key = TestHandle::from_parts(42, 0);
        assert!(!map.contains_key(key));
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let key = map.insert(1);
        map.slots[0].generation = u32::MAX;
        let key = TestHandle::from_parts(key.index(), u32::MAX);

        assert_eq!(map.remove(key), Some(1));
        let next = map.insert(2);
        assert_ne!(next.index(), key.index());
    }

    #[test]
    fn test_iter_skips_vacant_slots() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let a = map.insert(1);
        let b = map.insert(2);
        let c = map.insert(3);
        map.remove(b);

        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![a, c]);

        for (_, value) in map.iter_mut() {
            *value *= 10;
        }
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn test_index_by_key() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let a = map.insert(1);
        map[a] += 41;
        assert_eq!(map[a], 42);
    }

    #[test]
    #[should_panic(expected = "is not in the slot map")]
    fn test_index_stale_key_panics() {
        let mut map = SlotMap::<TestHandle, u32>::new();
        let a = map.insert(1);
        map.remove(a);
        let _ = map[a];
    }

    #[test]
    fn test_handle_debug_format() {
        let handle = TestHandle::from_parts(3, 7);
        assert_eq!(format!("{handle:?}"), "TestHandle(3@7)");
    }
}
