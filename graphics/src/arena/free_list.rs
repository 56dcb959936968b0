//! Hole tracking for an arena.
//!
//! Space below `tail` is either a live block or a hole; everything from
//! `tail` to the arena capacity is untouched. Holes are kept sorted by offset
//! and never touch each other: a released block is merged with the holes on
//! either side, and a hole that ends at `tail` is folded back into it.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub(crate) struct FreeList {
    holes: BTreeMap<u64, u64>,
    tail: u64,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// First byte past the highest live block.
    pub fn tail(&self) -> u64 {
        self.tail
    }

    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    pub fn hole_bytes(&self) -> u64 {
        self.holes.values().sum()
    }

    /// Offset of the lowest hole that can hold `size` bytes.
    pub fn find_hole(&self, size: u64) -> Option<u64> {
        self.holes
            .iter()
            .find_map(|(&offset, &hole)| (hole >= size).then_some(offset))
    }

    /// Whether `size` bytes can be placed in an arena of `capacity` bytes.
    pub fn fits(&self, size: u64, capacity: u64) -> bool {
        self.find_hole(size).is_some() || self.tail + size <= capacity
    }

    /// First-fit over the holes, then bump at the tail.
    pub fn allocate(&mut self, size: u64, capacity: u64) -> Option<u64> {
        if let Some(offset) = self.find_hole(size) {
            let hole = self.holes.remove(&offset)?;
            if hole > size {
                self.holes.insert(offset + size, hole - size);
            }
            return Some(offset);
        }

        if self.tail + size <= capacity {
            let offset = self.tail;
            self.tail += size;
            return Some(offset);
        }

        None
    }

    /// Return a block. The caller guarantees it is live.
    pub fn release(&mut self, offset: u64, size: u64) {
        let mut start = offset;
        let mut end = offset + size;

        if let Some((&prev, &prev_size)) = self.holes.range(..offset).next_back()
            && prev + prev_size == start
        {
            self.holes.remove(&prev);
            start = prev;
        }

        if let Some(next_size) = self.holes.remove(&end) {
            end += next_size;
        }

        if end == self.tail {
            self.tail = start;
        } else {
            self.holes.insert(start, end - start);
        }
    }
}
