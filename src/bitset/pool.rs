// This module provides BitSetPool, the recycling allocator behind envmod's bit-sets. Sets
// that are released go back to a bounded free list of block vectors, and the functional
// set operations (union, intersect, subtract, complement, copy) draw their result storage
// from that list before falling back to the global allocator. The tail-handling rules are
// the ones callers rely on: union copies the longer operand's extra blocks verbatim,
// intersect stops at the shorter operand, subtract keeps the minuend's extra tail.
// PoolStats counts acquisitions, releases and recycled chains for debugging.

//! Recycling pool and functional set operations.

use super::{BitSet, Block};
use crate::core::error::BitSetError;
use std::fmt;

/// Upper bound on chains kept for reuse.
const MAX_FREE_CHAINS: usize = 64;

/// Pool statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Sets handed out by the pool.
    pub acquired: usize,
    /// Sets returned to the pool.
    pub released: usize,
    /// Acquisitions served from the free list.
    pub recycled: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} acquired, {} released, {} recycled",
            self.acquired, self.released, self.recycled
        )
    }
}

/// Free-list backed source of [`BitSet`]s.
#[derive(Debug, Default)]
pub struct BitSetPool {
    free: Vec<Vec<Block>>,
    stats: PoolStats,
}

impl BitSetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed storage of `len` blocks, reusing a released chain when possible.
    fn storage(&mut self, len: usize) -> Vec<Block> {
        self.stats.acquired += 1;
        let mut blocks = match self.free.pop() {
            Some(blocks) => {
                self.stats.recycled += 1;
                blocks
            }
            None => Vec::with_capacity(len),
        };
        blocks.clear();
        blocks.resize(len, 0);
        blocks
    }

    /// An empty set.
    pub fn acquire(&mut self) -> BitSet {
        BitSet::from_blocks(self.storage(0))
    }

    /// Return a set's chain to the pool.
    pub fn release(&mut self, set: BitSet) {
        self.stats.released += 1;
        let blocks = set.into_blocks();
        if blocks.capacity() > 0 && self.free.len() < MAX_FREE_CHAINS {
            self.free.push(blocks);
        }
    }

    /// Independent copy of `set`.
    pub fn copy(&mut self, set: &BitSet) -> BitSet {
        let mut blocks = self.storage(0);
        blocks.extend_from_slice(set.blocks());
        BitSet::from_blocks(blocks)
    }

    /// `a ∪ b` as a new set.
    pub fn union(&mut self, a: &BitSet, b: &BitSet) -> BitSet {
        let (longer, shorter) = if a.block_count() >= b.block_count() {
            (a, b)
        } else {
            (b, a)
        };
        let mut result = self.copy(longer);
        result.union_with(shorter);
        result
    }

    /// `a ∩ b` as a new set, never longer than the shorter operand.
    pub fn intersect(&mut self, a: &BitSet, b: &BitSet) -> BitSet {
        let mut blocks = self.storage(0);
        blocks.extend(a.blocks().iter().zip(b.blocks()).map(|(x, y)| x & y));
        BitSet::from_blocks(blocks)
    }

    /// `a \ b` as a new set.
    pub fn subtract(&mut self, a: &BitSet, b: &BitSet) -> BitSet {
        let mut result = self.copy(a);
        result.subtract_with(b);
        result
    }

    /// Complement of `set` relative to `[0, upper]` as a new set.
    pub fn complement(&mut self, upper: usize, set: &BitSet) -> Result<BitSet, BitSetError> {
        let mut result = self.copy(set);
        if let Err(err) = result.complement_within(upper) {
            self.release(result);
            return Err(err);
        }
        Ok(result)
    }

    /// Number of chains waiting for reuse.
    pub fn free_chains(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
