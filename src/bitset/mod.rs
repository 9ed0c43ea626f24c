// This module implements the extensible bit-set used throughout envmod, most importantly
// for the transitive inheritance closure ("inhset") of every class. A BitSet is a chain
// of fixed-width blocks where block i covers elements [i*64, (i+1)*64); blocks past the
// end of the chain are logically zero, so sets of different lengths combine freely. The
// imperative operations (union_with, intersect_with, subtract_with, complement_within)
// mutate the receiver, while the functional forms live on BitSetPool (see pool.rs) and
// build fresh sets out of recycled block storage. next_elem doubles as a restartable
// cursor; iter/apply are the idiomatic wrappers around it.

//! Extensible bit-sets over a chain of fixed-width blocks.
//!
//! # Example
//!
//! ```
//! use envmod::bitset::BitSet;
//!
//! let mut set = BitSet::new();
//! set.add_elem(3);
//! set.add_range(64, 66).unwrap();
//!
//! let mut cursor = None;
//! let mut seen = Vec::new();
//! while let Some(e) = set.next_elem(cursor) {
//!     seen.push(e);
//!     cursor = Some(e);
//! }
//! assert_eq!(seen, vec![3, 64, 65, 66]);
//! ```

pub mod pool;

pub use pool::{BitSetPool, PoolStats};

use crate::core::error::BitSetError;
use std::fmt;

/// One block of the chain.
pub type Block = u64;

/// Number of elements covered by a single block.
pub const BLOCK_BITS: usize = Block::BITS as usize;

/// Largest element a set can hold.
pub const MAX_ELEM: usize = u32::MAX as usize;

fn check_elem(elem: usize) -> Result<(), BitSetError> {
    if elem > MAX_ELEM {
        return Err(BitSetError::ElementTooLarge {
            elem,
            limit: MAX_ELEM,
        });
    }
    Ok(())
}

/// Block index and bit mask for an element.
#[inline]
fn locate(elem: usize) -> (usize, Block) {
    (elem / BLOCK_BITS, 1 << (elem % BLOCK_BITS))
}

/// Per-block masks covering the inclusive range `[low, high]`.
fn range_masks(low: usize, high: usize) -> impl Iterator<Item = (usize, Block)> {
    let first = low / BLOCK_BITS;
    let last = high / BLOCK_BITS;
    (first..=last).map(move |index| {
        let lo_bit = if index == first { low % BLOCK_BITS } else { 0 };
        let hi_bit = if index == last {
            high % BLOCK_BITS
        } else {
            BLOCK_BITS - 1
        };
        let mask = (Block::MAX >> (BLOCK_BITS - 1 - hi_bit)) & (Block::MAX << lo_bit);
        (index, mask)
    })
}

/// Unbounded set of non-negative integers.
///
/// Two sets compare equal when they contain the same elements, regardless of
/// how many trailing zero blocks either chain carries.
#[derive(Clone, Default)]
pub struct BitSet {
    blocks: Vec<Block>,
}

impl BitSet {
    /// Create an empty set with no blocks.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub(crate) fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub(crate) fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub(crate) fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks currently in the chain.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn grow_to(&mut self, len: usize) {
        if self.blocks.len() < len {
            self.blocks.resize(len, 0);
        }
    }

    /// Add `elem`, growing the chain as needed. Returns true if it was not
    /// already present.
    ///
    /// # Panics
    ///
    /// Panics if `elem` exceeds [`MAX_ELEM`]; see [`try_add_elem`](Self::try_add_elem).
    pub fn add_elem(&mut self, elem: usize) -> bool {
        match self.try_add_elem(elem) {
            Ok(added) => added,
            Err(err) => panic!("{}", err),
        }
    }

    /// Checked form of [`add_elem`](Self::add_elem).
    pub fn try_add_elem(&mut self, elem: usize) -> Result<bool, BitSetError> {
        check_elem(elem)?;
        let (index, mask) = locate(elem);
        self.grow_to(index + 1);
        let was_set = self.blocks[index] & mask != 0;
        self.blocks[index] |= mask;
        Ok(!was_set)
    }

    /// Remove `elem`. Returns true if it was present.
    pub fn remove_elem(&mut self, elem: usize) -> bool {
        let (index, mask) = locate(elem);
        match self.blocks.get_mut(index) {
            Some(block) if *block & mask != 0 => {
                *block &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Membership test. Elements past the end of the chain are absent.
    pub fn contains(&self, elem: usize) -> bool {
        let (index, mask) = locate(elem);
        self.blocks
            .get(index)
            .is_some_and(|block| block & mask != 0)
    }

    /// Add every element of the inclusive range `[low, high]`.
    pub fn add_range(&mut self, low: usize, high: usize) -> Result<(), BitSetError> {
        if low > high {
            return Err(BitSetError::InvalidRange { low, high });
        }
        check_elem(high)?;
        self.grow_to(high / BLOCK_BITS + 1);
        for (index, mask) in range_masks(low, high) {
            self.blocks[index] |= mask;
        }
        Ok(())
    }

    /// Remove every element of the inclusive range `[low, high]`.
    pub fn remove_range(&mut self, low: usize, high: usize) -> Result<(), BitSetError> {
        if low > high {
            return Err(BitSetError::InvalidRange { low, high });
        }
        for (index, mask) in range_masks(low, high) {
            match self.blocks.get_mut(index) {
                Some(block) => *block &= !mask,
                None => break,
            }
        }
        Ok(())
    }

    /// Remove all elements, keeping the chain allocated.
    pub fn clear(&mut self) {
        self.blocks.fill(0);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&block| block == 0)
    }

    /// Number of elements in the set.
    pub fn card(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.count_ones() as usize)
            .sum()
    }

    /// True if the two sets share no element.
    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .all(|(a, b)| a & b == 0)
    }

    /// True if every element of `self` is also in `other`.
    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.blocks.iter().enumerate().all(|(index, &block)| {
            let theirs = other.blocks.get(index).copied().unwrap_or(0);
            block & !theirs == 0
        })
    }

    /// Smallest element strictly greater than `after`, or the smallest element
    /// at all when `after` is `None`.
    ///
    /// Feeding the result back in enumerates the set in increasing order and
    /// ends with `None`.
    pub fn next_elem(&self, after: Option<usize>) -> Option<usize> {
        let start = match after {
            None => 0,
            Some(elem) => elem.checked_add(1)?,
        };
        let (mut index, _) = locate(start);
        let mut block = *self.blocks.get(index)? & (Block::MAX << (start % BLOCK_BITS));
        loop {
            if block != 0 {
                return Some(index * BLOCK_BITS + block.trailing_zeros() as usize);
            }
            index += 1;
            block = *self.blocks.get(index)?;
        }
    }

    /// Ascending iterator over the elements.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            blocks: &self.blocks,
            index: 0,
            current: self.blocks.first().copied().unwrap_or(0),
        }
    }

    /// Call `f` once for every element in increasing order.
    pub fn apply<F: FnMut(usize)>(&self, mut f: F) {
        for elem in self.iter() {
            f(elem);
        }
    }

    /// In-place union. Grows the chain to cover `other`.
    pub fn union_with(&mut self, other: &BitSet) {
        self.grow_to(other.blocks.len());
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            *mine |= theirs;
        }
    }

    /// In-place intersection. Blocks past the end of `other` are dropped.
    pub fn intersect_with(&mut self, other: &BitSet) {
        self.blocks.truncate(other.blocks.len());
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            *mine &= theirs;
        }
    }

    /// In-place difference.
    pub fn subtract_with(&mut self, other: &BitSet) {
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            *mine &= !theirs;
        }
    }

    /// In-place complement relative to `[0, upper]`.
    ///
    /// Only membership within `[0, upper]` is meaningful afterwards; this
    /// implementation drops everything above `upper`.
    pub fn complement_within(&mut self, upper: usize) -> Result<(), BitSetError> {
        check_elem(upper)?;
        let len = upper / BLOCK_BITS + 1;
        self.grow_to(len);
        self.blocks.truncate(len);
        for (index, mask) in range_masks(0, upper) {
            self.blocks[index] = !self.blocks[index] & mask;
        }
        Ok(())
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        let common = self.blocks.len().min(other.blocks.len());
        self.blocks[..common] == other.blocks[..common]
            && self.blocks[common..].iter().all(|&block| block == 0)
            && other.blocks[common..].iter().all(|&block| block == 0)
    }
}

impl Eq for BitSet {}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (position, elem) in self.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", elem)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<usize> for BitSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        for elem in iter {
            self.add_elem(elem);
        }
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over a [`BitSet`].
pub struct Iter<'a> {
    blocks: &'a [Block],
    index: usize,
    current: Block,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.index += 1;
            self.current = *self.blocks.get(self.index)?;
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(self.index * BLOCK_BITS + bit)
    }
}
