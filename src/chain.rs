//! A circular chain of slot indices laid out at a fixed stride.
//!
//! Every slot on the chain holds the index of the slot one stride below it,
//! so walking the chain is a sequence of loads where each address depends on the previous load.
//! The lowest slot wraps around to the highest one, closing a single cycle.

use crate::error::{ProbeError, Result};
use std::mem;

/// Width of one chain slot in bytes.
pub const ADDRESS_WIDTH: usize = mem::size_of::<usize>();

pub struct Chain {
    slots: Vec<usize>,
    base: usize,
    stride: usize,
    len: usize,
}

impl Chain {
    /// Lays out a chain over a fresh buffer of `capacity` slots.
    ///
    /// `stride` is the distance between consecutive chain slots, counted in slots.
    /// The buffer is over-allocated by one page so that the first chain slot can sit on a page boundary.
    pub fn build(capacity: usize, stride: usize, page_size: usize) -> Result<Self> {
        if stride == 0 || stride > capacity {
            return Err(ProbeError::InvalidStride { stride, capacity });
        }
        let total = capacity + page_size / ADDRESS_WIDTH;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(total)
            .map_err(|source| ProbeError::AllocationFailure {
                slots: total,
                stride,
                source,
            })?;
        slots.resize(total, 0);

        let misalignment = slots.as_ptr() as usize % page_size;
        let base = if misalignment == 0 {
            0
        } else {
            (page_size - misalignment) / ADDRESS_WIDTH
        };
        let len = capacity / stride;
        let mut chain = Chain {
            slots,
            base,
            stride,
            len,
        };
        for k in (1..len).rev() {
            let (at, previous) = (chain.slot(k), chain.slot(k - 1));
            chain.slots[at] = previous;
        }
        let wrap = chain.slot(len - 1);
        chain.slots[base] = wrap;
        debug_assert_eq!(wrap, chain.entry());
        debug_assert_eq!(chain.walk(chain.entry(), len), chain.entry());
        Ok(chain)
    }

    fn slot(&self, k: usize) -> usize {
        self.base + k * self.stride
    }

    /// Index of the slot traversals start from, the highest slot on the chain.
    pub fn entry(&self) -> usize {
        self.slot(self.len - 1)
    }

    /// Number of slots on the cycle.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of traversal counts worth sampling, capped at `ceiling`.
    pub fn spots(&self, ceiling: usize) -> usize {
        self.len.min(ceiling)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Address of the first chain slot.
    pub fn base_address(&self) -> usize {
        self.slots[self.base..].as_ptr() as usize
    }

    /// Performs one dependent load.
    #[inline(always)]
    pub fn next(&self, index: usize) -> usize {
        self.slots[index]
    }

    /// Follows the chain for `steps` loads and returns where it ends up.
    #[inline(never)]
    pub fn walk(&self, from: usize, steps: usize) -> usize {
        let mut index = from;
        for _ in 0..steps {
            index = self.next(index);
        }
        index
    }
}

#[cfg(test)]
const TEST_PAGE: usize = 4096;

#[test]
fn test_cycle_returns_to_entry() {
    for stride in [1, 8, 16, 64, 512] {
        let chain = Chain::build(1 << 14, stride, TEST_PAGE).unwrap();
        let entry = chain.entry();
        assert_eq!(chain.len(), (1 << 14) / stride);
        assert_eq!(chain.walk(entry, chain.len()), entry, "stride {stride}");
        let mut index = entry;
        for k in 1..chain.len() {
            index = chain.next(index);
            assert_ne!(index, entry, "stride {stride} revisited entry after {k} steps");
        }
    }
}

#[test]
fn test_steps_are_one_stride_apart() {
    let chain = Chain::build(1 << 12, 32, TEST_PAGE).unwrap();
    let entry = chain.entry();
    assert_eq!(chain.next(entry), entry - 32);
    let lowest = chain.walk(entry, chain.len() - 1);
    assert_eq!(chain.next(lowest), entry);
}

#[test]
fn test_base_is_page_aligned() {
    for page in [4096, 16384, 65536] {
        for stride in [8, 128, 4096] {
            let chain = Chain::build(1 << 16, stride, page).unwrap();
            assert_eq!(chain.base_address() % page, 0, "page {page} stride {stride}");
        }
    }
}

#[test]
fn test_single_slot_chain() {
    let chain = Chain::build(64, 64, TEST_PAGE).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.next(chain.entry()), chain.entry());
}

#[test]
fn test_spots_capped_at_ceiling() {
    let chain = Chain::build(1 << 12, 8, TEST_PAGE).unwrap();
    assert_eq!(chain.spots(100), 100);
    let chain = Chain::build(1 << 12, 1 << 8, TEST_PAGE).unwrap();
    assert_eq!(chain.spots(100), 16);
}

#[test]
fn test_rejects_out_of_range_stride() {
    assert!(matches!(
        Chain::build(64, 128, TEST_PAGE),
        Err(ProbeError::InvalidStride {
            stride: 128,
            capacity: 64
        })
    ));
    assert!(matches!(
        Chain::build(64, 0, TEST_PAGE),
        Err(ProbeError::InvalidStride { .. })
    ));
}

#[test]
fn test_allocation_failure_is_reported() {
    let result = Chain::build(usize::MAX / 2, 8, TEST_PAGE);
    assert!(matches!(
        result,
        Err(ProbeError::AllocationFailure { stride: 8, .. })
    ));
}
