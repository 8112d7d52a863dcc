use crate::chain::ADDRESS_WIDTH;
use std::collections::BTreeMap;

/// First interesting jump index per stride, ordered by stride.
pub type StrideJumpTable = BTreeMap<usize, usize>;

/// The group of strides with the largest strides, see [`find_last_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastGroup {
    /// Smallest stride of the group.
    pub stride: usize,
    /// Largest number of spots that still fit into one cache set.
    pub associativity: usize,
}

/// Splits the strides into groups of near-equal jump indices and returns the last one.
///
/// A new group starts whenever a stride's jump index differs from the previous stride's by more than `tolerance`.
/// Returns `None` for an empty table.
pub fn find_last_group(table: &StrideJumpTable, tolerance: usize) -> Option<LastGroup> {
    let mut entries = table.iter();
    let (&first_stride, &first_value) = entries.next()?;
    let mut group_start = first_stride;
    let mut last_value = first_value;
    let mut group_max = first_value;
    for (&stride, &value) in entries {
        if value.abs_diff(last_value) > tolerance {
            group_start = stride;
            group_max = value;
        } else {
            group_max = group_max.max(value);
        }
        last_value = value;
    }
    Some(LastGroup {
        stride: group_start,
        associativity: group_max.saturating_sub(1),
    })
}

/// Cache geometry inferred from the last stride group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEstimate {
    pub stride: usize,
    pub associativity: usize,
    pub size_bytes: usize,
}

impl CacheEstimate {
    pub fn from_group(group: LastGroup) -> Self {
        CacheEstimate {
            stride: group.stride,
            associativity: group.associativity,
            size_bytes: group.stride * ADDRESS_WIDTH * group.associativity,
        }
    }

    pub fn kib(&self) -> f64 {
        self.size_bytes as f64 / 1024.
    }

    pub fn mib(&self) -> f64 {
        self.size_bytes as f64 / 1024. / 1024.
    }
}

#[test]
fn test_breaks_on_large_difference() {
    let table = StrideJumpTable::from([(2, 5), (4, 6), (8, 9), (16, 40)]);
    assert_eq!(
        find_last_group(&table, 3),
        Some(LastGroup {
            stride: 16,
            associativity: 39
        })
    );
}

#[test]
fn test_last_group_spans_several_strides() {
    let table = StrideJumpTable::from([(8, 40), (16, 9), (32, 11), (64, 13), (128, 12)]);
    assert_eq!(
        find_last_group(&table, 3),
        Some(LastGroup {
            stride: 16,
            associativity: 12
        })
    );
}

#[test]
fn test_groups_chain_through_neighbours() {
    // 5 and 11 differ by more than the tolerance but are linked by 8
    let table = StrideJumpTable::from([(8, 5), (16, 8), (32, 11)]);
    let group = find_last_group(&table, 3).unwrap();
    assert_eq!(group.stride, 8);
    assert_eq!(group.associativity, 10);
}

#[test]
fn test_zero_tolerance() {
    let table = StrideJumpTable::from([(8, 5), (16, 5), (32, 6)]);
    let group = find_last_group(&table, 0).unwrap();
    assert_eq!(group.stride, 32);
    assert_eq!(group.associativity, 5);
}

#[test]
fn test_single_and_empty_table() {
    assert_eq!(find_last_group(&StrideJumpTable::new(), 3), None);
    assert_eq!(
        find_last_group(&StrideJumpTable::from([(64, 17)]), 3),
        Some(LastGroup {
            stride: 64,
            associativity: 16
        })
    );
}

#[test]
fn test_cache_size() {
    let estimate = CacheEstimate::from_group(LastGroup {
        stride: 16,
        associativity: 39,
    });
    assert_eq!(estimate.size_bytes, 16 * ADDRESS_WIDTH * 39);
    let estimate = CacheEstimate::from_group(LastGroup {
        stride: 512,
        associativity: 8,
    });
    assert_eq!(estimate.size_bytes, 512 * ADDRESS_WIDTH * 8);
    assert_eq!(estimate.kib(), (512 * ADDRESS_WIDTH * 8) as f64 / 1024.);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_cache_size_on_64_bit() {
    let estimate = CacheEstimate::from_group(LastGroup {
        stride: 16,
        associativity: 39,
    });
    assert_eq!(estimate.size_bytes, 4992);
}
