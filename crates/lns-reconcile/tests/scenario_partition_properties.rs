//! Partitioner properties.
//!
//! 1. Concatenating the batches in order reproduces the input exactly.
//! 2. Every batch except the last has exactly `batch_size` elements.
//! 3. Non-positive batch sizes are rejected.

use lns_reconcile::{partition, PartitionError};
use proptest::prelude::*;

proptest! {
    #[test]
    fn concatenation_reproduces_input(items in proptest::collection::vec(any::<u16>(), 0..300),
                                      batch in 1i64..64) {
        let batches = partition(&items, batch).unwrap();
        let flat: Vec<u16> = batches.iter().flatten().copied().collect();
        prop_assert_eq!(flat, items);
    }

    #[test]
    fn only_last_batch_may_be_short(items in proptest::collection::vec(any::<u8>(), 1..300),
                                    batch in 1i64..64) {
        let batches = partition(&items, batch).unwrap();
        let (last, full) = batches.split_last().unwrap();
        for b in full {
            prop_assert_eq!(b.len() as i64, batch);
        }
        prop_assert!(!last.is_empty() && last.len() as i64 <= batch);
    }

    #[test]
    fn non_positive_sizes_fail(batch in i64::MIN..=0) {
        prop_assert_eq!(partition(&[1, 2, 3], batch), Err(PartitionError::InvalidBatchSize(batch)));
    }
}

#[test]
fn two_hundred_fifty_by_hundred_is_three_batches() {
    let items: Vec<i64> = (0..250).collect();
    let sizes: Vec<usize> = partition(&items, 100).unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
}
