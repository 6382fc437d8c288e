// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Merge sort specialized for the flattened sketch layout.
//!
//! The input is a run of fixed-size blocks that are already sorted (one per
//! occupied level) followed by an unsorted remainder (the base buffer). The
//! remainder is sorted on its own and then adjacent runs are merged bottom-up,
//! doubling the run length each pass. That costs `O(N log(N / k))` instead of
//! the `O(N log N)` of sorting from scratch.
//!
//! Items move together with their weights. Merging is stable: among items the
//! comparator considers equal, the one that appeared first in the input comes
//! first in the output.

use super::comparator::Comparator;

/// A retained item together with the number of stream items it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Weighted<T> {
    pub item: T,
    pub weight: u64,
}

/// Fully sorts `entries`, whose first `sorted_len` entries form sorted blocks
/// of `block_size` entries each.
pub(crate) fn blocky_tandem_merge_sort<T, C>(
    mut entries: Vec<Weighted<T>>,
    sorted_len: usize,
    block_size: usize,
    cmp: &C,
) -> Vec<Weighted<T>>
where
    C: Comparator<T> + ?Sized,
{
    assert!(block_size > 0, "block size must be positive");
    debug_assert!(sorted_len <= entries.len());
    debug_assert_eq!(sorted_len % block_size, 0, "sorted prefix must be whole blocks");

    // Weights in the remainder are uniform, so sorting them along is harmless.
    entries[sorted_len..].sort_by(|a, b| cmp.compare(&a.item, &b.item));

    let mut run_len = block_size;
    while run_len < entries.len() {
        entries = merge_pass(entries, run_len, cmp);
        run_len = run_len.saturating_mul(2);
    }
    entries
}

/// Merges each pair of adjacent `run_len` runs.
fn merge_pass<T, C>(entries: Vec<Weighted<T>>, run_len: usize, cmp: &C) -> Vec<Weighted<T>>
where
    C: Comparator<T> + ?Sized,
{
    let mut merged = Vec::with_capacity(entries.len());
    let mut iter = entries.into_iter();
    loop {
        let left: Vec<_> = iter.by_ref().take(run_len).collect();
        if left.is_empty() {
            break;
        }
        let right: Vec<_> = iter.by_ref().take(run_len).collect();
        merge_runs(&mut merged, left, right, cmp);
    }
    merged
}

fn merge_runs<T, C>(
    out: &mut Vec<Weighted<T>>,
    left: Vec<Weighted<T>>,
    right: Vec<Weighted<T>>,
    cmp: &C,
) where
    C: Comparator<T> + ?Sized,
{
    let mut left_iter = left.into_iter().peekable();
    let mut right_iter = right.into_iter().peekable();
    loop {
        let take_right = match (left_iter.peek(), right_iter.peek()) {
            (Some(l), Some(r)) => cmp.less(&r.item, &l.item),
            _ => break,
        };
        let next = if take_right {
            right_iter.next()
        } else {
            left_iter.next()
        };
        out.extend(next);
    }
    out.extend(left_iter);
    out.extend(right_iter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RandomSource;
    use crate::common::XorShift64;
    use crate::quantiles::NaturalOrder;

    fn entries(items: &[i64], weight: u64) -> Vec<Weighted<i64>> {
        items
            .iter()
            .map(|&item| Weighted { item, weight })
            .collect()
    }

    #[test]
    fn test_levels_and_remainder() {
        let mut input = entries(&[1, 5, 9, 13], 2);
        input.extend(entries(&[0, 4, 8, 12], 4));
        input.extend(entries(&[11, 2, 7], 1));

        let sorted = blocky_tandem_merge_sort(input, 8, 4, &NaturalOrder);
        let items: Vec<i64> = sorted.iter().map(|e| e.item).collect();
        assert_eq!(items, vec![0, 1, 2, 4, 5, 7, 8, 9, 11, 12, 13]);
        let weights: Vec<u64> = sorted.iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![4, 2, 1, 4, 2, 1, 4, 2, 1, 4, 2]);
    }

    #[test]
    fn test_equal_items_keep_input_order() {
        let mut input = entries(&[3, 3], 2);
        input.extend(entries(&[3, 3], 4));
        input.extend(entries(&[3], 1));

        let sorted = blocky_tandem_merge_sort(input, 4, 2, &NaturalOrder);
        let weights: Vec<u64> = sorted.iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![2, 2, 4, 4, 1]);
    }

    #[test]
    fn test_only_remainder() {
        let input = entries(&[3, 1, 2], 1);
        let sorted = blocky_tandem_merge_sort(input, 0, 4, &NaturalOrder);
        let items: Vec<i64> = sorted.iter().map(|e| e.item).collect();
        assert_eq!(items, vec![1, 2, 3]);
        assert!(blocky_tandem_merge_sort(Vec::<Weighted<i64>>::new(), 0, 4, &NaturalOrder).is_empty());
    }

    #[test]
    fn test_matches_stable_sort() {
        let mut rng = XorShift64::seeded(0x5eed);
        for num_blocks in 0..9usize {
            let block_size = 8usize;
            let mut input = Vec::new();
            for block in 0..num_blocks {
                let mut items: Vec<i64> = (0..block_size)
                    .map(|_| rng.next_below(20) as i64)
                    .collect();
                items.sort();
                input.extend(entries(&items, 2u64 << block));
            }
            let remainder_len = rng.next_below(2 * block_size as u64) as usize;
            for _ in 0..remainder_len {
                input.push(Weighted {
                    item: rng.next_below(20) as i64,
                    weight: 1,
                });
            }

            let mut expected = input.clone();
            expected.sort_by(|a, b| a.item.cmp(&b.item));
            let actual = blocky_tandem_merge_sort(input, num_blocks * block_size, block_size, &NaturalOrder);
            assert_eq!(actual, expected, "num_blocks={num_blocks}");
        }
    }
}
