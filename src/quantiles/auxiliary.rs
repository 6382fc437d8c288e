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

//! Flattened, weighted view of a sketch for positional queries.
//!
//! Building the view copies every retained item together with its weight,
//! sorts the lot with the block-aware merge, and turns the weights into an
//! exclusive prefix sum. A positional query is then a binary search over the
//! prefix sums.

use super::accessor::QuantilesAccessor;
use super::accessor::check_snapshot;
use super::accessor::level_weight;
use super::sort::Weighted;
use super::sort::blocky_tandem_merge_sort;
use crate::error::Error;

/// Sorted retained items with cumulative weights, built from one sketch snapshot.
///
/// Build it once with [`Auxiliary::new`] (or
/// [`ItemsSketch::auxiliary`](super::ItemsSketch::auxiliary)) to answer many
/// quantile queries without re-sorting.
#[derive(Debug, Clone)]
pub struct Auxiliary<T> {
    n: u64,
    items: Vec<T>,
    // cum_weights[i] is the total weight of items[..i]; the extra last slot is n.
    cum_weights: Vec<u64>,
}

impl<T: Clone> Auxiliary<T> {
    /// Builds the flattened view of `sketch`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InconsistentState`](crate::error::ErrorKind::InconsistentState)
    /// if the sketch layout disagrees with its `k` and `n`.
    pub fn new<S>(sketch: &S) -> Result<Self, Error>
    where
        S: QuantilesAccessor<T> + ?Sized,
    {
        check_snapshot(sketch)?;

        let n = sketch.n();
        let num_retained = sketch.retained_item_count();
        let buffer = sketch.combined_buffer();

        let mut entries = Vec::with_capacity(num_retained);
        for (level, items) in buffer.occupied_levels() {
            let weight = level_weight(level);
            entries.extend(items.iter().map(|item| Weighted {
                item: item.clone(),
                weight,
            }));
        }
        let sorted_len = entries.len();
        entries.extend(buffer.base_buffer().iter().map(|item| Weighted {
            item: item.clone(),
            weight: 1,
        }));
        if entries.len() != num_retained {
            return Err(Error::inconsistent_state(format!(
                "flattened {} items, expected {num_retained}",
                entries.len()
            )));
        }

        let entries =
            blocky_tandem_merge_sort(entries, sorted_len, sketch.k() as usize, sketch.comparator());

        let mut items = Vec::with_capacity(num_retained);
        let mut cum_weights = Vec::with_capacity(num_retained + 1);
        let mut subtotal = 0u64;
        for entry in entries {
            cum_weights.push(subtotal);
            subtotal += entry.weight;
            items.push(entry.item);
        }
        cum_weights.push(subtotal);

        if subtotal != n {
            return Err(Error::inconsistent_state(format!(
                "total retained weight {subtotal} does not match n = {n}"
            )));
        }

        Ok(Self {
            n,
            items,
            cum_weights,
        })
    }
}

impl<T> Auxiliary<T> {
    /// Returns the stream length the view was built from.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Returns true if the view was built from an empty sketch.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns the retained items in sorted order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Returns the cumulative weights: entry `i` is the weight of all items before
    /// `items()[i]`, and the final entry equals `n`.
    pub fn cumulative_weights(&self) -> &[u64] {
        &self.cum_weights
    }

    /// Returns the item at normalized rank `rank`, or `None` for an empty sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// if `rank` is not in `[0.0, 1.0]`.
    pub fn quantile(&self, rank: f64) -> Result<Option<&T>, Error> {
        check_rank(rank)?;
        if self.is_empty() {
            return Ok(None);
        }
        let pos = position_for_rank(rank, self.n);
        let index = chunk_containing_pos(&self.cum_weights, pos);
        Ok(Some(&self.items[index]))
    }
}

pub(crate) fn check_rank(rank: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&rank) {
        Ok(())
    } else {
        Err(Error::invalid_argument("rank must be in [0.0, 1.0]").with_context("rank", rank))
    }
}

/// Zero-based position of normalized rank `rank` in a sorted stream of `n` items.
///
/// `rank == 1.0` maps to the last position, `n - 1`.
pub fn position_for_rank(rank: f64, n: u64) -> u64 {
    let pos = (rank * n as f64).floor() as u64;
    pos.min(n.saturating_sub(1))
}

/// Finds `i` such that `cum_weights[i] <= pos < cum_weights[i + 1]`.
///
/// `cum_weights` carries one extra trailing slot holding the total weight, and
/// `pos` must be below that total.
pub(crate) fn chunk_containing_pos(cum_weights: &[u64], pos: u64) -> usize {
    debug_assert!(cum_weights.len() > 1);
    let mut l = 0;
    let mut r = cum_weights.len() - 1;
    debug_assert!(cum_weights[l] <= pos && pos < cum_weights[r]);
    // Invariant: cum_weights[l] <= pos < cum_weights[r].
    while l + 1 < r {
        let m = l + (r - l) / 2;
        if cum_weights[m] <= pos {
            l = m;
        } else {
            r = m;
        }
    }
    l
}
