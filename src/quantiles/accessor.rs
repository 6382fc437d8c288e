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

use super::comparator::Comparator;
use super::util;
use crate::error::Error;

/// Read-only view of a quantiles sketch, as consumed by the query engines.
///
/// Query engines take `&impl QuantilesAccessor`, so the borrow keeps the
/// underlying sketch frozen for as long as a query is being built: level
/// contents and the occupancy pattern cannot change between reads.
pub trait QuantilesAccessor<T> {
    /// The ordering the sketch was built with.
    type Cmp: Comparator<T>;

    /// Configured level size, a power of two greater than one.
    fn k(&self) -> u16;

    /// Total number of items ever incorporated.
    fn n(&self) -> u64;

    /// Bit `i` set means level `i` holds exactly `k` sorted items.
    fn level_occupancy(&self) -> u64;

    /// The base buffer and level blocks.
    fn combined_buffer(&self) -> CombinedBuffer<'_, T>;

    /// The comparator the sketch was built with.
    fn comparator(&self) -> &Self::Cmp;

    /// Number of valid entries in the base buffer.
    fn base_buffer_count(&self) -> usize {
        self.combined_buffer().base_buffer().len()
    }

    /// Number of retained items across the base buffer and all levels.
    fn retained_item_count(&self) -> usize {
        util::retained_item_count(self.k(), self.n())
    }
}

/// Borrowed layout of a sketch's retained items.
///
/// The base buffer holds unsorted, weight-one items. Level `i` is either empty
/// or holds `k` items sorted by the sketch comparator, each of weight
/// `2^(i + 1)`.
#[derive(Debug)]
pub struct CombinedBuffer<'a, T> {
    base_buffer: &'a [T],
    levels: &'a [Vec<T>],
}

impl<T> Clone for CombinedBuffer<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CombinedBuffer<'_, T> {}

impl<'a, T> CombinedBuffer<'a, T> {
    /// Creates a view over a base buffer and a per-level list of blocks.
    pub fn new(base_buffer: &'a [T], levels: &'a [Vec<T>]) -> Self {
        Self {
            base_buffer,
            levels,
        }
    }

    /// The unsorted staging area.
    pub fn base_buffer(&self) -> &'a [T] {
        self.base_buffer
    }

    /// Returns the items of level `level`, or `None` if it is not occupied.
    pub fn level(&self, level: usize) -> Option<&'a [T]> {
        self.levels
            .get(level)
            .filter(|items| !items.is_empty())
            .map(|items| items.as_slice())
    }

    /// Number of level slots, occupied or not.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Iterates over `(level, items)` for every occupied level, lowest first.
    pub fn occupied_levels(&self) -> impl Iterator<Item = (usize, &'a [T])> + 'a {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .map(|(level, items)| (level, items.as_slice()))
    }
}

/// Weight carried by each item of `level`.
pub(crate) fn level_weight(level: usize) -> u64 {
    1u64 << (level + 1)
}

/// Verifies that a snapshot's layout agrees with its `k` and `n`.
pub(crate) fn check_snapshot<T, S>(sketch: &S) -> Result<(), Error>
where
    S: QuantilesAccessor<T> + ?Sized,
{
    let k = sketch.k();
    util::check_k(k)?;
    let n = sketch.n();
    let occupancy = sketch.level_occupancy();
    let expected_occupancy = util::level_occupancy(k, n);
    if occupancy != expected_occupancy {
        return Err(Error::inconsistent_state(format!(
            "level occupancy {occupancy:#b} does not match n / 2k = {expected_occupancy:#b}"
        ))
        .with_context("k", k)
        .with_context("n", n));
    }

    let buffer = sketch.combined_buffer();
    let bb_count = buffer.base_buffer().len();
    if bb_count != util::base_buffer_count(k, n) || bb_count != sketch.base_buffer_count() {
        return Err(Error::inconsistent_state(format!(
            "base buffer holds {bb_count} items, expected n mod 2k = {}",
            util::base_buffer_count(k, n)
        ))
        .with_context("k", k)
        .with_context("n", n));
    }

    for level in 0..buffer.num_levels().max(util::total_levels_needed(occupancy)) {
        let expected = if util::is_level_occupied(occupancy, level) {
            k as usize
        } else {
            0
        };
        let actual = buffer.level(level).map_or(0, |items| items.len());
        if actual != expected {
            return Err(Error::inconsistent_state(format!(
                "level {level} holds {actual} items, expected {expected}"
            ))
            .with_context("k", k)
            .with_context("n", n));
        }
    }
    Ok(())
}
