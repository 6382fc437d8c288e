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

//! Weighted bucket counts over caller-supplied split points.
//!
//! `m` split points define `m + 1` half-open buckets: bucket `0` holds items
//! below the first split point, bucket `j` holds items in
//! `[split_points[j - 1], split_points[j])`, and the last bucket holds
//! everything at or above the last split point.
//!
//! The snapshot is read directly instead of through the flattened view. Level
//! blocks are already sorted, so each is counted with a linear merge-style
//! walk. The base buffer is unsorted: with few split points it is cheaper to
//! scan the split points for every sample than to sort it first.

use super::LINEAR_HISTOGRAM_THRESHOLD;
use super::accessor::QuantilesAccessor;
use super::accessor::check_snapshot;
use super::accessor::level_weight;
use super::comparator::Comparator;
use crate::error::Error;

/// How the unsorted base buffer is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseBufferStrategy {
    /// Scan the split points for each sample: `O(samples * split_points)`.
    Bilinear,
    /// Sort the samples, then walk both sequences: `O(samples + split_points)`
    /// after the sort.
    Linear,
}

impl BaseBufferStrategy {
    fn for_split_points(num_split_points: usize) -> Self {
        if num_split_points < LINEAR_HISTOGRAM_THRESHOLD {
            BaseBufferStrategy::Bilinear
        } else {
            BaseBufferStrategy::Linear
        }
    }
}

/// Checks that split points are strictly increasing under `cmp`.
pub(crate) fn check_split_points<T, C>(split_points: &[T], cmp: &C) -> Result<(), Error>
where
    C: Comparator<T> + ?Sized,
{
    for (i, pair) in split_points.windows(2).enumerate() {
        if !cmp.less(&pair[0], &pair[1]) {
            return Err(Error::invalid_argument(
                "split points must be unique and monotonically increasing",
            )
            .with_context("index", i + 1));
        }
    }
    Ok(())
}

/// Returns the unnormalized weighted count of each of the `m + 1` buckets.
///
/// The counts always sum to `n`.
pub(crate) fn build_histogram<T, S>(sketch: &S, split_points: &[T]) -> Result<Vec<u64>, Error>
where
    S: QuantilesAccessor<T> + ?Sized,
{
    let strategy = BaseBufferStrategy::for_split_points(split_points.len());
    build_histogram_with(sketch, split_points, strategy)
}

pub(crate) fn build_histogram_with<T, S>(
    sketch: &S,
    split_points: &[T],
    strategy: BaseBufferStrategy,
) -> Result<Vec<u64>, Error>
where
    S: QuantilesAccessor<T> + ?Sized,
{
    let cmp = sketch.comparator();
    check_split_points(split_points, cmp)?;
    check_snapshot(sketch)?;
    log::trace!(
        "histogram over {} split points, base buffer strategy {strategy:?}",
        split_points.len()
    );

    let buffer = sketch.combined_buffer();
    let mut counters = vec![0u64; split_points.len() + 1];

    let base_buffer = buffer.base_buffer();
    match strategy {
        BaseBufferStrategy::Bilinear => {
            bilinear_increment(base_buffer.iter(), 1, split_points, &mut counters, cmp);
        }
        BaseBufferStrategy::Linear => {
            // Sort references: the snapshot itself stays untouched.
            let mut sorted: Vec<&T> = base_buffer.iter().collect();
            sorted.sort_by(|a, b| cmp.compare(*a, *b));
            linear_increment(sorted.into_iter(), 1, split_points, &mut counters, cmp);
        }
    }

    for (level, items) in buffer.occupied_levels() {
        linear_increment(
            items.iter(),
            level_weight(level),
            split_points,
            &mut counters,
            cmp,
        );
    }

    let total: u64 = counters.iter().sum();
    if total != sketch.n() {
        return Err(Error::inconsistent_state(format!(
            "histogram total {total} does not match n = {}",
            sketch.n()
        )));
    }
    Ok(counters)
}

/// Normalizes bucket counts by `n`, as per-bucket shares or running shares.
pub(crate) fn normalize(counters: &[u64], n: u64, cumulative: bool) -> Vec<f64> {
    let n = n as f64;
    let mut subtotal = 0u64;
    counters
        .iter()
        .map(|&count| {
            subtotal += count;
            if cumulative {
                subtotal as f64 / n
            } else {
                count as f64 / n
            }
        })
        .collect()
}

/// Adds `weight` to the bucket of every sample. Samples need not be sorted.
fn bilinear_increment<'a, T, C, I>(
    samples: I,
    weight: u64,
    split_points: &[T],
    counters: &mut [u64],
    cmp: &C,
) where
    T: 'a,
    C: Comparator<T> + ?Sized,
    I: Iterator<Item = &'a T>,
{
    debug_assert_eq!(split_points.len() + 1, counters.len());
    for sample in samples {
        let bucket = split_points
            .iter()
            .position(|split| cmp.less(sample, split))
            .unwrap_or(split_points.len());
        counters[bucket] += weight;
    }
}

/// Adds `weight` to the bucket of every sample by walking samples and split
/// points together. Samples must be sorted.
fn linear_increment<'a, T, C, I>(
    samples: I,
    weight: u64,
    split_points: &[T],
    counters: &mut [u64],
    cmp: &C,
) where
    T: 'a,
    C: Comparator<T> + ?Sized,
    I: ExactSizeIterator<Item = &'a T>,
{
    debug_assert_eq!(split_points.len() + 1, counters.len());
    let mut samples = samples.peekable();
    let mut j = 0;
    while j < split_points.len() {
        let Some(sample) = samples.peek() else {
            return;
        };
        if cmp.less(*sample, &split_points[j]) {
            counters[j] += weight;
            samples.next();
        } else {
            j += 1;
        }
    }
    // Everything left is at or above the last split point.
    counters[j] += weight * samples.len() as u64;
}
