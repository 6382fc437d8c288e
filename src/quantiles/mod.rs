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

//! Classic quantiles sketch for estimating quantiles, ranks, PMF and CDF.
//!
//! The sketch keeps a small unsorted base buffer plus a stack of levels. Level
//! `i` is either empty or holds `k` sorted items, each standing for `2^(i + 1)`
//! stream items, and the set of occupied levels always spells out `n / 2k` in
//! binary. When the base buffer fills up it is sorted, halved, and carried into
//! the levels the way an increment ripples through a binary counter.
//!
//! Queries read the sketch through [`QuantilesAccessor`]. Quantile queries
//! flatten the retained items into an [`Auxiliary`] view; PMF and CDF queries
//! count directly over the levels and the base buffer.
//!
//! The normalized rank error is bounded by [`epsilon_for_k`].
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_quantiles::quantiles::ItemsSketch;
//! let mut sketch = ItemsSketch::<i64>::new(128);
//! for i in 1..=1000 {
//!     sketch.update(i);
//! }
//! let median = sketch.quantile(0.5).unwrap().unwrap();
//! assert!((450..=550).contains(&median));
//! let cdf = sketch.cdf(&[250, 500, 750]).unwrap().unwrap();
//! assert_eq!(cdf.len(), 4);
//! assert_eq!(cdf[3], 1.0);
//! ```

mod accessor;
mod auxiliary;
mod comparator;
mod epsilon;
mod histogram;
mod serde;
mod serialization;
mod sketch;
mod sort;
mod util;

pub use self::accessor::CombinedBuffer;
pub use self::accessor::QuantilesAccessor;
pub use self::auxiliary::Auxiliary;
pub use self::auxiliary::position_for_rank;
pub use self::comparator::Comparator;
pub use self::comparator::FloatOrder;
pub use self::comparator::NaturalOrder;
pub use self::epsilon::epsilon_for_k;
pub use self::sketch::ItemsSketch;
pub use self::util::base_buffer_count;
pub use self::util::level_occupancy;
pub use self::util::required_buffer_capacity;
pub use self::util::retained_item_count;
pub use self::util::total_levels_needed;
pub use self::util::valid_level_count;

/// Default value of parameter k.
pub const DEFAULT_K: u16 = 128;
/// Minimum value of parameter k.
pub const MIN_K: u16 = 2;
/// Maximum value of parameter k.
pub const MAX_K: u16 = 1 << 15;

/// Split-point count at or above which PMF and CDF queries sort the base
/// buffer instead of scanning the split points for every item.
pub const LINEAR_HISTOGRAM_THRESHOLD: usize = 50;
