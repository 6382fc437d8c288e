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

use super::DEFAULT_K;
use super::MAX_K;
use super::MIN_K;
use super::accessor::CombinedBuffer;
use super::accessor::QuantilesAccessor;
use super::auxiliary::Auxiliary;
use super::auxiliary::check_rank;
use super::comparator::Comparator;
use super::comparator::NaturalOrder;
use super::epsilon::epsilon_for_valid_k;
use super::histogram::build_histogram;
use super::histogram::check_split_points;
use super::histogram::normalize;
use super::serde::QuantilesItem;
use super::serialization::ALLOWED_FLAGS;
use super::serialization::DATA_START;
use super::serialization::EMPTY_SIZE_BYTES;
use super::serialization::FLAG_COMPACT;
use super::serialization::FLAG_EMPTY;
use super::serialization::FLAG_ORDERED;
use super::serialization::SERIAL_VERSION;
use super::util;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::family::Family;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;

/// Classic quantiles sketch over items of type `T`.
///
/// Items are ordered by the comparator `C` given at construction; `R` supplies
/// the random bits that pick which half of a block survives compaction.
///
/// See the [quantiles module level documentation](crate::quantiles) for more.
#[derive(Debug, Clone)]
pub struct ItemsSketch<T, C = NaturalOrder, R = XorShift64> {
    k: u16,
    n: u64,
    base_buffer: Vec<T>,
    // levels[i] is either empty or holds exactly k items sorted by the comparator.
    levels: Vec<Vec<T>>,
    min_item: Option<T>,
    max_item: Option<T>,
    comparator: C,
    rng: R,
}

impl<T: Ord + Clone> Default for ItemsSketch<T> {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl<T: Ord + Clone> ItemsSketch<T> {
    /// Creates a new sketch ordered by `T`'s natural order.
    ///
    /// # Panics
    ///
    /// Panics if k is not a power of two in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::quantiles::ItemsSketch;
    /// let sketch = ItemsSketch::<i64>::new(128);
    /// assert_eq!(sketch.k(), 128);
    /// ```
    pub fn new(k: u16) -> Self {
        Self::try_new(k).unwrap_or_else(|err| panic!("{}", err.message()))
    }

    /// Creates a new sketch ordered by `T`'s natural order.
    ///
    /// # Errors
    ///
    /// Returns an error if k is not a power of two in [MIN_K, MAX_K].
    pub fn try_new(k: u16) -> Result<Self, Error> {
        util::check_k(k)?;
        Ok(Self::make(k, NaturalOrder, XorShift64::default()))
    }
}

impl<T: Clone, C: Comparator<T>> ItemsSketch<T, C> {
    /// Creates a new sketch ordered by `comparator`.
    ///
    /// # Panics
    ///
    /// Panics if k is not a power of two in [MIN_K, MAX_K].
    pub fn with_comparator(k: u16, comparator: C) -> Self {
        Self::with_comparator_and_rng(k, comparator, XorShift64::default())
    }
}

impl<T: Clone, C: Comparator<T>, R: RandomSource> ItemsSketch<T, C, R> {
    /// Creates a new sketch ordered by `comparator` that draws compaction
    /// offsets from `rng`.
    ///
    /// # Panics
    ///
    /// Panics if k is not a power of two in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::common::XorShift64;
    /// # use datasketches_quantiles::quantiles::FloatOrder;
    /// # use datasketches_quantiles::quantiles::ItemsSketch;
    /// let mut sketch = ItemsSketch::with_comparator_and_rng(32, FloatOrder, XorShift64::seeded(7));
    /// for i in 0..1000 {
    ///     sketch.update(i as f64);
    /// }
    /// assert!(sketch.is_estimation_mode());
    /// ```
    pub fn with_comparator_and_rng(k: u16, comparator: C, rng: R) -> Self {
        assert!(
            (MIN_K..=MAX_K).contains(&k) && k.is_power_of_two(),
            "k must be a power of two in [{MIN_K}, {MAX_K}], got {k}"
        );
        Self::make(k, comparator, rng)
    }

    fn make(k: u16, comparator: C, rng: R) -> Self {
        Self {
            k,
            n: 0,
            base_buffer: Vec::with_capacity(2 * k as usize),
            levels: Vec::new(),
            min_item: None,
            max_item: None,
            comparator,
            rng,
        }
    }

    /// Updates the sketch with a new item.
    pub fn update(&mut self, item: T) {
        self.update_min_max(&item);
        self.base_buffer.push(item);
        self.n += 1;
        if self.base_buffer.len() == 2 * self.k as usize {
            self.flush_base_buffer();
        }
    }

    /// Merges another sketch into this one.
    ///
    /// Both sketches must order items the same way. If `other` was built with a
    /// larger k, its levels are downsampled on the way in; if it was built with
    /// a smaller k, this sketch is first reduced to that k.
    ///
    /// # Errors
    ///
    /// Returns an error if the two values of k are not related by a power of two.
    pub fn merge<R2>(&mut self, other: &ItemsSketch<T, C, R2>) -> Result<(), Error> {
        if other.is_empty() {
            return Ok(());
        }
        let (large_k, small_k) = (self.k.max(other.k), self.k.min(other.k));
        if large_k % small_k != 0 || !(large_k / small_k).is_power_of_two() {
            return Err(Error::invalid_argument(format!(
                "cannot merge sketches with k = {} and k = {}",
                self.k, other.k
            )));
        }

        if other.k < self.k {
            self.downsample_to(other.k);
        }
        self.absorb(other.k, other.n, &other.base_buffer, &other.levels);
        self.update_min_max_from(other.min_item.as_ref(), other.max_item.as_ref());

        debug_assert_eq!(self.occupancy_bits(), util::level_occupancy(self.k, self.n));
        Ok(())
    }

    /// Returns the quantile for the given normalized rank.
    ///
    /// Rank `0.0` returns the minimum and rank `1.0` the maximum item ever seen.
    ///
    /// # Errors
    ///
    /// Returns an error if rank is not in [0.0, 1.0].
    pub fn quantile(&self, rank: f64) -> Result<Option<T>, Error> {
        check_rank(rank)?;
        if self.is_empty() {
            return Ok(None);
        }
        if rank == 0.0 {
            return Ok(self.min_item.clone());
        }
        if rank == 1.0 {
            return Ok(self.max_item.clone());
        }
        let aux = Auxiliary::new(self)?;
        Ok(aux.quantile(rank)?.cloned())
    }

    /// Returns the quantiles for several normalized ranks at once, sorting the
    /// retained items only once.
    ///
    /// # Errors
    ///
    /// Returns an error if the ranks are not unique, increasing and in [0.0, 1.0].
    pub fn quantiles(&self, ranks: &[f64]) -> Result<Option<Vec<T>>, Error> {
        check_ranks(ranks)?;
        if self.is_empty() {
            return Ok(None);
        }
        let aux = Auxiliary::new(self)?;
        let mut quantiles = Vec::with_capacity(ranks.len());
        for &rank in ranks {
            let item = if rank == 0.0 {
                self.min_item.clone()
            } else if rank == 1.0 {
                self.max_item.clone()
            } else {
                aux.quantile(rank)?.cloned()
            };
            quantiles.extend(item);
        }
        Ok(Some(quantiles))
    }

    /// Returns `num` quantiles at evenly spaced ranks from `0.0` to `1.0`
    /// inclusive: the minimum, the maximum, and `num - 2` items in between.
    ///
    /// # Errors
    ///
    /// Returns an error if num is less than two.
    pub fn evenly_spaced_quantiles(&self, num: usize) -> Result<Option<Vec<T>>, Error> {
        if num < 2 {
            return Err(Error::invalid_argument(format!(
                "number of evenly spaced quantiles must be at least 2, got {num}"
            )));
        }
        let ranks: Vec<f64> = (0..num).map(|i| i as f64 / (num - 1) as f64).collect();
        self.quantiles(&ranks)
    }

    /// Returns the approximate normalized rank of `item`: the share of the
    /// stream strictly below it.
    pub fn rank(&self, item: &T) -> Result<Option<f64>, Error> {
        let cdf = self.cdf(std::slice::from_ref(item))?;
        Ok(cdf.map(|cdf| cdf[0]))
    }

    /// Returns the weighted item count of each bucket defined by `split_points`.
    ///
    /// The result has `split_points.len() + 1` entries summing to `n`.
    ///
    /// # Errors
    ///
    /// Returns an error if the split points are not unique and increasing.
    pub fn histogram(&self, split_points: &[T]) -> Result<Vec<u64>, Error> {
        build_histogram(self, split_points)
    }

    /// Returns the approximate PMF for the given split points.
    ///
    /// # Errors
    ///
    /// Returns an error if the split points are not unique and increasing.
    pub fn pmf(&self, split_points: &[T]) -> Result<Option<Vec<f64>>, Error> {
        self.normalized_histogram(split_points, false)
    }

    /// Returns the approximate CDF for the given split points.
    ///
    /// The last entry is always `1.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the split points are not unique and increasing.
    pub fn cdf(&self, split_points: &[T]) -> Result<Option<Vec<f64>>, Error> {
        self.normalized_histogram(split_points, true)
    }

    /// Builds the sorted, weighted view of the retained items, for answering
    /// many quantile queries against one state of the sketch.
    pub fn auxiliary(&self) -> Result<Auxiliary<T>, Error> {
        Auxiliary::new(self)
    }

    fn normalized_histogram(
        &self,
        split_points: &[T],
        cumulative: bool,
    ) -> Result<Option<Vec<f64>>, Error> {
        check_split_points(split_points, &self.comparator)?;
        if self.is_empty() {
            return Ok(None);
        }
        let counters = build_histogram(self, split_points)?;
        Ok(Some(normalize(&counters, self.n, cumulative)))
    }

    fn flush_base_buffer(&mut self) {
        debug_assert_eq!(self.base_buffer.len(), 2 * self.k as usize);
        let cmp = &self.comparator;
        self.base_buffer.sort_by(|a, b| cmp.compare(a, b));
        let offset = self.rng.next_bool() as usize;
        let block = downsample(self.base_buffer.drain(..), offset, 2);
        self.propagate_carry(block, 0);
    }

    /// Adds a sorted block of k items at `start_level`, carrying upward like a
    /// binary counter.
    fn propagate_carry(&mut self, mut carry: Vec<T>, start_level: usize) {
        debug_assert_eq!(carry.len(), self.k as usize);
        let end_level =
            util::lowest_zero_bit_starting_at(self.occupancy_bits(), start_level as u32) as usize;
        if end_level >= self.levels.len() {
            self.levels.resize_with(end_level + 1, Vec::new);
            log::debug!(
                "quantiles sketch grew to {} levels (k = {}, n = {})",
                self.levels.len(),
                self.k,
                self.n
            );
        }

        for level in start_level..end_level {
            let resident = std::mem::take(&mut self.levels[level]);
            let merged = merge_sorted(resident, carry, &self.comparator);
            let offset = self.rng.next_bool() as usize;
            carry = downsample(merged.into_iter(), offset, 2);
        }
        debug_assert!(self.levels[end_level].is_empty());
        self.levels[end_level] = carry;
    }

    /// Re-inserts the content of a sketch with `src_k >= self.k`.
    fn absorb(&mut self, src_k: u16, src_n: u64, base_buffer: &[T], levels: &[Vec<T>]) {
        debug_assert!(src_k >= self.k);
        let stride = (src_k / self.k) as usize;
        let shift = stride.trailing_zeros() as usize;
        if stride > 1 {
            log::debug!("downsampling levels from k = {src_k} to k = {}", self.k);
        }

        let final_n = self.n + src_n;
        for item in base_buffer {
            self.update(item.clone());
        }
        for (level, items) in levels.iter().enumerate() {
            if items.is_empty() {
                continue;
            }
            let block = if stride == 1 {
                items.to_vec()
            } else {
                let offset = self.rng.next_below(stride as u64) as usize;
                downsample(items.iter().cloned(), offset, stride)
            };
            self.propagate_carry(block, level + shift);
        }
        self.n = final_n;
    }

    /// Reduces this sketch to a smaller `new_k`, keeping `n`, min and max.
    fn downsample_to(&mut self, new_k: u16) {
        let old_k = self.k;
        let old_n = self.n;
        let base_buffer = std::mem::take(&mut self.base_buffer);
        let levels = std::mem::take(&mut self.levels);
        self.k = new_k;
        self.n = 0;
        self.base_buffer = Vec::with_capacity(2 * new_k as usize);
        self.absorb(old_k, old_n, &base_buffer, &levels);
    }

    fn update_min_max(&mut self, item: &T) {
        self.update_min_max_from(Some(item), Some(item));
    }

    fn update_min_max_from(&mut self, min: Option<&T>, max: Option<&T>) {
        if let Some(min) = min {
            if self
                .min_item
                .as_ref()
                .is_none_or(|current| self.comparator.less(min, current))
            {
                self.min_item = Some(min.clone());
            }
        }
        if let Some(max) = max {
            if self
                .max_item
                .as_ref()
                .is_none_or(|current| self.comparator.less(current, max))
            {
                self.max_item = Some(max.clone());
            }
        }
    }
}

impl<T, C, R> ItemsSketch<T, C, R> {
    /// Returns parameter k used to configure this sketch.
    pub fn k(&self) -> u16 {
        self.k
    }

    /// Returns the number of items the sketch has seen.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Returns true if the sketch has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns true once at least one level has been filled, i.e. once quantiles
    /// are estimates rather than exact.
    pub fn is_estimation_mode(&self) -> bool {
        self.n >= 2 * self.k as u64
    }

    /// Returns the number of retained items.
    pub fn num_retained(&self) -> usize {
        self.base_buffer.len() + self.levels.iter().map(|level| level.len()).sum::<usize>()
    }

    /// Returns the minimum item seen by the sketch.
    pub fn min_item(&self) -> Option<&T> {
        self.min_item.as_ref()
    }

    /// Returns the maximum item seen by the sketch.
    pub fn max_item(&self) -> Option<&T> {
        self.max_item.as_ref()
    }

    /// Returns the number of items waiting in the unsorted base buffer.
    pub fn base_buffer_count(&self) -> usize {
        self.base_buffer.len()
    }

    /// Returns the level occupancy bit pattern: bit `i` is set iff level `i` is full.
    pub fn level_occupancy(&self) -> u64 {
        self.occupancy_bits()
    }

    /// Returns the item capacity an updatable combined buffer needs for the
    /// current state.
    pub fn combined_buffer_capacity(&self) -> usize {
        util::required_buffer_capacity(self.k, self.n)
    }

    /// Returns the guaranteed normalized rank error for this sketch's k.
    pub fn normalized_rank_error(&self) -> f64 {
        epsilon_for_valid_k(self.k as u32)
    }

    /// Discards all retained items, keeping k, the comparator and the random source.
    pub fn reset(&mut self) {
        self.n = 0;
        self.base_buffer.clear();
        self.levels.clear();
        self.min_item = None;
        self.max_item = None;
    }

    fn occupancy_bits(&self) -> u64 {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, items)| !items.is_empty())
            .fold(0, |bits, (level, _)| bits | (1 << level))
    }
}

impl<T, C: Comparator<T>, R> QuantilesAccessor<T> for ItemsSketch<T, C, R> {
    type Cmp = C;

    fn k(&self) -> u16 {
        self.k
    }

    fn n(&self) -> u64 {
        self.n
    }

    fn level_occupancy(&self) -> u64 {
        self.occupancy_bits()
    }

    fn combined_buffer(&self) -> CombinedBuffer<'_, T> {
        CombinedBuffer::new(&self.base_buffer, &self.levels)
    }

    fn comparator(&self) -> &C {
        &self.comparator
    }
}

#[allow(private_bounds)]
impl<T: QuantilesItem + Ord> ItemsSketch<T> {
    /// Deserializes a sketch ordered by `T`'s natural order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::quantiles::ItemsSketch;
    /// let mut sketch = ItemsSketch::<i64>::new(16);
    /// sketch.update(3);
    /// let bytes = sketch.serialize(false);
    /// let restored = ItemsSketch::<i64>::deserialize(&bytes).unwrap();
    /// assert_eq!(restored.n(), 1);
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_comparator(bytes, NaturalOrder)
    }
}

#[allow(private_bounds)]
impl<T: QuantilesItem, C: Comparator<T>> ItemsSketch<T, C> {
    /// Deserializes a sketch that was built with an ordering equivalent to
    /// `comparator`.
    pub fn deserialize_with_comparator(bytes: &[u8], comparator: C) -> Result<Self, Error> {
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
            move |_| Error::insufficient_data(tag)
        }

        let mut cursor = SketchSlice::new(bytes);

        let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let k = cursor.read_u16_le().map_err(make_error("k"))?;
        let _unused = cursor.read_u16_le().map_err(make_error("unused"))?;

        Family::QUANTILES.validate_id(family_id)?;
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        if flags & !ALLOWED_FLAGS != 0 {
            return Err(Error::deserial(format!("invalid flags: {flags:#010b}")));
        }
        if flags & FLAG_COMPACT == 0 {
            return Err(Error::deserial("only compact images can be deserialized"));
        }
        let is_empty = flags & FLAG_EMPTY != 0;
        let expected_preamble_longs = if is_empty {
            Family::QUANTILES.min_pre_longs
        } else {
            Family::QUANTILES.max_pre_longs
        };
        if preamble_longs != expected_preamble_longs {
            return Err(Error::invalid_preamble_longs(
                expected_preamble_longs,
                preamble_longs,
            ));
        }
        if let Err(err) = util::check_k(k) {
            return Err(Error::deserial(err.message()));
        }

        let mut sketch = Self::make(k, comparator, XorShift64::default());
        if is_empty {
            return Ok(sketch);
        }

        let n = cursor.read_u64_le().map_err(make_error("n"))?;
        if n == 0 {
            return Err(Error::deserial("non-empty image must have n > 0"));
        }
        // Every item codec writes at least one byte.
        let num_retained = util::retained_item_count(k, n);
        if num_retained > cursor.remaining() {
            return Err(Error::insufficient_data("items"));
        }

        let min_item = T::deserialize(&mut cursor)?;
        let max_item = T::deserialize(&mut cursor)?;

        let bb_count = util::base_buffer_count(k, n);
        for _ in 0..bb_count {
            sketch.base_buffer.push(T::deserialize(&mut cursor)?);
        }

        let occupancy = util::level_occupancy(k, n);
        let num_levels = util::total_levels_needed(occupancy);
        sketch.levels = Vec::with_capacity(num_levels);
        for level in 0..num_levels {
            let mut items = Vec::new();
            if util::is_level_occupied(occupancy, level) {
                items.reserve(k as usize);
                for _ in 0..k {
                    items.push(T::deserialize(&mut cursor)?);
                }
                if items.windows(2).any(|pair| sketch.comparator.less(&pair[1], &pair[0])) {
                    return Err(Error::deserial(format!("level {level} is not sorted")));
                }
            }
            sketch.levels.push(items);
        }

        sketch.n = n;
        sketch.min_item = Some(min_item);
        sketch.max_item = Some(max_item);
        Ok(sketch)
    }
}

#[allow(private_bounds)]
impl<T: QuantilesItem, C: Comparator<T>, R> ItemsSketch<T, C, R> {
    /// Serializes the sketch to a compact image.
    ///
    /// With `ordered` set, the base buffer is written in sorted order and the
    /// image is flagged accordingly.
    pub fn serialize(&self, ordered: bool) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(self.serialized_size());
        let is_empty = self.is_empty();

        let preamble_longs = if is_empty {
            Family::QUANTILES.min_pre_longs
        } else {
            Family::QUANTILES.max_pre_longs
        };
        let flags = FLAG_COMPACT
            | (if is_empty { FLAG_EMPTY } else { 0 })
            | (if ordered { FLAG_ORDERED } else { 0 });

        bytes.write_u8(preamble_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::QUANTILES.id);
        bytes.write_u8(flags);
        bytes.write_u16_le(self.k);
        bytes.write_u16_le(0);

        if is_empty {
            return bytes.into_bytes();
        }

        bytes.write_u64_le(self.n);
        if let (Some(min_item), Some(max_item)) = (&self.min_item, &self.max_item) {
            T::serialize(min_item, &mut bytes);
            T::serialize(max_item, &mut bytes);
        }

        if ordered {
            let mut sorted: Vec<&T> = self.base_buffer.iter().collect();
            sorted.sort_by(|a, b| self.comparator.compare(*a, *b));
            for item in sorted {
                T::serialize(item, &mut bytes);
            }
        } else {
            for item in &self.base_buffer {
                T::serialize(item, &mut bytes);
            }
        }

        for level in &self.levels {
            for item in level {
                T::serialize(item, &mut bytes);
            }
        }

        bytes.into_bytes()
    }

    fn serialized_size(&self) -> usize {
        if self.is_empty() {
            return EMPTY_SIZE_BYTES;
        }
        let items = self
            .min_item
            .iter()
            .chain(self.max_item.iter())
            .chain(self.base_buffer.iter())
            .chain(self.levels.iter().flatten());
        DATA_START + items.map(T::serialized_size).sum::<usize>()
    }
}

/// Keeps every `stride`-th item starting at `offset`.
fn downsample<T>(items: impl Iterator<Item = T>, offset: usize, stride: usize) -> Vec<T> {
    debug_assert!(offset < stride);
    items.skip(offset).step_by(stride).collect()
}

/// Stable two-way merge: on ties, items from `left` come first.
fn merge_sorted<T, C: Comparator<T>>(left: Vec<T>, right: Vec<T>, cmp: &C) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left_iter = left.into_iter().peekable();
    let mut right_iter = right.into_iter().peekable();
    loop {
        let take_right = match (left_iter.peek(), right_iter.peek()) {
            (Some(l), Some(r)) => cmp.less(r, l),
            _ => break,
        };
        let next = if take_right {
            right_iter.next()
        } else {
            left_iter.next()
        };
        merged.extend(next);
    }
    merged.extend(left_iter);
    merged.extend(right_iter);
    merged
}

fn check_ranks(ranks: &[f64]) -> Result<(), Error> {
    for &rank in ranks {
        check_rank(rank)?;
    }
    if ranks.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(Error::invalid_argument(
            "ranks must be unique and monotonically increasing",
        ));
    }
    Ok(())
}
