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

use datasketches_quantiles::common::RandomSource;
use datasketches_quantiles::common::XorShift64;
use datasketches_quantiles::error::ErrorKind;
use datasketches_quantiles::quantiles::Auxiliary;
use datasketches_quantiles::quantiles::CombinedBuffer;
use datasketches_quantiles::quantiles::ItemsSketch;
use datasketches_quantiles::quantiles::NaturalOrder;
use datasketches_quantiles::quantiles::QuantilesAccessor;
use datasketches_quantiles::quantiles::position_for_rank;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;

fn seeded_sketch(k: u16, seed: u64) -> ItemsSketch<i64> {
    ItemsSketch::with_comparator_and_rng(k, NaturalOrder, XorShift64::seeded(seed))
}

/// A layout assembled by hand rather than by compaction.
struct HandBuilt {
    k: u16,
    n: u64,
    occupancy: u64,
    base_buffer: Vec<u32>,
    levels: Vec<Vec<u32>>,
}

impl QuantilesAccessor<u32> for HandBuilt {
    type Cmp = NaturalOrder;

    fn k(&self) -> u16 {
        self.k
    }

    fn n(&self) -> u64 {
        self.n
    }

    fn level_occupancy(&self) -> u64 {
        self.occupancy
    }

    fn combined_buffer(&self) -> CombinedBuffer<'_, u32> {
        CombinedBuffer::new(&self.base_buffer, &self.levels)
    }

    fn comparator(&self) -> &NaturalOrder {
        &NaturalOrder
    }
}

#[test]
fn test_one_level_plus_base_buffer() {
    let mut sketch = seeded_sketch(4, 1);
    for i in 1..=12 {
        sketch.update(i);
    }
    assert_eq!(sketch.level_occupancy(), 1);
    assert_eq!(sketch.base_buffer_count(), 4);

    let aux = sketch.auxiliary().unwrap();
    assert_eq!(aux.n(), 12);
    assert_eq!(aux.items().len(), 8);
    assert_eq!(aux.cumulative_weights(), &[0, 2, 4, 6, 8, 9, 10, 11, 12]);
    assert_eq!(&aux.items()[4..], &[9, 10, 11, 12]);

    // floor(0.5 * 12) = 6 lands on the fourth level item.
    let median = aux.quantile(0.5).unwrap();
    assert_eq!(median, Some(&aux.items()[3]));
    assert!(matches!(median, Some(&7) | Some(&8)));
}

#[test]
fn test_boundaries_are_min_and_max_retained() {
    let mut rng = XorShift64::seeded(2);
    let mut sketch = seeded_sketch(16, 3);
    for _ in 0..3000 {
        sketch.update(rng.next_below(1 << 20) as i64);
    }
    let aux = sketch.auxiliary().unwrap();
    let retained_min = aux.items().iter().min().copied();
    let retained_max = aux.items().iter().max().copied();
    assert_eq!(aux.quantile(0.0).unwrap().copied(), retained_min);
    assert_eq!(aux.quantile(1.0).unwrap().copied(), retained_max);
}

#[test]
fn test_weights_are_consistent() {
    let mut rng = XorShift64::seeded(4);
    for k in [2u16, 4, 16, 128] {
        let mut sketch = seeded_sketch(k, 5);
        let n = rng.next_below(10000) + 1;
        for _ in 0..n {
            sketch.update(rng.next_below(500) as i64);
        }
        let aux = Auxiliary::new(&sketch).unwrap();
        let cum = aux.cumulative_weights();
        assert_eq!(cum.len(), sketch.num_retained() + 1);
        assert_eq!(cum[0], 0);
        assert_eq!(cum[cum.len() - 1], n);
        assert!(cum.windows(2).all(|w| w[0] < w[1]), "k={k}");
        assert!(aux.items().windows(2).all(|w| w[0] <= w[1]), "k={k}");
    }
}

#[test]
fn test_agrees_with_histogram() {
    let mut rng = XorShift64::seeded(6);
    let mut sketch = seeded_sketch(32, 7);
    let mut items: Vec<i64> = (0..20000).collect();
    for i in (1..items.len()).rev() {
        items.swap(i, rng.next_below(i as u64 + 1) as usize);
    }
    for item in items {
        sketch.update(item);
    }

    // With distinct items, the weight below each retained item is both its
    // cumulative weight and the first bucket of a one-point histogram.
    let aux = sketch.auxiliary().unwrap();
    for (i, item) in aux.items().iter().enumerate().step_by(7) {
        let counts = sketch.histogram(std::slice::from_ref(item)).unwrap();
        assert_eq!(counts[0], aux.cumulative_weights()[i], "item {item}");
    }
}

#[test]
fn test_many_queries_against_one_snapshot() {
    let mut sketch = seeded_sketch(8, 8);
    for i in 0..1000 {
        sketch.update(i);
    }
    let aux = sketch.auxiliary().unwrap();
    let mut previous = i64::MIN;
    for step in 0..=100 {
        let item = *aux.quantile(step as f64 / 100.0).unwrap().unwrap();
        assert!(item >= previous);
        previous = item;
    }
}

#[test]
fn test_position_for_rank_is_monotone() {
    for n in [1u64, 2, 7, 1000, 1 << 40] {
        let mut previous = 0;
        for step in 0..=1000 {
            let pos = position_for_rank(step as f64 / 1000.0, n);
            assert!(pos >= previous);
            assert!(pos < n);
            previous = pos;
        }
        assert_eq!(position_for_rank(1.0, n), n - 1);
    }
}

#[test]
fn test_hand_built_layout() {
    // k = 2: 2k = 4, n = 4 * 0b10 + 3 leaves level 1 full and three items staged.
    let layout = HandBuilt {
        k: 2,
        n: 11,
        occupancy: 0b10,
        base_buffer: vec![30, 10, 20],
        levels: vec![vec![], vec![15, 25]],
    };
    let aux = Auxiliary::new(&layout).unwrap();
    assert_eq!(aux.items(), &[10, 15, 20, 25, 30]);
    assert_eq!(aux.cumulative_weights(), &[0, 1, 5, 6, 10, 11]);
    assert_eq!(aux.quantile(0.5).unwrap(), Some(&20));
}

#[test]
fn test_inconsistent_layout_is_rejected() {
    let layout = HandBuilt {
        k: 2,
        n: 11,
        occupancy: 0b01,
        base_buffer: vec![30, 10, 20],
        levels: vec![vec![5, 6], vec![15, 25]],
    };
    let err = Auxiliary::new(&layout).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InconsistentState));
    assert_that!(err.message(), contains_substring("level occupancy"));
}
