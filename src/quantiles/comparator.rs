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

use std::cmp::Ordering;

/// A total order over sketch items.
///
/// A sketch is built around exactly one comparator instance and routes every
/// ordering decision through it, so two items that compare `Equal` are treated
/// as ties even if they differ otherwise. Implementations must be pure: the
/// same pair must always compare the same way.
///
/// Closures of type `Fn(&T, &T) -> Ordering` are comparators:
///
/// ```
/// # use datasketches_quantiles::quantiles::ItemsSketch;
/// let by_len = |a: &String, b: &String| a.len().cmp(&b.len());
/// let mut sketch = ItemsSketch::with_comparator(16, by_len);
/// sketch.update("abc".to_string());
/// assert_eq!(sketch.n(), 1);
/// ```
pub trait Comparator<T> {
    /// Compares two items.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Returns true if `a` orders strictly before `b`.
    fn less(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Orders items by their [`Ord`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Orders floating point items by IEEE 754 `totalOrder`.
///
/// `-0.0` sorts before `+0.0` and NaNs sort to the ends, so the order is total
/// even for inputs that `partial_cmp` cannot rank.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatOrder;

impl Comparator<f64> for FloatOrder {
    fn compare(&self, a: &f64, b: &f64) -> Ordering {
        a.total_cmp(b)
    }
}

impl Comparator<f32> for FloatOrder {
    fn compare(&self, a: &f32, b: &f32) -> Ordering {
        a.total_cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        assert!(NaturalOrder.less(&1, &2));
        assert!(!NaturalOrder.less(&2, &2));
        assert_eq!(NaturalOrder.compare(&"b", &"a"), Ordering::Greater);
    }

    #[test]
    fn test_float_order_is_total() {
        assert!(FloatOrder.less(&-0.0f64, &0.0));
        assert!(FloatOrder.less(&1.0f64, &f64::NAN));
        assert_eq!(FloatOrder.compare(&2.5f32, &2.5), Ordering::Equal);
    }

    #[test]
    fn test_closure_comparator() {
        let reversed = |a: &i64, b: &i64| b.cmp(a);
        assert!(reversed.less(&3, &1));
    }
}
