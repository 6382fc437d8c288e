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

//! Level arithmetic.
//!
//! The level structure of a quantiles sketch is a binary counter over blocks of
//! `2k` items: after `n` updates, level `i` is occupied iff bit `i` of
//! `n / 2k` is set, and the base buffer holds the `n mod 2k` most recent
//! items. Everything here is a pure function of `(k, n)` or of the occupancy
//! bit pattern.

use super::MAX_K;
use super::MIN_K;
use crate::error::Error;

/// Validates that `k` is a power of two in `[MIN_K, MAX_K]`.
pub(crate) fn check_k(k: u16) -> Result<(), Error> {
    if !(MIN_K..=MAX_K).contains(&k) || !k.is_power_of_two() {
        return Err(Error::invalid_argument(format!(
            "k must be a power of two in [{MIN_K}, {MAX_K}], got {k}"
        )));
    }
    Ok(())
}

/// Number of items currently held in the base buffer.
pub fn base_buffer_count(k: u16, n: u64) -> usize {
    (n % (2 * k as u64)) as usize
}

/// The level occupancy bit pattern: bit `i` set means level `i` holds `k` items.
pub fn level_occupancy(k: u16, n: u64) -> u64 {
    n / (2 * k as u64)
}

/// Number of occupied levels in the given bit pattern.
pub fn valid_level_count(pattern: u64) -> u32 {
    pattern.count_ones()
}

/// Number of levels spanned by the given bit pattern, empty ones included.
pub fn total_levels_needed(pattern: u64) -> usize {
    (u64::BITS - pattern.leading_zeros()) as usize
}

/// Number of retained items for a sketch with the given `k` that has seen `n` items.
pub fn retained_item_count(k: u16, n: u64) -> usize {
    let levels = valid_level_count(level_occupancy(k, n)) as usize;
    base_buffer_count(k, n) + levels * k as usize
}

/// Item capacity of an updatable combined buffer (base buffer plus level slots).
///
/// While no level exists this is the base buffer's nominal size `2k`, or the
/// next power of two covering the base buffer if that is larger.
pub fn required_buffer_capacity(k: u16, n: u64) -> usize {
    let k = k as usize;
    let total_levels = total_levels_needed(level_occupancy(k as u16, n));
    if total_levels == 0 {
        let bb_count = base_buffer_count(k as u16, n);
        return (2 * k).max(ceiling_power_of_two(bb_count));
    }
    (2 + total_levels) * k
}

/// Smallest power of two that is `>= n`; `1` for `n == 0`.
pub(crate) fn ceiling_power_of_two(n: usize) -> usize {
    n.next_power_of_two()
}

/// Returns whether level `level` is occupied in the given bit pattern.
pub(crate) fn is_level_occupied(pattern: u64, level: usize) -> bool {
    level < u64::BITS as usize && (pattern >> level) & 1 == 1
}

/// Zero-based position of the lowest zero bit of `bits` at or above `start`.
///
/// This is the level a carry entering at `start` finally settles in.
pub(crate) fn lowest_zero_bit_starting_at(bits: u64, start: u32) -> u32 {
    let start = start & 0x3F;
    start + (bits >> start).trailing_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_k() {
        assert!(check_k(2).is_ok());
        assert!(check_k(128).is_ok());
        assert!(check_k(MAX_K).is_ok());
        assert!(check_k(0).is_err());
        assert!(check_k(1).is_err());
        assert!(check_k(3).is_err());
        assert!(check_k(100).is_err());
    }

    #[test]
    fn test_binary_counter_layout() {
        let k = 4;
        // 12 items: one block of 8 folded into level 0, 4 waiting in the base buffer.
        assert_eq!(base_buffer_count(k, 12), 4);
        assert_eq!(level_occupancy(k, 12), 0b1);
        assert_eq!(retained_item_count(k, 12), 8);

        // 5 blocks of 8 plus 7 items: levels 0 and 2.
        let n = 5 * 8 + 7;
        assert_eq!(level_occupancy(k, n), 0b101);
        assert_eq!(valid_level_count(level_occupancy(k, n)), 2);
        assert_eq!(total_levels_needed(level_occupancy(k, n)), 3);
        assert_eq!(retained_item_count(k, n), 7 + 2 * 4);
    }

    #[test]
    fn test_total_levels_needed() {
        assert_eq!(total_levels_needed(0), 0);
        assert_eq!(total_levels_needed(1), 1);
        assert_eq!(total_levels_needed(0b100), 3);
        assert_eq!(total_levels_needed(u64::MAX), 64);
    }

    #[test]
    fn test_required_buffer_capacity() {
        assert_eq!(required_buffer_capacity(16, 0), 32);
        assert_eq!(required_buffer_capacity(16, 31), 32);
        assert_eq!(required_buffer_capacity(16, 32), 3 * 16);
        assert_eq!(required_buffer_capacity(16, 4 * 32), 5 * 16);
    }

    #[test]
    fn test_lowest_zero_bit() {
        assert_eq!(lowest_zero_bit_starting_at(0, 0), 0);
        assert_eq!(lowest_zero_bit_starting_at(0b0111, 0), 3);
        assert_eq!(lowest_zero_bit_starting_at(0b1011, 0), 2);
        assert_eq!(lowest_zero_bit_starting_at(0b1011, 2), 2);
        assert_eq!(lowest_zero_bit_starting_at(0b1011, 3), 4);
    }

    #[test]
    fn test_is_level_occupied() {
        assert!(is_level_occupied(0b101, 0));
        assert!(!is_level_occupied(0b101, 1));
        assert!(is_level_occupied(0b101, 2));
        assert!(!is_level_occupied(0b101, 64));
    }
}
