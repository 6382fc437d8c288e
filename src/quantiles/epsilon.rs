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

//! Normalized rank error as a function of k.
//!
//! The bound inverts the mergeable-summaries space formula
//! `k * FUDGE_FACTOR = (1 / eps) * sqrt(ln(1 / (eps * DELTA)))` by bracketed
//! bisection. The fudge factor was fitted against empirical error for k in
//! `[16, 1024]`; it is tied to `DELTA` and the two must change together.
//!
//! | k    | empirical | epsilon_for_k |
//! |------|-----------|---------------|
//! | 16   | 0.121094  | 0.121454      |
//! | 32   | 0.063477  | 0.063587      |
//! | 64   | 0.033081  | 0.033169      |
//! | 128  | 0.017120  | 0.017248      |
//! | 256  | 0.008804  | 0.008945      |
//! | 1024 | 0.002303  | 0.002389      |

use crate::error::Error;

const DELTA: f64 = 0.01;
const FUDGE_FACTOR: f64 = 4.0 / 3.0;
const SEARCH_LO: f64 = 1e-16;
const SEARCH_HI: f64 = 1.0 - 1e-16;
const SEARCH_TOLERANCE: f64 = 1e-15;

/// Returns the guaranteed normalized rank error for a sketch configured with `k`.
///
/// The result is strictly decreasing in `k`. Any `k >= 2` is accepted, not just
/// the powers of two a sketch can be built with.
///
/// # Errors
///
/// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
/// if `k < 2`.
///
/// # Examples
///
/// ```
/// # use datasketches_quantiles::quantiles::epsilon_for_k;
/// let eps = epsilon_for_k(128).unwrap();
/// assert!(eps > 0.017 && eps < 0.018);
/// ```
pub fn epsilon_for_k(k: u32) -> Result<f64, Error> {
    if k < 2 {
        return Err(Error::invalid_argument(format!(
            "k must be greater than one, got {k}"
        )));
    }
    Ok(epsilon_for_valid_k(k))
}

/// Same as [`epsilon_for_k`] for a `k` already known to be at least two.
pub(crate) fn epsilon_for_valid_k(k: u32) -> f64 {
    debug_assert!(k >= 2);
    let kf = k as f64 * FUDGE_FACTOR;
    debug_assert!(k_covers_eps(SEARCH_LO, kf), "search must be bracketed below");
    debug_assert!(!k_covers_eps(SEARCH_HI, kf), "search must be bracketed above");
    bracketed_search(kf)
}

fn k_of_eps(eps: f64) -> f64 {
    (1.0 / eps) * (1.0 / (eps * DELTA)).ln().sqrt()
}

fn k_covers_eps(eps: f64, kf: f64) -> bool {
    k_of_eps(eps) >= kf
}

// Invariant: k_covers_eps(lo) && !k_covers_eps(hi).
fn bracketed_search(kf: f64) -> f64 {
    let mut lo = SEARCH_LO;
    let mut hi = SEARCH_HI;
    while (hi - lo) / lo >= SEARCH_TOLERANCE {
        let mid = (lo + hi) / 2.0;
        if mid <= lo || mid >= hi {
            break;
        }
        if k_covers_eps(mid, kf) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn assert_relative_eq(actual: f64, expected: f64) {
        let delta = ((actual - expected) / expected).abs();
        assert!(delta < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_known_values() {
        assert_relative_eq(epsilon_for_k(2).unwrap(), 0.821714930853465);
        assert_relative_eq(epsilon_for_k(16).unwrap(), 0.12145410223356);
        assert_relative_eq(epsilon_for_k(1024).unwrap(), 0.00238930378957284);
        assert_relative_eq(epsilon_for_k(1 << 30).unwrap(), 3.42875166500824e-09);
    }

    #[test]
    fn test_strictly_decreasing() {
        let mut previous = epsilon_for_k(2).unwrap();
        for k in 3..2048 {
            let eps = epsilon_for_k(k).unwrap();
            assert!(eps < previous, "epsilon must decrease: k={k}");
            previous = eps;
        }
    }

    #[test]
    fn test_k_too_small() {
        assert_eq!(
            epsilon_for_k(1).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(epsilon_for_k(0).is_err());
    }
}
