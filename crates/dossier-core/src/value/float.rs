//! Module: value::float
//! Responsibility: a float wrapper with a total order, so `Value` can
//! derive `Eq`/`Ord`-adjacent behavior without silently mishandling `NaN`.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// Float
///
/// Wraps `f64` and orders by IEEE 754 total order (`f64::total_cmp`).
/// `NaN` sorts after all other values and compares equal only to itself,
/// matching the totally-ordered key contract the index manager requires.
///

#[derive(Clone, Copy, Debug, Display, Serialize, Deserialize)]
pub struct Float(f64);

impl Float {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// A signed, order-preserving `i128` projection used by descending
    /// numeric sort keys.
    #[must_use]
    pub fn to_order_key(self) -> i128 {
        let bits = self.0.to_bits();
        let signed = if bits & (1 << 63) != 0 {
            !bits
        } else {
            bits | (1 << 63)
        };
        i128::from(signed as i64)
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Float {}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_sorts_after_infinity() {
        let nan = Float::new(f64::NAN);
        let inf = Float::new(f64::INFINITY);
        assert!(nan > inf);
    }

    #[test]
    fn ordering_matches_numeric_order_for_finite_values() {
        assert!(Float::new(1.0) < Float::new(2.0));
        assert!(Float::new(-1.0) < Float::new(0.0));
    }
}
