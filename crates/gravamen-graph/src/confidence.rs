//! Bounded confidence weights.

use serde::{Deserialize, Serialize};

/// Confidence assigned to an entity, relationship, or requirement match
/// (0.0 to 1.0).
///
/// Upstream extraction heuristics may overshoot; out-of-range values are
/// clamped here rather than rejected, so no call site can smuggle an
/// unbounded weight into a graph.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f32);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);
    pub const FULL: Confidence = Confidence(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Combine independent weights (multiplicative).
    pub fn combine(self, other: Confidence) -> Confidence {
        Confidence::new(self.0 * other.0)
    }

    /// Keep the stronger of two weights.
    pub fn stronger(self, other: Confidence) -> Confidence {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    pub fn at_least(self, floor: f32) -> bool {
        self.0 >= floor
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self(0.5) // Neutral weight
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Confidence::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamps_out_of_range() {
        assert_relative_eq!(Confidence::new(1.5).value(), 1.0);
        assert_relative_eq!(Confidence::new(-0.5).value(), 0.0);
        assert_relative_eq!(Confidence::new(0.75).value(), 0.75);
    }

    #[test]
    fn nan_becomes_zero() {
        assert_relative_eq!(Confidence::new(f32::NAN).value(), 0.0);
    }

    #[test]
    fn combine_is_multiplicative() {
        let c = Confidence::new(0.8).combine(Confidence::new(0.5));
        assert_relative_eq!(c.value(), 0.4);
    }

    #[test]
    fn stronger_keeps_max() {
        let a = Confidence::new(0.3);
        let b = Confidence::new(0.9);
        assert_relative_eq!(a.stronger(b).value(), 0.9);
        assert_relative_eq!(b.stronger(a).value(), 0.9);
    }
}
