//! Piecewise-linear curves for designer-tuned progressions.

use serde::{Deserialize, Serialize};

/// A curve through `(x, y)` keys, clamped at both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Build a curve from keys in any order. Non-finite keys are dropped.
    pub fn new(keys: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut keys: Vec<(f32, f32)> = keys
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        keys.dedup_by(|a, b| a.0 == b.0);
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self::new([(0.0, value)])
    }

    pub fn linear(from: (f32, f32), to: (f32, f32)) -> Self {
        Self::new([from, to])
    }

    pub fn keys(&self) -> &[(f32, f32)] {
        &self.keys
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        for pair in self.keys.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x <= x1 {
                let t = (x - x0) / (x1 - x0);
                return y0 + (y1 - y0) * t;
            }
        }
        last.1
    }

    /// True when `y` never decreases as `x` grows.
    pub fn is_monotonic(&self) -> bool {
        self.keys.windows(2).all(|pair| pair[1].1 >= pair[0].1)
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_between_keys() {
        let curve = Curve::new([(10.0, 1000.0), (1.0, 100.0)]);
        assert_eq!(curve.evaluate(1.0), 100.0);
        assert!((curve.evaluate(5.5) - 550.0).abs() < 1e-3);
        assert_eq!(curve.evaluate(-4.0), 100.0);
        assert_eq!(curve.evaluate(40.0), 1000.0);
        assert!(curve.is_monotonic());
    }

    #[test]
    fn test_empty_and_constant() {
        assert_eq!(Curve::new([]).evaluate(3.0), 0.0);
        assert_eq!(Curve::constant(2.5).evaluate(99.0), 2.5);
        assert!(!Curve::linear((0.0, 2.0), (1.0, 1.0)).is_monotonic());
    }
}
