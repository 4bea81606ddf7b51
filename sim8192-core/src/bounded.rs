use serde::{Deserialize, Serialize};

/// A float clamped to a closed range.
/// Used for: diplomatic trust (-100 to +100), AI trust (0 to 100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundedF64 {
    value: f64,
    min: f64,
    max: f64,
}

impl BoundedF64 {
    pub fn new(value: f64, min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "empty range {min}..={max}");
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn add(&mut self, delta: f64) {
        self.value = (self.value + delta).clamp(self.min, self.max);
    }

    pub fn set(&mut self, value: f64) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Position within the range, 0.0 at `min` and 1.0 at `max`.
    /// Returns 0 if max == min.
    pub fn ratio(&self) -> f64 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        (self.value - self.min) / range
    }

    /// Decay toward a target by a rate (e.g., 0.05 = 5%)
    ///
    /// `value = value + (target - value) * rate`
    pub fn decay_toward(&mut self, target: f64, rate: f64) {
        let delta = (target - self.value) * rate;
        self.value = (self.value + delta).clamp(self.min, self.max);
    }
}

/// Bilateral trust between two players, starting neutral.
pub fn new_diplomatic_trust() -> BoundedF64 {
    BoundedF64::new(0.0, -100.0, 100.0)
}

/// An AI's private trust in a counterpart, starting at the midpoint.
pub fn new_ai_trust() -> BoundedF64 {
    BoundedF64::new(50.0, 0.0, 100.0)
}
