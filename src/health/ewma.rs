//! Exponentially weighted moving average.

/// A single EWMA accumulator.
///
/// Not synchronized; lives inside the per-endpoint health lock.
#[derive(Debug, Clone, Copy)]
pub struct Ewma {
    value: f64,
    seeded: bool,
}

impl Ewma {
    /// Accumulator starting at `initial`, blended with every sample.
    pub fn with_initial(initial: f64) -> Self {
        Self {
            value: initial,
            seeded: true,
        }
    }

    /// Accumulator that adopts its first sample verbatim.
    pub fn unseeded() -> Self {
        Self {
            value: 0.0,
            seeded: false,
        }
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    /// `value = alpha * sample + (1 - alpha) * value`
    pub fn observe(&mut self, sample: f64, alpha: f64) {
        if !sample.is_finite() {
            return;
        }
        if self.seeded {
            self.value = alpha * sample + (1.0 - alpha) * self.value;
        } else {
            self.value = sample;
            self.seeded = true;
        }
    }
}
