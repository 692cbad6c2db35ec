//! Weight vector for the composite performance score.

use serde::{Deserialize, Serialize};
use tutorly_config::ScoreWeights;

/// The 4-component weight vector W.
/// Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Fraction of steps answered correctly
    pub accuracy: f64,
    /// Time spent relative to the level's expected time (inverted)
    pub time: f64,
    /// Scaffolding hints consumed (inverted)
    pub hints: f64,
    /// Mistakes made (inverted)
    pub mistakes: f64,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            accuracy: 0.40,
            time:     0.20,
            hints:    0.20,
            mistakes: 0.20,
        }
    }
}

impl From<&ScoreWeights> for WeightVector {
    fn from(w: &ScoreWeights) -> Self {
        Self {
            accuracy: w.accuracy,
            time:     w.time,
            hints:    w.hints,
            mistakes: w.mistakes,
        }
    }
}

impl WeightVector {
    fn sum(&self) -> f64 {
        self.accuracy + self.time + self.hints + self.mistakes
    }

    /// Validate that all weights are non-negative and sum to ~1.0
    pub fn validate(&self) -> bool {
        self.as_array().iter().all(|w| *w >= 0.0) && (self.sum() - 1.0).abs() < 1e-6
    }

    /// Renormalise weights so they sum to 1.0
    pub fn normalise(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.accuracy /= sum;
            self.time     /= sum;
            self.hints    /= sum;
            self.mistakes /= sum;
        }
    }

    /// Convert to array for iteration.
    pub fn as_array(&self) -> [f64; 4] {
        [self.accuracy, self.time, self.hints, self.mistakes]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = WeightVector::default();
        assert!(w.validate(), "Default weights must sum to 1.0");
    }

    #[test]
    fn test_normalise_restores_sum() {
        let mut w = WeightVector::default();
        w.accuracy += 0.10;
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
        assert!(w.accuracy > w.time);
    }

    #[test]
    fn test_negative_weight_invalid() {
        let w = WeightVector { accuracy: 1.2, time: -0.2, hints: 0.0, mistakes: 0.0 };
        assert!(!w.validate());
    }
}
