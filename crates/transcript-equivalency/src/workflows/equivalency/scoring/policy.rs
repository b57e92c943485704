use serde::{Deserialize, Serialize};

use super::super::settings::WeightSettings;

/// Weighting rules applied to each accepted mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Mappings strictly below this confidence are penalized.
    pub low_confidence_cutoff: f64,
    /// Multiplier applied to the normalized grade of penalized mappings.
    pub low_confidence_factor: f64,
    /// Coefficient used when neither the target subject nor the transcript provides one.
    pub fallback_coefficient: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            low_confidence_cutoff: 0.6,
            low_confidence_factor: 0.7,
            fallback_coefficient: 1.0,
        }
    }
}

impl ScoringPolicy {
    /// Policy driven by the editable weights. Only the fallback coefficient is taken from
    /// them; the low-confidence penalty stays fixed at 0.7 below 0.6.
    pub fn from_weights(weights: &WeightSettings) -> Self {
        Self {
            fallback_coefficient: weights.default_coefficient,
            ..Self::default()
        }
    }

    pub fn penalty(&self, confidence: f64) -> f64 {
        if confidence < self.low_confidence_cutoff {
            self.low_confidence_factor
        } else {
            1.0
        }
    }
}
