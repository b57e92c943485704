use serde::{Deserialize, Serialize};

/// Confidence and score thresholds consumed by batch review and matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    /// Minimum overall score (0-20) for a candidate to be considered equivalent.
    pub global_acceptance: f64,
    pub exact_min: f64,
    pub fuzzy_ok: f64,
    pub fuzzy_maybe: f64,
    pub llm_min: f64,
    pub near_miss_low: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            global_acceptance: 12.0,
            exact_min: 0.95,
            fuzzy_ok: 0.85,
            fuzzy_maybe: 0.70,
            llm_min: 0.60,
            near_miss_low: 0.50,
        }
    }
}

impl ThresholdSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=20.0).contains(&self.global_acceptance) {
            return Err(SettingsError::OutOfRange {
                field: "global_acceptance",
                value: self.global_acceptance,
                min: 0.0,
                max: 20.0,
            });
        }
        let confidences = [
            ("exact_min", self.exact_min),
            ("fuzzy_ok", self.fuzzy_ok),
            ("fuzzy_maybe", self.fuzzy_maybe),
            ("llm_min", self.llm_min),
            ("near_miss_low", self.near_miss_low),
        ];
        for (field, value) in confidences {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightSettings {
    pub default_coefficient: f64,
    pub llm_bonus: f64,
    pub penalty_low_confidence: f64,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            default_coefficient: 1.0,
            llm_bonus: 0.2,
            penalty_low_confidence: 0.5,
        }
    }
}

impl WeightSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let weights = [
            ("default_coefficient", self.default_coefficient),
            ("llm_bonus", self.llm_bonus),
            ("penalty_low_confidence", self.penalty_low_confidence),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::Negative { field, value });
            }
        }
        Ok(())
    }
}

/// Fast-path cache controlling how quickly approved aliases reach the matchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotCacheSettings {
    pub enabled: bool,
    pub ttl_minutes: u32,
}

pub const MIN_HOT_CACHE_TTL_MINUTES: u32 = 5;

impl Default for HotCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: 180,
        }
    }
}

impl HotCacheSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ttl_minutes < MIN_HOT_CACHE_TTL_MINUTES {
            return Err(SettingsError::TtlTooShort {
                minutes: self.ttl_minutes,
            });
        }
        Ok(())
    }
}

/// The three settings singletons, persisted and replaced independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub thresholds: ThresholdSettings,
    pub weights: WeightSettings,
    pub hot_cache: HotCacheSettings,
}

/// Boundary validation failure. The engine itself accepts any value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be a non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("hot cache ttl must be at least 5 minutes, got {minutes}")]
    TtlTooShort { minutes: u32 },
}
