//! Aggregation of accepted mappings into a weighted 0-20 score and an equivalency percent.
//!
//! Everything here is pure: persisting a breakdown onto a candidate is the caller's job.

mod policy;

pub use policy::ScoringPolicy;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{ExtractedSubject, ExtractedSubjectId, Mapping, MappingId, TargetSubject};
use super::grading::COMMON_SCALE;

/// Derived score projection. Never a source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total_coefficient: f64,
    pub weighted_sum: f64,
    pub overall_score: f64,
    pub equivalency_percent: f64,
}

impl ScoreBreakdown {
    pub const ZERO: ScoreBreakdown = ScoreBreakdown {
        total_coefficient: 0.0,
        weighted_sum: 0.0,
        overall_score: 0.0,
        equivalency_percent: 0.0,
    };

    /// Score as stored on the candidate record (2 decimals).
    pub fn persisted_score(&self) -> f64 {
        round_to(self.overall_score, 2)
    }

    /// Percent as stored on the candidate record (1 decimal).
    pub fn persisted_percent(&self) -> f64 {
        round_to(self.equivalency_percent, 1)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Where the coefficient of a contribution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientSource {
    TargetSubject,
    SourceTranscript,
    Fallback,
}

/// Per-mapping share of a breakdown, kept for review screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreContribution {
    pub mapping_id: MappingId,
    pub extracted_subject_id: ExtractedSubjectId,
    pub target_subject_code: String,
    pub normalized_grade: f64,
    pub coefficient: f64,
    pub coefficient_source: CoefficientSource,
    pub penalty: f64,
    pub weighted: f64,
}

/// Breakdown together with the contributions it was folded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub breakdown: ScoreBreakdown,
    pub contributions: Vec<ScoreContribution>,
}

/// Stateless scorer; repeated calls with identical inputs return identical output.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn calculate(
        &self,
        subjects: &[ExtractedSubject],
        mappings: &[Mapping],
        targets: &[TargetSubject],
    ) -> ScoreBreakdown {
        self.report(subjects, mappings, targets).breakdown
    }

    pub fn report(
        &self,
        subjects: &[ExtractedSubject],
        mappings: &[Mapping],
        targets: &[TargetSubject],
    ) -> ScoreReport {
        let subjects: HashMap<&ExtractedSubjectId, &ExtractedSubject> =
            subjects.iter().map(|subject| (&subject.id, subject)).collect();
        let targets: HashMap<&str, &TargetSubject> = targets
            .iter()
            .map(|target| (target.code.as_str(), target))
            .collect();

        let contributions: Vec<ScoreContribution> = mappings
            .iter()
            .filter_map(|mapping| {
                let code = mapping.target_code()?;
                // A mapping whose line-item vanished is skipped, not fatal.
                let subject = subjects.get(&mapping.extracted_subject_id)?;
                Some(self.contribution(mapping, code, subject, targets.get(code).copied()))
            })
            .collect();

        ScoreReport {
            breakdown: fold(&contributions),
            contributions,
        }
    }

    fn contribution(
        &self,
        mapping: &Mapping,
        code: &str,
        subject: &ExtractedSubject,
        target: Option<&TargetSubject>,
    ) -> ScoreContribution {
        let (coefficient, coefficient_source) = match (target, subject.source_coefficient) {
            (Some(target), _) => (target.coefficient, CoefficientSource::TargetSubject),
            (None, Some(source)) => (source, CoefficientSource::SourceTranscript),
            (None, None) => (
                self.policy.fallback_coefficient,
                CoefficientSource::Fallback,
            ),
        };
        let normalized_grade = subject.normalized_grade();
        let penalty = self.policy.penalty(mapping.confidence);

        ScoreContribution {
            mapping_id: mapping.id.clone(),
            extracted_subject_id: subject.id.clone(),
            target_subject_code: code.to_string(),
            normalized_grade,
            coefficient,
            coefficient_source,
            penalty,
            weighted: normalized_grade * coefficient * penalty,
        }
    }
}

fn fold(contributions: &[ScoreContribution]) -> ScoreBreakdown {
    if contributions.is_empty() {
        return ScoreBreakdown::ZERO;
    }

    let (total_coefficient, weighted_sum) = contributions
        .iter()
        .fold((0.0, 0.0), |(total, sum), item| {
            (total + item.coefficient, sum + item.weighted)
        });
    let overall_score = if total_coefficient > 0.0 {
        weighted_sum / total_coefficient
    } else {
        0.0
    };
    let percent_per_point = 100.0 / COMMON_SCALE;

    ScoreBreakdown {
        total_coefficient,
        weighted_sum,
        overall_score,
        equivalency_percent: (overall_score * percent_per_point).min(100.0),
    }
}

/// Score with the default policy.
pub fn calculate(
    subjects: &[ExtractedSubject],
    mappings: &[Mapping],
    targets: &[TargetSubject],
) -> ScoreBreakdown {
    ScoringEngine::default().calculate(subjects, mappings, targets)
}
