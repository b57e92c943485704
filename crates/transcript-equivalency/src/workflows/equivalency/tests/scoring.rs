use super::common::*;
use crate::workflows::equivalency::domain::{Mapping, MappingMethod};
use crate::workflows::equivalency::scoring::{
    calculate, CoefficientSource, ScoreBreakdown, ScoringEngine, ScoringPolicy,
};
use crate::workflows::equivalency::settings::WeightSettings;

fn mapping(id: &str, subject_id: &str, code: Option<&str>, confidence: f64) -> Mapping {
    Mapping::from(proposal(id, subject_id, code, confidence))
}

#[test]
fn empty_inputs_yield_the_zero_breakdown() {
    assert_eq!(calculate(&[], &[], &[]), ScoreBreakdown::ZERO);
}

#[test]
fn unaccepted_mappings_yield_the_zero_breakdown() {
    let subjects = vec![subject("sub-1", "doc-1", 15.0, 20.0, Some(2.0))];
    let mappings = vec![mapping("map-1", "sub-1", None, 0.95)];
    let targets = vec![target("MAT101", 4.0)];

    assert_eq!(
        calculate(&subjects, &mappings, &targets),
        ScoreBreakdown::ZERO
    );
}

#[test]
fn blank_target_codes_do_not_score() {
    let subjects = vec![
        subject("sub-1", "doc-1", 15.0, 20.0, Some(2.0)),
        subject("sub-2", "doc-1", 12.0, 20.0, Some(2.0)),
    ];
    let mut empty = mapping("map-1", "sub-1", None, 0.95);
    empty.target_subject_code = Some(String::new());
    let mut padded = mapping("map-2", "sub-2", None, 0.95);
    padded.target_subject_code = Some("  ".to_string());

    assert_eq!(
        calculate(&subjects, &[empty, padded], &[target("MAT101", 4.0)]),
        ScoreBreakdown::ZERO
    );
}

#[test]
fn confident_mapping_uses_target_coefficient() {
    let subjects = vec![subject("sub-1", "doc-1", 15.0, 20.0, Some(2.0))];
    let mappings = vec![mapping("map-1", "sub-1", Some("MAT101"), 0.8)];
    let targets = vec![target("MAT101", 4.0)];

    let breakdown = calculate(&subjects, &mappings, &targets);

    assert_close(breakdown.weighted_sum, 60.0);
    assert_close(breakdown.total_coefficient, 4.0);
    assert_close(breakdown.overall_score, 15.0);
    assert_close(breakdown.equivalency_percent, 75.0);
}

#[test]
fn low_confidence_mapping_is_penalized() {
    let subjects = vec![subject("sub-1", "doc-1", 15.0, 20.0, Some(2.0))];
    let mappings = vec![mapping("map-1", "sub-1", Some("MAT101"), 0.4)];
    let targets = vec![target("MAT101", 4.0)];

    let report = ScoringEngine::default().report(&subjects, &mappings, &targets);

    assert_close(report.contributions[0].penalty, 0.7);
    assert_close(report.breakdown.weighted_sum, 42.0);
    assert_close(report.breakdown.overall_score, 10.5);
    assert_close(report.breakdown.equivalency_percent, 52.5);
}

#[test]
fn penalty_cutoff_is_exclusive() {
    let policy = ScoringPolicy::default();
    assert_eq!(policy.penalty(0.6), 1.0);
    assert_eq!(policy.penalty(0.599), 0.7);
}

#[test]
fn missing_target_falls_back_to_source_coefficient() {
    let subjects = vec![
        subject("sub-1", "doc-1", 15.0, 20.0, Some(2.0)),
        subject("sub-2", "doc-1", 10.0, 10.0, Some(3.0)),
    ];
    let mappings = vec![
        mapping("map-1", "sub-1", Some("MAT101"), 0.8),
        mapping("map-2", "sub-2", Some("RETIRED9"), 0.9),
    ];
    let targets = vec![target("MAT101", 4.0)];

    let report = ScoringEngine::default().report(&subjects, &mappings, &targets);

    let fallback = &report.contributions[1];
    assert_eq!(fallback.coefficient_source, CoefficientSource::SourceTranscript);
    assert_close(fallback.normalized_grade, 20.0);
    assert_close(fallback.weighted, 60.0);
    assert_close(report.breakdown.total_coefficient, 7.0);
    assert_close(report.breakdown.weighted_sum, 120.0);
}

#[test]
fn missing_coefficients_default_to_policy_fallback() {
    let subjects = vec![subject("sub-1", "doc-1", 12.0, 20.0, None)];
    let mappings = vec![mapping("map-1", "sub-1", Some("UNKNOWN"), 0.9)];

    let default_report = ScoringEngine::default().report(&subjects, &mappings, &[]);
    assert_eq!(
        default_report.contributions[0].coefficient_source,
        CoefficientSource::Fallback
    );
    assert_close(default_report.breakdown.total_coefficient, 1.0);
    assert_close(default_report.breakdown.overall_score, 12.0);

    let weights = WeightSettings {
        default_coefficient: 2.5,
        ..WeightSettings::default()
    };
    let weighted = ScoringEngine::new(ScoringPolicy::from_weights(&weights))
        .calculate(&subjects, &mappings, &[]);
    assert_close(weighted.total_coefficient, 2.5);
    assert_close(weighted.overall_score, 12.0);
}

#[test]
fn mappings_with_missing_subjects_are_skipped() {
    let subjects = vec![subject("sub-1", "doc-1", 16.0, 20.0, None)];
    let mappings = vec![
        mapping("map-1", "sub-1", Some("MAT101"), 0.9),
        mapping("map-2", "sub-gone", Some("MAT101"), 0.9),
    ];
    let targets = vec![target("MAT101", 4.0)];

    let report = ScoringEngine::default().report(&subjects, &mappings, &targets);

    assert_eq!(report.contributions.len(), 1);
    assert_close(report.breakdown.overall_score, 16.0);
}

#[test]
fn percent_is_clamped_at_one_hundred() {
    let subjects = vec![subject("sub-1", "doc-1", 24.0, 20.0, None)];
    let mappings = vec![mapping("map-1", "sub-1", Some("MAT101"), 0.9)];
    let targets = vec![target("MAT101", 4.0)];

    let breakdown = calculate(&subjects, &mappings, &targets);

    assert_close(breakdown.overall_score, 24.0);
    assert_close(breakdown.equivalency_percent, 100.0);
}

#[test]
fn zero_coefficient_targets_do_not_divide_by_zero() {
    let subjects = vec![subject("sub-1", "doc-1", 14.0, 20.0, None)];
    let mappings = vec![mapping("map-1", "sub-1", Some("SPORT"), 0.9)];
    let targets = vec![target("SPORT", 0.0)];

    let breakdown = calculate(&subjects, &mappings, &targets);

    assert_eq!(breakdown.overall_score, 0.0);
    assert_eq!(breakdown.equivalency_percent, 0.0);
}

#[test]
fn calculation_is_idempotent() {
    let subjects = vec![
        subject("sub-1", "doc-1", 13.5, 20.0, None),
        subject("sub-2", "doc-1", 71.0, 100.0, Some(2.0)),
    ];
    let mut low = mapping("map-2", "sub-2", Some("PHY101"), 0.45);
    low.method = MappingMethod::Llm;
    let mappings = vec![mapping("map-1", "sub-1", Some("MAT101"), 0.97), low];
    let targets = vec![target("MAT101", 4.0), target("PHY101", 2.0)];

    let engine = ScoringEngine::default();
    let first = engine.report(&subjects, &mappings, &targets);
    let second = engine.report(&subjects, &mappings, &targets);

    assert_eq!(first, second);
}

#[test]
fn persisted_values_round_to_display_precision() {
    let breakdown = ScoreBreakdown {
        total_coefficient: 3.0,
        weighted_sum: 40.0,
        overall_score: 40.0 / 3.0,
        equivalency_percent: 40.0 / 3.0 * 5.0,
    };

    assert_eq!(breakdown.persisted_score(), 13.33);
    assert_eq!(breakdown.persisted_percent(), 66.7);
}
