use crate::infra::{in_memory_service, parse_export_kind, seed_sample_data};
use clap::Args;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use transcript_equivalency::config::load_engine_settings;
use transcript_equivalency::error::AppError;
use transcript_equivalency::workflows::equivalency::{
    CandidateStatus, EngineSettings, EquivalencyService, ExportKind, InMemoryRepository,
};

const DEMO_ACTOR: &str = "demo-admin";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Confidence at or above which proposals are accepted (defaults to the fuzzy_ok threshold)
    #[arg(long)]
    pub(crate) accept_threshold: Option<f64>,
    /// Confidence below which proposals are cleared (defaults to the near_miss_low threshold)
    #[arg(long)]
    pub(crate) reject_threshold: Option<f64>,
    /// Minimum confidence for bulk alias approval
    #[arg(long, default_value_t = 0.9)]
    pub(crate) approve_confidence: f64,
    /// JSON settings file overriding the built-in thresholds and weights
    #[arg(long)]
    pub(crate) settings: Option<PathBuf>,
    /// Print the audit export after the walkthrough
    #[arg(long)]
    pub(crate) show_audit_csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Dataset to export: candidates, mappings, catalog or audit
    #[arg(long, value_parser = parse_export_kind)]
    pub(crate) kind: ExportKind,
    /// Destination file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Refresh candidate scores before exporting
    #[arg(long)]
    pub(crate) score: bool,
}

fn sample_service(
    settings: Option<PathBuf>,
) -> Result<Arc<EquivalencyService<InMemoryRepository>>, AppError> {
    let settings = match settings {
        Some(path) => load_engine_settings(path)?,
        None => EngineSettings::default(),
    };
    let service = in_memory_service(settings);
    seed_sample_data(&service)?;
    Ok(service)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        accept_threshold,
        reject_threshold,
        approve_confidence,
        settings,
        show_audit_csv,
    } = args;

    let service = sample_service(settings)?;
    let thresholds = service.settings()?.thresholds;
    let accept_threshold = accept_threshold.unwrap_or(thresholds.fuzzy_ok);
    let reject_threshold = reject_threshold.unwrap_or(thresholds.near_miss_low);

    println!("Transcript equivalency demo");
    println!(
        "- catalog: {} target subjects",
        service.catalog().target_subjects()?.len()
    );

    println!("\nAlias suggestions awaiting review");
    for suggestion in service.suggestions().pending()? {
        println!(
            "  - {} '{}' -> {} ({:.0}% confidence, seen {}x)",
            suggestion.id,
            suggestion.raw_label,
            suggestion.target_subject_code,
            suggestion.confidence * 100.0,
            suggestion.occurrences
        );
    }
    let approvals = service
        .suggestions()
        .approve_confident(approve_confidence, DEMO_ACTOR)?;
    println!(
        "- approved {} suggestion(s) at or above {:.2}",
        approvals.len(),
        approve_confidence
    );
    for approval in &approvals {
        println!(
            "  - alias '{}' now resolves to {}",
            approval.alias.label, approval.alias.target_subject_code
        );
    }

    for candidate in service.candidates(None)? {
        println!(
            "\nCandidate {} - {} ({}, {})",
            candidate.id, candidate.name, candidate.school, candidate.country
        );
        for mapping in service.mappings_for_candidate(&candidate.id)? {
            println!(
                "  - {} -> {} [{} {:.2}]",
                mapping.extracted_subject_id,
                mapping.target_subject_code.as_deref().unwrap_or("unmapped"),
                mapping.method.label(),
                mapping.confidence
            );
        }

        let accepted = service
            .mappings()
            .accept_by_threshold(&candidate.id, accept_threshold, DEMO_ACTOR)?;
        let cleared = service
            .mappings()
            .reject_below_threshold(&candidate.id, reject_threshold, DEMO_ACTOR)?;
        println!(
            "  Review: {} accepted at >= {:.2}, {} cleared below {:.2}",
            accepted.len(),
            accept_threshold,
            cleared.len(),
            reject_threshold
        );

        let report = service.score_report(&candidate.id)?;
        for contribution in &report.contributions {
            println!(
                "    {} grade {:.2}/20 x coef {} (penalty {}) = {:.2}",
                contribution.target_subject_code,
                contribution.normalized_grade,
                contribution.coefficient,
                contribution.penalty,
                contribution.weighted
            );
        }
        let breakdown = service.refresh_candidate_score(&candidate.id, DEMO_ACTOR)?;
        println!(
            "  Score: {:.2}/20 ({:.1}% equivalency)",
            breakdown.persisted_score(),
            breakdown.persisted_percent()
        );

        let acceptance = service.settings()?.thresholds.global_acceptance;
        if breakdown.overall_score >= acceptance {
            service.update_candidate_status(
                &candidate.id,
                CandidateStatus::AutoEvaluated,
                DEMO_ACTOR,
            )?;
            println!("  Status: auto-evaluated (>= {acceptance})");
        } else {
            println!("  Status: left pending for manual review (< {acceptance})");
        }
    }

    let log = service.audit_log()?;
    println!("\nAudit trail ({} entries, newest first)", log.len());
    for entry in log.iter().take(8) {
        println!(
            "  - {} {} {} {} by {}",
            entry.at.format("%H:%M:%S"),
            entry.action.label(),
            entry.entity,
            entry.entity_id,
            entry.actor
        );
    }

    if show_audit_csv {
        let csv = service.export_csv(ExportKind::Audit)?;
        println!("\n{}", String::from_utf8_lossy(&csv));
    }

    Ok(())
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let ExportArgs {
        kind,
        output,
        score,
    } = args;

    let service = sample_service(None)?;
    if score {
        for candidate in service.candidates(None)? {
            service.refresh_candidate_score(&candidate.id, DEMO_ACTOR)?;
        }
    }

    let csv = service.export_csv(kind)?;
    match output {
        Some(path) => {
            fs::write(&path, &csv)?;
            println!("wrote {} ({} bytes)", path.display(), csv.len());
        }
        None => std::io::stdout().write_all(&csv)?,
    }
    Ok(())
}
