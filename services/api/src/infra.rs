use chrono::{DateTime, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use transcript_equivalency::workflows::equivalency::{
    AliasSuggestion, Candidate, CandidateId, CandidateStatus, Document, DocumentId, DocumentKind,
    EngineSettings, EquivalencyRepository, EquivalencyService, ExportKind, ExtractedSubject,
    ExtractedSubjectId, InMemoryRepository, MappingId, MappingMethod, MappingProposal,
    ServiceError, SuggestionId, SuggestionLanguage, SuggestionStatus, TargetSubject,
};

/// Actor recorded on audit entries written by the sample dataset loader.
pub(crate) const SEED_ACTOR: &str = "seed";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_export_kind(raw: &str) -> Result<ExportKind, String> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|err| format!("{err}; expected one of candidates, mappings, catalog, audit"))
}

pub(crate) fn in_memory_service(
    settings: EngineSettings,
) -> Arc<EquivalencyService<InMemoryRepository>> {
    Arc::new(EquivalencyService::new(Arc::new(InMemoryRepository::new(
        settings,
    ))))
}

struct SampleLine {
    label: &'static str,
    grade: f64,
    target: Option<&'static str>,
    method: MappingMethod,
    confidence: f64,
}

struct SampleCandidate {
    id: &'static str,
    name: &'static str,
    school: &'static str,
    country: &'static str,
    scale: f64,
    source_coefficient: Option<f64>,
    lines: &'static [SampleLine],
}

const SAMPLE_CANDIDATES: &[SampleCandidate] = &[
    SampleCandidate {
        id: "cand-001",
        name: "Awa Ndiaye",
        school: "Lycée Lamine Guèye",
        country: "SN",
        scale: 20.0,
        source_coefficient: None,
        lines: &[
            SampleLine {
                label: "Mathématiques",
                grade: 15.0,
                target: Some("MAT101"),
                method: MappingMethod::Exact,
                confidence: 0.98,
            },
            SampleLine {
                label: "Sciences Physiques",
                grade: 13.5,
                target: Some("PHY101"),
                method: MappingMethod::Fuzzy,
                confidence: 0.86,
            },
            SampleLine {
                label: "Philo",
                grade: 11.0,
                target: Some("FRA101"),
                method: MappingMethod::Llm,
                confidence: 0.52,
            },
        ],
    },
    SampleCandidate {
        id: "cand-002",
        name: "Daniel Ortega",
        school: "Lincoln High School",
        country: "US",
        scale: 100.0,
        source_coefficient: Some(1.0),
        lines: &[
            SampleLine {
                label: "AP Calculus AB",
                grade: 91.0,
                target: Some("MAT101"),
                method: MappingMethod::Fuzzy,
                confidence: 0.84,
            },
            SampleLine {
                label: "English Literature",
                grade: 88.0,
                target: Some("ANG101"),
                method: MappingMethod::Fuzzy,
                confidence: 0.77,
            },
            SampleLine {
                label: "Driver Education",
                grade: 95.0,
                target: None,
                method: MappingMethod::Llm,
                confidence: 0.31,
            },
        ],
    },
    SampleCandidate {
        id: "cand-003",
        name: "Yasmine El Amrani",
        school: "Lycée Ibn Sina",
        country: "MA",
        scale: 20.0,
        source_coefficient: Some(2.0),
        lines: &[
            SampleLine {
                label: "Algèbre",
                grade: 16.25,
                target: Some("MAT101"),
                method: MappingMethod::Llm,
                confidence: 0.71,
            },
            SampleLine {
                label: "Histoire-Géo",
                grade: 12.0,
                target: Some("HIS101"),
                method: MappingMethod::Exact,
                confidence: 0.96,
            },
        ],
    },
];

fn sample_catalog() -> Vec<TargetSubject> {
    [
        ("MAT101", "Mathématiques", "Mathematics", "sciences", 4.0),
        ("PHY101", "Physique-Chimie", "Physics and Chemistry", "sciences", 3.0),
        ("FRA101", "Français", "French", "lettres", 2.0),
        ("ANG101", "Anglais", "English", "langues", 2.0),
        ("HIS101", "Histoire-Géographie", "History and Geography", "lettres", 2.0),
    ]
    .into_iter()
    .map(|(code, title_fr, title_en, category, coefficient)| TargetSubject {
        code: code.to_string(),
        title_fr: title_fr.to_string(),
        title_en: Some(title_en.to_string()),
        category: category.to_string(),
        level: Some("L1".to_string()),
        coefficient,
        active: true,
    })
    .collect()
}

fn sample_suggestions(created_at: DateTime<Utc>) -> Vec<AliasSuggestion> {
    [
        ("suggest-1", "Algèbre", "MAT101", SuggestionLanguage::Fr, 0.93, 7),
        ("suggest-2", "Calculus", "MAT101", SuggestionLanguage::En, 0.91, 4),
        ("suggest-3", "Historia", "HIS101", SuggestionLanguage::Es, 0.64, 2),
        ("suggest-4", "Philo", "FRA101", SuggestionLanguage::Fr, 0.48, 1),
    ]
    .into_iter()
    .map(
        |(id, label, code, language, confidence, occurrences)| AliasSuggestion {
            id: SuggestionId::from(id),
            raw_label: label.to_string(),
            normalized_label: label.to_lowercase(),
            language,
            target_subject_code: code.to_string(),
            confidence,
            status: SuggestionStatus::Pending,
            occurrences,
            created_at,
        },
    )
    .collect()
}

/// Load a small multi-country dataset: catalog, three candidates with proposals, and a
/// suggestion queue.
pub(crate) fn seed_sample_data<R>(service: &EquivalencyService<R>) -> Result<(), ServiceError>
where
    R: EquivalencyRepository + 'static,
{
    let received = Utc
        .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    for target in sample_catalog() {
        service.catalog().add_target_subject(target, SEED_ACTOR)?;
    }

    let intake = service.intake();
    for sample in SAMPLE_CANDIDATES {
        intake.register_candidate(Candidate {
            id: CandidateId::from(sample.id),
            name: sample.name.to_string(),
            email: format!("{}@applicants.example", sample.id),
            school: sample.school.to_string(),
            track: "sciences".to_string(),
            country: sample.country.to_string(),
            created_at: received,
            status: CandidateStatus::Pending,
            overall_score: 0.0,
            equivalency_percent: 0.0,
            threshold: None,
        })?;

        let document_id = DocumentId(format!("{}-transcript", sample.id));
        intake.add_document(Document {
            id: document_id.clone(),
            candidate_id: CandidateId::from(sample.id),
            filename: format!("{}-transcript.pdf", sample.id),
            kind: DocumentKind::Pdf,
            uploaded_at: received,
            raw_text: String::new(),
            preview_url: format!("/previews/{}", document_id),
        })?;

        for (index, line) in sample.lines.iter().enumerate() {
            let subject_id = ExtractedSubjectId(format!("{}-line-{}", sample.id, index + 1));
            intake.add_extracted_subject(ExtractedSubject {
                id: subject_id.clone(),
                document_id: document_id.clone(),
                raw_label: line.label.to_string(),
                normalized_label: line.label.to_lowercase(),
                raw_grade: line.grade,
                scale: sample.scale,
                year: 2025,
                source_coefficient: sample.source_coefficient,
            })?;
            intake.propose_mapping(MappingProposal {
                id: MappingId(format!("{}-map-{}", sample.id, index + 1)),
                extracted_subject_id: subject_id,
                target_subject_code: line.target.map(str::to_string),
                method: line.method,
                confidence: line.confidence,
            })?;
        }
    }

    for suggestion in sample_suggestions(received) {
        intake.enqueue_suggestion(suggestion)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_data_loads_into_a_fresh_store() {
        let service = in_memory_service(EngineSettings::default());
        seed_sample_data(&service).expect("sample data loads");

        assert_eq!(service.candidates(None).unwrap().len(), 3);
        assert_eq!(service.catalog().target_subjects().unwrap().len(), 5);
        assert_eq!(service.suggestions().pending().unwrap().len(), 4);
        assert_eq!(
            service
                .mappings_for_candidate(&CandidateId::from("cand-002"))
                .unwrap()
                .len(),
            3
        );
        // Only catalog creation is an admin action.
        assert_eq!(service.audit_log().unwrap().len(), 5);
    }

    #[test]
    fn export_kind_parser_is_case_insensitive() {
        assert_eq!(parse_export_kind(" Audit "), Ok(ExportKind::Audit));
        assert!(parse_export_kind("grades").is_err());
    }
}
