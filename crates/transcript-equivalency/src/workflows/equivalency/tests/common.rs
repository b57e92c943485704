use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::workflows::equivalency::audit::AuditLog;
use crate::workflows::equivalency::domain::{
    AliasSuggestion, Candidate, CandidateId, CandidateStatus, Document, DocumentId,
    DocumentKind, ExtractedSubject, ExtractedSubjectId, MappingId, MappingMethod, SuggestionId,
    SuggestionLanguage, SuggestionStatus, TargetSubject,
};
use crate::workflows::equivalency::intake::MappingProposal;
use crate::workflows::equivalency::repository::{
    ChangeSet, CommitReceipt, EquivalencyRepository, InMemoryRepository, RecordWrite,
    RepositoryError, StoreSnapshot,
};
use crate::workflows::equivalency::settings::EngineSettings;
use crate::workflows::equivalency::{equivalency_router, EquivalencyService};

pub(super) const ADMIN: &str = "admin@admissions.test";

pub(super) fn build_service() -> (EquivalencyService<InMemoryRepository>, Arc<InMemoryRepository>) {
    let repository = Arc::new(InMemoryRepository::new(EngineSettings::default()));
    let service = EquivalencyService::new(repository.clone());
    (service, repository)
}

pub(super) fn candidate(id: &str) -> Candidate {
    Candidate {
        id: CandidateId::from(id),
        name: "Amina Diallo".to_string(),
        email: format!("{id}@example.org"),
        school: "Lycée Blaise Diagne".to_string(),
        track: "sciences".to_string(),
        country: "SN".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 0).unwrap(),
        status: CandidateStatus::Pending,
        overall_score: 0.0,
        equivalency_percent: 0.0,
        threshold: None,
    }
}

pub(super) fn document(id: &str, candidate_id: &str) -> Document {
    Document {
        id: DocumentId::from(id),
        candidate_id: CandidateId::from(candidate_id),
        filename: format!("{id}.pdf"),
        kind: DocumentKind::Pdf,
        uploaded_at: Utc.with_ymd_and_hms(2026, 2, 11, 9, 0, 0).unwrap(),
        raw_text: String::new(),
        preview_url: format!("/previews/{id}"),
    }
}

pub(super) fn subject(
    id: &str,
    document_id: &str,
    raw_grade: f64,
    scale: f64,
    source_coefficient: Option<f64>,
) -> ExtractedSubject {
    ExtractedSubject {
        id: ExtractedSubjectId::from(id),
        document_id: DocumentId::from(document_id),
        raw_label: format!("Matière {id}"),
        normalized_label: format!("matière {id}"),
        raw_grade,
        scale,
        year: 2025,
        source_coefficient,
    }
}

pub(super) fn target(code: &str, coefficient: f64) -> TargetSubject {
    TargetSubject {
        code: code.to_string(),
        title_fr: format!("Cours {code}"),
        title_en: None,
        category: "sciences".to_string(),
        level: Some("L1".to_string()),
        coefficient,
        active: true,
    }
}

pub(super) fn proposal(
    id: &str,
    subject_id: &str,
    code: Option<&str>,
    confidence: f64,
) -> MappingProposal {
    MappingProposal {
        id: MappingId::from(id),
        extracted_subject_id: ExtractedSubjectId::from(subject_id),
        target_subject_code: code.map(str::to_string),
        method: MappingMethod::Fuzzy,
        confidence,
    }
}

pub(super) fn suggestion(
    id: &str,
    raw_label: &str,
    code: &str,
    language: SuggestionLanguage,
    confidence: f64,
) -> AliasSuggestion {
    AliasSuggestion {
        id: SuggestionId::from(id),
        raw_label: raw_label.to_string(),
        normalized_label: raw_label.to_lowercase(),
        language,
        target_subject_code: code.to_string(),
        confidence,
        status: SuggestionStatus::Pending,
        occurrences: 3,
        created_at: Utc.with_ymd_and_hms(2026, 2, 12, 14, 0, 0).unwrap(),
    }
}

pub(super) fn seed_catalog<R: EquivalencyRepository + 'static>(service: &EquivalencyService<R>) {
    for entry in [target("MAT101", 4.0), target("MAT201", 3.0), target("PHY101", 2.0)] {
        service
            .catalog()
            .add_target_subject(entry, "seed")
            .expect("catalog entry seeds");
    }
}

/// One candidate with one document and one 15/20 line-item per confidence, each mapped to
/// MAT101. Returns the mapping ids in input order.
pub(super) fn seed_candidate<R: EquivalencyRepository + 'static>(
    service: &EquivalencyService<R>,
    candidate_id: &str,
    confidences: &[f64],
) -> Vec<MappingId> {
    let intake = service.intake();
    intake
        .register_candidate(candidate(candidate_id))
        .expect("candidate registers");
    let document_id = format!("{candidate_id}-doc");
    intake
        .add_document(document(&document_id, candidate_id))
        .expect("document ingests");

    confidences
        .iter()
        .enumerate()
        .map(|(index, confidence)| {
            let subject_id = format!("{candidate_id}-sub-{}", index + 1);
            intake
                .add_extracted_subject(subject(&subject_id, &document_id, 15.0, 20.0, None))
                .expect("subject extracts");
            let mapping_id = format!("{candidate_id}-map-{}", index + 1);
            intake
                .propose_mapping(proposal(&mapping_id, &subject_id, Some("MAT101"), *confidence))
                .expect("mapping proposed")
                .id
        })
        .collect()
}

pub(super) fn audit_len<R: EquivalencyRepository + 'static>(
    service: &EquivalencyService<R>,
) -> usize {
    service.audit_log().expect("audit log readable").len()
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) struct UnavailableRepository;

impl EquivalencyRepository for UnavailableRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _changes: ChangeSet) -> Result<CommitReceipt, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Reads succeed against a fixed snapshot; every commit loses the version race.
pub(super) struct StaleRepository {
    pub(super) snapshot: StoreSnapshot,
}

impl EquivalencyRepository for StaleRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(self.snapshot.clone())
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, RepositoryError> {
        Err(RepositoryError::Conflict(format!(
            "store moved past version {}",
            changes.base_version()
        )))
    }

    fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Store that refuses any change set creating an alias; everything else goes through.
pub(super) struct AliasRejectingRepository {
    pub(super) inner: InMemoryRepository,
}

impl EquivalencyRepository for AliasRejectingRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        self.inner.snapshot()
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, RepositoryError> {
        if changes
            .writes()
            .iter()
            .any(|write| matches!(write, RecordWrite::Alias(_)))
        {
            return Err(RepositoryError::Unavailable("alias table is read-only".to_string()));
        }
        self.inner.commit(changes)
    }

    fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError> {
        self.inner.audit_log()
    }
}

pub(super) fn router_with_service(
    service: EquivalencyService<InMemoryRepository>,
) -> axum::Router {
    equivalency_router(Arc::new(service))
}

pub(super) fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub(super) fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json payload")
}
