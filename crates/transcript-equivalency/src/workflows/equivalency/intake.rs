//! Entry points for the upstream suppliers: candidate intake, document upload, extraction,
//! matchers and the suggestion generator. These writes are not admin actions and are not
//! audited.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    normalize_target_code, AliasSuggestion, Candidate, Document, ExtractedSubject,
    ExtractedSubjectId, Mapping, MappingId, MappingMethod, SuggestionStatus,
};
use super::repository::{
    ChangeSet, EquivalencyRepository, RecordKind, RecordWrite, RepositoryError, StoreHandle,
    StoreSnapshot,
};
use super::service::ServiceError;

/// Matcher output for one extracted line-item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProposal {
    pub id: MappingId,
    pub extracted_subject_id: ExtractedSubjectId,
    pub target_subject_code: Option<String>,
    pub method: MappingMethod,
    pub confidence: f64,
}

impl From<MappingProposal> for Mapping {
    fn from(proposal: MappingProposal) -> Self {
        Mapping {
            id: proposal.id,
            extracted_subject_id: proposal.extracted_subject_id,
            target_subject_code: normalize_target_code(proposal.target_subject_code),
            method: proposal.method,
            confidence: proposal.confidence,
            auto: true,
            overridden_by_admin: false,
        }
    }
}

pub struct Intake<R> {
    store: StoreHandle<R>,
}

impl<R: EquivalencyRepository> Intake<R> {
    pub fn new(store: StoreHandle<R>) -> Self {
        Self { store }
    }

    pub fn register_candidate(&self, candidate: Candidate) -> Result<Candidate, ServiceError> {
        let snapshot = self.store.snapshot()?;
        if snapshot.candidates.contains_key(&candidate.id) {
            return Err(ServiceError::Repository(RepositoryError::Conflict(format!(
                "candidate '{}' already registered",
                candidate.id
            ))));
        }
        self.write(&snapshot, RecordWrite::Candidate(candidate.clone()))?;
        debug!(candidate_id = %candidate.id, "candidate registered");
        Ok(candidate)
    }

    pub fn add_document(&self, document: Document) -> Result<Document, ServiceError> {
        let snapshot = self.store.snapshot()?;
        if !snapshot.candidates.contains_key(&document.candidate_id) {
            return Err(ServiceError::not_found(
                RecordKind::Candidate,
                &document.candidate_id,
            ));
        }
        self.write(&snapshot, RecordWrite::Document(document.clone()))?;
        debug!(document_id = %document.id, candidate_id = %document.candidate_id, "document ingested");
        Ok(document)
    }

    pub fn add_extracted_subject(
        &self,
        subject: ExtractedSubject,
    ) -> Result<ExtractedSubject, ServiceError> {
        let snapshot = self.store.snapshot()?;
        if !snapshot.documents.contains_key(&subject.document_id) {
            return Err(ServiceError::not_found(
                RecordKind::Document,
                &subject.document_id,
            ));
        }
        self.write(&snapshot, RecordWrite::ExtractedSubject(subject.clone()))?;
        Ok(subject)
    }

    pub fn propose_mapping(&self, proposal: MappingProposal) -> Result<Mapping, ServiceError> {
        let snapshot = self.store.snapshot()?;
        if !snapshot
            .extracted_subjects
            .contains_key(&proposal.extracted_subject_id)
        {
            return Err(ServiceError::not_found(
                RecordKind::ExtractedSubject,
                &proposal.extracted_subject_id,
            ));
        }
        if snapshot.mappings.contains_key(&proposal.id) {
            return Err(ServiceError::Repository(RepositoryError::Conflict(format!(
                "mapping '{}' already proposed",
                proposal.id
            ))));
        }
        if let Some(existing) = snapshot
            .mappings
            .values()
            .find(|mapping| mapping.extracted_subject_id == proposal.extracted_subject_id)
        {
            return Err(ServiceError::Repository(RepositoryError::Conflict(format!(
                "extracted subject '{}' is already mapped by '{}'",
                proposal.extracted_subject_id, existing.id
            ))));
        }
        let mapping = Mapping::from(proposal);
        self.write(&snapshot, RecordWrite::Mapping(mapping.clone()))?;
        debug!(mapping_id = %mapping.id, method = mapping.method.label(), "mapping proposed");
        Ok(mapping)
    }

    /// Queue a suggestion for review. Incoming suggestions always start pending.
    pub fn enqueue_suggestion(
        &self,
        mut suggestion: AliasSuggestion,
    ) -> Result<AliasSuggestion, ServiceError> {
        let snapshot = self.store.snapshot()?;
        suggestion.status = SuggestionStatus::Pending;
        self.write(&snapshot, RecordWrite::Suggestion(suggestion.clone()))?;
        Ok(suggestion)
    }

    fn write(
        &self,
        snapshot: &StoreSnapshot,
        write: RecordWrite,
    ) -> Result<(), ServiceError> {
        let mut changes = ChangeSet::against(snapshot);
        changes.write(write);
        self.store.commit(changes)?;
        Ok(())
    }
}
