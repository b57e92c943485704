use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::audit::{AuditDraft, AuditLog, AuditTrail};
use super::domain::{
    Alias, AliasId, AliasSuggestion, Candidate, CandidateId, Document, DocumentId,
    ExtractedSubject, ExtractedSubjectId, Mapping, MappingId, SuggestionId, TargetSubject,
};
use super::settings::EngineSettings;

/// Entity collections held by the store; also the `entity` column of the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Candidate,
    Document,
    ExtractedSubject,
    Mapping,
    TargetSubject,
    Alias,
    AliasSuggestion,
    Settings,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::Candidate => "candidate",
            RecordKind::Document => "document",
            RecordKind::ExtractedSubject => "extracted_subject",
            RecordKind::Mapping => "mapping",
            RecordKind::TargetSubject => "target_subject",
            RecordKind::Alias => "alias",
            RecordKind::AliasSuggestion => "alias_suggestion",
            RecordKind::Settings => "settings",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fan-out indices maintained on write so candidate-scoped reads avoid full scans.
#[derive(Debug, Clone, Default)]
struct CandidateIndex {
    documents_by_candidate: BTreeMap<CandidateId, BTreeSet<DocumentId>>,
    subjects_by_document: BTreeMap<DocumentId, BTreeSet<ExtractedSubjectId>>,
    mappings_by_subject: BTreeMap<ExtractedSubjectId, BTreeSet<MappingId>>,
}

/// Consistent, versioned copy of every collection except the audit log.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub version: u64,
    pub candidates: BTreeMap<CandidateId, Candidate>,
    pub documents: BTreeMap<DocumentId, Document>,
    pub extracted_subjects: BTreeMap<ExtractedSubjectId, ExtractedSubject>,
    pub mappings: BTreeMap<MappingId, Mapping>,
    pub target_subjects: BTreeMap<String, TargetSubject>,
    pub aliases: BTreeMap<AliasId, Alias>,
    pub suggestions: BTreeMap<SuggestionId, AliasSuggestion>,
    pub settings: EngineSettings,
    index: CandidateIndex,
}

impl StoreSnapshot {
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn documents_for_candidate(&self, candidate_id: &CandidateId) -> Vec<&Document> {
        self.index
            .documents_by_candidate
            .get(candidate_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.documents.get(id))
            .collect()
    }

    pub fn extracted_subjects_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Vec<&ExtractedSubject> {
        self.documents_for_candidate(candidate_id)
            .into_iter()
            .filter_map(|document| self.index.subjects_by_document.get(&document.id))
            .flatten()
            .filter_map(|id| self.extracted_subjects.get(id))
            .collect()
    }

    pub fn mappings_for_candidate(&self, candidate_id: &CandidateId) -> Vec<&Mapping> {
        self.extracted_subjects_for_candidate(candidate_id)
            .into_iter()
            .filter_map(|subject| self.index.mappings_by_subject.get(&subject.id))
            .flatten()
            .filter_map(|id| self.mappings.get(id))
            .collect()
    }

    fn apply(&mut self, write: RecordWrite) -> Result<(), RepositoryError> {
        match write {
            RecordWrite::Candidate(candidate) => {
                self.candidates.insert(candidate.id.clone(), candidate);
            }
            RecordWrite::Document(document) => {
                if self.documents.contains_key(&document.id) {
                    return Err(RepositoryError::Conflict(format!(
                        "document '{}' is immutable once ingested",
                        document.id
                    )));
                }
                if !self.candidates.contains_key(&document.candidate_id) {
                    return Err(RepositoryError::Invariant(format!(
                        "document '{}' references unknown candidate '{}'",
                        document.id, document.candidate_id
                    )));
                }
                self.index
                    .documents_by_candidate
                    .entry(document.candidate_id.clone())
                    .or_default()
                    .insert(document.id.clone());
                self.documents.insert(document.id.clone(), document);
            }
            RecordWrite::ExtractedSubject(subject) => {
                if self.extracted_subjects.contains_key(&subject.id) {
                    return Err(RepositoryError::Conflict(format!(
                        "extracted subject '{}' is immutable once extracted",
                        subject.id
                    )));
                }
                if !self.documents.contains_key(&subject.document_id) {
                    return Err(RepositoryError::Invariant(format!(
                        "extracted subject '{}' references unknown document '{}'",
                        subject.id, subject.document_id
                    )));
                }
                self.index
                    .subjects_by_document
                    .entry(subject.document_id.clone())
                    .or_default()
                    .insert(subject.id.clone());
                self.extracted_subjects.insert(subject.id.clone(), subject);
            }
            RecordWrite::Mapping(mapping) => {
                match self.mappings.get(&mapping.id) {
                    Some(existing) => {
                        if existing.extracted_subject_id != mapping.extracted_subject_id {
                            return Err(RepositoryError::Invariant(format!(
                                "mapping '{}' cannot move to another extracted subject",
                                mapping.id
                            )));
                        }
                        if existing.overridden_by_admin && !mapping.overridden_by_admin {
                            return Err(RepositoryError::Invariant(format!(
                                "mapping '{}' cannot drop its admin override",
                                mapping.id
                            )));
                        }
                    }
                    None => {
                        if !self
                            .extracted_subjects
                            .contains_key(&mapping.extracted_subject_id)
                        {
                            return Err(RepositoryError::Invariant(format!(
                                "mapping '{}' references unknown extracted subject '{}'",
                                mapping.id, mapping.extracted_subject_id
                            )));
                        }
                        if let Some(existing) = self
                            .index
                            .mappings_by_subject
                            .get(&mapping.extracted_subject_id)
                            .and_then(|ids| ids.iter().next())
                        {
                            return Err(RepositoryError::Conflict(format!(
                                "extracted subject '{}' is already mapped by '{}'",
                                mapping.extracted_subject_id, existing
                            )));
                        }
                        self.index
                            .mappings_by_subject
                            .entry(mapping.extracted_subject_id.clone())
                            .or_default()
                            .insert(mapping.id.clone());
                    }
                }
                self.mappings.insert(mapping.id.clone(), mapping);
            }
            RecordWrite::TargetSubject(target) => {
                self.target_subjects.insert(target.code.clone(), target);
            }
            RecordWrite::Alias(alias) => {
                if self.aliases.contains_key(&alias.id) {
                    return Err(RepositoryError::Conflict(format!(
                        "alias '{}' already exists",
                        alias.id
                    )));
                }
                self.aliases.insert(alias.id.clone(), alias);
            }
            RecordWrite::Suggestion(suggestion) => {
                self.suggestions.insert(suggestion.id.clone(), suggestion);
            }
            RecordWrite::Settings(settings) => {
                self.settings = settings;
            }
        }
        Ok(())
    }
}

/// Full replacement of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    Candidate(Candidate),
    Document(Document),
    ExtractedSubject(ExtractedSubject),
    Mapping(Mapping),
    TargetSubject(TargetSubject),
    Alias(Alias),
    Suggestion(AliasSuggestion),
    Settings(EngineSettings),
}

impl RecordWrite {
    pub fn key(&self) -> ChangedRecord {
        let (kind, id) = match self {
            RecordWrite::Candidate(record) => (RecordKind::Candidate, record.id.to_string()),
            RecordWrite::Document(record) => (RecordKind::Document, record.id.to_string()),
            RecordWrite::ExtractedSubject(record) => {
                (RecordKind::ExtractedSubject, record.id.to_string())
            }
            RecordWrite::Mapping(record) => (RecordKind::Mapping, record.id.to_string()),
            RecordWrite::TargetSubject(record) => (RecordKind::TargetSubject, record.code.clone()),
            RecordWrite::Alias(record) => (RecordKind::Alias, record.id.to_string()),
            RecordWrite::Suggestion(record) => {
                (RecordKind::AliasSuggestion, record.id.to_string())
            }
            RecordWrite::Settings(_) => (RecordKind::Settings, "engine".to_string()),
        };
        ChangedRecord { kind, id }
    }
}

/// Writes and their audit entries, computed against one snapshot and committed as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    base_version: u64,
    writes: Vec<RecordWrite>,
    audit: Vec<AuditDraft>,
}

impl ChangeSet {
    pub fn against(snapshot: &StoreSnapshot) -> Self {
        Self {
            base_version: snapshot.version,
            writes: Vec::new(),
            audit: Vec::new(),
        }
    }

    pub fn write(&mut self, write: RecordWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn audit(&mut self, draft: AuditDraft) -> &mut Self {
        self.audit.push(draft);
        self
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn writes(&self) -> &[RecordWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.audit.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangedRecord {
    pub kind: RecordKind,
    pub id: String,
}

/// Notification published after every successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEvent {
    pub version: u64,
    pub changes: Vec<ChangedRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub version: u64,
    pub changes: Vec<ChangedRecord>,
    pub audit: Vec<AuditLog>,
}

/// Storage abstraction: snapshot reads and atomic, version-checked change sets.
pub trait EquivalencyRepository: Send + Sync {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError>;
    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, RepositoryError>;
    /// Audit entries, newest first.
    fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
struct StoreState {
    snapshot: StoreSnapshot,
    audit: AuditTrail,
    /// Store version at which each record was last written.
    written_at: HashMap<ChangedRecord, u64>,
}

impl StoreState {
    /// First record in `keys` written after `base_version`, if any.
    fn stale_key<'a>(
        &self,
        keys: &'a [ChangedRecord],
        base_version: u64,
    ) -> Option<&'a ChangedRecord> {
        keys.iter().find(|key| {
            self.written_at
                .get(*key)
                .is_some_and(|&version| version > base_version)
        })
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<StoreState>,
}

impl InMemoryRepository {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            state: Mutex::new(StoreState {
                snapshot: StoreSnapshot::with_settings(settings),
                ..StoreState::default()
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl EquivalencyRepository for InMemoryRepository {
    fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(self.lock()?.snapshot.clone())
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, RepositoryError> {
        let mut state = self.lock()?;
        let keys: Vec<ChangedRecord> = changes.writes.iter().map(RecordWrite::key).collect();
        if changes.base_version > state.snapshot.version {
            return Err(RepositoryError::Conflict(format!(
                "change set computed against version {} but store is at {}",
                changes.base_version, state.snapshot.version
            )));
        }
        // Stale change sets still commit when none of their records moved since the base.
        if let Some(key) = state.stale_key(&keys, changes.base_version) {
            return Err(RepositoryError::Conflict(format!(
                "{} '{}' changed after version {} (store is at {})",
                key.kind, key.id, changes.base_version, state.snapshot.version
            )));
        }

        let mut next = state.snapshot.clone();
        for write in changes.writes {
            next.apply(write)?;
        }
        next.version += 1;
        let version = next.version;
        state.snapshot = next;
        for key in &keys {
            state.written_at.insert(key.clone(), version);
        }

        let audit = changes
            .audit
            .into_iter()
            .map(|draft| state.audit.record(draft))
            .collect();

        Ok(CommitReceipt {
            version: state.snapshot.version,
            changes: keys,
            audit,
        })
    }

    fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError> {
        Ok(self.lock()?.audit.newest_first())
    }
}

const EVENT_CAPACITY: usize = 256;

/// Repository plus the change notification channel shared by every engine component.
pub struct StoreHandle<R> {
    repository: Arc<R>,
    events: broadcast::Sender<StoreEvent>,
}

impl<R> Clone for StoreHandle<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            events: self.events.clone(),
        }
    }
}

impl<R: EquivalencyRepository> StoreHandle<R> {
    pub fn new(repository: Arc<R>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { repository, events }
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        self.repository.snapshot()
    }

    pub fn audit_log(&self) -> Result<Vec<AuditLog>, RepositoryError> {
        self.repository.audit_log()
    }

    pub fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, RepositoryError> {
        let receipt = self.repository.commit(changes)?;
        // No subscribers is not an error.
        let _ = self.events.send(StoreEvent {
            version: receipt.version,
            changes: receipt.changes.clone(),
        });
        Ok(receipt)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
