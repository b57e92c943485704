//! Transcript equivalency: mapping resolution, alias review, scoring and the audit trail.
//!
//! Every admin mutation goes through [`EquivalencyService`] (or one of the components it
//! exposes) and commits its state change and audit entries as one [`repository::ChangeSet`].
//! Upstream suppliers feed records through [`intake::Intake`] without auditing.

pub mod audit;
pub mod catalog;
pub mod domain;
pub mod export;
pub mod grading;
pub mod intake;
pub mod mapping;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod settings;
pub mod suggestions;

#[cfg(test)]
mod tests;

pub use audit::{AuditAction, AuditLog};
pub use catalog::{Catalog, TargetSubjectPatch};
pub use domain::{
    Alias, AliasId, AliasLanguage, AliasSuggestion, Candidate, CandidateId, CandidateStatus,
    Document, DocumentId, DocumentKind, ExtractedSubject, ExtractedSubjectId, Mapping,
    MappingId, MappingMethod, SuggestionId, SuggestionLanguage, SuggestionStatus, TargetSubject,
};
pub use export::{ExportError, ExportKind};
pub use grading::{normalize_grade, normalize_label};
pub use intake::{Intake, MappingProposal};
pub use mapping::{BatchOutcome, MappingResolver};
pub use repository::{
    EquivalencyRepository, InMemoryRepository, RecordKind, RepositoryError, StoreEvent,
};
pub use router::equivalency_router;
pub use scoring::{calculate, ScoreBreakdown, ScoreReport, ScoringEngine, ScoringPolicy};
pub use service::{EquivalencyService, ServiceError};
pub use settings::{
    EngineSettings, HotCacheSettings, SettingsError, ThresholdSettings, WeightSettings,
};
pub use suggestions::{Approval, SuggestionQueue};
