use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::audit::{AuditAction, AuditDraft, AuditLog};
use super::catalog::Catalog;
use super::domain::{
    AliasSuggestion, Candidate, CandidateId, CandidateStatus, Document, ExtractedSubject,
    Mapping, SuggestionStatus,
};
use super::export::{self, ExportError, ExportKind};
use super::intake::Intake;
use super::mapping::MappingResolver;
use super::repository::{
    ChangeSet, EquivalencyRepository, RecordKind, RecordWrite, RepositoryError, StoreEvent,
    StoreHandle, StoreSnapshot,
};
use super::scoring::{ScoreBreakdown, ScoreReport, ScoringEngine, ScoringPolicy};
use super::settings::{
    EngineSettings, HotCacheSettings, SettingsError, ThresholdSettings, WeightSettings,
};
use super::suggestions::SuggestionQueue;

/// Facade composing the resolver, suggestion queue, catalog, intake and scoring over one
/// store.
pub struct EquivalencyService<R> {
    store: StoreHandle<R>,
    mappings: MappingResolver<R>,
    suggestions: SuggestionQueue<R>,
    catalog: Catalog<R>,
    intake: Intake<R>,
}

impl<R> EquivalencyService<R>
where
    R: EquivalencyRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        let store = StoreHandle::new(repository);
        Self {
            mappings: MappingResolver::new(store.clone()),
            suggestions: SuggestionQueue::new(store.clone()),
            catalog: Catalog::new(store.clone()),
            intake: Intake::new(store.clone()),
            store,
        }
    }

    pub fn mappings(&self) -> &MappingResolver<R> {
        &self.mappings
    }

    pub fn suggestions(&self) -> &SuggestionQueue<R> {
        &self.suggestions
    }

    pub fn catalog(&self) -> &Catalog<R> {
        &self.catalog
    }

    pub fn intake(&self) -> &Intake<R> {
        &self.intake
    }

    /// Change notifications for live views.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn candidates(
        &self,
        status: Option<CandidateStatus>,
    ) -> Result<Vec<Candidate>, ServiceError> {
        Ok(self
            .store
            .snapshot()?
            .candidates
            .into_values()
            .filter(|candidate| status.map_or(true, |wanted| candidate.status == wanted))
            .collect())
    }

    pub fn candidate(&self, id: &CandidateId) -> Result<Candidate, ServiceError> {
        self.store
            .snapshot()?
            .candidates
            .remove(id)
            .ok_or_else(|| ServiceError::not_found(RecordKind::Candidate, id))
    }

    pub fn documents_for_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<Document>, ServiceError> {
        let (snapshot, _) = self.candidate_snapshot(id)?;
        Ok(snapshot
            .documents_for_candidate(id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn extracted_subjects_for_candidate(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<ExtractedSubject>, ServiceError> {
        let (snapshot, _) = self.candidate_snapshot(id)?;
        Ok(snapshot
            .extracted_subjects_for_candidate(id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn mappings_for_candidate(&self, id: &CandidateId) -> Result<Vec<Mapping>, ServiceError> {
        let (snapshot, _) = self.candidate_snapshot(id)?;
        Ok(snapshot
            .mappings_for_candidate(id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn mappings_for_target(&self, code: &str) -> Result<Vec<Mapping>, ServiceError> {
        Ok(self
            .store
            .snapshot()?
            .mappings
            .into_values()
            .filter(|mapping| mapping.target_code() == Some(code))
            .collect())
    }

    pub fn alias_suggestions(
        &self,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<AliasSuggestion>, ServiceError> {
        Ok(self
            .store
            .snapshot()?
            .suggestions
            .into_values()
            .filter(|suggestion| status.map_or(true, |wanted| suggestion.status == wanted))
            .collect())
    }

    /// Audit entries, newest first.
    pub fn audit_log(&self) -> Result<Vec<AuditLog>, ServiceError> {
        Ok(self.store.audit_log()?)
    }

    pub fn settings(&self) -> Result<EngineSettings, ServiceError> {
        Ok(self.store.snapshot()?.settings)
    }

    /// Pure score of the candidate's current mappings.
    pub fn score_report(&self, id: &CandidateId) -> Result<ScoreReport, ServiceError> {
        let (snapshot, _) = self.candidate_snapshot(id)?;
        Ok(score_candidate(&snapshot, id))
    }

    pub fn breakdown_for_candidate(&self, id: &CandidateId) -> Result<ScoreBreakdown, ServiceError> {
        Ok(self.score_report(id)?.breakdown)
    }

    /// Recompute and cache the score on the candidate record. Safe to repeat.
    pub fn refresh_candidate_score(
        &self,
        id: &CandidateId,
        actor: &str,
    ) -> Result<ScoreBreakdown, ServiceError> {
        let (snapshot, mut candidate) = self.candidate_snapshot(id)?;
        let breakdown = score_candidate(&snapshot, id).breakdown;

        candidate.overall_score = breakdown.persisted_score();
        candidate.equivalency_percent = breakdown.persisted_percent();

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::Candidate(candidate))
            .audit(
                AuditDraft::new(actor, AuditAction::UpdateScores, RecordKind::Candidate, id.as_str())
                    .after(&breakdown),
            );
        self.store.commit(changes)?;

        info!(
            candidate_id = %id,
            overall_score = breakdown.overall_score,
            equivalency_percent = breakdown.equivalency_percent,
            "candidate score refreshed"
        );
        Ok(breakdown)
    }

    pub fn update_candidate_status(
        &self,
        id: &CandidateId,
        status: CandidateStatus,
        actor: &str,
    ) -> Result<Candidate, ServiceError> {
        let (snapshot, before) = self.candidate_snapshot(id)?;
        let mut after = before.clone();
        after.status = status;

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::Candidate(after.clone()))
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::UpdateCandidateStatus,
                    RecordKind::Candidate,
                    id.as_str(),
                )
                .before(&serde_json::json!({ "status": before.status }))
                .after(&serde_json::json!({ "status": status })),
            );
        self.store.commit(changes)?;

        info!(candidate_id = %id, status = status.label(), actor, "candidate status updated");
        Ok(after)
    }

    pub fn update_thresholds(
        &self,
        thresholds: ThresholdSettings,
        actor: &str,
    ) -> Result<ThresholdSettings, ServiceError> {
        self.replace_settings(
            actor,
            AuditAction::UpdateThresholds,
            "thresholds",
            &thresholds,
            |settings| std::mem::replace(&mut settings.thresholds, thresholds.clone()),
        )?;
        Ok(thresholds)
    }

    pub fn update_weights(
        &self,
        weights: WeightSettings,
        actor: &str,
    ) -> Result<WeightSettings, ServiceError> {
        self.replace_settings(
            actor,
            AuditAction::UpdateWeights,
            "weights",
            &weights,
            |settings| std::mem::replace(&mut settings.weights, weights.clone()),
        )?;
        Ok(weights)
    }

    pub fn update_hot_cache(
        &self,
        hot_cache: HotCacheSettings,
        actor: &str,
    ) -> Result<HotCacheSettings, ServiceError> {
        self.replace_settings(
            actor,
            AuditAction::UpdateHotCache,
            "hot_cache",
            &hot_cache,
            |settings| std::mem::replace(&mut settings.hot_cache, hot_cache.clone()),
        )?;
        Ok(hot_cache)
    }

    /// Render one collection as `;`-delimited CSV from the current state.
    pub fn export_csv(&self, kind: ExportKind) -> Result<Vec<u8>, ExportError> {
        let mut buffer = Vec::new();
        let rows = match kind {
            ExportKind::Candidates => {
                export::write_csv(&mut buffer, &export::candidate_rows(&self.store.snapshot()?))?
            }
            ExportKind::Mappings => {
                export::write_csv(&mut buffer, &export::mapping_rows(&self.store.snapshot()?))?
            }
            ExportKind::Catalog => {
                export::write_csv(&mut buffer, &export::catalog_rows(&self.store.snapshot()?))?
            }
            ExportKind::Audit => {
                export::write_csv(&mut buffer, &export::audit_rows(&self.store.audit_log()?))?
            }
        };
        debug!(kind = kind.label(), rows, "csv export rendered");
        Ok(buffer)
    }

    fn candidate_snapshot(
        &self,
        id: &CandidateId,
    ) -> Result<(StoreSnapshot, Candidate), ServiceError> {
        let snapshot = self.store.snapshot()?;
        let candidate = snapshot
            .candidates
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(RecordKind::Candidate, id))?;
        Ok((snapshot, candidate))
    }

    fn replace_settings<T: Serialize>(
        &self,
        actor: &str,
        action: AuditAction,
        entity_id: &str,
        value: &T,
        replace: impl FnOnce(&mut EngineSettings) -> T,
    ) -> Result<(), ServiceError> {
        let snapshot = self.store.snapshot()?;
        let mut settings = snapshot.settings.clone();
        let previous = replace(&mut settings);

        let mut changes = ChangeSet::against(&snapshot);
        changes.write(RecordWrite::Settings(settings)).audit(
            AuditDraft::new(actor, action, RecordKind::Settings, entity_id)
                .before(&previous)
                .after(value),
        );
        self.store.commit(changes)?;

        info!(setting = entity_id, actor, "engine settings replaced");
        Ok(())
    }
}

fn score_candidate(snapshot: &StoreSnapshot, id: &CandidateId) -> ScoreReport {
    let subjects: Vec<ExtractedSubject> = snapshot
        .extracted_subjects_for_candidate(id)
        .into_iter()
        .cloned()
        .collect();
    let mappings: Vec<Mapping> = snapshot
        .mappings_for_candidate(id)
        .into_iter()
        .cloned()
        .collect();
    let targets: Vec<_> = snapshot.target_subjects.values().cloned().collect();

    ScoringEngine::new(ScoringPolicy::from_weights(&snapshot.settings.weights))
        .report(&subjects, &mappings, &targets)
}

/// Error raised by the engine's commands and queries.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: String },
    #[error("alias suggestion '{id}' is already {status}")]
    InvalidTransition { id: String, status: SuggestionStatus },
    #[error("target subject '{0}' already exists")]
    DuplicateTarget(String),
    #[error(transparent)]
    Invalid(#[from] SettingsError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub fn not_found(kind: RecordKind, id: impl Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
