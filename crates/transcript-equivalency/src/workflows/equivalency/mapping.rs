//! Target assignment and confidence-threshold review of mappings.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::audit::{AuditAction, AuditDraft};
use super::domain::{normalize_target_code, CandidateId, Mapping, MappingId};
use super::repository::{
    ChangeSet, EquivalencyRepository, RecordKind, RecordWrite, StoreHandle, StoreSnapshot,
};
use super::service::ServiceError;

/// Mappings touched by a batch review, in candidate order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchOutcome {
    pub affected: Vec<MappingId>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.affected.len()
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchRule {
    AcceptAtOrAbove,
    RejectBelow,
}

impl BatchRule {
    fn selects(self, confidence: f64, threshold: f64) -> bool {
        match self {
            BatchRule::AcceptAtOrAbove => confidence >= threshold,
            BatchRule::RejectBelow => confidence < threshold,
        }
    }

    fn action(self) -> AuditAction {
        match self {
            BatchRule::AcceptAtOrAbove => AuditAction::AcceptThreshold,
            BatchRule::RejectBelow => AuditAction::RejectThreshold,
        }
    }

    fn apply(self, mapping: &Mapping) -> Mapping {
        let mut updated = mapping.clone();
        if matches!(self, BatchRule::RejectBelow) {
            updated.target_subject_code = None;
        }
        updated.overridden_by_admin = true;
        updated
    }
}

/// Maintains the association between extracted line-items and catalog codes.
pub struct MappingResolver<R> {
    store: StoreHandle<R>,
}

impl<R: EquivalencyRepository> MappingResolver<R> {
    pub fn new(store: StoreHandle<R>) -> Self {
        Self { store }
    }

    /// Reassign (or clear) the target of one mapping. Always marks the mapping as overridden.
    pub fn set_target(
        &self,
        mapping_id: &MappingId,
        code: Option<String>,
        actor: &str,
    ) -> Result<Mapping, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let before = find_mapping(&snapshot, mapping_id)?;
        let code = normalize_target_code(code);

        if let Some(code) = code.as_deref() {
            if !snapshot.target_subjects.contains_key(code) {
                warn!(%mapping_id, code, "assigning mapping to a code missing from the catalog");
            }
        }

        let mut after = before.clone();
        after.target_subject_code = code;
        after.overridden_by_admin = true;

        self.commit_single(&snapshot, before, after, actor)
    }

    /// Confirm the current assignment without changing it.
    pub fn confirm(&self, mapping_id: &MappingId, actor: &str) -> Result<Mapping, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let before = find_mapping(&snapshot, mapping_id)?;
        let mut after = before.clone();
        after.overridden_by_admin = true;

        self.commit_single(&snapshot, before, after, actor)
    }

    /// Mark every mapping of the candidate with `confidence >= threshold` as reviewed.
    pub fn accept_by_threshold(
        &self,
        candidate_id: &CandidateId,
        threshold: f64,
        actor: &str,
    ) -> Result<BatchOutcome, ServiceError> {
        self.batch(candidate_id, threshold, actor, BatchRule::AcceptAtOrAbove)
    }

    /// Clear the target of every mapping of the candidate with `confidence < threshold`.
    pub fn reject_below_threshold(
        &self,
        candidate_id: &CandidateId,
        threshold: f64,
        actor: &str,
    ) -> Result<BatchOutcome, ServiceError> {
        self.batch(candidate_id, threshold, actor, BatchRule::RejectBelow)
    }

    fn batch(
        &self,
        candidate_id: &CandidateId,
        threshold: f64,
        actor: &str,
        rule: BatchRule,
    ) -> Result<BatchOutcome, ServiceError> {
        // The affected set is fixed by this one snapshot.
        let snapshot = self.store.snapshot()?;
        if !snapshot.candidates.contains_key(candidate_id) {
            return Err(ServiceError::not_found(RecordKind::Candidate, candidate_id));
        }

        let mut changes = ChangeSet::against(&snapshot);
        let mut outcome = BatchOutcome::default();
        for mapping in snapshot.mappings_for_candidate(candidate_id) {
            if !rule.selects(mapping.confidence, threshold) {
                continue;
            }
            let updated = rule.apply(mapping);
            changes
                .audit(
                    AuditDraft::new(actor, rule.action(), RecordKind::Mapping, mapping.id.as_str())
                        .before(mapping)
                        .after(&updated),
                )
                .write(RecordWrite::Mapping(updated));
            outcome.affected.push(mapping.id.clone());
        }

        if outcome.is_empty() {
            debug!(%candidate_id, threshold, ?rule, "no mappings qualified for batch review");
            return Ok(outcome);
        }

        self.store.commit(changes)?;
        info!(
            %candidate_id,
            threshold,
            actor,
            affected = outcome.len(),
            action = rule.action().label(),
            "batch mapping review applied"
        );
        Ok(outcome)
    }

    fn commit_single(
        &self,
        snapshot: &StoreSnapshot,
        before: &Mapping,
        after: Mapping,
        actor: &str,
    ) -> Result<Mapping, ServiceError> {
        let mut changes = ChangeSet::against(snapshot);
        changes
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::UpdateMapping,
                    RecordKind::Mapping,
                    before.id.as_str(),
                )
                .before(before)
                .after(&after),
            )
            .write(RecordWrite::Mapping(after.clone()));
        self.store.commit(changes)?;

        info!(
            mapping_id = %after.id,
            target = after.target_subject_code.as_deref().unwrap_or("-"),
            actor,
            "mapping updated by admin"
        );
        Ok(after)
    }
}

fn find_mapping<'a>(
    snapshot: &'a StoreSnapshot,
    mapping_id: &MappingId,
) -> Result<&'a Mapping, ServiceError> {
    snapshot
        .mappings
        .get(mapping_id)
        .ok_or_else(|| ServiceError::not_found(RecordKind::Mapping, mapping_id))
}
