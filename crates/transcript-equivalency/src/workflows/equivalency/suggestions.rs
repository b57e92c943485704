//! Review queue for externally proposed label-to-target aliases.
//!
//! `pending` is the only non-terminal state. Snoozed suggestions are not re-queued.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::audit::{AuditAction, AuditDraft};
use super::domain::{Alias, AliasId, AliasSuggestion, SuggestionId, SuggestionStatus};
use super::repository::{ChangeSet, EquivalencyRepository, RecordKind, RecordWrite, StoreHandle};
use super::service::ServiceError;

/// First free `alias-NNNNNN` id, counting up from the number of stored aliases.
fn next_alias_id(aliases: &BTreeMap<AliasId, Alias>) -> AliasId {
    let mut sequence = aliases.len() + 1;
    loop {
        let id = AliasId(format!("alias-{sequence:06}"));
        if !aliases.contains_key(&id) {
            return id;
        }
        sequence += 1;
    }
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approval {
    pub suggestion: AliasSuggestion,
    pub alias: Alias,
}

pub struct SuggestionQueue<R> {
    store: StoreHandle<R>,
}

impl<R: EquivalencyRepository> SuggestionQueue<R> {
    pub fn new(store: StoreHandle<R>) -> Self {
        Self { store }
    }

    /// Suggestions still awaiting review, highest confidence first.
    pub fn pending(&self) -> Result<Vec<AliasSuggestion>, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let mut pending: Vec<_> = snapshot
            .suggestions
            .into_values()
            .filter(|suggestion| suggestion.status == SuggestionStatus::Pending)
            .collect();
        pending.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(pending)
    }

    /// Promote a pending suggestion into a permanent alias.
    ///
    /// The alias and the status change commit in one change set, so a failed alias write
    /// leaves the suggestion pending.
    pub fn approve(&self, id: &SuggestionId, actor: &str) -> Result<Approval, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let current = pending_suggestion(&snapshot.suggestions, id)?;

        let alias = Alias::from_suggestion(next_alias_id(&snapshot.aliases), current);
        let mut approved = current.clone();
        approved.status = SuggestionStatus::Approved;

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::Alias(alias.clone()))
            .write(RecordWrite::Suggestion(approved.clone()))
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::ApproveAliasSuggestion,
                    RecordKind::AliasSuggestion,
                    id.as_str(),
                )
                .before(current)
                .after(&json!({ "suggestion": &approved, "alias": &alias })),
            );
        self.store.commit(changes)?;

        info!(
            suggestion_id = %id,
            alias_id = %alias.id,
            target = %alias.target_subject_code,
            actor,
            "alias suggestion approved"
        );
        Ok(Approval {
            suggestion: approved,
            alias,
        })
    }

    pub fn reject(&self, id: &SuggestionId, actor: &str) -> Result<AliasSuggestion, ServiceError> {
        self.transition(id, SuggestionStatus::Rejected, actor)
    }

    pub fn snooze(&self, id: &SuggestionId, actor: &str) -> Result<AliasSuggestion, ServiceError> {
        self.transition(id, SuggestionStatus::Snoozed, actor)
    }

    /// Approve every pending suggestion at or above `min_confidence`, one change set each.
    pub fn approve_confident(
        &self,
        min_confidence: f64,
        actor: &str,
    ) -> Result<Vec<Approval>, ServiceError> {
        let candidates: Vec<SuggestionId> = self
            .pending()?
            .into_iter()
            .filter(|suggestion| suggestion.confidence >= min_confidence)
            .map(|suggestion| suggestion.id)
            .collect();

        let mut approvals = Vec::with_capacity(candidates.len());
        for id in candidates {
            approvals.push(self.approve(&id, actor)?);
        }
        debug!(min_confidence, approved = approvals.len(), "bulk approval finished");
        Ok(approvals)
    }

    fn transition(
        &self,
        id: &SuggestionId,
        status: SuggestionStatus,
        actor: &str,
    ) -> Result<AliasSuggestion, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let current = pending_suggestion(&snapshot.suggestions, id)?;
        let mut updated = current.clone();
        updated.status = status;

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::Suggestion(updated.clone()))
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::UpdateAliasSuggestion,
                    RecordKind::AliasSuggestion,
                    id.as_str(),
                )
                .before(&json!({ "status": current.status }))
                .after(&json!({ "status": status })),
            );
        self.store.commit(changes)?;

        info!(suggestion_id = %id, status = status.label(), actor, "alias suggestion updated");
        Ok(updated)
    }
}

fn pending_suggestion<'a>(
    suggestions: &'a BTreeMap<SuggestionId, AliasSuggestion>,
    id: &SuggestionId,
) -> Result<&'a AliasSuggestion, ServiceError> {
    let suggestion = suggestions
        .get(id)
        .ok_or_else(|| ServiceError::not_found(RecordKind::AliasSuggestion, id))?;
    if suggestion.status.is_terminal() {
        return Err(ServiceError::InvalidTransition {
            id: id.to_string(),
            status: suggestion.status,
        });
    }
    Ok(suggestion)
}
