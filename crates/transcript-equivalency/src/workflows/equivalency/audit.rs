//! Append-only record of every administrative mutation.
//!
//! Entries are drafted by the component performing a change and stamped by the store when the
//! change set commits, so an entry never exists without the state write it describes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::AuditLogId;
use super::repository::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    UpdateMapping,
    AcceptThreshold,
    RejectThreshold,
    UpdateScores,
    UpdateCandidateStatus,
    ApproveAliasSuggestion,
    UpdateAliasSuggestion,
    CreateTargetSubject,
    UpdateTargetSubject,
    UpdateThresholds,
    UpdateWeights,
    UpdateHotCache,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::UpdateMapping => "update_mapping",
            AuditAction::AcceptThreshold => "accept_threshold",
            AuditAction::RejectThreshold => "reject_threshold",
            AuditAction::UpdateScores => "update_scores",
            AuditAction::UpdateCandidateStatus => "update_candidate_status",
            AuditAction::ApproveAliasSuggestion => "approve_alias_suggestion",
            AuditAction::UpdateAliasSuggestion => "update_alias_suggestion",
            AuditAction::CreateTargetSubject => "create_target_subject",
            AuditAction::UpdateTargetSubject => "update_target_subject",
            AuditAction::UpdateThresholds => "update_thresholds",
            AuditAction::UpdateWeights => "update_weights",
            AuditAction::UpdateHotCache => "update_hot_cache",
        }
    }
}

/// Unstamped audit entry carried inside a change set.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub actor: String,
    pub action: AuditAction,
    pub entity: RecordKind,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditDraft {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        entity: RecordKind,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action,
            entity,
            entity_id: entity_id.into(),
            before: None,
            after: None,
        }
    }

    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub actor: String,
    pub action: AuditAction,
    pub entity: RecordKind,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    pub at: DateTime<Utc>,
}

/// Ordered log with strictly increasing timestamps.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    entries: Vec<AuditLog>,
    sequence: u64,
    last_at: Option<DateTime<Utc>>,
}

impl AuditTrail {
    pub fn record(&mut self, draft: AuditDraft) -> AuditLog {
        self.record_at(draft, Utc::now())
    }

    /// Stamp `draft` at `now`, nudged forward one microsecond past the previous entry when
    /// the clock has not advanced.
    pub fn record_at(&mut self, draft: AuditDraft, now: DateTime<Utc>) -> AuditLog {
        let at = match self.last_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.sequence += 1;
        self.last_at = Some(at);

        let entry = AuditLog {
            id: AuditLogId(format!("audit-{:06}", self.sequence)),
            actor: draft.actor,
            action: draft.action,
            entity: draft.entity,
            entity_id: draft.entity_id,
            before: draft.before,
            after: draft.after,
            at,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display order.
    pub fn newest_first(&self) -> Vec<AuditLog> {
        self.entries.iter().rev().cloned().collect()
    }
}
