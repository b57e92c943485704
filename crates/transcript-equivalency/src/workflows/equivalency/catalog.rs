use serde::{Deserialize, Serialize};
use tracing::info;

use super::audit::{AuditAction, AuditDraft};
use super::domain::{Alias, TargetSubject};
use super::grading::normalize_label;
use super::repository::{ChangeSet, EquivalencyRepository, RecordKind, RecordWrite, StoreHandle};
use super::service::ServiceError;

/// Partial update of a catalog entry. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSubjectPatch {
    pub title_fr: Option<String>,
    pub title_en: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub coefficient: Option<f64>,
    pub active: Option<bool>,
}

impl TargetSubjectPatch {
    fn apply_to(&self, target: &mut TargetSubject) {
        if let Some(title) = &self.title_fr {
            target.title_fr = title.clone();
        }
        if let Some(title) = &self.title_en {
            target.title_en = Some(title.clone());
        }
        if let Some(category) = &self.category {
            target.category = category.clone();
        }
        if let Some(level) = &self.level {
            target.level = Some(level.clone());
        }
        if let Some(coefficient) = self.coefficient {
            target.coefficient = coefficient;
        }
        if let Some(active) = self.active {
            target.active = active;
        }
    }
}

/// Canonical subject catalog and its permanent aliases.
pub struct Catalog<R> {
    store: StoreHandle<R>,
}

impl<R: EquivalencyRepository> Catalog<R> {
    pub fn new(store: StoreHandle<R>) -> Self {
        Self { store }
    }

    pub fn target_subjects(&self) -> Result<Vec<TargetSubject>, ServiceError> {
        Ok(self.store.snapshot()?.target_subjects.into_values().collect())
    }

    /// Entries eligible for new automatic matching.
    pub fn active_target_subjects(&self) -> Result<Vec<TargetSubject>, ServiceError> {
        Ok(self
            .target_subjects()?
            .into_iter()
            .filter(|target| target.active)
            .collect())
    }

    pub fn target_subject(&self, code: &str) -> Result<TargetSubject, ServiceError> {
        self.store
            .snapshot()?
            .target_subjects
            .remove(code)
            .ok_or_else(|| ServiceError::not_found(RecordKind::TargetSubject, code))
    }

    pub fn add_target_subject(
        &self,
        target: TargetSubject,
        actor: &str,
    ) -> Result<TargetSubject, ServiceError> {
        let snapshot = self.store.snapshot()?;
        if snapshot.target_subjects.contains_key(&target.code) {
            return Err(ServiceError::DuplicateTarget(target.code));
        }

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::TargetSubject(target.clone()))
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::CreateTargetSubject,
                    RecordKind::TargetSubject,
                    target.code.as_str(),
                )
                .after(&target),
            );
        self.store.commit(changes)?;

        info!(code = %target.code, actor, "catalog entry created");
        Ok(target)
    }

    /// Apply `patch` to an existing entry. Setting `active = false` is the soft delete.
    pub fn update_target_subject(
        &self,
        code: &str,
        patch: &TargetSubjectPatch,
        actor: &str,
    ) -> Result<TargetSubject, ServiceError> {
        let snapshot = self.store.snapshot()?;
        let before = snapshot
            .target_subjects
            .get(code)
            .ok_or_else(|| ServiceError::not_found(RecordKind::TargetSubject, code))?;
        let mut after = before.clone();
        patch.apply_to(&mut after);

        let mut changes = ChangeSet::against(&snapshot);
        changes
            .write(RecordWrite::TargetSubject(after.clone()))
            .audit(
                AuditDraft::new(
                    actor,
                    AuditAction::UpdateTargetSubject,
                    RecordKind::TargetSubject,
                    code,
                )
                .before(before)
                .after(&after),
            );
        self.store.commit(changes)?;

        info!(code, active = after.active, actor, "catalog entry updated");
        Ok(after)
    }

    pub fn aliases_for_target(&self, code: &str) -> Result<Vec<Alias>, ServiceError> {
        Ok(self
            .store
            .snapshot()?
            .aliases
            .into_values()
            .filter(|alias| alias.target_subject_code == code)
            .collect())
    }

    /// Alias whose normalized label matches `label`, restricted to active targets.
    pub fn find_alias(&self, label: &str) -> Result<Option<Alias>, ServiceError> {
        let wanted = normalize_label(label);
        let snapshot = self.store.snapshot()?;
        Ok(snapshot
            .aliases
            .values()
            .filter(|alias| {
                snapshot
                    .target_subjects
                    .get(&alias.target_subject_code)
                    .is_some_and(|target| target.active)
            })
            .find(|alias| {
                normalize_label(&alias.normalized_label) == wanted
                    || normalize_label(&alias.label) == wanted
            })
            .cloned())
    }
}
