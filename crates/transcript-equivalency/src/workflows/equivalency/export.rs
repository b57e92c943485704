//! Flat CSV projections of the store for offline review.
//!
//! Files use `;` as the delimiter. Fields are quoted only when they contain the delimiter, a
//! quote or a line break, with embedded quotes doubled.

use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::audit::AuditLog;
use super::repository::{RepositoryError, StoreSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Candidates,
    Mappings,
    Catalog,
    Audit,
}

impl ExportKind {
    pub const fn label(self) -> &'static str {
        match self {
            ExportKind::Candidates => "candidates",
            ExportKind::Mappings => "mappings",
            ExportKind::Catalog => "catalog",
            ExportKind::Audit => "audit",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.csv", self.label())
    }
}

impl FromStr for ExportKind {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "candidates" => Ok(ExportKind::Candidates),
            "mappings" => Ok(ExportKind::Mappings),
            "catalog" => Ok(ExportKind::Catalog),
            "audit" => Ok(ExportKind::Audit),
            other => Err(ExportError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unknown export '{0}'")]
    UnknownKind(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub school: String,
    pub track: String,
    pub country: String,
    pub status: &'static str,
    pub overall_score: f64,
    pub equivalency_percent: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRow {
    pub mapping_id: String,
    pub candidate_id: String,
    pub raw_label: String,
    pub normalized_grade: f64,
    pub target_subject_code: String,
    pub method: &'static str,
    pub confidence: f64,
    pub overridden_by_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRow {
    pub code: String,
    pub title_fr: String,
    pub title_en: String,
    pub category: String,
    pub level: String,
    pub coefficient: f64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub at: String,
    pub actor: String,
    pub action: &'static str,
    pub entity: &'static str,
    pub entity_id: String,
    pub after: String,
}

pub fn candidate_rows(snapshot: &StoreSnapshot) -> Vec<CandidateRow> {
    snapshot
        .candidates
        .values()
        .map(|candidate| CandidateRow {
            id: candidate.id.to_string(),
            name: candidate.name.clone(),
            email: candidate.email.clone(),
            school: candidate.school.clone(),
            track: candidate.track.clone(),
            country: candidate.country.clone(),
            status: candidate.status.label(),
            overall_score: candidate.overall_score,
            equivalency_percent: candidate.equivalency_percent,
            created_at: candidate.created_at.to_rfc3339(),
        })
        .collect()
}

/// One row per mapping, joined to its line-item and owning candidate.
pub fn mapping_rows(snapshot: &StoreSnapshot) -> Vec<MappingRow> {
    snapshot
        .candidates
        .keys()
        .flat_map(|candidate_id| {
            snapshot
                .mappings_for_candidate(candidate_id)
                .into_iter()
                .filter_map(move |mapping| {
                    let subject = snapshot.extracted_subjects.get(&mapping.extracted_subject_id)?;
                    Some(MappingRow {
                        mapping_id: mapping.id.to_string(),
                        candidate_id: candidate_id.to_string(),
                        raw_label: subject.raw_label.clone(),
                        normalized_grade: subject.normalized_grade(),
                        target_subject_code: mapping.target_subject_code.clone().unwrap_or_default(),
                        method: mapping.method.label(),
                        confidence: mapping.confidence,
                        overridden_by_admin: mapping.overridden_by_admin,
                    })
                })
        })
        .collect()
}

pub fn catalog_rows(snapshot: &StoreSnapshot) -> Vec<CatalogRow> {
    snapshot
        .target_subjects
        .values()
        .map(|target| CatalogRow {
            code: target.code.clone(),
            title_fr: target.title_fr.clone(),
            title_en: target.title_en.clone().unwrap_or_default(),
            category: target.category.clone(),
            level: target.level.clone().unwrap_or_default(),
            coefficient: target.coefficient,
            active: target.active,
        })
        .collect()
}

pub fn audit_rows(entries: &[AuditLog]) -> Vec<AuditRow> {
    entries
        .iter()
        .map(|entry| AuditRow {
            at: entry.at.to_rfc3339(),
            actor: entry.actor.clone(),
            action: entry.action.label(),
            entity: entry.entity.label(),
            entity_id: entry.entity_id.clone(),
            after: entry
                .after
                .as_ref()
                .map_or_else(|| "{}".to_string(), |value| value.to_string()),
        })
        .collect()
}

/// Write a header and one record per row. An empty slice writes nothing.
pub fn write_csv<W, T>(writer: W, rows: &[T]) -> Result<usize, ExportError>
where
    W: io::Write,
    T: Serialize,
{
    if rows.is_empty() {
        return Ok(0);
    }

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}
