use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::grading::normalize_grade;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of an admissions candidate.
    CandidateId
);
string_id!(
    /// Identifier of an uploaded transcript document.
    DocumentId
);
string_id!(
    /// Identifier of a transcript line-item produced by extraction.
    ExtractedSubjectId
);
string_id!(MappingId);
string_id!(SuggestionId);
string_id!(AliasId);
string_id!(AuditLogId);

/// Admissions lifecycle of a candidate. Candidates are never deleted, only rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    AutoEvaluated,
    Validated,
    Rejected,
}

impl CandidateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::AutoEvaluated => "auto_evaluated",
            CandidateStatus::Validated => "validated",
            CandidateStatus::Rejected => "rejected",
        }
    }
}

/// Candidate record. `overall_score` and `equivalency_percent` are cached projections written
/// only by score refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub email: String,
    pub school: String,
    pub track: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub equivalency_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Jpeg,
    Png,
}

/// Uploaded artifact. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub candidate_id: CandidateId,
    pub filename: String,
    pub kind: DocumentKind,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub preview_url: String,
}

/// One transcript line-item. Re-extraction produces new records instead of mutating these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSubject {
    pub id: ExtractedSubjectId,
    pub document_id: DocumentId,
    pub raw_label: String,
    pub normalized_label: String,
    pub raw_grade: f64,
    /// Denominator of the origin grading scale, e.g. 20 or 100.
    pub scale: f64,
    pub year: i32,
    /// Weight assigned by the origin institution, when the transcript states one.
    #[serde(default)]
    pub source_coefficient: Option<f64>,
}

impl ExtractedSubject {
    pub fn normalized_grade(&self) -> f64 {
        normalize_grade(self.raw_grade, self.scale)
    }
}

/// Canonical catalog entry keyed by `code`. Inactive entries stay referenceable by history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSubject {
    pub code: String,
    pub title_fr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub coefficient: f64,
    pub active: bool,
}

/// How a mapping proposal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    Exact,
    Fuzzy,
    Llm,
}

impl MappingMethod {
    pub const fn label(self) -> &'static str {
        match self {
            MappingMethod::Exact => "exact",
            MappingMethod::Fuzzy => "fuzzy",
            MappingMethod::Llm => "llm",
        }
    }
}

/// Association between one extracted line-item and at most one target subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: MappingId,
    pub extracted_subject_id: ExtractedSubjectId,
    #[serde(default)]
    pub target_subject_code: Option<String>,
    pub method: MappingMethod,
    pub confidence: f64,
    pub auto: bool,
    /// Set by the first human mutation and never cleared afterwards.
    #[serde(default)]
    pub overridden_by_admin: bool,
}

impl Mapping {
    /// Assigned target code, ignoring blank assignments.
    pub fn target_code(&self) -> Option<&str> {
        self.target_subject_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }

    /// Mappings with a target assignment contribute to scoring.
    pub fn is_accepted(&self) -> bool {
        self.target_code().is_some()
    }
}

/// Trims a target code; a blank one means "no target".
pub fn normalize_target_code(code: Option<String>) -> Option<String> {
    code.map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionLanguage {
    Fr,
    En,
    Es,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasLanguage {
    Fr,
    En,
}

impl From<SuggestionLanguage> for AliasLanguage {
    fn from(value: SuggestionLanguage) -> Self {
        match value {
            SuggestionLanguage::En => AliasLanguage::En,
            SuggestionLanguage::Fr | SuggestionLanguage::Es => AliasLanguage::Fr,
        }
    }
}

/// Review state of an externally proposed alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
    Snoozed,
}

impl SuggestionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
            SuggestionStatus::Snoozed => "snoozed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasSuggestion {
    pub id: SuggestionId,
    pub raw_label: String,
    pub normalized_label: String,
    pub language: SuggestionLanguage,
    pub target_subject_code: String,
    pub confidence: f64,
    pub status: SuggestionStatus,
    #[serde(default)]
    pub occurrences: u32,
    pub created_at: DateTime<Utc>,
}

/// Permanent label to target association. There is no update or delete path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: AliasId,
    pub target_subject_code: String,
    pub label: String,
    pub normalized_label: String,
    pub language: AliasLanguage,
}

impl Alias {
    pub fn from_suggestion(id: AliasId, suggestion: &AliasSuggestion) -> Self {
        Self {
            id,
            target_subject_code: suggestion.target_subject_code.clone(),
            label: suggestion.raw_label.clone(),
            normalized_label: suggestion.normalized_label.clone(),
            language: suggestion.language.into(),
        }
    }
}
