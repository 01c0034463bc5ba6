//! Request and result types for the pricing API.
//!
//! `PricingRequest` is immutable once accepted; `PricingResult` is built once per
//! request by the output composer and never mutated afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::PricingError;
use crate::sources::{MatchLevel, PayPeriod, SourceKind};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

// ────────────────────────────────────────────────────────────────────────────
// Request
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    Contract,
    PartTime,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::Contract => "contract",
            EmploymentType::PartTime => "part-time",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub job_title: String,
    pub job_description: String,
    pub location: String,
    pub organizational_grade: String,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Optional taxonomy-family hint used as a matching signal.
    #[serde(default)]
    pub job_family: Option<String>,
}

impl PricingRequest {
    /// Rejects malformed requests before any processing happens.
    pub fn validate(&self) -> Result<(), PricingError> {
        let title_len = self.job_title.trim().chars().count();
        if title_len == 0 {
            return Err(PricingError::Validation("job_title cannot be empty".to_string()));
        }
        if title_len > MAX_TITLE_CHARS {
            return Err(PricingError::Validation(format!(
                "job_title must be at most {MAX_TITLE_CHARS} characters (got {title_len})"
            )));
        }

        let description_len = self.job_description.trim().chars().count();
        if description_len == 0 {
            return Err(PricingError::Validation(
                "job_description cannot be empty".to_string(),
            ));
        }
        if self.job_description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(PricingError::Validation(format!(
                "job_description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        if self.location.trim().is_empty() {
            return Err(PricingError::Validation("location cannot be empty".to_string()));
        }
        if self.organizational_grade.trim().is_empty() {
            return Err(PricingError::Validation(
                "organizational_grade cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Title and description joined, as compared against taxonomy reference text.
    pub fn match_text(&self) -> String {
        format!("{}\n{}", self.job_title.trim(), self.job_description.trim())
    }

    /// Declared skills with blanks removed.
    pub fn clean_skills(&self) -> Vec<String> {
        self.skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result
// ────────────────────────────────────────────────────────────────────────────

/// Combined market distribution. Always ordered p10 ≤ p25 ≤ p50 ≤ p75 ≤ p90.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileSet {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

impl PercentileSet {
    pub fn is_ordered(&self) -> bool {
        self.p10 <= self.p25 && self.p25 <= self.p50 && self.p50 <= self.p75 && self.p75 <= self.p90
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedRange {
    pub min: f64,
    pub max: f64,
    pub target: f64,
    pub clamped_to_grade: bool,
    pub widened: bool,
    pub grade: String,
    pub grade_min: f64,
    pub grade_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    /// 0 – 30
    pub job_match: f64,
    /// 0 – 30
    pub source_quality: f64,
    /// 0 – 20
    pub sample_size: f64,
    /// 0 – 20
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub factors: ConfidenceFactors,
    pub requires_manual_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Used,
    Unavailable { reason: String },
}

/// One source's line in the contribution breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub weight: f64,
    pub sample_size: Option<u32>,
    pub quality_score: f64,
    pub recency_factor: f64,
    pub observation_date: Option<NaiveDate>,
    pub match_level: Option<MatchLevel>,
    pub original_currency: Option<String>,
    pub original_period: Option<PayPeriod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    pub range: ScenarioRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Shortlisted by similarity and confirmed by the reasoning stage.
    Reasoned,
    /// Reasoning stage unavailable; top similarity candidate used. Lower trust.
    EmbeddingOnly,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub taxonomy_code: Option<String>,
    pub title: Option<String>,
    pub confidence: f64,
    pub method: MatchMethod,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResult {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub currency: String,
    pub period: String,
    pub recommended_range: RecommendedRange,
    pub percentiles: PercentileSet,
    pub confidence: ConfidenceReport,
    pub sources: Vec<SourceSummary>,
    pub alternative_scenarios: Vec<Scenario>,
    #[serde(rename = "match")]
    pub job_match: MatchSummary,
    pub warnings: Vec<String>,
}
