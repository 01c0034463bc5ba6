//! Source connectors: one adapter per salary data source.
//!
//! Every connector answers the same question: "what does your data say this job
//! pays in this location?" It returns raw percentiles in the source's own
//! currency and pay period; normalization happens in the pricing layer.

pub mod applicant;
pub mod internal_records;
pub mod job_library;
pub mod noise;
pub mod postings;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::pricing::EmploymentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    JobLibrary,
    JobBoard,
    ReviewSite,
    InternalRecords,
    ApplicantExpectations,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::JobLibrary,
        SourceKind::JobBoard,
        SourceKind::ReviewSite,
        SourceKind::InternalRecords,
        SourceKind::ApplicantExpectations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::JobLibrary => "job_library",
            SourceKind::JobBoard => "job_board",
            SourceKind::ReviewSite => "review_site",
            SourceKind::InternalRecords => "internal_records",
            SourceKind::ApplicantExpectations => "applicant_expectations",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayPeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl PayPeriod {
    /// Multiplier that converts one period's pay into annual pay.
    pub fn annualization_factor(&self) -> f64 {
        match self {
            PayPeriod::Hourly => 2080.0,
            PayPeriod::Daily => 260.0,
            PayPeriod::Weekly => 52.0,
            PayPeriod::Monthly => 12.0,
            PayPeriod::Annual => 1.0,
        }
    }
}

impl FromStr for PayPeriod {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" | "hour" => Ok(PayPeriod::Hourly),
            "daily" | "day" => Ok(PayPeriod::Daily),
            "weekly" | "week" => Ok(PayPeriod::Weekly),
            "monthly" | "month" => Ok(PayPeriod::Monthly),
            "annual" | "annually" | "yearly" | "year" => Ok(PayPeriod::Annual),
            other => Err(SourceError::Malformed(format!("unknown pay period '{other}'"))),
        }
    }
}

/// How precisely a source's data matched the requested job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    ExactCode,
    Family,
    Broad,
}

/// Percentiles as reported by a source. Any point may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedPercentiles {
    #[serde(default)]
    pub p10: Option<f64>,
    #[serde(default)]
    pub p25: Option<f64>,
    #[serde(default)]
    pub p50: Option<f64>,
    #[serde(default)]
    pub p75: Option<f64>,
    #[serde(default)]
    pub p90: Option<f64>,
}

impl ObservedPercentiles {
    /// The source's own median: p50, else the p25/p75 midpoint.
    pub fn median(&self) -> Option<f64> {
        self.p50.or(match (self.p25, self.p75) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            _ => None,
        })
    }

    pub fn points(&self) -> [Option<f64>; 5] {
        [self.p10, self.p25, self.p50, self.p75, self.p90]
    }

    pub fn from_points(points: [Option<f64>; 5]) -> Self {
        let [p10, p25, p50, p75, p90] = points;
        Self {
            p10,
            p25,
            p50,
            p75,
            p90,
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::from_points(self.points().map(|p| p.map(&f)))
    }
}

/// One source's answer for one request. Ephemeral; never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObservation {
    #[serde(flatten)]
    pub percentiles: ObservedPercentiles,
    pub sample_size: u32,
    pub observation_date: NaiveDate,
    pub currency: String,
    pub period: PayPeriod,
    /// Location the data describes. `None` means national data.
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    Code(String),
    Family(String),
    FreeText(String),
}

impl SourceQuery {
    pub fn match_level(&self) -> MatchLevel {
        match self {
            SourceQuery::Code(_) => MatchLevel::ExactCode,
            SourceQuery::Family(_) => MatchLevel::Family,
            SourceQuery::FreeText(_) => MatchLevel::Broad,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceRequest {
    pub query: SourceQuery,
    pub location: String,
    pub employment_type: EmploymentType,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed observation: {0}")]
    Malformed(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A salary data source. Implementations must be cheap to call concurrently.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Whether the source can answer without a taxonomy code.
    fn supports_free_text(&self) -> bool;

    /// `Ok(None)` means the source has no data for this query.
    async fn query(&self, request: &SourceRequest)
        -> Result<Option<SourceObservation>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_prefers_p50() {
        let p = ObservedPercentiles {
            p25: Some(40.0),
            p50: Some(55.0),
            p75: Some(60.0),
            ..Default::default()
        };
        assert_eq!(p.median(), Some(55.0));
    }

    #[test]
    fn test_median_falls_back_to_interquartile_midpoint() {
        let p = ObservedPercentiles {
            p25: Some(40.0),
            p75: Some(60.0),
            ..Default::default()
        };
        assert_eq!(p.median(), Some(50.0));
        assert_eq!(ObservedPercentiles::default().median(), None);
    }

    #[test]
    fn test_pay_period_parse() {
        assert_eq!("Hourly".parse::<PayPeriod>().unwrap(), PayPeriod::Hourly);
        assert_eq!("yearly".parse::<PayPeriod>().unwrap(), PayPeriod::Annual);
        assert!("fortnightly".parse::<PayPeriod>().is_err());
    }

    #[test]
    fn test_observation_deserializes_flat_percentiles() {
        let json = r#"{
            "p25": 90000, "p50": 100000, "p75": 115000,
            "sample_size": 42,
            "observation_date": "2026-08-01",
            "currency": "USD",
            "period": "annual"
        }"#;
        let obs: SourceObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.percentiles.p50, Some(100_000.0));
        assert_eq!(obs.percentiles.p10, None);
        assert_eq!(obs.sample_size, 42);
        assert!(obs.location.is_none());
    }

    #[test]
    fn test_query_match_levels() {
        assert_eq!(SourceQuery::Code("X".into()).match_level(), MatchLevel::ExactCode);
        assert_eq!(SourceQuery::Family("X".into()).match_level(), MatchLevel::Family);
        assert_eq!(SourceQuery::FreeText("X".into()).match_level(), MatchLevel::Broad);
    }
}
