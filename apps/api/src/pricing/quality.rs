//! Per-source quality and recency scoring. Pure functions, no I/O.

use chrono::NaiveDate;

use crate::sources::MatchLevel;

const DAYS_PER_MONTH: f64 = 30.44;
/// Observations this young get full recency weight.
const RECENCY_FULL_MONTHS: f64 = 3.0;
/// e-folding time of the decay after the full-weight window. At 18 months the
/// factor is e^-3 ≈ 0.05.
const RECENCY_DECAY_MONTHS: f64 = 5.0;
/// Sample size at which the sample score reaches 1 - 1/e.
const SAMPLE_SCALE: f64 = 40.0;

const SPECIFICITY_WEIGHT: f64 = 0.40;
const SAMPLE_WEIGHT: f64 = 0.35;
const RECENCY_WEIGHT: f64 = 0.25;

/// Exact code > family > broad.
pub fn specificity_score(level: MatchLevel) -> f64 {
    match level {
        MatchLevel::ExactCode => 1.0,
        MatchLevel::Family => 0.7,
        MatchLevel::Broad => 0.4,
    }
}

/// 0 for no observations, rising toward 1 with diminishing returns.
pub fn sample_size_score(sample_size: u32) -> f64 {
    1.0 - (-(sample_size as f64) / SAMPLE_SCALE).exp()
}

/// Age of an observation in months, never negative.
pub fn age_months(observed: NaiveDate, as_of: NaiveDate) -> f64 {
    ((as_of - observed).num_days().max(0) as f64) / DAYS_PER_MONTH
}

/// 1.0 within three months, then exponential decay.
pub fn recency_factor(observed: NaiveDate, as_of: NaiveDate) -> f64 {
    let age = age_months(observed, as_of);
    if age <= RECENCY_FULL_MONTHS {
        return 1.0;
    }
    (-(age - RECENCY_FULL_MONTHS) / RECENCY_DECAY_MONTHS).exp()
}

/// Quality in [0, 1] from match specificity, sample size and recency.
pub fn quality_score(level: MatchLevel, sample_size: u32, recency: f64) -> f64 {
    (SPECIFICITY_WEIGHT * specificity_score(level)
        + SAMPLE_WEIGHT * sample_size_score(sample_size)
        + RECENCY_WEIGHT * recency.clamp(0.0, 1.0))
    .clamp(0.0, 1.0)
}

/// Un-normalized weight: base × quality × recency.
pub fn raw_weight(base_weight: f64, quality: f64, recency: f64) -> f64 {
    (base_weight.max(0.0) * quality.clamp(0.0, 1.0) * recency.clamp(0.0, 1.0)).max(0.0)
}
