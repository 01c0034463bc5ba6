//! Confidence Scorer: 0–100 score from four independent factors.
//!
//! | factor         | max | driven by                                  |
//! |----------------|-----|--------------------------------------------|
//! | job_match      | 30  | match confidence, discounted without rerank |
//! | source_quality | 30  | mean quality score of usable sources        |
//! | sample_size    | 20  | total observations across usable sources    |
//! | consistency    | 20  | agreement between source medians            |

use crate::models::pricing::{
    ConfidenceFactors, ConfidenceLevel, ConfidenceReport, MatchMethod, MatchSummary,
};
use crate::pricing::aggregator::{usable, SourceContribution};

const JOB_MATCH_MAX: f64 = 30.0;
const SOURCE_QUALITY_MAX: f64 = 30.0;
const CONSISTENCY_MAX: f64 = 20.0;
/// Embedding-only matches never had a reasoned second opinion.
const EMBEDDING_ONLY_DISCOUNT: f64 = 0.8;
/// Coefficient of variation at which the consistency factor reaches zero.
const CV_CEILING: f64 = 0.3;

pub const HIGH_THRESHOLD: f64 = 80.0;
pub const MEDIUM_THRESHOLD: f64 = 60.0;

pub fn job_match_points(job_match: &MatchSummary) -> f64 {
    let confidence = job_match.confidence.clamp(0.0, 1.0);
    match job_match.method {
        MatchMethod::Reasoned => confidence * JOB_MATCH_MAX,
        MatchMethod::EmbeddingOnly => confidence * JOB_MATCH_MAX * EMBEDDING_ONLY_DISCOUNT,
        MatchMethod::None => 0.0,
    }
}

pub fn source_quality_points(contributions: &[SourceContribution]) -> f64 {
    let qualities: Vec<f64> = usable(contributions).map(|c| c.quality_score).collect();
    if qualities.is_empty() {
        return 0.0;
    }
    let mean = qualities.iter().sum::<f64>() / qualities.len() as f64;
    mean.clamp(0.0, 1.0) * SOURCE_QUALITY_MAX
}

/// Step function on the total sample size.
pub fn sample_size_points(total: u64) -> f64 {
    match total {
        n if n >= 100 => 20.0,
        n if n >= 50 => 15.0,
        n if n >= 20 => 10.0,
        _ => 5.0,
    }
}

/// Population coefficient of variation. `None` for fewer than two values or a
/// non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}

/// Full marks for identical medians, zero once CV reaches 0.3. A single
/// source has nothing to disagree with and gets half marks.
pub fn consistency_points(medians: &[f64]) -> f64 {
    match medians.len() {
        0 => 0.0,
        1 => CONSISTENCY_MAX / 2.0,
        _ => match coefficient_of_variation(medians) {
            Some(cv) => (CONSISTENCY_MAX * (1.0 - cv / CV_CEILING)).max(0.0),
            None => 0.0,
        },
    }
}

pub fn level_for(score: f64) -> ConfidenceLevel {
    if score >= HIGH_THRESHOLD {
        ConfidenceLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

pub fn score(job_match: &MatchSummary, contributions: &[SourceContribution]) -> ConfidenceReport {
    let total_sample: u64 = usable(contributions)
        .filter_map(|c| c.observation.as_ref())
        .map(|o| o.sample_size as u64)
        .sum();
    let medians: Vec<f64> = usable(contributions)
        .filter_map(|c| c.observation.as_ref())
        .map(|o| o.median)
        .collect();

    let factors = ConfidenceFactors {
        job_match: job_match_points(job_match),
        source_quality: source_quality_points(contributions),
        sample_size: sample_size_points(total_sample),
        consistency: consistency_points(&medians),
    };
    let raw =
        factors.job_match + factors.source_quality + factors.sample_size + factors.consistency;
    let score = (raw.clamp(0.0, 100.0) * 10.0).round() / 10.0;
    let level = level_for(score);

    ConfidenceReport {
        score,
        level,
        factors,
        requires_manual_review: level == ConfidenceLevel::Low,
    }
}
