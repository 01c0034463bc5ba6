// Multi-source pricing: aggregate sources, combine percentiles, score confidence,
// compose the result. Stage-sequential per request; the aggregator fans out.

pub mod aggregator;
pub mod composer;
pub mod confidence;
pub mod engine;
pub mod handlers;
pub mod normalizer;
pub mod percentiles;
pub mod quality;

use thiserror::Error;

use crate::models::pricing::SourceSummary;

/// Failures that make a pricing result meaningless. Everything else is
/// absorbed with a weight or confidence penalty.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("{0}")]
    Validation(String),

    #[error("insufficient data: no source returned usable salary data")]
    InsufficientData { sources: Vec<SourceSummary> },
}
