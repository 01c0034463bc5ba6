//! Pricing pipeline: validate → match → aggregate → combine → score → compose.
//! One request deadline bounds the match and aggregation stages together.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::matching::matcher::{JobMatcher, MatchOutcome};
use crate::models::pricing::{PricingRequest, PricingResult};
use crate::models::taxonomy::GradeBand;
use crate::pricing::aggregator::{AggregationInput, SourceAggregator};
use crate::pricing::composer::{compose, Composition};
use crate::pricing::percentiles::{combine, recommend, DEFAULT_MIN_SPREAD_RATIO};
use crate::pricing::{confidence, PricingError};
use crate::reference::{GradeBands, ReferenceData};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub request_deadline: Duration,
    pub min_spread_ratio: f64,
    pub target_currency: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_millis(10_000),
            min_spread_ratio: DEFAULT_MIN_SPREAD_RATIO,
            target_currency: "USD".to_string(),
        }
    }
}

pub struct PricingEngine {
    reference: Arc<ReferenceData>,
    matcher: JobMatcher,
    aggregator: SourceAggregator,
    settings: EngineSettings,
}

impl PricingEngine {
    pub fn new(
        reference: Arc<ReferenceData>,
        matcher: JobMatcher,
        aggregator: SourceAggregator,
        settings: EngineSettings,
    ) -> Self {
        Self {
            reference,
            matcher,
            aggregator,
            settings,
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    fn grade_band(&self, request: &PricingRequest) -> Result<GradeBand, PricingError> {
        let grade = request.organizational_grade.trim();
        self.reference.bounds(grade).ok_or_else(|| {
            PricingError::Validation(format!("unknown organizational grade '{grade}'"))
        })
    }

    /// Job matching on its own, under the same deadline a full pricing run gets.
    pub async fn match_job(&self, request: &PricingRequest) -> Result<MatchOutcome, PricingError> {
        request.validate()?;
        let band = self.grade_band(request)?;
        let deadline = Instant::now() + self.settings.request_deadline;
        Ok(self.matcher.match_job(request, &band, deadline).await)
    }

    /// Prices one job. `as_of` anchors recency scoring so identical inputs
    /// against an identical reference snapshot give identical results.
    pub async fn price(
        &self,
        request: &PricingRequest,
        as_of: NaiveDate,
    ) -> Result<PricingResult, PricingError> {
        request.validate()?;
        let band = self.grade_band(request)?;
        let deadline = Instant::now() + self.settings.request_deadline;

        let outcome = self.matcher.match_job(request, &band, deadline).await;
        let job_match = outcome.summary();

        let contributions = self
            .aggregator
            .aggregate(&AggregationInput {
                matched: outcome.matched().map(|m| &m.job),
                job_title: &request.job_title,
                location: request.location.trim(),
                employment_type: request.employment_type,
                as_of,
                deadline,
            })
            .await?;

        let percentiles = combine(&contributions).ok_or_else(|| PricingError::InsufficientData {
            sources: contributions.iter().map(|c| c.summary()).collect(),
        })?;
        let range = recommend(&percentiles, &band, self.settings.min_spread_ratio);
        let confidence = confidence::score(&job_match, &contributions);

        let result = compose(Composition {
            request_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            currency: &self.settings.target_currency,
            band: &band,
            job_match,
            contributions: &contributions,
            percentiles,
            range,
            confidence,
        });

        info!(
            request_id = %result.request_id,
            grade = %band.grade,
            code = result.job_match.taxonomy_code.as_deref().unwrap_or("-"),
            target = result.recommended_range.target,
            confidence = result.confidence.score,
            "Pricing complete"
        );
        Ok(result)
    }
}
