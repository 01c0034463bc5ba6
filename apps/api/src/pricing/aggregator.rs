//! Source Aggregator: fans out to every connector concurrently, walks each
//! connector's query fallback chain under a per-source timeout, normalizes and
//! scores what comes back, and renormalizes the weights of usable sources.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::pricing::{EmploymentType, SourceStatus, SourceSummary};
use crate::models::taxonomy::StandardizedJob;
use crate::pricing::normalizer::{NormalizedObservation, Normalizer};
use crate::pricing::quality::{quality_score, raw_weight, recency_factor};
use crate::pricing::PricingError;
use crate::reference::ReferenceData;
use crate::sources::{
    MatchLevel, SourceConnector, SourceError, SourceKind, SourceObservation, SourceQuery,
    SourceRequest,
};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ────────────────────────────────────────────────────────────
// Base weights
// ────────────────────────────────────────────────────────────

/// Configured reliability weight per source kind. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseWeights(BTreeMap<SourceKind, f64>);

impl Default for BaseWeights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (SourceKind::JobLibrary, 0.30),
            (SourceKind::InternalRecords, 0.25),
            (SourceKind::JobBoard, 0.20),
            (SourceKind::ReviewSite, 0.15),
            (SourceKind::ApplicantExpectations, 0.10),
        ]))
    }
}

impl BaseWeights {
    pub fn get(&self, kind: SourceKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, kind: SourceKind, weight: f64) {
        self.0.insert(kind, weight);
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some((kind, w)) = self.0.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(format!("base weight for {kind} must be a non-negative number, got {w}"));
        }
        let total: f64 = self.0.values().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(format!("base weights must sum to 1.0, got {total:.6}"));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────
// Contributions
// ────────────────────────────────────────────────────────────

/// One source's part in a pricing run, usable or not.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    pub name: String,
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub observation: Option<NormalizedObservation>,
    pub match_level: Option<MatchLevel>,
    pub quality_score: f64,
    pub recency_factor: f64,
    pub base_weight: f64,
    pub raw_weight: f64,
    /// Renormalized weight; 0 for unusable sources.
    pub weight: f64,
}

impl SourceContribution {
    fn unavailable(
        name: &str,
        kind: SourceKind,
        base_weight: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: SourceStatus::Unavailable {
                reason: reason.into(),
            },
            observation: None,
            match_level: None,
            quality_score: 0.0,
            recency_factor: 0.0,
            base_weight,
            raw_weight: 0.0,
            weight: 0.0,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, SourceStatus::Used) && self.observation.is_some()
    }

    pub fn summary(&self) -> SourceSummary {
        let obs = self.observation.as_ref();
        SourceSummary {
            name: self.name.clone(),
            kind: self.kind,
            status: self.status.clone(),
            weight: self.weight,
            sample_size: obs.map(|o| o.sample_size),
            quality_score: self.quality_score,
            recency_factor: self.recency_factor,
            observation_date: obs.map(|o| o.observation_date),
            match_level: self.match_level,
            original_currency: obs.map(|o| o.original_currency.clone()),
            original_period: obs.map(|o| o.original_period),
        }
    }
}

/// Usable contributions only.
pub fn usable(contributions: &[SourceContribution]) -> impl Iterator<Item = &SourceContribution> {
    contributions.iter().filter(|c| c.is_usable())
}

/// Scales raw weights of usable sources to sum to 1.0. Returns the raw total;
/// a zero total leaves every weight at 0.
pub fn renormalize(contributions: &mut [SourceContribution]) -> f64 {
    let total: f64 = contributions
        .iter()
        .filter(|c| c.is_usable())
        .map(|c| c.raw_weight)
        .sum();
    for c in contributions.iter_mut() {
        c.weight = if c.is_usable() && total > 0.0 {
            c.raw_weight / total
        } else {
            0.0
        };
    }
    total
}

/// Query fallback chain for one connector. With a taxonomy match: code, then
/// family, then free text where supported. Without one: free text only.
pub fn plan_queries(
    supports_free_text: bool,
    matched: Option<&StandardizedJob>,
    free_text: &str,
) -> Vec<SourceQuery> {
    let mut queries = Vec::new();
    if let Some(job) = matched {
        queries.push(SourceQuery::Code(job.code.clone()));
        if !job.family.trim().is_empty() {
            queries.push(SourceQuery::Family(job.family.clone()));
        }
    }
    let free_text = free_text.trim();
    if supports_free_text && !free_text.is_empty() {
        queries.push(SourceQuery::FreeText(free_text.to_string()));
    }
    queries
}

// ────────────────────────────────────────────────────────────
// Aggregator
// ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub base_weights: BaseWeights,
    pub source_timeout: Duration,
    pub target_currency: String,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            base_weights: BaseWeights::default(),
            source_timeout: Duration::from_millis(3000),
            target_currency: "USD".to_string(),
        }
    }
}

/// What the aggregator needs to know about the request.
pub struct AggregationInput<'a> {
    pub matched: Option<&'a StandardizedJob>,
    pub job_title: &'a str,
    pub location: &'a str,
    pub employment_type: EmploymentType,
    pub as_of: NaiveDate,
    pub deadline: Instant,
}

type SourceOutcome = Result<Option<(SourceObservation, MatchLevel)>, SourceError>;

pub struct SourceAggregator {
    connectors: Vec<Arc<dyn SourceConnector>>,
    reference: Arc<ReferenceData>,
    settings: AggregatorSettings,
}

impl SourceAggregator {
    pub fn new(
        connectors: Vec<Arc<dyn SourceConnector>>,
        reference: Arc<ReferenceData>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            connectors,
            reference,
            settings,
        }
    }

    /// Collects one contribution per connector, in connector order. Fails with
    /// `InsufficientData` when no source ends up with a positive weight.
    pub async fn aggregate(
        &self,
        input: &AggregationInput<'_>,
    ) -> Result<Vec<SourceContribution>, PricingError> {
        let plans: Vec<Vec<SourceQuery>> = self
            .connectors
            .iter()
            .map(|c| plan_queries(c.supports_free_text(), input.matched, input.job_title))
            .collect();

        let mut outcomes: Vec<Option<SourceOutcome>> =
            (0..self.connectors.len()).map(|_| None).collect();
        let mut pending: FuturesUnordered<_> = self
            .connectors
            .iter()
            .zip(&plans)
            .enumerate()
            .filter(|(_, (_, queries))| !queries.is_empty())
            .map(|(idx, (connector, queries))| async move {
                (idx, self.run_source(connector.as_ref(), queries, input).await)
            })
            .collect();

        loop {
            match tokio::time::timeout_at(input.deadline, pending.next()).await {
                Ok(Some((idx, outcome))) => outcomes[idx] = Some(outcome),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        in_flight = pending.len(),
                        "Request deadline reached; abandoning remaining source queries"
                    );
                    break;
                }
            }
        }
        drop(pending);

        let normalizer = Normalizer::new(
            self.reference.as_ref(),
            self.reference.as_ref(),
            &self.settings.target_currency,
        );

        let mut contributions: Vec<SourceContribution> = self
            .connectors
            .iter()
            .zip(plans.iter().zip(outcomes))
            .map(|(connector, (queries, outcome))| {
                let name = connector.name();
                let kind = connector.kind();
                let base = self.settings.base_weights.get(kind);
                if queries.is_empty() {
                    return SourceContribution::unavailable(
                        name,
                        kind,
                        base,
                        "requires a taxonomy match",
                    );
                }
                match outcome {
                    None => SourceContribution::unavailable(name, kind, base, "deadline exceeded"),
                    Some(Err(e)) => {
                        warn!(source = name, error = %e, "Source query failed");
                        SourceContribution::unavailable(name, kind, base, e.to_string())
                    }
                    Some(Ok(None)) => SourceContribution::unavailable(
                        name,
                        kind,
                        base,
                        "no data for this job and location",
                    ),
                    Some(Ok(Some((observation, level)))) => {
                        self.score(&normalizer, name, kind, base, &observation, level, input)
                    }
                }
            })
            .collect();

        let total = renormalize(&mut contributions);
        let used = usable(&contributions).count();
        info!(
            sources = contributions.len(),
            used,
            raw_weight_total = total,
            "Source aggregation complete"
        );

        if used == 0 || total <= 0.0 {
            return Err(PricingError::InsufficientData {
                sources: contributions.iter().map(SourceContribution::summary).collect(),
            });
        }
        Ok(contributions)
    }

    /// Walks the fallback chain; the whole chain shares one source timeout.
    async fn run_source(
        &self,
        connector: &dyn SourceConnector,
        queries: &[SourceQuery],
        input: &AggregationInput<'_>,
    ) -> SourceOutcome {
        let chain = async {
            for query in queries {
                let request = SourceRequest {
                    query: query.clone(),
                    location: input.location.to_string(),
                    employment_type: input.employment_type,
                };
                if let Some(observation) = connector.query(&request).await? {
                    debug!(
                        source = connector.name(),
                        level = ?query.match_level(),
                        "Source answered"
                    );
                    return Ok(Some((observation, query.match_level())));
                }
            }
            Ok(None)
        };

        match tokio::time::timeout(self.settings.source_timeout, chain).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SourceError::Timeout(self.settings.source_timeout.as_millis() as u64)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        normalizer: &Normalizer<'_>,
        name: &str,
        kind: SourceKind,
        base: f64,
        observation: &SourceObservation,
        level: MatchLevel,
        input: &AggregationInput<'_>,
    ) -> SourceContribution {
        let normalized = match normalizer.normalize(observation, input.location) {
            Ok(n) => n,
            Err(e) => {
                warn!(source = name, error = %e, "Discarding observation");
                return SourceContribution::unavailable(name, kind, base, e.to_string());
            }
        };

        let recency = recency_factor(normalized.observation_date, input.as_of);
        let quality = quality_score(level, normalized.sample_size, recency);
        let raw = raw_weight(base, quality, recency);

        let mut contribution = SourceContribution {
            name: name.to_string(),
            kind,
            status: SourceStatus::Used,
            observation: Some(normalized),
            match_level: Some(level),
            quality_score: quality,
            recency_factor: recency,
            base_weight: base,
            raw_weight: raw,
            weight: 0.0,
        };
        if raw <= 0.0 {
            contribution.status = SourceStatus::Unavailable {
                reason: "zero effective weight".to_string(),
            };
        }
        contribution
    }
}
