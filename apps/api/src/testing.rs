//! Deterministic collaborator fakes shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::matching::matcher::{Candidate, JobMatcher, MatcherSettings};
use crate::matching::reranker::{
    CandidateScore, RerankContext, RerankDecision, RerankError, Reranker,
};
use crate::matching::similarity::{SimilarityError, SimilarityProvider};
use crate::models::pricing::{EmploymentType, PricingRequest, SourceStatus};
use crate::pricing::aggregator::{AggregatorSettings, SourceAggregator, SourceContribution};
use crate::pricing::engine::{EngineSettings, PricingEngine};
use crate::pricing::normalizer::NormalizedObservation;
use crate::reference::fixtures;
use crate::sources::{
    MatchLevel, ObservedPercentiles, PayPeriod, SourceConnector, SourceError, SourceKind,
    SourceObservation, SourceRequest,
};

/// Scores a candidate by the first needle found in its reference text.
pub struct FixedSimilarity(pub Vec<(&'static str, f64)>);

#[async_trait]
impl SimilarityProvider for FixedSimilarity {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn similarity(&self, _a: &str, b: &str) -> Result<f64, SimilarityError> {
        Ok(self
            .0
            .iter()
            .find(|(needle, _)| b.contains(needle))
            .map(|(_, s)| *s)
            .unwrap_or(0.0))
    }
}

/// Never answers within any realistic deadline.
pub struct StalledSimilarity;

#[async_trait]
impl SimilarityProvider for StalledSimilarity {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, SimilarityError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(0.0)
    }
}

pub enum Script {
    Decide(Vec<(&'static str, f64)>),
    Fail,
    Hang,
}

pub struct ScriptedReranker(pub Script);

#[async_trait]
impl Reranker for ScriptedReranker {
    async fn rerank(
        &self,
        _context: &RerankContext,
        _candidates: &[Candidate],
    ) -> Result<RerankDecision, RerankError> {
        match &self.0 {
            Script::Decide(scores) => Ok(RerankDecision {
                scores: scores
                    .iter()
                    .map(|(code, confidence)| CandidateScore {
                        code: code.to_string(),
                        confidence: *confidence,
                    })
                    .collect(),
                justification: "scripted".to_string(),
            }),
            Script::Fail => Err(RerankError::Unavailable("down".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RerankError::Unavailable("unreachable".to_string()))
            }
        }
    }
}

pub enum Behavior {
    /// Answers queries at the listed match levels only.
    Data(Vec<(MatchLevel, SourceObservation)>),
    Fail,
    Hang,
}

pub struct StaticConnector {
    pub kind: SourceKind,
    pub free_text: bool,
    pub behavior: Behavior,
    pub calls: AtomicUsize,
}

impl StaticConnector {
    pub fn new(kind: SourceKind, free_text: bool, behavior: Behavior) -> Self {
        Self {
            kind,
            free_text,
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceConnector for StaticConnector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn supports_free_text(&self) -> bool {
        self.free_text
    }

    async fn query(
        &self,
        request: &SourceRequest,
    ) -> Result<Option<SourceObservation>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Data(levels) => Ok(levels
                .iter()
                .find(|(level, _)| *level == request.query.match_level())
                .map(|(_, obs)| obs.clone())),
            Behavior::Fail => Err(SourceError::Unavailable("connection refused".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// Annual USD national observation, fresh relative to `as_of()`.
pub fn observation(p: [Option<f64>; 5], sample_size: u32) -> SourceObservation {
    SourceObservation {
        percentiles: ObservedPercentiles::from_points(p),
        sample_size,
        observation_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        currency: "USD".to_string(),
        period: PayPeriod::Annual,
        location: None,
    }
}

pub fn median_only(p50: f64, sample_size: u32) -> SourceObservation {
    observation([None, None, Some(p50), None, None], sample_size)
}

pub fn full(base: f64, sample_size: u32) -> SourceObservation {
    observation(
        [
            Some(base * 0.75),
            Some(base * 0.85),
            Some(base),
            Some(base * 1.15),
            Some(base * 1.3),
        ],
        sample_size,
    )
}

pub fn request() -> PricingRequest {
    PricingRequest {
        job_title: "Senior Data Engineer".to_string(),
        job_description: "Own our streaming data pipelines".to_string(),
        location: "Austin, TX".to_string(),
        organizational_grade: "G7".to_string(),
        employment_type: EmploymentType::FullTime,
        skills: vec!["pipelines".to_string(), "rust".to_string()],
        job_family: Some("eng-data".to_string()),
    }
}

/// Engine over the fixture reference data with scripted collaborators.
pub fn pricing_engine(
    similarity: Vec<(&'static str, f64)>,
    script: Script,
    connectors: Vec<StaticConnector>,
) -> PricingEngine {
    let reference = Arc::new(fixtures::reference());
    let matcher = JobMatcher::new(
        reference.clone(),
        Arc::new(FixedSimilarity(similarity)),
        Some(Arc::new(ScriptedReranker(script)) as Arc<dyn Reranker>),
        MatcherSettings::default(),
    );
    let aggregator = SourceAggregator::new(
        connectors
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn SourceConnector>)
            .collect(),
        reference.clone(),
        AggregatorSettings::default(),
    );
    PricingEngine::new(reference, matcher, aggregator, EngineSettings::default())
}

/// Usable, already-normalized contribution. The median falls back to 1.0
/// when `points` carries neither p50 nor both quartiles.
pub fn contribution(
    points: [Option<f64>; 5],
    sample_size: u32,
    quality_score: f64,
    raw_weight: f64,
) -> SourceContribution {
    let percentiles = ObservedPercentiles::from_points(points);
    SourceContribution {
        name: "source".to_string(),
        kind: SourceKind::JobBoard,
        status: SourceStatus::Used,
        observation: Some(NormalizedObservation {
            median: percentiles.median().unwrap_or(1.0),
            percentiles,
            sample_size,
            observation_date: as_of(),
            original_currency: "USD".to_string(),
            original_period: PayPeriod::Annual,
            conversion_factor: 1.0,
        }),
        match_level: None,
        quality_score,
        recency_factor: 1.0,
        base_weight: raw_weight,
        raw_weight,
        weight: raw_weight,
    }
}
