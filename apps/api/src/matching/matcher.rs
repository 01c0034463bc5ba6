//! Job Matcher: two-stage mapping from a free-text job to a taxonomy entry.
//!
//! Algorithm:
//! 1. Shortlist: similarity of the request text against every entry's reference
//!    text; keep the top-K above the similarity floor. Empty → no match.
//! 2. Reasoning: hand the shortlist plus structured signals to the re-ranker,
//!    bounded by its timeout. If it is missing, fails, times out or returns no
//!    usable score, fall back to the top shortlist entry (`EmbeddingOnly`).
//! 3. A final confidence below the hard floor is "no match", never a weak match.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::matching::reranker::{RerankContext, RerankDecision, RerankError, Reranker};
use crate::matching::similarity::{tokenize, SimilarityProvider};
use crate::models::pricing::{MatchMethod, MatchSummary, PricingRequest};
use crate::models::taxonomy::{GradeBand, StandardizedJob};
use crate::reference::ReferenceData;

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub top_k: usize,
    pub similarity_floor: f64,
    pub confidence_floor: f64,
    pub rerank_timeout: Duration,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_floor: 0.5,
            confidence_floor: 0.55,
            rerank_timeout: Duration::from_secs(8),
        }
    }
}

/// A shortlisted taxonomy entry with the signals handed to the reasoning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub code: String,
    pub title: String,
    pub family: String,
    pub description: String,
    pub similarity: f64,
    pub grade_alignment: f64,
    pub family_match: bool,
    pub skills_overlap: f64,
    #[serde(skip)]
    pub reference_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMatchResult {
    pub job: StandardizedJob,
    pub similarity: f64,
    pub confidence: f64,
    pub method: MatchMethod,
    pub justification: String,
    pub shortlist: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(JobMatchResult),
    NoMatch {
        best_confidence: f64,
        reason: String,
        shortlist: Vec<Candidate>,
    },
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&JobMatchResult> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            MatchOutcome::NoMatch { .. } => None,
        }
    }

    pub fn shortlist(&self) -> &[Candidate] {
        match self {
            MatchOutcome::Matched(m) => &m.shortlist,
            MatchOutcome::NoMatch { shortlist, .. } => shortlist,
        }
    }

    pub fn summary(&self) -> MatchSummary {
        match self {
            MatchOutcome::Matched(m) => MatchSummary {
                taxonomy_code: Some(m.job.code.clone()),
                title: Some(m.job.title.clone()),
                confidence: m.confidence,
                method: m.method,
                justification: m.justification.clone(),
            },
            MatchOutcome::NoMatch {
                best_confidence,
                reason,
                ..
            } => MatchSummary {
                taxonomy_code: None,
                title: None,
                confidence: *best_confidence,
                method: MatchMethod::None,
                justification: reason.clone(),
            },
        }
    }
}

pub struct JobMatcher {
    reference: Arc<ReferenceData>,
    similarity: Arc<dyn SimilarityProvider>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: MatcherSettings,
}

impl JobMatcher {
    pub fn new(
        reference: Arc<ReferenceData>,
        similarity: Arc<dyn SimilarityProvider>,
        reranker: Option<Arc<dyn Reranker>>,
        settings: MatcherSettings,
    ) -> Self {
        Self {
            reference,
            similarity,
            reranker,
            settings,
        }
    }

    /// Maps the request to zero-or-one taxonomy entry. Never fails: collaborator
    /// errors degrade to the fallback path or to `NoMatch`.
    pub async fn match_job(
        &self,
        request: &PricingRequest,
        band: &GradeBand,
        deadline: Instant,
    ) -> MatchOutcome {
        let shortlisting = tokio::time::timeout_at(deadline, self.shortlist(request, band));
        let shortlist = match shortlisting.await {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                warn!(provider = self.similarity.name(), error = %e, "Similarity provider failed");
                return MatchOutcome::NoMatch {
                    best_confidence: 0.0,
                    reason: format!("similarity provider failed: {e}"),
                    shortlist: vec![],
                };
            }
            Err(_) => {
                warn!(
                    provider = self.similarity.name(),
                    "Similarity stage hit the request deadline"
                );
                return MatchOutcome::NoMatch {
                    best_confidence: 0.0,
                    reason: "similarity provider did not answer before the request deadline".into(),
                    shortlist: vec![],
                };
            }
        };

        if shortlist.is_empty() {
            return MatchOutcome::NoMatch {
                best_confidence: 0.0,
                reason: format!(
                    "no taxonomy entry reached the similarity floor of {:.2}",
                    self.settings.similarity_floor
                ),
                shortlist,
            };
        }
        let top = &shortlist[0];

        let (index, confidence, method, justification) =
            match self.reason(request, &shortlist, deadline).await {
                Ok((index, confidence, justification)) => {
                    (index, confidence, MatchMethod::Reasoned, justification)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Reasoning stage unavailable, falling back to top similarity candidate"
                    );
                    (
                        0,
                        top.similarity,
                        MatchMethod::EmbeddingOnly,
                        format!(
                            "Embedding-only match: '{}' had the highest similarity ({:.2}); reasoning stage unavailable ({e}).",
                            top.title, top.similarity
                        ),
                    )
                }
            };

        let chosen = &shortlist[index];
        if confidence < self.settings.confidence_floor {
            info!(
                code = %chosen.code,
                confidence,
                floor = self.settings.confidence_floor,
                "Best match below confidence floor, treating as no match"
            );
            return MatchOutcome::NoMatch {
                best_confidence: confidence,
                reason: format!(
                    "best candidate '{}' scored {:.2}, below the {:.2} match floor",
                    chosen.title, confidence, self.settings.confidence_floor
                ),
                shortlist,
            };
        }

        let Some(job) = self.reference.job(&chosen.code).cloned() else {
            return MatchOutcome::NoMatch {
                best_confidence: confidence,
                reason: format!("taxonomy entry {} disappeared from reference data", chosen.code),
                shortlist,
            };
        };

        info!(code = %job.code, confidence, method = ?method, "Job matched");
        MatchOutcome::Matched(JobMatchResult {
            job,
            similarity: chosen.similarity,
            confidence,
            method,
            justification,
            shortlist,
        })
    }

    /// Stage 1: top-K candidates above the similarity floor, best first.
    async fn shortlist(
        &self,
        request: &PricingRequest,
        band: &GradeBand,
    ) -> Result<Vec<Candidate>, crate::matching::similarity::SimilarityError> {
        let taxonomy = self.reference.taxonomy();
        let texts: Vec<String> = taxonomy.iter().map(StandardizedJob::reference_text).collect();
        let scores = self
            .similarity
            .similarity_batch(&request.match_text(), &texts)
            .await?;

        let skills = request.clean_skills();
        let mut candidates: Vec<Candidate> = taxonomy
            .iter()
            .zip(texts.iter())
            .zip(scores)
            .filter(|(_, score)| score.is_finite() && *score >= self.settings.similarity_floor)
            .map(|((job, text), score)| Candidate {
                code: job.code.clone(),
                title: job.title.clone(),
                family: job.family.clone(),
                description: job.description.clone(),
                similarity: score.clamp(0.0, 1.0),
                grade_alignment: grade_alignment(job.position_class, band.position_class),
                family_match: request
                    .job_family
                    .as_deref()
                    .map(|hint| hint.trim().eq_ignore_ascii_case(&job.family))
                    .unwrap_or(false),
                skills_overlap: skills_overlap(&skills, text),
                reference_len: job.description.chars().count(),
            })
            .collect();

        candidates.sort_by(compare_candidates);
        candidates.truncate(self.settings.top_k.max(1));
        Ok(candidates)
    }

    /// Stage 2: one bounded call to the re-ranker. Returns the shortlist index,
    /// confidence and justification of the chosen candidate.
    async fn reason(
        &self,
        request: &PricingRequest,
        shortlist: &[Candidate],
        deadline: Instant,
    ) -> Result<(usize, f64, String), RerankError> {
        let reranker = self
            .reranker
            .as_ref()
            .ok_or_else(|| RerankError::Unavailable("no reasoning service configured".into()))?;

        let context = RerankContext {
            job_title: request.job_title.trim().to_string(),
            job_description: request.job_description.trim().to_string(),
            organizational_grade: request.organizational_grade.trim().to_string(),
            job_family: request.job_family.clone(),
            skills: request.clean_skills(),
        };

        let budget_end = deadline.min(Instant::now() + self.settings.rerank_timeout);
        let decision =
            match tokio::time::timeout_at(budget_end, reranker.rerank(&context, shortlist)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(RerankError::Timeout(
                        self.settings.rerank_timeout.as_millis() as u64,
                    ))
                }
            };

        let (index, confidence) = select_decision(&decision, shortlist)?;
        Ok((index, confidence, decision.justification))
    }
}

/// Highest reasoning confidence among shortlisted codes. Ties go to better
/// grade alignment, then the longer (more specific) reference description,
/// then the lexically smaller code.
pub fn select_decision(
    decision: &RerankDecision,
    shortlist: &[Candidate],
) -> Result<(usize, f64), RerankError> {
    let mut best: Option<(usize, f64)> = None;
    for score in &decision.scores {
        if !score.confidence.is_finite() {
            continue;
        }
        let Some(index) = shortlist
            .iter()
            .position(|c| c.code.eq_ignore_ascii_case(score.code.trim()))
        else {
            continue;
        };
        let confidence = score.confidence.clamp(0.0, 1.0);

        best = match best {
            None => Some((index, confidence)),
            Some((best_index, best_conf)) => {
                let ordering = confidence.total_cmp(&best_conf).then_with(|| {
                    compare_tiebreak(&shortlist[best_index], &shortlist[index])
                });
                if ordering == Ordering::Greater {
                    Some((index, confidence))
                } else {
                    Some((best_index, best_conf))
                }
            }
        };
    }

    best.ok_or_else(|| {
        RerankError::InvalidDecision("no score referenced a shortlisted code".to_string())
    })
}

/// Sort order for the shortlist: best candidate first.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| compare_tiebreak(a, b))
}

/// `Less` when `a` should rank ahead of `b` on the non-score tie-breakers.
fn compare_tiebreak(a: &Candidate, b: &Candidate) -> Ordering {
    b.grade_alignment
        .total_cmp(&a.grade_alignment)
        .then_with(|| b.reference_len.cmp(&a.reference_len))
        .then_with(|| a.code.cmp(&b.code))
}

/// 1.0 when the entry's position class equals the grade's, decaying with distance.
pub fn grade_alignment(job_class: i32, grade_class: i32) -> f64 {
    1.0 / (1.0 + (job_class - grade_class).abs() as f64)
}

/// Fraction of declared skills whose tokens all appear in the reference text.
pub fn skills_overlap(skills: &[String], reference_text: &str) -> f64 {
    if skills.is_empty() {
        return 0.0;
    }
    let reference: BTreeSet<String> = tokenize(reference_text).into_iter().collect();
    let covered = skills
        .iter()
        .filter(|skill| {
            let tokens = tokenize(skill);
            !tokens.is_empty() && tokens.iter().all(|t| reference.contains(t))
        })
        .count();
    covered as f64 / skills.len() as f64
}
