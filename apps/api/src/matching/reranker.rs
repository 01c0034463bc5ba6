//! Reasoning stage of job matching: a pluggable re-ranker over the shortlist.
//!
//! Carried by the matcher as `Option<Arc<dyn Reranker>>`; `None` means every
//! match is embedding-only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;
use crate::matching::matcher::Candidate;
use crate::matching::prompts::{RERANK_PROMPT_TEMPLATE, RERANK_SYSTEM};

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("reasoning service unavailable: {0}")]
    Unavailable(String),

    #[error("reasoning service timed out after {0}ms")]
    Timeout(u64),

    #[error("reasoning service returned an unusable decision: {0}")]
    InvalidDecision(String),
}

/// The request-side signals the reasoning service sees alongside the shortlist.
#[derive(Debug, Clone, Serialize)]
pub struct RerankContext {
    pub job_title: String,
    pub job_description: String,
    pub organizational_grade: String,
    pub job_family: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub code: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankDecision {
    pub scores: Vec<CandidateScore>,
    pub justification: String,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        context: &RerankContext,
        candidates: &[Candidate],
    ) -> Result<RerankDecision, RerankError>;
}

/// Claude-backed re-ranker. One call per request; no retries.
pub struct LlmReranker {
    llm: LlmClient,
}

impl LlmReranker {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

pub fn build_rerank_prompt(
    context: &RerankContext,
    candidates: &[Candidate],
) -> Result<String, RerankError> {
    let job_json = serde_json::to_string_pretty(context)
        .map_err(|e| RerankError::InvalidDecision(format!("failed to serialize job: {e}")))?;
    let candidates_json = serde_json::to_string_pretty(candidates).map_err(|e| {
        RerankError::InvalidDecision(format!("failed to serialize shortlist: {e}"))
    })?;

    Ok(RERANK_PROMPT_TEMPLATE
        .replace("{job_json}", &job_json)
        .replace("{candidates_json}", &candidates_json))
}

pub fn rerank_system_prompt() -> String {
    format!("{RERANK_SYSTEM} {JSON_ONLY_SYSTEM}")
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        context: &RerankContext,
        candidates: &[Candidate],
    ) -> Result<RerankDecision, RerankError> {
        let prompt = build_rerank_prompt(context, candidates)?;
        let system = rerank_system_prompt();
        self.llm
            .call_json::<RerankDecision>(&prompt, &system)
            .await
            .map_err(|e| RerankError::Unavailable(e.to_string()))
    }
}
