mod config;
mod db;
mod errors;
mod llm_client;
mod matching;
mod models;
mod pricing;
mod reference;
mod routes;
mod sources;
mod state;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::matcher::JobMatcher;
use crate::matching::reranker::{LlmReranker, Reranker};
use crate::matching::similarity::{EmbeddingSimilarity, LexicalSimilarity, SimilarityProvider};
use crate::pricing::aggregator::SourceAggregator;
use crate::pricing::engine::PricingEngine;
use crate::reference::loader::{load_from_db, load_from_file};
use crate::routes::build_router;
use crate::sources::applicant::ApplicantExpectationsConnector;
use crate::sources::internal_records::InternalRecordsConnector;
use crate::sources::job_library::JobLibraryConnector;
use crate::sources::noise::PrivacyNoise;
use crate::sources::postings::PostingsConnector;
use crate::sources::{SourceConnector, SourceKind};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing or invalid values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("payband_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Payband API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Reference data snapshot (read-only for the life of the process)
    let reference = Arc::new(match &config.reference_data_path {
        Some(path) => load_from_file(path)?,
        None => load_from_db(&db).await?,
    });

    let pricing = &config.pricing;

    // Similarity stage: remote embeddings when configured, lexical otherwise
    let similarity: Arc<dyn SimilarityProvider> = match &config.embedding_url {
        Some(url) => Arc::new(
            EmbeddingSimilarity::new(url.clone(), pricing.rerank_timeout)
                .context("Failed to build embedding client")?,
        ),
        None => Arc::new(LexicalSimilarity),
    };
    info!(provider = similarity.name(), "Similarity provider initialized");

    // Reasoning stage is optional; without it every match is embedding-only
    let reranker: Option<Arc<dyn Reranker>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), pricing.rerank_timeout)
                .context("Failed to build LLM client")?;
            info!("LLM reranker initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(LlmReranker::new(llm)))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; job matching runs similarity-only");
            None
        }
    };

    // Salary data sources
    let noise = PrivacyNoise::from_seed(config.privacy_noise_seed);
    let mut connectors: Vec<Arc<dyn SourceConnector>> = vec![
        Arc::new(JobLibraryConnector::new(db.clone())),
        Arc::new(InternalRecordsConnector::new(db.clone(), noise)),
        Arc::new(ApplicantExpectationsConnector::new(db.clone())),
    ];
    for (kind, url) in [
        (SourceKind::JobBoard, &config.job_board_url),
        (SourceKind::ReviewSite, &config.review_site_url),
    ] {
        if let Some(url) = url {
            let connector = PostingsConnector::new(kind, url, pricing.source_timeout)
                .with_context(|| format!("Failed to build {kind} connector"))?;
            connectors.push(Arc::new(connector));
        }
    }
    info!(sources = connectors.len(), "Source connectors registered");

    let matcher = JobMatcher::new(
        reference.clone(),
        similarity,
        reranker,
        pricing.matcher_settings(),
    );
    let aggregator =
        SourceAggregator::new(connectors, reference.clone(), pricing.aggregator_settings());
    let engine = PricingEngine::new(reference, matcher, aggregator, pricing.engine_settings());

    // Build app state
    let state = AppState {
        engine: Arc::new(engine),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
