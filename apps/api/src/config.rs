use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::matching::matcher::MatcherSettings;
use crate::pricing::aggregator::{AggregatorSettings, BaseWeights};
use crate::pricing::engine::EngineSettings;
use crate::pricing::percentiles::DEFAULT_MIN_SPREAD_RATIO;
use crate::sources::SourceKind;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or any knob is invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Absent: no reasoning stage, every match is embedding-only.
    pub anthropic_api_key: Option<String>,
    /// Absent: built-in lexical similarity.
    pub embedding_url: Option<String>,
    pub job_board_url: Option<String>,
    pub review_site_url: Option<String>,
    /// When set, reference data comes from this JSON file instead of Postgres.
    pub reference_data_path: Option<PathBuf>,
    pub privacy_noise_seed: Option<u64>,
    pub port: u16,
    pub rust_log: String,
    pub pricing: PricingConfig,
}

/// Tunable pricing knobs.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub top_k: usize,
    pub similarity_floor: f64,
    pub confidence_floor: f64,
    pub rerank_timeout: Duration,
    pub source_timeout: Duration,
    pub request_deadline: Duration,
    pub min_spread_ratio: f64,
    pub target_currency: String,
    pub base_weights: BaseWeights,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let matcher = MatcherSettings::default();
        Self {
            top_k: matcher.top_k,
            similarity_floor: matcher.similarity_floor,
            confidence_floor: matcher.confidence_floor,
            rerank_timeout: matcher.rerank_timeout,
            source_timeout: Duration::from_millis(3000),
            request_deadline: Duration::from_millis(10_000),
            min_spread_ratio: DEFAULT_MIN_SPREAD_RATIO,
            target_currency: "USD".to_string(),
            base_weights: BaseWeights::default(),
        }
    }
}

impl PricingConfig {
    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            top_k: self.top_k,
            similarity_floor: self.similarity_floor,
            confidence_floor: self.confidence_floor,
            rerank_timeout: self.rerank_timeout,
        }
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            base_weights: self.base_weights.clone(),
            source_timeout: self.source_timeout,
            target_currency: self.target_currency.clone(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            request_deadline: self.request_deadline,
            min_spread_ratio: self.min_spread_ratio,
            target_currency: self.target_currency.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            bail!("MATCH_TOP_K must be at least 1");
        }
        for (key, value) in [
            ("MATCH_SIMILARITY_FLOOR", self.similarity_floor),
            ("MATCH_CONFIDENCE_FLOOR", self.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{key} must be within [0, 1], got {value}");
            }
        }
        if !(self.min_spread_ratio.is_finite() && self.min_spread_ratio >= 0.0) {
            bail!("MIN_SPREAD_RATIO must be a non-negative number");
        }
        if self.target_currency.len() != 3 {
            bail!("TARGET_CURRENCY must be a 3-letter currency code");
        }
        if let Err(msg) = self.base_weights.validate() {
            bail!("{msg}");
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = PricingConfig::default();
        let mut base_weights = BaseWeights::default();
        for kind in SourceKind::ALL {
            let key = format!("WEIGHT_{}", kind.as_str().to_uppercase());
            base_weights.set(kind, parse_or(&get, &key, base_weights.get(kind))?);
        }

        let pricing = PricingConfig {
            top_k: parse_or(&get, "MATCH_TOP_K", defaults.top_k)?,
            similarity_floor: parse_or(&get, "MATCH_SIMILARITY_FLOOR", defaults.similarity_floor)?,
            confidence_floor: parse_or(&get, "MATCH_CONFIDENCE_FLOOR", defaults.confidence_floor)?,
            rerank_timeout: millis_or(&get, "RERANK_TIMEOUT_MS", defaults.rerank_timeout)?,
            source_timeout: millis_or(&get, "SOURCE_TIMEOUT_MS", defaults.source_timeout)?,
            request_deadline: millis_or(&get, "REQUEST_DEADLINE_MS", defaults.request_deadline)?,
            min_spread_ratio: parse_or(&get, "MIN_SPREAD_RATIO", defaults.min_spread_ratio)?,
            target_currency: get("TARGET_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.target_currency),
            base_weights,
        };
        pricing.validate()?;

        Ok(Config {
            database_url: get("DATABASE_URL")
                .context("Required environment variable 'DATABASE_URL' is not set")?,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            embedding_url: get("EMBEDDING_URL"),
            job_board_url: get("JOB_BOARD_URL"),
            review_site_url: get("REVIEW_SITE_URL"),
            reference_data_path: get("REFERENCE_DATA_PATH").map(PathBuf::from),
            privacy_noise_seed: get("PRIVACY_NOISE_SEED")
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("PRIVACY_NOISE_SEED must be an unsigned integer")?,
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            pricing,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn millis_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let ms: u64 = parse_or(get, key, default.as_millis() as u64)?;
    if ms == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/payband")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(config.anthropic_api_key.is_none());
        assert!(config.reference_data_path.is_none());
        let p = &config.pricing;
        assert_eq!(p.top_k, 5);
        assert_eq!(p.confidence_floor, 0.55);
        assert_eq!(p.source_timeout, Duration::from_millis(3000));
        assert_eq!(p.request_deadline, Duration::from_millis(10_000));
        assert_eq!(p.base_weights, BaseWeights::default());
    }

    #[test]
    fn test_missing_database_url_fails() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_blank_optional_values_are_absent() {
        let config = load(&[("DATABASE_URL", "x"), ("EMBEDDING_URL", "  ")]).unwrap();
        assert!(config.embedding_url.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "x"),
            ("MATCH_TOP_K", "3"),
            ("RERANK_TIMEOUT_MS", "2500"),
            ("TARGET_CURRENCY", "eur"),
            ("PRIVACY_NOISE_SEED", "42"),
            ("WEIGHT_JOB_LIBRARY", "0.40"),
            ("WEIGHT_APPLICANT_EXPECTATIONS", "0.0"),
        ])
        .unwrap();
        assert_eq!(config.pricing.top_k, 3);
        assert_eq!(config.pricing.rerank_timeout, Duration::from_millis(2500));
        assert_eq!(config.pricing.target_currency, "EUR");
        assert_eq!(config.privacy_noise_seed, Some(42));
        assert_eq!(config.pricing.base_weights.get(SourceKind::JobLibrary), 0.40);
    }

    #[test]
    fn test_weights_not_summing_to_one_fail_startup() {
        let err = load(&[("DATABASE_URL", "x"), ("WEIGHT_JOB_BOARD", "0.5")]).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_invalid_numbers_fail_startup() {
        assert!(load(&[("DATABASE_URL", "x"), ("PORT", "eighty")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("MATCH_CONFIDENCE_FLOOR", "1.5")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("MATCH_TOP_K", "0")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("SOURCE_TIMEOUT_MS", "0")]).is_err());
    }
}
