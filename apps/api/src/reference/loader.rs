use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::models::taxonomy::{CurrencyRate, GradeBand, LocationMultiplier, StandardizedJob};
use crate::reference::ReferenceData;

/// On-disk shape of a reference snapshot (local development and fixtures).
#[derive(Debug, Deserialize)]
struct ReferenceFile {
    taxonomy: Vec<StandardizedJob>,
    grade_bands: Vec<GradeBand>,
    #[serde(default)]
    locations: Vec<LocationMultiplier>,
    #[serde(default)]
    currency_rates: Vec<CurrencyRate>,
}

/// Loads reference data from Postgres.
pub async fn load_from_db(pool: &PgPool) -> Result<ReferenceData> {
    let taxonomy = sqlx::query_as::<_, StandardizedJob>(
        "SELECT code, title, family, description, position_class, career_level \
         FROM standardized_jobs ORDER BY code",
    )
    .fetch_all(pool)
    .await
    .context("Failed to load standardized_jobs")?;

    let grade_bands = sqlx::query_as::<_, GradeBand>(
        r#"SELECT grade, min_pay AS "min", max_pay AS "max", position_class FROM grade_bands"#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load grade_bands")?;

    let locations =
        sqlx::query_as::<_, LocationMultiplier>("SELECT location, multiplier FROM location_index")
            .fetch_all(pool)
            .await
            .context("Failed to load location_index")?;

    let currency_rates =
        sqlx::query_as::<_, CurrencyRate>("SELECT currency, usd_per_unit FROM currency_rates")
            .fetch_all(pool)
            .await
            .context("Failed to load currency_rates")?;

    build(taxonomy, grade_bands, locations, currency_rates)
}

/// Loads reference data from a JSON snapshot file.
pub fn load_from_file(path: &Path) -> Result<ReferenceData> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference data at {}", path.display()))?;
    let file: ReferenceFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid reference data JSON in {}", path.display()))?;

    build(file.taxonomy, file.grade_bands, file.locations, file.currency_rates)
}

fn build(
    taxonomy: Vec<StandardizedJob>,
    grade_bands: Vec<GradeBand>,
    locations: Vec<LocationMultiplier>,
    currency_rates: Vec<CurrencyRate>,
) -> Result<ReferenceData> {
    if taxonomy.is_empty() {
        bail!("Reference data contains no standardized jobs");
    }
    for band in &grade_bands {
        if !(band.min.is_finite() && band.max.is_finite()) || band.min <= 0.0 || band.min > band.max
        {
            bail!(
                "Grade band '{}' has invalid bounds [{}, {}]",
                band.grade,
                band.min,
                band.max
            );
        }
    }
    for loc in &locations {
        if !loc.multiplier.is_finite() || loc.multiplier <= 0.0 {
            bail!("Location '{}' has invalid multiplier {}", loc.location, loc.multiplier);
        }
    }
    for rate in &currency_rates {
        if !rate.usd_per_unit.is_finite() || rate.usd_per_unit <= 0.0 {
            bail!("Currency '{}' has invalid rate {}", rate.currency, rate.usd_per_unit);
        }
    }

    info!(
        "Reference data loaded: {} jobs, {} grade bands, {} locations, {} currencies",
        taxonomy.len(),
        grade_bands.len(),
        locations.len(),
        currency_rates.len()
    );

    Ok(ReferenceData::new(taxonomy, grade_bands, locations, currency_rates))
}
