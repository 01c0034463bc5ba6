//! Internal compensation records: what the organization already pays.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::sources::noise::PrivacyNoise;
use crate::sources::stats::{observation_from_samples, SalarySample};
use crate::sources::{
    SourceConnector, SourceError, SourceKind, SourceObservation, SourceQuery, SourceRequest,
};

#[derive(Debug, Clone, FromRow)]
pub struct CompensationRecordRow {
    pub annual_base: f64,
    pub currency: String,
    pub effective_on: NaiveDate,
}

impl From<CompensationRecordRow> for SalarySample {
    fn from(row: CompensationRecordRow) -> Self {
        SalarySample {
            amount: row.annual_base,
            currency: row.currency,
            recorded_on: row.effective_on,
        }
    }
}

const BY_CODE: &str = r#"
    SELECT annual_base, currency, effective_on
    FROM internal_compensation
    WHERE taxonomy_code = $1 AND lower(location) = lower($2) AND employment_type = $3
"#;

const BY_FAMILY: &str = r#"
    SELECT annual_base, currency, effective_on
    FROM internal_compensation
    WHERE job_family = $1 AND lower(location) = lower($2) AND employment_type = $3
"#;

pub struct InternalRecordsConnector {
    pool: PgPool,
    noise: PrivacyNoise,
}

impl InternalRecordsConnector {
    pub fn new(pool: PgPool, noise: PrivacyNoise) -> Self {
        Self { pool, noise }
    }
}

/// Summarizes raw records and applies privacy noise to small samples.
pub fn summarize_records(
    rows: Vec<CompensationRecordRow>,
    location: &str,
    noise: PrivacyNoise,
    key: &str,
) -> Option<SourceObservation> {
    let samples: Vec<SalarySample> = rows.into_iter().map(SalarySample::from).collect();
    let mut observation = observation_from_samples(&samples, Some(location))?;
    noise.apply(&mut observation.percentiles, observation.sample_size, key);
    Some(observation)
}

#[async_trait]
impl SourceConnector for InternalRecordsConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::InternalRecords
    }

    fn supports_free_text(&self) -> bool {
        false
    }

    async fn query(
        &self,
        request: &SourceRequest,
    ) -> Result<Option<SourceObservation>, SourceError> {
        let (sql, key) = match &request.query {
            SourceQuery::Code(code) => (BY_CODE, code),
            SourceQuery::Family(family) => (BY_FAMILY, family),
            SourceQuery::FreeText(_) => return Ok(None),
        };

        let rows = sqlx::query_as::<_, CompensationRecordRow>(sql)
            .bind(key)
            .bind(&request.location)
            .bind(request.employment_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        debug!(
            source = self.name(),
            key = %key,
            records = rows.len(),
            "Internal records fetched"
        );

        let noise_key = format!("{key}|{}", request.location.trim().to_lowercase());
        Ok(summarize_records(rows, &request.location, self.noise, &noise_key))
    }
}
