//! Standardized job library: purchased survey percentiles keyed by taxonomy code.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::sources::{
    ObservedPercentiles, SourceConnector, SourceError, SourceKind, SourceObservation, SourceQuery,
    SourceRequest,
};

#[derive(Debug, Clone, FromRow)]
pub struct JobLibraryRow {
    pub p10: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub sample_size: i32,
    pub observed_on: NaiveDate,
    pub currency: String,
    pub pay_period: String,
    pub location: Option<String>,
}

impl TryFrom<JobLibraryRow> for SourceObservation {
    type Error = SourceError;

    fn try_from(row: JobLibraryRow) -> Result<Self, Self::Error> {
        Ok(SourceObservation {
            percentiles: ObservedPercentiles {
                p10: row.p10,
                p25: row.p25,
                p50: row.p50,
                p75: row.p75,
                p90: row.p90,
            },
            sample_size: u32::try_from(row.sample_size).map_err(|_| {
                SourceError::Malformed(format!("negative sample size {}", row.sample_size))
            })?,
            observation_date: row.observed_on,
            currency: row.currency,
            period: row.pay_period.parse()?,
            location: row.location,
        })
    }
}

// Location-specific rows win over national (NULL location) rows, newest first.
const BY_CODE: &str = r#"
    SELECT p10, p25, p50, p75, p90, sample_size, observed_on, currency, pay_period, location
    FROM job_library_salaries
    WHERE taxonomy_code = $1 AND (lower(location) = lower($2) OR location IS NULL)
    ORDER BY (location IS NULL), observed_on DESC
    LIMIT 1
"#;

const BY_FAMILY: &str = r#"
    SELECT p10, p25, p50, p75, p90, sample_size, observed_on, currency, pay_period, location
    FROM job_library_salaries
    WHERE job_family = $1 AND (lower(location) = lower($2) OR location IS NULL)
    ORDER BY (location IS NULL), observed_on DESC, sample_size DESC
    LIMIT 1
"#;

pub struct JobLibraryConnector {
    pool: PgPool,
}

impl JobLibraryConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceConnector for JobLibraryConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::JobLibrary
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

        let row = sqlx::query_as::<_, JobLibraryRow>(sql)
            .bind(key)
            .bind(&request.location)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SourceObservation::try_from).transpose()
    }
}
