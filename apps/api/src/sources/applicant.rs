//! Applicant expectations: salary expectations stated by recent applicants.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::sources::stats::{observation_from_samples, SalarySample};
use crate::sources::{
    SourceConnector, SourceError, SourceKind, SourceObservation, SourceQuery, SourceRequest,
};

/// Most recent submissions considered per query.
const MAX_SUBMISSIONS: i64 = 500;

#[derive(Debug, Clone, FromRow)]
pub struct ExpectationRow {
    pub expected_annual: f64,
    pub currency: String,
    pub submitted_on: NaiveDate,
}

impl From<ExpectationRow> for SalarySample {
    fn from(row: ExpectationRow) -> Self {
        SalarySample {
            amount: row.expected_annual,
            currency: row.currency,
            recorded_on: row.submitted_on,
        }
    }
}

const BY_CODE: &str = r#"
    SELECT expected_annual, currency, submitted_on
    FROM applicant_expectations
    WHERE taxonomy_code = $1 AND lower(location) = lower($2)
    ORDER BY submitted_on DESC
    LIMIT $3
"#;

const BY_FAMILY: &str = r#"
    SELECT expected_annual, currency, submitted_on
    FROM applicant_expectations
    WHERE job_family = $1 AND lower(location) = lower($2)
    ORDER BY submitted_on DESC
    LIMIT $3
"#;

const BY_TITLE: &str = r#"
    SELECT expected_annual, currency, submitted_on
    FROM applicant_expectations
    WHERE job_title ILIKE '%' || $1 || '%' ESCAPE '\' AND lower(location) = lower($2)
    ORDER BY submitted_on DESC
    LIMIT $3
"#;

/// Escapes `ILIKE` metacharacters so a title only ever matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// SQL and bind key for one query level. `None` when there is nothing to look up.
pub fn lookup(query: &SourceQuery) -> Option<(&'static str, String)> {
    let (sql, key) = match query {
        SourceQuery::Code(code) => (BY_CODE, code.trim().to_string()),
        SourceQuery::Family(family) => (BY_FAMILY, family.trim().to_string()),
        SourceQuery::FreeText(title) => (BY_TITLE, escape_like(title.trim())),
    };
    (!key.is_empty()).then_some((sql, key))
}

pub struct ApplicantExpectationsConnector {
    pool: PgPool,
}

impl ApplicantExpectationsConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceConnector for ApplicantExpectationsConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::ApplicantExpectations
    }

    fn supports_free_text(&self) -> bool {
        true
    }

    async fn query(
        &self,
        request: &SourceRequest,
    ) -> Result<Option<SourceObservation>, SourceError> {
        let Some((sql, key)) = lookup(&request.query) else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, ExpectationRow>(sql)
            .bind(&key)
            .bind(&request.location)
            .bind(MAX_SUBMISSIONS)
            .fetch_all(&self.pool)
            .await?;

        let samples: Vec<SalarySample> = rows.into_iter().map(SalarySample::from).collect();
        Ok(observation_from_samples(&samples, Some(&request.location)))
    }
}
