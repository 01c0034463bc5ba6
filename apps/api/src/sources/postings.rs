//! Posting-derived sources (job boards, review sites).
//!
//! Scraping lives elsewhere; this connector only consumes the scraper service's
//! output contract:
//!
//! `GET {base_url}/observations?code=..|family=..|q=..&location=..&employment_type=..`
//! → `200` with a `SourceObservation` (or `null`), `404` when nothing matches.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::sources::{
    SourceConnector, SourceError, SourceKind, SourceObservation, SourceQuery, SourceRequest,
};

pub struct PostingsConnector {
    kind: SourceKind,
    base_url: String,
    client: Client,
}

impl PostingsConnector {
    pub fn new(kind: SourceKind, base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/observations", self.base_url)
    }
}

/// Query-string pairs for a request.
pub fn query_params(request: &SourceRequest) -> Vec<(&'static str, String)> {
    let (key, value) = match &request.query {
        SourceQuery::Code(code) => ("code", code.clone()),
        SourceQuery::Family(family) => ("family", family.clone()),
        SourceQuery::FreeText(text) => ("q", text.trim().to_string()),
    };
    vec![
        (key, value),
        ("location", request.location.trim().to_string()),
        ("employment_type", request.employment_type.as_str().to_string()),
    ]
}

/// Interprets the scraper's reply. `404` and a `null` body mean "no data";
/// any other non-2xx status marks the source unavailable.
pub fn read_response(
    kind: SourceKind,
    status: StatusCode,
    body: &str,
) -> Result<Option<SourceObservation>, SourceError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(SourceError::Unavailable(format!(
            "{kind} returned {status}: {}",
            body.chars().take(200).collect::<String>()
        )));
    }
    serde_json::from_str(body)
        .map_err(|e| SourceError::Malformed(format!("{kind} response: {e}")))
}

#[async_trait]
impl SourceConnector for PostingsConnector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn supports_free_text(&self) -> bool {
        true
    }

    async fn query(
        &self,
        request: &SourceRequest,
    ) -> Result<Option<SourceObservation>, SourceError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&query_params(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let observation = read_response(self.kind, status, &body)?;
        debug!(
            source = self.name(),
            found = observation.is_some(),
            "Postings observation received"
        );
        Ok(observation)
    }
}
