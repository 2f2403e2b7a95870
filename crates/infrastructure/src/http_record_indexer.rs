use std::time::Duration;

use archivum_application::{IndexDocument, RecordIndexer};
use archivum_core::{AppError, AppResult};
use archivum_domain::{DataGroup, IndexTerm};
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// Wire body posted to the search indexer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexDocumentPayload<'a> {
    record_type: &'a str,
    record_id: &'a str,
    ids: &'a [String],
    index_terms: &'a [IndexTerm],
    data: &'a DataGroup,
}

impl<'a> From<&'a IndexDocument> for IndexDocumentPayload<'a> {
    fn from(document: &'a IndexDocument) -> Self {
        Self {
            record_type: document.record_type.as_str(),
            record_id: document.record_id.as_str(),
            ids: &document.ids,
            index_terms: &document.index_terms,
            data: &document.data,
        }
    }
}

/// HTTP implementation of the search indexer port.
pub struct HttpRecordIndexer {
    http_client: reqwest::Client,
    documents_url: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpRecordIndexer {
    /// Creates an indexer posting to `{base_url}/api/index/documents`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            documents_url: format!(
                "{}/api/index/documents?commit=false",
                base_url.trim_end_matches('/')
            ),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl RecordIndexer for HttpRecordIndexer {
    async fn index_without_explicit_commit(&self, document: IndexDocument) -> AppResult<()> {
        let payload = IndexDocumentPayload::from(&document);
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.documents_url.as_str())
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} while indexing '{}:{}'",
                        response.status(),
                        document.record_type,
                        document.record_id
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Internal(format!(
                        "indexer rejected '{}:{}' with status {status}: {body}",
                        document.record_type, document.record_id
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("indexer transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    record_type = %document.record_type,
                    record_id = %document.record_id,
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying index request"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "indexer request exhausted retries".to_owned()
        })))
    }
}
