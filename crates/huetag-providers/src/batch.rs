//! Client for the Anthropic Message Batches API.
//!
//! A batch is submitted once, polled until `processing_status` reaches
//! `ended`, then its JSONL results file is downloaded. Each request carries a
//! short `custom_id`; mapping ids back to seeds is the caller's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::anthropic::{send_for_text, AnthropicClient, MessagesRequest, MessagesResponse};
use crate::error::ProviderError;
use crate::BatchApi;

pub const STATUS_ENDED: &str = "ended";

/// One refinement request inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub custom_id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u32,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub errored: u32,
    #[serde(default)]
    pub canceled: u32,
    #[serde(default)]
    pub expired: u32,
}

/// Batch metadata as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub id: String,
    /// `in_progress`, `canceling` or `ended`.
    pub processing_status: String,
    #[serde(default)]
    pub request_counts: RequestCounts,
    #[serde(default)]
    pub results_url: Option<String>,
}

impl BatchStatus {
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.processing_status == STATUS_ENDED
    }
}

/// Outcome of one request in a finished batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultLine {
    pub custom_id: String,
    /// Model text on success, an error description otherwise.
    pub outcome: Result<String, String>,
}

/// Every line of a results file. Lines that could not be parsed carry no
/// usable custom id and are only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResults {
    pub lines: Vec<BatchResultLine>,
    pub malformed: usize,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    requests: Vec<SubmitRequest<'a>>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    custom_id: &'a str,
    params: MessagesRequest<'a>,
}

#[derive(Deserialize)]
struct RawResultLine {
    custom_id: String,
    result: RawResult,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<MessagesResponse>,
    #[serde(default)]
    error: Option<Value>,
}

/// Batch client addressing one refinement model.
pub struct AnthropicBatchClient {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
}

impl AnthropicBatchClient {
    #[must_use]
    pub fn new(client: AnthropicClient, model: &str, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_owned(),
            max_tokens,
        }
    }

    fn parse_status(body: &str, context: &str) -> Result<BatchStatus, ProviderError> {
        serde_json::from_str(body).map_err(|e| ProviderError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Parse a results JSONL payload. Lines that do not parse are logged and
/// counted in [`BatchResults::malformed`].
#[must_use]
pub fn parse_results_jsonl(body: &str) -> BatchResults {
    let mut results = BatchResults::default();
    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match serde_json::from_str::<RawResultLine>(line) {
            Ok(raw) => results.lines.push(raw.into_line()),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable batch result line");
                results.malformed += 1;
            }
        }
    }
    results
}

impl RawResultLine {
    fn into_line(self) -> BatchResultLine {
        let outcome = match (self.result.kind.as_str(), self.result.message) {
            ("succeeded", Some(message)) => {
                let text = message.text();
                if text.trim().is_empty() {
                    Err("empty response".to_owned())
                } else {
                    Ok(text)
                }
            }
            ("succeeded", None) => Err("succeeded without message".to_owned()),
            (kind, _) => Err(match self.result.error {
                Some(error) => format!("{kind}: {error}"),
                None => kind.to_owned(),
            }),
        };
        BatchResultLine {
            custom_id: self.custom_id,
            outcome,
        }
    }
}

#[async_trait]
impl BatchApi for AnthropicBatchClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn submit(
        &self,
        requests: &[BatchRequest],
        instructions: &str,
    ) -> Result<BatchStatus, ProviderError> {
        let body = SubmitBody {
            requests: requests
                .iter()
                .map(|r| SubmitRequest {
                    custom_id: &r.custom_id,
                    params: MessagesRequest::new(
                        &self.model,
                        self.max_tokens,
                        instructions,
                        &r.prompt,
                    ),
                })
                .collect(),
        };
        let text = send_for_text(self.client.post("/v1/messages/batches").json(&body)).await?;
        Self::parse_status(&text, "create message batch")
    }

    async fn status(&self, batch_id: &str) -> Result<BatchStatus, ProviderError> {
        let url = self
            .client
            .url(&format!("/v1/messages/batches/{batch_id}"));
        let text = send_for_text(self.client.get(&url)).await?;
        Self::parse_status(&text, &format!("message batch {batch_id}"))
    }

    async fn fetch_results(&self, batch_id: &str) -> Result<BatchResults, ProviderError> {
        let status = self.status(batch_id).await?;
        let url = match (&status.results_url, status.is_ended()) {
            (Some(url), true) => url.clone(),
            _ => {
                return Err(ProviderError::ResultsUnavailable {
                    batch_id: batch_id.to_owned(),
                    status: status.processing_status,
                })
            }
        };
        let body = send_for_text(self.client.get(&url)).await?;
        Ok(parse_results_jsonl(&body))
    }
}
