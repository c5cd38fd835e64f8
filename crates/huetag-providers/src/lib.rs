//! Model provider adapters for palette tagging.
//!
//! Each provider family gets one adapter implementing the small capability
//! traits below; the pipeline never branches on provider names. The
//! Anthropic message-batch client lives here too.

pub mod anthropic;
pub mod batch;
pub mod error;
pub mod extract;
pub mod factory;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use huetag_core::{RefinedTags, TagResponse};

pub use batch::{
    AnthropicBatchClient, BatchRequest, BatchResultLine, BatchResults, BatchStatus, RequestCounts,
};
pub use error::ProviderError;
pub use factory::{build_batch_client, build_refiner, build_tag_providers};
pub use retry::{is_permanent, retry_with_backoff, RetryPolicy};

/// A classification model that tags one palette description.
#[async_trait]
pub trait TagProvider: Send + Sync {
    /// Configured provider name recorded on result rows.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Classify `description` following `instructions`.
    ///
    /// A single attempt; retries are the caller's concern.
    async fn classify(
        &self,
        description: &str,
        instructions: &str,
    ) -> Result<TagResponse, ProviderError>;
}

/// The higher-capability model that curates a consensus summary.
#[async_trait]
pub trait RefinementModel: Send + Sync {
    fn model(&self) -> &str;

    async fn curate(&self, prompt: &str, instructions: &str)
        -> Result<RefinedTags, ProviderError>;
}

/// An asynchronous bulk-processing API for refinement requests.
#[async_trait]
pub trait BatchApi: Send + Sync {
    /// Model the batch requests are addressed to.
    fn model(&self) -> &str;

    async fn submit(
        &self,
        requests: &[BatchRequest],
        instructions: &str,
    ) -> Result<BatchStatus, ProviderError>;

    async fn status(&self, batch_id: &str) -> Result<BatchStatus, ProviderError>;

    async fn fetch_results(&self, batch_id: &str) -> Result<BatchResults, ProviderError>;
}

/// Which request knobs a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Native JSON-object response format.
    pub json_mode: bool,
    /// Accepts a sampling temperature.
    pub temperature: bool,
    /// Emits reasoning markup that has to be hidden or stripped.
    pub reasoning: bool,
}

impl ModelCapabilities {
    /// Infer capabilities from a chat-completions model id.
    #[must_use]
    pub fn for_chat_model(model: &str) -> Self {
        let id = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();
        let o_series = ["o1", "o3", "o4"]
            .iter()
            .any(|p| id == *p || id.starts_with(&format!("{p}-")));
        let reasoning = o_series
            || ["r1", "qwq", "reasoner", "thinking"]
                .iter()
                .any(|marker| id.contains(marker));
        Self {
            json_mode: !reasoning || o_series,
            temperature: !o_series,
            reasoning,
        }
    }
}
