//! Concurrent fan-out of one palette description to every provider.

use std::sync::Arc;

use futures::future::join_all;
use huetag_core::TagResponse;
use huetag_providers::{retry_with_backoff, RetryPolicy, TagProvider};

/// What one provider returned for one palette after retries.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: String,
    pub model: String,
    /// Validated tags, or the final error message.
    pub result: Result<TagResponse, String>,
}

/// Call every provider concurrently, each behind its own retry loop.
///
/// Always yields one outcome per provider, in input order. A failing
/// provider does not cancel its siblings.
pub async fn tag_with_providers(
    providers: &[Arc<dyn TagProvider>],
    description: &str,
    instructions: &str,
    policy: RetryPolicy,
) -> Vec<ProviderOutcome> {
    let calls = providers.iter().map(|provider| async move {
        let result = retry_with_backoff(policy, provider.name(), || {
            provider.classify(description, instructions)
        })
        .await
        .map_err(|e| e.to_string());

        ProviderOutcome {
            provider: provider.name().to_owned(),
            model: provider.model().to_owned(),
            result,
        }
    });

    join_all(calls).await
}
