//! Builds provider adapters from application configuration.

use std::sync::Arc;
use std::time::Duration;

use huetag_core::{AppConfig, ProviderFamily};
use reqwest::Client;

use crate::anthropic::{AnthropicClient, AnthropicProvider, AnthropicRefiner};
use crate::batch::AnthropicBatchClient;
use crate::error::ProviderError;
use crate::openai::OpenAiCompatibleProvider;
use crate::TagProvider;

fn http_client(config: &AppConfig) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.provider_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent("huetag/0.1 (palette-tagging)")
        .build()?)
}

fn anthropic_client(config: &AppConfig, client: Client) -> Result<AnthropicClient, ProviderError> {
    let key = config
        .api_key_for(ProviderFamily::Anthropic)
        .ok_or(ProviderError::MissingApiKey(ProviderFamily::Anthropic))?;
    Ok(AnthropicClient::new(client, key))
}

/// One adapter per configured provider, in configuration order.
///
/// # Errors
///
/// Returns [`ProviderError::MissingApiKey`] if a configured provider's
/// family has no credential, or [`ProviderError::Http`] if the HTTP client
/// cannot be built.
pub fn build_tag_providers(config: &AppConfig) -> Result<Vec<Arc<dyn TagProvider>>, ProviderError> {
    let client = http_client(config)?;
    config
        .providers
        .iter()
        .map(|spec| -> Result<Arc<dyn TagProvider>, ProviderError> {
            match spec.family {
                ProviderFamily::Anthropic => Ok(Arc::new(AnthropicProvider::new(
                    anthropic_client(config, client.clone())?,
                    spec.clone(),
                ))),
                family => {
                    let key = config
                        .api_key_for(family)
                        .ok_or(ProviderError::MissingApiKey(family))?;
                    Ok(Arc::new(OpenAiCompatibleProvider::new(
                        client.clone(),
                        spec.clone(),
                        key,
                    )))
                }
            }
        })
        .collect()
}

/// Synchronous refinement model.
///
/// # Errors
///
/// Returns [`ProviderError::MissingApiKey`] without `ANTHROPIC_API_KEY`.
pub fn build_refiner(config: &AppConfig) -> Result<AnthropicRefiner, ProviderError> {
    let client = anthropic_client(config, http_client(config)?)?;
    Ok(AnthropicRefiner::new(
        client,
        &config.refinement_model,
        config.refinement_max_tokens,
    ))
}

/// Batch client for the refinement model.
///
/// # Errors
///
/// Returns [`ProviderError::MissingApiKey`] without `ANTHROPIC_API_KEY`.
pub fn build_batch_client(config: &AppConfig) -> Result<AnthropicBatchClient, ProviderError> {
    let client = anthropic_client(config, http_client(config)?)?;
    Ok(AnthropicBatchClient::new(
        client,
        &config.refinement_model,
        config.refinement_max_tokens,
    ))
}
