//! Adapter for the Anthropic Messages API.
//!
//! Used both as a classification provider and as the refinement model.
//! Output is free text, so everything goes through [`crate::extract`].

use async_trait::async_trait;
use huetag_core::{ProviderSpec, RefinedTags, TagResponse};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::extract::{parse_refined_output, parse_tag_output};
use crate::{RefinementModel, TagProvider};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const TAG_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> MessagesRequest<'a> {
    pub(crate) fn new(model: &'a str, max_tokens: u32, system: &'a str, user: &'a str) -> Self {
        Self {
            model,
            max_tokens,
            system,
            messages: vec![UserMessage {
                role: "user",
                content: user,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    /// Concatenate all text blocks, ignoring thinking and tool blocks.
    pub(crate) fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Authenticated HTTP access to the Anthropic API.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    #[must_use]
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different API root (for tests with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.authorize(self.client.get(url))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    /// Send a single-turn message and return the concatenated text reply.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Status`] on non-2xx responses,
    /// [`ProviderError::Deserialize`] on an unexpected envelope and
    /// [`ProviderError::EmptyResponse`] when no text came back.
    pub async fn message(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        user: &str,
    ) -> Result<String, ProviderError> {
        let request = MessagesRequest::new(model, max_tokens, system, user);
        let body = send_for_text(self.post("/v1/messages").json(&request)).await?;
        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
                context: format!("messages({model})"),
                source: e,
            })?;
        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(model.to_owned()));
        }
        Ok(text)
    }
}

/// Send a request, assert a 2xx status, and return the body text.
pub(crate) async fn send_for_text(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Anthropic model used as a classification provider.
pub struct AnthropicProvider {
    client: AnthropicClient,
    spec: ProviderSpec,
}

impl AnthropicProvider {
    #[must_use]
    pub fn new(client: AnthropicClient, spec: ProviderSpec) -> Self {
        Self { client, spec }
    }
}

#[async_trait]
impl TagProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn model(&self) -> &str {
        &self.spec.model
    }

    async fn classify(
        &self,
        description: &str,
        instructions: &str,
    ) -> Result<TagResponse, ProviderError> {
        let text = self
            .client
            .message(&self.spec.model, TAG_MAX_TOKENS, instructions, description)
            .await?;
        Ok(parse_tag_output(&text)?)
    }
}

/// Anthropic model used for synchronous refinement.
pub struct AnthropicRefiner {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
}

impl AnthropicRefiner {
    #[must_use]
    pub fn new(client: AnthropicClient, model: &str, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_owned(),
            max_tokens,
        }
    }
}

#[async_trait]
impl RefinementModel for AnthropicRefiner {
    fn model(&self) -> &str {
        &self.model
    }

    async fn curate(
        &self,
        prompt: &str,
        instructions: &str,
    ) -> Result<RefinedTags, ProviderError> {
        let text = self
            .client
            .message(&self.model, self.max_tokens, instructions, prompt)
            .await?;
        Ok(parse_refined_output(&text)?)
    }
}
