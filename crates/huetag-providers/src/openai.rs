//! Adapter for OpenAI-compatible chat-completions APIs (OpenAI, Groq,
//! OpenRouter).

use async_trait::async_trait;
use huetag_core::{ProviderFamily, ProviderSpec, TagResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::extract::parse_tag_output;
use crate::{ModelCapabilities, TagProvider};

const TAG_TEMPERATURE: f32 = 0.3;

/// Default API root for a chat-completions family.
#[must_use]
pub fn default_base_url(family: ProviderFamily) -> &'static str {
    match family {
        ProviderFamily::OpenAi => "https://api.openai.com/v1",
        ProviderFamily::Groq => "https://api.groq.com/openai/v1",
        ProviderFamily::OpenRouter => "https://openrouter.ai/api/v1",
        ProviderFamily::Anthropic => "https://api.anthropic.com",
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Tag provider speaking the `/chat/completions` protocol.
pub struct OpenAiCompatibleProvider {
    client: Client,
    spec: ProviderSpec,
    api_key: String,
    endpoint: String,
    capabilities: ModelCapabilities,
}

impl OpenAiCompatibleProvider {
    #[must_use]
    pub fn new(client: Client, spec: ProviderSpec, api_key: &str) -> Self {
        let base_url = default_base_url(spec.family);
        Self::with_base_url(client, spec, api_key, base_url)
    }

    /// Point the adapter at a different API root (for tests with wiremock).
    #[must_use]
    pub fn with_base_url(client: Client, spec: ProviderSpec, api_key: &str, base_url: &str) -> Self {
        let capabilities = ModelCapabilities::for_chat_model(&spec.model);
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
            spec,
            capabilities,
        }
    }

    fn request_body(&self, description: &str, instructions: &str) -> Value {
        let messages = [
            ChatMessage {
                role: "system",
                content: instructions,
            },
            ChatMessage {
                role: "user",
                content: description,
            },
        ];
        let mut body = json!({
            "model": self.spec.model,
            "messages": messages,
        });
        if self.capabilities.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if self.capabilities.temperature {
            body["temperature"] = json!(TAG_TEMPERATURE);
        }
        if self.capabilities.reasoning && self.spec.family == ProviderFamily::Groq {
            body["reasoning_format"] = json!("hidden");
        }
        body
    }
}

#[async_trait]
impl TagProvider for OpenAiCompatibleProvider {
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
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(description, instructions))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
                context: format!("{} chat completion", self.spec.name),
                source: e,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse(self.spec.name.clone()))?;

        Ok(parse_tag_output(&content)?)
    }
}
