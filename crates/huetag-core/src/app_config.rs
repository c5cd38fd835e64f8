use std::net::SocketAddr;

use crate::providers::{ProviderFamily, ProviderSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub providers: Vec<ProviderSpec>,
    pub provider_max_attempts: u32,
    pub provider_backoff_base_ms: u64,
    pub provider_timeout_secs: u64,
    pub inter_seed_delay_ms: u64,
    pub refinement_model: String,
    pub refinement_max_tokens: u32,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl AppConfig {
    /// Credential for a provider family, if one was configured.
    #[must_use]
    pub fn api_key_for(&self, family: ProviderFamily) -> Option<&str> {
        match family {
            ProviderFamily::OpenAi => self.openai_api_key.as_deref(),
            ProviderFamily::Groq => self.groq_api_key.as_deref(),
            ProviderFamily::OpenRouter => self.openrouter_api_key.as_deref(),
            ProviderFamily::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("providers", &self.providers)
            .field("provider_max_attempts", &self.provider_max_attempts)
            .field("provider_backoff_base_ms", &self.provider_backoff_base_ms)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("inter_seed_delay_ms", &self.inter_seed_delay_ms)
            .field("refinement_model", &self.refinement_model)
            .field("refinement_max_tokens", &self.refinement_max_tokens)
            .field("openai_api_key", &redact(self.openai_api_key.as_ref()))
            .field("groq_api_key", &redact(self.groq_api_key.as_ref()))
            .field(
                "openrouter_api_key",
                &redact(self.openrouter_api_key.as_ref()),
            )
            .field("anthropic_api_key", &redact(self.anthropic_api_key.as_ref()))
            .finish()
    }
}
