use crate::app_config::{AppConfig, Environment};
use crate::providers::parse_provider_list;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let providers = parse_provider_list(&require("HUETAG_PROVIDERS")?)?;

    let env = parse_environment(&or_default("HUETAG_ENV", "development"));
    let bind_addr = parse_addr("HUETAG_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("HUETAG_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("HUETAG_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("HUETAG_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("HUETAG_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let provider_max_attempts = parse_u32("HUETAG_PROVIDER_MAX_ATTEMPTS", "5")?;
    if provider_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "HUETAG_PROVIDER_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let provider_backoff_base_ms = parse_u64("HUETAG_PROVIDER_BACKOFF_BASE_MS", "1000")?;
    let provider_timeout_secs = parse_u64("HUETAG_PROVIDER_TIMEOUT_SECS", "60")?;
    let inter_seed_delay_ms = parse_u64("HUETAG_INTER_SEED_DELAY_MS", "500")?;

    let refinement_model = or_default("HUETAG_REFINEMENT_MODEL", "claude-sonnet-4-5");
    let refinement_max_tokens = parse_u32("HUETAG_REFINEMENT_MAX_TOKENS", "1024")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        providers,
        provider_max_attempts,
        provider_backoff_base_ms,
        provider_timeout_secs,
        inter_seed_delay_ms,
        refinement_model,
        refinement_max_tokens,
        openai_api_key: optional("OPENAI_API_KEY"),
        groq_api_key: optional("GROQ_API_KEY"),
        openrouter_api_key: optional("OPENROUTER_API_KEY"),
        anthropic_api_key: optional("ANTHROPIC_API_KEY"),
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
