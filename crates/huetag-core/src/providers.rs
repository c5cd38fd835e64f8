use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// API family a classification provider speaks.
///
/// `OpenAi`, `Groq` and `OpenRouter` share the chat-completions wire format
/// and differ only in base URL and credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    OpenAi,
    Groq,
    OpenRouter,
    Anthropic,
}

impl ProviderFamily {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Groq => "groq",
            ProviderFamily::OpenRouter => "openrouter",
            ProviderFamily::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderFamily::OpenAi),
            "groq" => Ok(ProviderFamily::Groq),
            "openrouter" => Ok(ProviderFamily::OpenRouter),
            "anthropic" => Ok(ProviderFamily::Anthropic),
            other => Err(format!("unknown provider family '{other}'")),
        }
    }
}

/// One configured classification provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Stable name recorded on every result row. Changing it makes the
    /// provider look new to the run coordinator.
    pub name: String,
    pub family: ProviderFamily,
    pub model: String,
}

/// Parse a provider list of the form `name=family:model,name=family:model`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidProvider`] for malformed entries, unknown
/// families, or duplicate names, and [`ConfigError::InvalidEnvVar`] when the
/// list is empty.
pub fn parse_provider_list(raw: &str) -> Result<Vec<ProviderSpec>, ConfigError> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason: &str| ConfigError::InvalidProvider {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let (name, target) = entry
            .split_once('=')
            .ok_or_else(|| invalid("expected name=family:model"))?;
        let (family, model) = target
            .split_once(':')
            .ok_or_else(|| invalid("expected family:model after '='"))?;

        let name = name.trim();
        let model = model.trim();
        if name.is_empty() || model.is_empty() {
            return Err(invalid("name and model must be non-empty"));
        }
        let family = family.parse::<ProviderFamily>().map_err(|e| invalid(&e))?;
        if !seen.insert(name.to_string()) {
            return Err(invalid("duplicate provider name"));
        }

        specs.push(ProviderSpec {
            name: name.to_string(),
            family,
            model: model.to_string(),
        });
    }

    if specs.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "HUETAG_PROVIDERS".to_string(),
            reason: "at least one provider is required".to_string(),
        });
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_entries() {
        let specs = parse_provider_list(
            "llama=groq:llama-3.3-70b-versatile, r1=openrouter:deepseek/deepseek-r1",
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].family, ProviderFamily::Groq);
        assert_eq!(specs[1].model, "deepseek/deepseek-r1");
    }

    #[test]
    fn model_may_contain_colons() {
        let specs = parse_provider_list("free=openrouter:meta-llama/llama-3-8b:free").unwrap();
        assert_eq!(specs[0].model, "meta-llama/llama-3-8b:free");
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = parse_provider_list("a=openai:gpt-4o,a=groq:llama").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProvider { .. }));
    }

    #[test]
    fn rejects_unknown_family() {
        let err = parse_provider_list("a=cohere:command").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidProvider { ref reason, .. } if reason.contains("cohere"))
        );
    }

    #[test]
    fn rejects_empty_list() {
        assert!(matches!(
            parse_provider_list(" , "),
            Err(ConfigError::InvalidEnvVar { .. })
        ));
    }
}
