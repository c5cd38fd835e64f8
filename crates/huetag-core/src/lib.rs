//! Shared types for the palette tagging pipeline: configuration, the tag
//! schema, prompt texts and their versions, and seed color descriptions.

pub mod app_config;
pub mod config;
pub mod palette;
pub mod prompt;
pub mod providers;
pub mod tags;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use palette::{describe_seed, ColorDescription, ColorSample};
pub use prompt::{PromptVersion, REFINEMENT_INSTRUCTIONS, TAGGING_INSTRUCTIONS};
pub use providers::{parse_provider_list, ProviderFamily, ProviderSpec};
pub use tags::{
    Brightness, Contrast, RefinedTags, Saturation, TagParseError, TagResponse, Temperature,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid provider entry '{entry}': {reason}")]
    InvalidProvider { entry: String, reason: String },
}
