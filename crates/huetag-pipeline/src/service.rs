//! [`TaggingService`] bundles the store, the providers and the active prompt
//! versions. Its operations live in [`crate::tagging`], [`crate::refine`]
//! and [`crate::batch`].

use std::sync::Arc;
use std::time::Duration;

use huetag_core::{AppConfig, PromptVersion};
use huetag_providers::{BatchApi, RefinementModel, RetryPolicy, TagProvider};

use crate::store::TagStore;

/// Tunables for sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Pause between consecutive seeds in a sweep.
    pub inter_seed_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            inter_seed_delay: Duration::from_millis(500),
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: config.provider_max_attempts,
                backoff_base_ms: config.provider_backoff_base_ms,
            },
            inter_seed_delay: Duration::from_millis(config.inter_seed_delay_ms),
        }
    }
}

pub struct TaggingService<S> {
    pub(crate) store: S,
    pub(crate) providers: Vec<Arc<dyn TagProvider>>,
    pub(crate) refiner: Arc<dyn RefinementModel>,
    pub(crate) batch_api: Arc<dyn BatchApi>,
    pub(crate) settings: PipelineSettings,
    pub(crate) tagging_version: PromptVersion,
    pub(crate) refinement_version: PromptVersion,
}

impl<S: TagStore> TaggingService<S> {
    /// Build a service using the compiled-in instruction texts.
    #[must_use]
    pub fn new(
        store: S,
        providers: Vec<Arc<dyn TagProvider>>,
        refiner: Arc<dyn RefinementModel>,
        batch_api: Arc<dyn BatchApi>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            providers,
            refiner,
            batch_api,
            settings,
            tagging_version: PromptVersion::tagging(),
            refinement_version: PromptVersion::refinement(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn tagging_version(&self) -> &PromptVersion {
        &self.tagging_version
    }

    #[must_use]
    pub fn refinement_version(&self) -> &PromptVersion {
        &self.refinement_version
    }

    pub(crate) fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}
