use huetag_db::DbError;
use huetag_providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// Only raised for batch API calls; per-provider tagging failures are
    /// recorded as error rows instead.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("seed {seed} already has a refinement for prompt version {version}")]
    DuplicateRefinement { seed: String, version: String },

    #[error("seed {seed} has no valid tags at prompt version {version}")]
    NoValidTags { seed: String, version: String },

    #[error("no seeds pending refinement at prompt version {0}")]
    NothingToRefine(String),

    #[error("batch {batch_id} is not ready (status: {status})")]
    BatchNotReady { batch_id: String, status: String },

    #[error("unknown batch {0} and no correlation map supplied")]
    UnknownBatch(String),

    #[error("no refinement found for seed {0}")]
    RefinementNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// Stable machine-readable error code for API envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownBatch(_) | Self::RefinementNotFound(_) => "not_found",
            Self::DuplicateRefinement { .. }
            | Self::BatchNotReady { .. }
            | Self::NothingToRefine(_)
            | Self::NoValidTags { .. } => "conflict",
            Self::InvalidRequest(_) => "bad_request",
            Self::Db(DbError::NotFound) => "not_found",
            Self::Db(_) | Self::Provider(_) | Self::Serialize(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let dup = PipelineError::DuplicateRefinement {
            seed: "abc".into(),
            version: "v".into(),
        };
        assert_eq!(dup.code(), "conflict");
        assert_eq!(PipelineError::UnknownBatch("b".into()).code(), "not_found");
        assert_eq!(PipelineError::InvalidRequest("x".into()).code(), "bad_request");
        assert_eq!(PipelineError::Db(DbError::NotFound).code(), "not_found");
    }
}
