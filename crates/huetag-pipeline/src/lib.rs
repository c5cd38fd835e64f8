//! Tagging and refinement pipeline.
//!
//! Fans palette descriptions out to every configured provider, stores one
//! result per provider per run, aggregates results into consensus counts and
//! curates them through a refinement model, either one seed at a time or as
//! a message batch. All state lives behind [`TagStore`].

pub mod batch;
pub mod consensus;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod refine;
pub mod runs;
pub mod service;
pub mod store;
pub mod tagging;

pub use batch::{BatchReconciliation, BatchSubmission, CorrelationMap};
pub use consensus::{aggregate, TagSummary};
pub use error::PipelineError;
pub use memory::MemoryStore;
pub use orchestrator::{tag_with_providers, ProviderOutcome};
pub use refine::{RefinementOutcome, RefinementStatus};
pub use runs::{plan_run, RunPlan};
pub use service::{PipelineSettings, TaggingService};
pub use store::{PgStore, TagStore};
pub use tagging::{RunResults, SeedResults, SweepReport, TaggingStatus};
