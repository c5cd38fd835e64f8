//! End-to-end pipeline tests against `MemoryStore` with scripted providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huetag_core::{PromptVersion, RefinedTags, TagResponse};
use huetag_db::NewTagResult;
use huetag_pipeline::{
    MemoryStore, PipelineError, PipelineSettings, TagStore, TaggingService,
};
use huetag_providers::{
    BatchApi, BatchRequest, BatchResultLine, BatchResults, BatchStatus, ProviderError,
    RefinementModel, RequestCounts, RetryPolicy, TagProvider,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

fn tag_response(temperature: &str) -> TagResponse {
    TagResponse::from_value(json!({
        "temperature": temperature,
        "contrast": "medium",
        "brightness": "light",
        "saturation": "vibrant",
        "mood": ["playful"],
        "style": ["retro"],
        "dominant_colors": ["coral", "teal"],
        "seasonal": ["summer"],
        "associations": ["beach"]
    }))
    .expect("valid tag fixture")
}

fn refined_tags() -> RefinedTags {
    let embed_text = vec!["vivid"; 35].join(" ");
    RefinedTags::from_value(json!({
        "temperature": "warm",
        "contrast": "medium",
        "brightness": "light",
        "saturation": "vibrant",
        "mood": ["playful"],
        "style": ["retro"],
        "dominant_colors": ["coral"],
        "seasonal": ["summer"],
        "associations": ["beach"],
        "embed_text": embed_text
    }))
    .expect("valid refined fixture")
}

enum Script {
    Succeed(&'static str),
    Fail(u16),
}

struct FakeProvider {
    name: &'static str,
    script: Script,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn classify(
        &self,
        _description: &str,
        _instructions: &str,
    ) -> Result<TagResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Succeed(temperature) => Ok(tag_response(temperature)),
            Script::Fail(status) => Err(ProviderError::Status {
                status,
                body: "scripted failure".to_owned(),
            }),
        }
    }
}

struct FakeRefiner;

#[async_trait]
impl RefinementModel for FakeRefiner {
    fn model(&self) -> &str {
        "fake-refiner"
    }

    async fn curate(&self, prompt: &str, _instructions: &str) -> Result<RefinedTags, ProviderError> {
        assert!(prompt.contains("temperature:"), "prompt carries consensus tables");
        Ok(refined_tags())
    }
}

#[derive(Default)]
struct FakeBatchApi {
    submitted: Mutex<Vec<BatchRequest>>,
    processing_status: Mutex<String>,
    results: Mutex<BatchResults>,
}

impl FakeBatchApi {
    fn set_status(&self, status: &str) {
        *self.processing_status.lock().unwrap() = status.to_owned();
    }

    fn set_results(&self, lines: Vec<BatchResultLine>) {
        self.results.lock().unwrap().lines = lines;
    }

    fn set_malformed(&self, count: usize) {
        self.results.lock().unwrap().malformed = count;
    }

    fn current(&self) -> BatchStatus {
        BatchStatus {
            id: "msgbatch_test".to_owned(),
            processing_status: self.processing_status.lock().unwrap().clone(),
            request_counts: RequestCounts::default(),
            results_url: None,
        }
    }
}

#[async_trait]
impl BatchApi for FakeBatchApi {
    fn model(&self) -> &str {
        "fake-batch-model"
    }

    async fn submit(
        &self,
        requests: &[BatchRequest],
        _instructions: &str,
    ) -> Result<BatchStatus, ProviderError> {
        self.submitted.lock().unwrap().extend_from_slice(requests);
        self.set_status("in_progress");
        Ok(self.current())
    }

    async fn status(&self, _batch_id: &str) -> Result<BatchStatus, ProviderError> {
        Ok(self.current())
    }

    async fn fetch_results(&self, _batch_id: &str) -> Result<BatchResults, ProviderError> {
        Ok(self.results.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn settings() -> PipelineSettings {
    PipelineSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 0,
        },
        inter_seed_delay: Duration::ZERO,
    }
}

fn service(
    providers: Vec<Arc<FakeProvider>>,
    batch_api: Arc<FakeBatchApi>,
) -> TaggingService<MemoryStore> {
    let providers: Vec<Arc<dyn TagProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn TagProvider>)
        .collect();
    TaggingService::new(
        MemoryStore::with_seeds(["abc", "def"]),
        providers,
        Arc::new(FakeRefiner),
        batch_api,
        settings(),
    )
}

fn two_warm_providers() -> Vec<Arc<FakeProvider>> {
    vec![
        FakeProvider::new("alpha", Script::Succeed("warm")),
        FakeProvider::new("beta", Script::Succeed("warm")),
    ]
}

fn succeeded(custom_id: &str, text: String) -> BatchResultLine {
    BatchResultLine {
        custom_id: custom_id.to_owned(),
        outcome: Ok(text),
    }
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_stores_one_row_per_seed_and_provider() {
    let svc = service(two_warm_providers(), Arc::default());

    let report = svc.generate_tags().await.expect("sweep");
    assert_eq!(report.run_number, 1);
    assert_eq!(report.seeds_processed, 2);
    assert_eq!(report.results_stored, 4);

    let rows = svc.store().tag_results();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.tags.is_some() != r.error.is_some()));

    let status = svc.tagging_status().await.expect("status");
    assert_eq!(status.completed, 2);
    assert_eq!(status.pending, 0);
    assert_eq!(status.total_results, 4);
    assert_eq!(status.run_number, 1);
}

#[tokio::test]
async fn sweep_resumes_without_duplicating_completed_providers() {
    let providers = two_warm_providers();
    let alpha = Arc::clone(&providers[0]);
    let svc = service(providers, Arc::default());

    svc.store()
        .insert_tag_result(&NewTagResult {
            seed: "abc".to_owned(),
            provider: "alpha".to_owned(),
            model: "fake-model".to_owned(),
            run_number: 1,
            prompt_version: PromptVersion::tagging().to_string(),
            tags: Some(serde_json::to_value(tag_response("warm")).unwrap()),
            error: None,
        })
        .await
        .unwrap();

    let report = svc.generate_tags().await.expect("sweep");
    assert_eq!(report.run_number, 1);
    assert_eq!(report.results_stored, 3);
    assert_eq!(alpha.calls(), 1, "alpha already answered for abc");
    assert_eq!(svc.store().tag_results().len(), 4);
}

#[tokio::test]
async fn fully_tagged_run_advances_on_next_sweep() {
    let svc = service(two_warm_providers(), Arc::default());

    svc.generate_tags().await.expect("first sweep");
    let second = svc.generate_tags().await.expect("second sweep");

    assert_eq!(second.run_number, 2);
    assert_eq!(second.seeds_processed, 2);
    let rows = svc.store().tag_results();
    assert_eq!(rows.iter().filter(|r| r.run_number == 2).count(), 4);
}

#[tokio::test]
async fn provider_failures_become_error_rows() {
    let transient = FakeProvider::new("flaky", Script::Fail(503));
    let permanent = FakeProvider::new("locked", Script::Fail(401));
    let svc = service(
        vec![
            FakeProvider::new("alpha", Script::Succeed("cool")),
            Arc::clone(&transient),
            Arc::clone(&permanent),
        ],
        Arc::default(),
    );

    let report = svc.generate_tags().await.expect("sweep never fails on providers");
    assert_eq!(report.results_stored, 6);
    assert_eq!(report.failures, 4);
    assert_eq!(transient.calls(), 2 * 3, "retried up to the attempt budget");
    assert_eq!(permanent.calls(), 2, "credential errors are not retried");

    let errors: Vec<_> = svc
        .store()
        .tag_results()
        .into_iter()
        .filter(|r| r.error.is_some())
        .collect();
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|r| r.tags.is_none()));
}

#[tokio::test]
async fn seed_results_include_consensus() {
    let svc = service(two_warm_providers(), Arc::default());
    svc.generate_tags().await.unwrap();

    let view = svc.results_for_seed("abc").await.expect("results");
    assert_eq!(view.runs.len(), 1);
    assert_eq!(view.runs[0].results.len(), 2);
    assert_eq!(view.consensus.total_valid_responses, 2);
    assert_eq!(view.consensus.temperature.get("warm"), Some(&2));
}

// ---------------------------------------------------------------------------
// Refinement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refine_single_is_exclusive_per_seed_and_version() {
    let svc = service(two_warm_providers(), Arc::default());
    svc.generate_tags().await.unwrap();

    let outcome = svc.refine_single("abc", None).await.expect("first refinement");
    assert!(outcome.error.is_none());
    assert_eq!(outcome.tags, Some(refined_tags()));

    let err = svc.refine_single("abc", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateRefinement { .. }));
    assert_eq!(err.code(), "conflict");
    assert_eq!(svc.store().refinements().len(), 1);

    let stored = svc.refinement_result("abc").await.expect("stored refinement");
    assert_eq!(stored.consensus["temperature"]["warm"], 2);

    let status = svc.refinement_status().await.unwrap();
    assert_eq!(status.tagged_seeds, 2);
    assert_eq!(status.refined, 1);
    assert_eq!(status.pending, 1);
}

#[tokio::test]
async fn refine_single_requires_valid_tags() {
    let svc = service(vec![FakeProvider::new("down", Script::Fail(500))], Arc::default());
    svc.generate_tags().await.unwrap();

    let err = svc.refine_single("abc", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoValidTags { .. }));
    assert!(svc.store().refinements().is_empty());
}

#[tokio::test]
async fn missing_refinement_is_not_found() {
    let svc = service(two_warm_providers(), Arc::default());
    let err = svc.refinement_result("abc").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn batch_round_trip_stores_every_mapped_line() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();

    let submission = svc.start_batch_refinement(10).await.expect("submit");
    assert!(submission.persisted);
    assert_eq!(submission.batch_id, "msgbatch_test");
    assert_eq!(submission.correlation_map.len(), 2);
    assert_eq!(submission.correlation_map["idx_0"], "abc");
    assert_eq!(submission.correlation_map["idx_1"], "def");
    assert_eq!(api.submitted.lock().unwrap().len(), 2);

    api.set_status("ended");
    api.set_results(vec![
        succeeded("idx_0", serde_json::to_string(&refined_tags()).unwrap()),
        BatchResultLine {
            custom_id: "idx_1".to_owned(),
            outcome: Err("errored: overloaded".to_owned()),
        },
    ]);

    let report = svc
        .process_batch_results(&submission.batch_id, None)
        .await
        .expect("reconcile");
    assert_eq!(report.stored + report.errors, 2);
    assert_eq!(report.stored, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.skipped, 0);

    let refinements = svc.store().refinements();
    assert!(refinements
        .iter()
        .all(|r| r.batch_id.as_deref() == Some("msgbatch_test")));
    let batch = svc
        .store()
        .get_refinement_batch("msgbatch_test")
        .await
        .unwrap()
        .expect("batch record");
    assert!(batch.processed_at.is_some());
}

#[tokio::test]
async fn batch_submission_survives_failed_record_write() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();
    svc.store()
        .insert_refinement_batch("msgbatch_test", svc.tagging_version().as_str(), &json!({}), 0)
        .await
        .unwrap();

    let submission = svc
        .start_batch_refinement(10)
        .await
        .expect("submission returned despite store failure");
    assert!(!submission.persisted);
    assert_eq!(submission.batch_id, "msgbatch_test");
    assert_eq!(submission.correlation_map.len(), 2);
    assert_eq!(api.submitted.lock().unwrap().len(), 2);

    api.set_status("ended");
    let text = serde_json::to_string(&refined_tags()).unwrap();
    api.set_results(vec![succeeded("idx_0", text.clone()), succeeded("idx_1", text)]);
    let report = svc
        .process_batch_results(&submission.batch_id, Some(submission.correlation_map))
        .await
        .expect("reconcile with returned map");
    assert_eq!(report.stored, 2);
}

#[tokio::test]
async fn batch_lines_without_mapping_are_skipped() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();
    svc.start_batch_refinement(1).await.unwrap();

    api.set_status("ended");
    let text = serde_json::to_string(&refined_tags()).unwrap();
    api.set_results(vec![succeeded("idx_0", text.clone()), succeeded("idx_7", text)]);

    let report = svc.process_batch_results("msgbatch_test", None).await.unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn malformed_batch_lines_count_as_skipped() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();
    svc.start_batch_refinement(2).await.unwrap();

    api.set_status("ended");
    api.set_results(vec![succeeded(
        "idx_0",
        serde_json::to_string(&refined_tags()).unwrap(),
    )]);
    api.set_malformed(1);

    let report = svc.process_batch_results("msgbatch_test", None).await.unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(svc.store().refinements().len(), 1);
}

#[tokio::test]
async fn caller_supplied_map_overrides_stored_one() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();

    api.set_status("ended");
    api.set_results(vec![succeeded(
        "custom",
        serde_json::to_string(&refined_tags()).unwrap(),
    )]);
    let map = [("custom".to_owned(), "def".to_owned())].into_iter().collect();

    let report = svc
        .process_batch_results("external_batch", Some(map))
        .await
        .expect("reconcile with supplied map");
    assert_eq!(report.stored, 1);
    assert_eq!(svc.store().refinements()[0].seed, "def");
}

#[tokio::test]
async fn unfinished_batch_is_rejected() {
    let api = Arc::new(FakeBatchApi::default());
    let svc = service(two_warm_providers(), Arc::clone(&api));
    svc.generate_tags().await.unwrap();
    svc.start_batch_refinement(5).await.unwrap();

    let err = svc
        .process_batch_results("msgbatch_test", None)
        .await
        .unwrap_err();
    match err {
        PipelineError::BatchNotReady { status, .. } => assert_eq!(status, "in_progress"),
        other => panic!("expected BatchNotReady, got {other:?}"),
    }
    assert!(svc.store().refinements().is_empty());
}

#[tokio::test]
async fn unknown_batch_without_map_is_not_found() {
    let svc = service(two_warm_providers(), Arc::default());
    let err = svc.process_batch_results("nope", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownBatch(_)));
}

#[tokio::test]
async fn batch_start_with_nothing_pending_is_rejected() {
    let svc = service(two_warm_providers(), Arc::default());
    let err = svc.start_batch_refinement(10).await.unwrap_err();
    assert!(matches!(err, PipelineError::NothingToRefine(_)));
    assert!(matches!(
        svc.start_batch_refinement(0).await.unwrap_err(),
        PipelineError::InvalidRequest(_)
    ));
}
