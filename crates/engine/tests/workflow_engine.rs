use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sparta_engine::{
    EngineError, EngineSettings, Pipeline, RetryPolicy, StageContext, StageDescriptor, StageExecutor, StageOutput, WorkflowEngine,
    WorkflowStore,
};
use sparta_types::{CreateWorkflowRequest, JsonObject, RemoteError, RemoteErrorKind, RunStatus, StageRecord, WorkflowStage, WorkflowStatus};
use tokio::sync::Notify;

/// Executor whose behaviour is fixed up front.
#[derive(Clone)]
struct Scripted {
    outcome: Result<StageOutput, RemoteError>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    fn ok(payload: Value) -> Self {
        Self {
            outcome: Ok(StageOutput::new(object(payload))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn output(output: StageOutput) -> Self {
        Self {
            outcome: Ok(output),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn err(error: RemoteError) -> Self {
        Self {
            outcome: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl StageExecutor for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Blocks until released, then succeeds.
struct Gated {
    release: Arc<Notify>,
}

#[async_trait]
impl StageExecutor for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
        self.release.notified().await;
        Ok(StageOutput::new(object(json!({"intent": "create_design"}))))
    }
}

/// Never finishes on its own.
struct Stuck;

#[async_trait]
impl StageExecutor for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
        std::future::pending::<()>().await;
        Ok(StageOutput::default())
    }
}

/// Fails with a connection error a fixed number of times, then succeeds.
struct Flaky {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl StageExecutor for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RemoteError::connection("connection refused"));
        }
        Ok(StageOutput::new(object(json!({"attempt": call + 1}))))
    }
}

struct Panicking;

#[async_trait]
impl StageExecutor for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
        panic!("executor exploded");
    }
}

/// Records the carry it was handed.
struct CarryProbe {
    seen: Arc<Mutex<Vec<JsonObject>>>,
}

#[async_trait]
impl StageExecutor for CarryProbe {
    fn name(&self) -> &str {
        "probe"
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, RemoteError> {
        self.seen.lock().unwrap().push(context.carry.clone());
        Ok(StageOutput::new(object(json!({"architecture": "ripple_carry"}))))
    }
}

fn object(value: Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn engine_with(stages: Vec<StageDescriptor>, settings: EngineSettings) -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(WorkflowStore::new()), Pipeline::new(stages).unwrap(), settings)
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        stage_timeout: Duration::from_secs(5),
        max_concurrent_stage_calls: 8,
        shutdown_grace: Duration::from_secs(5),
        retry: RetryPolicy::default(),
    }
}

fn happy_pipeline() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::new(WorkflowStage::Parsing, Scripted::ok(json!({"intent": "create_design"}))),
        StageDescriptor::new(WorkflowStage::Synthesis, Scripted::ok(json!({"architecture": {"kind": "ripple_carry"}}))),
        StageDescriptor::new(WorkflowStage::Generation, Scripted::ok(json!({"code": "module adder4;", "module_name": "adder4"}))),
        StageDescriptor::new(
            WorkflowStage::Emulation,
            Scripted::output(StageOutput::new(object(json!({"cycles_executed": 100}))).with_artifact("wave-123")),
        ),
    ]
}

async fn wait_for_terminal(engine: &WorkflowEngine, workflow_id: &str) -> WorkflowStatus {
    for _ in 0..500 {
        let status = engine.get_workflow_status(workflow_id).await.unwrap();
        if status.status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow {workflow_id} never reached a terminal status");
}

#[tokio::test]
async fn every_stage_succeeding_completes_the_workflow() {
    let engine = engine_with(happy_pipeline(), fast_settings());

    let created = engine
        .create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder").with_id("wf-adder"))
        .await
        .unwrap();
    assert_eq!(created.workflow_id, "wf-adder");
    assert_eq!(created.status, RunStatus::Pending);
    assert_eq!(created.progress_percentage, 0.0);

    let status = wait_for_terminal(&engine, "wf-adder").await;
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.current_stage, WorkflowStage::Complete);
    assert_eq!(status.progress_percentage, 100.0);
    assert_eq!(status.stages_completed, WorkflowStage::PIPELINE.to_vec());

    let result = engine.get_workflow_result("wf-adder").await.unwrap();
    let keys: Vec<_> = result.results.keys().copied().collect();
    assert_eq!(keys, WorkflowStage::PIPELINE.to_vec());
    assert!(result.results.values().all(StageRecord::is_completed));
    assert_eq!(result.results[&WorkflowStage::Generation].payload().unwrap()["module_name"], json!("adder4"));
    assert_eq!(result.artifacts, vec!["wave-123".to_string()]);
    assert!(result.errors.is_none());
    assert_eq!(result.completed_at, status.updated_at);
}

#[tokio::test]
async fn failing_stage_stops_the_run_and_records_the_error() {
    let emulation = Scripted::ok(json!({}));
    let emulation_calls = Arc::clone(&emulation.calls);
    let engine = engine_with(
        vec![
            StageDescriptor::new(WorkflowStage::Parsing, Scripted::ok(json!({"intent": "create_design"}))),
            StageDescriptor::new(WorkflowStage::Synthesis, Scripted::err(RemoteError::http_status(503, "unavailable"))),
            StageDescriptor::new(WorkflowStage::Generation, Scripted::ok(json!({}))),
            StageDescriptor::new(WorkflowStage::Emulation, emulation),
        ],
        fast_settings(),
    );

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    let status = wait_for_terminal(&engine, &created.workflow_id).await;

    assert_eq!(status.status, RunStatus::Failed);
    assert_eq!(status.current_stage, WorkflowStage::Synthesis);
    assert_eq!(status.stages_completed, vec![WorkflowStage::Parsing]);
    assert_eq!(status.progress_percentage, 25.0);

    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    assert_eq!(result.errors, Some(vec!["Synthesis: HTTP 503: unavailable".to_string()]));
    match &result.results[&WorkflowStage::Synthesis] {
        StageRecord::Failed { error, error_kind, .. } => {
            assert_eq!(error, "HTTP 503: unavailable");
            assert_eq!(*error_kind, RemoteErrorKind::HttpStatus);
        }
        other => panic!("expected failed record, got {other:?}"),
    }
    assert!(!result.results.contains_key(&WorkflowStage::Generation));
    assert_eq!(emulation_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_workflow_stays_cancelled_and_discards_late_results() {
    let release = Arc::new(Notify::new());
    let later = Scripted::ok(json!({}));
    let later_calls = Arc::clone(&later.calls);
    let engine = engine_with(
        vec![
            StageDescriptor::new(
                WorkflowStage::Parsing,
                Gated {
                    release: Arc::clone(&release),
                },
            ),
            StageDescriptor::new(WorkflowStage::Synthesis, later),
        ],
        fast_settings(),
    );

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    let receipt = engine.cancel_workflow(&created.workflow_id).await.unwrap();
    assert_eq!(receipt.workflow_id, created.workflow_id);
    assert_eq!(receipt.status, RunStatus::Cancelled);

    release.notify_one();
    let report = engine.shutdown(Duration::from_secs(5)).await;
    assert!(report.drained);

    let status = engine.get_workflow_status(&created.workflow_id).await.unwrap();
    assert_eq!(status.status, RunStatus::Cancelled);
    assert!(status.stages_completed.is_empty());
    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    assert!(result.results.is_empty());
    assert!(result.errors.is_none());
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_reports_not_found_for_unknown_and_finished_workflows() {
    let engine = engine_with(happy_pipeline(), fast_settings());

    assert!(matches!(engine.cancel_workflow("wf-missing").await, Err(EngineError::NotFound { .. })));

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    wait_for_terminal(&engine, &created.workflow_id).await;
    let err = engine.cancel_workflow(&created.workflow_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { ref id } if *id == created.workflow_id));
    assert_eq!(
        engine.get_workflow_status(&created.workflow_id).await.unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn second_cancel_is_rejected() {
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Stuck)], fast_settings());
    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();

    engine.cancel_workflow(&created.workflow_id).await.unwrap();
    assert!(matches!(
        engine.cancel_workflow(&created.workflow_id).await,
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn queries_for_unknown_ids_report_not_found() {
    let engine = engine_with(happy_pipeline(), fast_settings());
    assert!(matches!(engine.get_workflow_status("nope").await, Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.get_workflow_result("nope").await, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn duplicate_caller_ids_are_rejected() {
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Stuck)], fast_settings());
    engine
        .create_workflow(CreateWorkflowRequest::new("first").with_id("wf-dup"))
        .await
        .unwrap();

    let err = engine
        .create_workflow(CreateWorkflowRequest::new("second").with_id("wf-dup"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateWorkflow { ref id } if id == "wf-dup"));
    assert_eq!(engine.store().len().await, 1);
    assert_eq!(engine.store().get("wf-dup").await.unwrap().user_input, "first");
}

#[tokio::test]
async fn invalid_requests_store_nothing() {
    let engine = engine_with(happy_pipeline(), fast_settings());

    let err = engine.create_workflow(CreateWorkflowRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    let err = engine
        .create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder").with_id("bad/id"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    assert!(engine.store().is_empty().await);
}

#[tokio::test]
async fn later_stages_receive_earlier_carry() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = engine_with(
        vec![
            StageDescriptor::new(
                WorkflowStage::Parsing,
                Scripted::output(StageOutput::new(object(json!({"intent": "x"}))).with_carry("parsed_spec", json!({"width": 4}))),
            ),
            StageDescriptor::new(
                WorkflowStage::Synthesis,
                CarryProbe {
                    seen: Arc::clone(&seen),
                },
            ),
        ],
        fast_settings(),
    );

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    assert_eq!(wait_for_terminal(&engine, &created.workflow_id).await.status, RunStatus::Completed);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["parsed_spec"], json!({"width": 4}));
}

#[tokio::test]
async fn slow_stage_fails_with_timeout() {
    let settings = EngineSettings {
        stage_timeout: Duration::from_millis(50),
        ..fast_settings()
    };
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Stuck)], settings);

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    let status = wait_for_terminal(&engine, &created.workflow_id).await;
    assert_eq!(status.status, RunStatus::Failed);

    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    assert_eq!(result.errors, Some(vec!["Parsing: parsing call timed out after 50ms".to_string()]));
    assert!(matches!(
        result.results[&WorkflowStage::Parsing],
        StageRecord::Failed {
            error_kind: RemoteErrorKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn retryable_failures_are_retried_up_to_the_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let settings = EngineSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        },
        ..fast_settings()
    };
    let engine = engine_with(
        vec![StageDescriptor::new(
            WorkflowStage::Parsing,
            Flaky {
                failures: 2,
                calls: Arc::clone(&calls),
            },
        )],
        settings,
    );

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    assert_eq!(wait_for_terminal(&engine, &created.workflow_id).await.status, RunStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    assert_eq!(result.results[&WorkflowStage::Parsing].payload().unwrap()["attempt"], json!(3));
}

#[tokio::test]
async fn non_retryable_failures_are_not_retried() {
    let failing = Scripted::err(RemoteError::malformed("expected a JSON object"));
    let calls = Arc::clone(&failing.calls);
    let settings = EngineSettings {
        retry: RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(5),
        },
        ..fast_settings()
    };
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, failing)], settings);

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    assert_eq!(wait_for_terminal(&engine, &created.workflow_id).await.status, RunStatus::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_attempt_policy_does_not_retry() {
    let failing = Scripted::err(RemoteError::connection("connection refused"));
    let calls = Arc::clone(&failing.calls);
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, failing)], fast_settings());

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    assert_eq!(wait_for_terminal(&engine, &created.workflow_id).await.status, RunStatus::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_executor_fails_the_workflow() {
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Panicking)], fast_settings());

    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();
    let status = wait_for_terminal(&engine, &created.workflow_id).await;
    assert_eq!(status.status, RunStatus::Failed);

    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("panicked"));
    assert!(errors[0].contains("executor exploded"));
}

#[tokio::test]
async fn shutdown_interrupts_runs_that_outlive_the_grace_period() {
    let engine = engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Stuck)], fast_settings());
    let created = engine.create_workflow(CreateWorkflowRequest::new("Create a 4-bit adder")).await.unwrap();

    // Let the run reach its stage call.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = engine.shutdown(Duration::from_millis(50)).await;
    assert!(!report.drained);
    assert_eq!(report.interrupted_runs, 1);
    assert_eq!(engine.active_runs(), 0);

    let result = engine.get_workflow_result(&created.workflow_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.results[&WorkflowStage::Parsing],
        StageRecord::Failed {
            error_kind: RemoteErrorKind::Interrupted,
            ..
        }
    ));

    let err = engine.create_workflow(CreateWorkflowRequest::new("too late")).await.unwrap_err();
    assert!(matches!(err, EngineError::ShuttingDown));
    assert!(!engine.is_accepting());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn creates_racing_shutdown_are_drained_or_refused() {
    let engine = Arc::new(engine_with(vec![StageDescriptor::new(WorkflowStage::Parsing, Stuck)], fast_settings()));

    let creates: Vec<_> = (0..64)
        .map(|index| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .create_workflow(CreateWorkflowRequest::new(format!("design {index}")))
                    .await
            })
        })
        .collect();
    engine.shutdown(Duration::from_millis(20)).await;

    let mut admitted = Vec::new();
    for create in creates {
        match create.await.unwrap() {
            Ok(status) => admitted.push(status.workflow_id),
            Err(error) => assert!(matches!(error, EngineError::ShuttingDown), "unexpected error: {error}"),
        }
    }
    assert_eq!(engine.active_runs(), 0);
    for id in &admitted {
        let status = engine.get_workflow_status(id).await.unwrap().status;
        assert!(status.is_terminal(), "workflow {id} escaped the drain as {status}");
    }
}

#[tokio::test]
async fn many_workflows_run_independently() {
    let engine = engine_with(happy_pipeline(), fast_settings());

    let mut ids = Vec::new();
    for index in 0..20 {
        let status = engine
            .create_workflow(CreateWorkflowRequest::new(format!("design {index}")))
            .await
            .unwrap();
        ids.push(status.workflow_id);
    }

    let report = engine.shutdown(Duration::from_secs(5)).await;
    assert!(report.drained);

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
    for id in &ids {
        assert_eq!(engine.get_workflow_status(id).await.unwrap().status, RunStatus::Completed);
    }
}

#[tokio::test]
async fn parameters_and_metadata_are_kept_on_the_record() {
    let engine = engine_with(happy_pipeline(), fast_settings());
    let created = engine
        .create_workflow(
            CreateWorkflowRequest::new("Create a 4-bit adder")
                .with_parameters(object(json!({"language": "verilog"})))
                .with_metadata(object(json!({"requested_by": "lab-7"}))),
        )
        .await
        .unwrap();

    let stored = engine.store().get(&created.workflow_id).await.unwrap();
    assert_eq!(stored.parameters["language"], json!("verilog"));
    assert_eq!(stored.metadata["requested_by"], json!("lab-7"));
}
