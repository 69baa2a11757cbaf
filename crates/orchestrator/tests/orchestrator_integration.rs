//! Integration tests for the orchestrator against the in-memory resource.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::{CancellationToken, Orchestrator, OrchestratorError, RunState, Step, StepError};
use serde_json::json;
use thiserror::Error;
use transactor::{
    CoordinatorError, InMemoryResource, InMemorySession, RecordSession, ResourceError, ResourceOp,
    TransactionalResource,
};

#[derive(Debug, Error, PartialEq)]
#[error("step {0} rejected the request")]
struct Rejected(String);

#[derive(Debug, Default)]
struct Payload {
    run_id: String,
    visited: Vec<String>,
}

impl Payload {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            visited: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct RecordingStep {
    name: String,
    trace: Trace,
    fail: Arc<AtomicBool>,
    cancel_after: bool,
}

#[async_trait]
impl Step<Payload, InMemorySession> for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        session: &mut InMemorySession,
        data: &mut Payload,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        self.trace.push(&self.name);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StepError::domain(Rejected(self.name.clone())));
        }

        let key = format!("{}/{}", data.run_id, self.name);
        session
            .insert("runs", &key, json!({ "step": self.name }))
            .await?;
        data.visited.push(self.name.clone());

        if self.cancel_after {
            cancel.cancel();
        }
        Ok(())
    }
}

struct HangingStep;

#[async_trait]
impl Step<Payload, InMemorySession> for HangingStep {
    fn name(&self) -> &str {
        "hang"
    }

    async fn execute(
        &self,
        session: &mut InMemorySession,
        _data: &mut Payload,
        _cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        session.insert("runs", "hang", json!({})).await?;
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Cancels `token` as soon as a flush has completed.
#[derive(Clone)]
struct CancelOnFlush {
    inner: InMemoryResource,
    token: CancellationToken,
}

#[async_trait]
impl TransactionalResource for CancelOnFlush {
    type Session = InMemorySession;

    async fn begin(&self) -> transactor::Result<InMemorySession> {
        self.inner.begin().await
    }

    async fn flush(&self, session: &mut InMemorySession) -> transactor::Result<()> {
        self.inner.flush(session).await?;
        self.token.cancel();
        Ok(())
    }

    async fn commit(&self, session: &mut InMemorySession) -> transactor::Result<()> {
        self.inner.commit(session).await
    }

    async fn rollback(&self, session: &mut InMemorySession) -> transactor::Result<()> {
        self.inner.rollback(session).await
    }

    fn abandon(&self, session: InMemorySession) {
        self.inner.abandon(session);
    }
}

struct TestHarness {
    resource: InMemoryResource,
    trace: Trace,
    failures: Vec<Arc<AtomicBool>>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            resource: InMemoryResource::new(),
            trace: Trace::default(),
            failures: Vec::new(),
        }
    }

    /// Builds `count` steps named step-1..step-n; step `cancel_after` (1-indexed)
    /// cancels the run once it has finished.
    fn orchestrator(
        &mut self,
        count: usize,
        cancel_after: Option<usize>,
    ) -> Orchestrator<InMemoryResource, Payload> {
        let mut steps: Vec<Box<dyn Step<Payload, InMemorySession>>> = Vec::new();
        for i in 1..=count {
            let fail = Arc::new(AtomicBool::new(false));
            self.failures.push(fail.clone());
            steps.push(Box::new(RecordingStep {
                name: format!("step-{i}"),
                trace: self.trace.clone(),
                fail,
                cancel_after: cancel_after == Some(i),
            }));
        }
        Orchestrator::new(self.resource.clone(), steps)
    }

    fn fail_step(&self, k: usize, fail: bool) {
        self.failures[k - 1].store(fail, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_success_begins_flushes_and_commits_once() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(5, None);
    let mut data = Payload::new("r1");

    let report = orchestrator
        .process_request(&mut data, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Committed);
    assert_eq!(report.steps.len(), 5);
    assert_eq!(
        h.resource.journal(),
        vec![ResourceOp::Begin, ResourceOp::Flush, ResourceOp::Commit]
    );
    assert_eq!(h.resource.count(ResourceOp::Rollback), 0);
    assert_eq!(h.resource.record_count("runs"), 5);
    assert_eq!(
        h.trace.entries(),
        vec!["step-1", "step-2", "step-3", "step-4", "step-5"]
    );
}

#[tokio::test]
async fn test_failing_step_stops_run_and_rolls_back() {
    for k in 1..=5 {
        let mut h = TestHarness::new();
        let orchestrator = h.orchestrator(5, None);
        h.fail_step(k, true);
        let mut data = Payload::new("r1");

        let err = orchestrator
            .process_request(&mut data, &CancellationToken::new())
            .await
            .unwrap_err();

        let expected_step = format!("step-{k}");
        assert_eq!(err.failed_step(), Some(expected_step.as_str()));
        assert_eq!(
            err.step_error().and_then(|e| e.downcast_domain::<Rejected>()),
            Some(&Rejected(expected_step.clone()))
        );

        // Steps after k never execute
        let expected_trace: Vec<String> = (1..=k).map(|i| format!("step-{i}")).collect();
        assert_eq!(h.trace.entries(), expected_trace);
        assert_eq!(data.visited.len(), k - 1);

        assert_eq!(
            h.resource.journal(),
            vec![ResourceOp::Begin, ResourceOp::Rollback]
        );
        assert_eq!(h.resource.record_count("runs"), 0);
    }
}

#[tokio::test]
async fn test_cancellation_between_steps_aborts_before_next_step() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(5, Some(2));
    let mut data = Payload::new("r1");

    let err = orchestrator
        .process_request(&mut data, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(
        err,
        OrchestratorError::Cancelled { ref stage } if stage == "step 'step-3'"
    ));
    assert_eq!(h.trace.entries(), vec!["step-1", "step-2"]);
    assert_eq!(
        h.resource.journal(),
        vec![ResourceOp::Begin, ResourceOp::Rollback]
    );
    assert_eq!(h.resource.record_count("runs"), 0);
}

#[tokio::test]
async fn test_cancelled_token_prevents_any_step() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(3, None);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(h.trace.entries().is_empty());
    assert_eq!(
        h.resource.journal(),
        vec![ResourceOp::Begin, ResourceOp::Rollback]
    );
}

#[tokio::test]
async fn test_cancellation_during_flush_lets_flush_finish_then_rolls_back() {
    let inner = InMemoryResource::new();
    let token = CancellationToken::new();
    let resource = CancelOnFlush {
        inner: inner.clone(),
        token: token.clone(),
    };
    let trace = Trace::default();
    let orchestrator: Orchestrator<CancelOnFlush, Payload> =
        Orchestrator::new(resource, Vec::new()).with_step(RecordingStep {
            name: "step-1".to_string(),
            trace: trace.clone(),
            fail: Arc::new(AtomicBool::new(false)),
            cancel_after: false,
        });

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &token)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Cancelled { ref stage } if stage == "commit"
    ));
    assert!(err.is_cancelled());
    assert_eq!(trace.entries(), vec!["step-1"]);
    assert_eq!(
        inner.journal(),
        vec![ResourceOp::Begin, ResourceOp::Flush, ResourceOp::Rollback]
    );
    assert_eq!(inner.record_count("runs"), 0);
}

#[tokio::test]
async fn test_commit_failure_rolls_back_once() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(3, None);
    h.resource.set_fail_on_commit(true);

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Transaction(CoordinatorError::CommitFailed { rollback: None, .. })
    ));
    assert_eq!(
        h.resource.journal(),
        vec![
            ResourceOp::Begin,
            ResourceOp::Flush,
            ResourceOp::Commit,
            ResourceOp::Rollback
        ]
    );
    assert_eq!(h.resource.record_count("runs"), 0);
}

#[tokio::test]
async fn test_flush_failure_rolls_back_without_commit() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(2, None);
    h.resource.set_fail_on_flush(true);

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Transaction(CoordinatorError::Resource(ResourceError::Unavailable(_)))
    ));
    assert_eq!(h.resource.count(ResourceOp::Commit), 0);
    assert_eq!(h.resource.count(ResourceOp::Rollback), 1);
}

#[tokio::test]
async fn test_rollback_failure_keeps_step_failure_primary() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(3, None);
    h.fail_step(2, true);
    h.resource.set_fail_on_rollback(true);

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::RollbackFailed { .. }));
    assert_eq!(err.failed_step(), Some("step-2"));
    assert!(matches!(
        err.rollback_error(),
        Some(CoordinatorError::Resource(ResourceError::Unavailable(_)))
    ));
    assert_eq!(h.resource.count(ResourceOp::Rollback), 1);
    assert_eq!(h.resource.record_count("runs"), 0);
}

#[tokio::test]
async fn test_commit_and_rollback_failure_reported_together() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(1, None);
    h.resource.set_fail_on_commit(true);
    h.resource.set_fail_on_rollback(true);

    let err = orchestrator
        .process_request(&mut Payload::new("r1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::Transaction(CoordinatorError::CommitFailed {
            source: ResourceError::Unavailable(_),
            rollback: Some(ResourceError::Unavailable(_)),
        })
    ));
    assert_eq!(h.resource.count(ResourceOp::Rollback), 1);
}

#[tokio::test]
async fn test_resubmission_uses_new_session() {
    let mut h = TestHarness::new();
    let orchestrator = h.orchestrator(2, None);
    h.fail_step(2, true);

    let mut data = Payload::new("r1");
    assert!(
        orchestrator
            .process_request(&mut data, &CancellationToken::new())
            .await
            .is_err()
    );

    h.fail_step(2, false);
    let mut data = Payload::new("r1");
    orchestrator
        .process_request(&mut data, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        h.resource.journal(),
        vec![
            ResourceOp::Begin,
            ResourceOp::Rollback,
            ResourceOp::Begin,
            ResourceOp::Flush,
            ResourceOp::Commit
        ]
    );
    assert_eq!(h.resource.record_count("runs"), 2);
}

#[tokio::test]
async fn test_concurrent_runs_own_their_sessions() {
    let mut h = TestHarness::new();
    let orchestrator = Arc::new(h.orchestrator(3, None));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let mut data = Payload::new(&format!("run-{i}"));
            orchestrator
                .process_request(&mut data, &CancellationToken::new())
                .await
                .map(|_| data.visited.len())
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }
    assert_eq!(h.resource.count(ResourceOp::Begin), 8);
    assert_eq!(h.resource.count(ResourceOp::Commit), 8);
    assert_eq!(h.resource.record_count("runs"), 24);
}

#[tokio::test]
async fn test_dropped_run_abandons_session() {
    let resource = InMemoryResource::new();
    let orchestrator: Orchestrator<_, Payload> =
        Orchestrator::new(resource.clone(), vec![Box::new(HangingStep)]);

    let mut data = Payload::new("r1");
    let cancel = CancellationToken::new();
    let result = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.process_request(&mut data, &cancel),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(
        resource.journal(),
        vec![ResourceOp::Begin, ResourceOp::Abandon]
    );
    assert_eq!(resource.record_count("runs"), 0);
}
