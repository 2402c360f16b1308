//! Integration tests for the job engine over the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::test_execution_config;
use provider_api::engine::admission::admit;
use provider_api::engine::{AdmissionError, JobEngine, WaitError};
use provider_core::job::{JobParameter, JobRecord, JobState, ParamValue};
use provider_core::store::{JobStore, MemoryJobStore, StoreError};
use tokio::sync::{oneshot, Mutex};

fn params(pairs: &[(&str, &str)]) -> Vec<(String, ParamValue)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), ParamValue::from(*value)))
        .collect()
}

/// Delegates to a [`MemoryJobStore`] and injects failures.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryJobStore,
    fail_admit: bool,
    fail_delete: bool,
    fail_mark_started: bool,
    fail_mark_completed: bool,
    /// Hold `admit_job` after the write until the receiver fires.
    hold_after_admit: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

fn injected() -> StoreError {
    StoreError::Backend("injected failure".into())
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create_job(&self, service: &str, job_id: &str) -> Result<(), StoreError> {
        self.inner.create_job(service, job_id).await
    }

    async fn admit_job(
        &self,
        service: &str,
        job_id: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StoreError> {
        if self.fail_admit {
            return Err(injected());
        }
        self.inner.admit_job(service, job_id, parameters).await?;
        let hold = self.hold_after_admit.lock().await.take();
        if let Some((written, release)) = hold {
            let _ = written.send(());
            let _ = release.await;
        }
        Ok(())
    }

    async fn add_parameter(&self, job_id: &str, name: &str, value: &str) -> Result<(), StoreError> {
        self.inner.add_parameter(job_id, name, value).await
    }

    async fn delete_job_and_parameters(&self, job_id: &str) -> Result<(), StoreError> {
        if self.fail_delete {
            return Err(injected());
        }
        self.inner.delete_job_and_parameters(job_id).await
    }

    async fn mark_started(&self, job_id: &str) -> Result<(), StoreError> {
        if self.fail_mark_started {
            return Err(injected());
        }
        self.inner.mark_started(job_id).await
    }

    async fn mark_failed_before_start(&self, job_id: &str, message: &str) -> Result<(), StoreError> {
        self.inner.mark_failed_before_start(job_id, message).await
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
        suppress_stdout: bool,
    ) -> Result<(), StoreError> {
        if self.fail_mark_completed {
            return Err(injected());
        }
        self.inner
            .mark_completed(job_id, exit_code, stdout, stderr, suppress_stdout)
            .await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        self.inner.get_job(job_id).await
    }

    async fn get_parameters(&self, job_id: &str) -> Result<Vec<JobParameter>, StoreError> {
        self.inner.get_parameters(job_id).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

// ---------------------------------------------------------------------------
// Test: admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admitted_job_is_created_with_parameters_in_order() {
    let root = tempfile::tempdir().unwrap();
    let config = test_execution_config(root.path(), &["echo"]);
    let store = MemoryJobStore::new();

    admit(&store, &config, "job-1", &params(&[("--b", "2"), ("--a", "1")]))
        .await
        .unwrap();

    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Created);
    assert_eq!(job.service, "svc-a");
    assert!(job.start_processing.is_none());

    let stored = store.get_parameters("job-1").await.unwrap();
    let names: Vec<_> = stored.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["--b", "--a"]);
}

#[tokio::test]
async fn duplicate_submission_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(store, test_execution_config(root.path(), &["echo"]));

    engine.submit("job-1", &[]).await.unwrap();
    let second = engine.submit("job-1", &[]).await;

    assert_matches!(
        second,
        Err(AdmissionError::Store(StoreError::DuplicateJob(id))) if id == "job-1"
    );
}

#[tokio::test]
async fn store_failure_during_admission_leaves_nothing() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore {
        fail_admit: true,
        ..FlakyStore::default()
    });
    let engine = JobEngine::new(store.clone(), test_execution_config(root.path(), &["echo"]));

    let result = engine
        .submit("job-1", &params(&[("--a", "1"), ("--b", "2"), ("--c", "3")]))
        .await;

    assert_matches!(result, Err(AdmissionError::Store(StoreError::Backend(_))));
    assert!(store.get_job("job-1").await.unwrap().is_none());
    assert!(store.get_parameters("job-1").await.unwrap().is_empty());
    assert!(!root.path().join("job-1").exists());
    assert_eq!(engine.active_executions(), 0);
}

#[tokio::test]
async fn job_is_visible_only_with_all_its_parameters() {
    let root = tempfile::tempdir().unwrap();
    let (written_tx, written_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let store = Arc::new(FlakyStore {
        hold_after_admit: Mutex::new(Some((written_tx, release_rx))),
        ..FlakyStore::default()
    });
    let engine = Arc::new(JobEngine::new(
        store.clone(),
        test_execution_config(root.path(), &["echo"]),
    ));

    // Nothing is visible before admission.
    assert!(engine.job_info("job-1").await.unwrap().is_none());

    let submitter = Arc::clone(&engine);
    let submit = tokio::spawn(async move {
        submitter
            .submit("job-1", &params(&[("--a", "1"), ("--b", "2"), ("--c", "3")]))
            .await
    });

    // Admission is paused right after the store write.
    written_rx.await.unwrap();
    let info = engine.job_info("job-1").await.unwrap().unwrap();
    let names: Vec<_> = info.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["--a", "--b", "--c"]);

    release_tx.send(()).unwrap();
    submit.await.unwrap().unwrap();
    engine.wait_for_completion("job-1").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_readers_never_see_partial_parameters() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = Arc::new(JobEngine::new(
        Arc::clone(&store),
        test_execution_config(root.path(), &["true"]),
    ));
    let names: Vec<String> = (0..50).map(|i| format!("--p{i}")).collect();
    let many: Vec<(String, ParamValue)> = names
        .iter()
        .map(|n| (n.clone(), ParamValue::from("v")))
        .collect();

    let reader_store = Arc::clone(&store);
    let reader = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..500 {
            if reader_store.get_job("job-1").await.unwrap().is_some() {
                seen.push(reader_store.get_parameters("job-1").await.unwrap().len());
            }
            tokio::task::yield_now().await;
        }
        seen
    });

    engine.submit("job-1", &many).await.unwrap();

    for count in reader.await.unwrap() {
        assert_eq!(count, 50);
    }
}

#[tokio::test]
async fn failed_rollback_is_reported_as_the_original_error() {
    let root = tempfile::tempdir().unwrap();
    // A regular file where the root directory should be.
    let blocker = root.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let store = Arc::new(FlakyStore {
        fail_delete: true,
        ..FlakyStore::default()
    });
    let engine = JobEngine::new(store.clone(), test_execution_config(&blocker, &["echo"]));

    let result = engine.submit("job-1", &params(&[("--a", "1")])).await;

    assert_matches!(result, Err(AdmissionError::WorkingDirectory { .. }));
    // The row could not be removed, but nothing was dispatched for it.
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Created);
    assert_eq!(engine.active_executions(), 0);
}

// ---------------------------------------------------------------------------
// Test: execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitted_job_runs_to_completion() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(store, test_execution_config(root.path(), &["printf"]));

    engine.submit("job-1", &params(&[("ok\\n", "")])).await.unwrap();
    engine.wait_for_start("job-1").await.unwrap();
    let job = engine.wait_for_completion("job-1").await.unwrap();

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.std_out.as_deref(), Some("ok\n"));
    assert!(job.start_processing.unwrap() <= job.end_processing.unwrap());
}

#[tokio::test]
async fn flag_parameter_reaches_the_command_line() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(store, test_execution_config(root.path(), &["echo"]));

    engine.submit("job-1", &params(&[("--flag", "")])).await.unwrap();
    let job = engine.wait_for_completion("job-1").await.unwrap();

    assert_eq!(job.exit_code, Some(0));
    assert!(job.std_out.unwrap().contains("--flag"));

    let info = engine.job_info("job-1").await.unwrap().unwrap();
    assert_eq!(info.parameters[0].name, "--flag");
    assert_eq!(info.parameters[0].value, "");
}

#[tokio::test]
async fn process_runs_in_the_job_directory() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(store, test_execution_config(root.path(), &["touch", "marker"]));

    engine.submit("job-1", &[]).await.unwrap();
    engine.wait_for_completion("job-1").await.unwrap();

    assert!(root.path().join("job-1").join("marker").exists());
}

#[tokio::test]
async fn failed_start_mark_never_launches_the_process() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore {
        fail_mark_started: true,
        ..FlakyStore::default()
    });
    let engine = JobEngine::new(
        store.clone(),
        test_execution_config(root.path(), &["touch", "marker"]),
    );

    engine.submit("job-1", &[]).await.unwrap();
    let result = engine.wait_for_start("job-1").await;

    assert_matches!(result, Err(WaitError::FailedToStart { .. }));
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::FailedToStart);
    assert_eq!(job.exit_code, Some(-1));
    assert!(job.start_processing.is_none());
    assert!(engine.shutdown(Duration::from_secs(1)).await);
    assert!(!root.path().join("job-1").join("marker").exists());
}

#[tokio::test]
async fn failed_completion_write_leaves_job_started() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(FlakyStore {
        fail_mark_completed: true,
        ..FlakyStore::default()
    });
    let engine = JobEngine::new(store.clone(), test_execution_config(root.path(), &["echo"]));

    engine.submit("job-1", &params(&[("--a", "1")])).await.unwrap();
    engine.wait_for_start("job-1").await.unwrap();

    // The dispatcher task ends normally after logging the failed write.
    assert!(engine.shutdown(Duration::from_secs(5)).await);

    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Started);
    assert!(job.exit_code.is_none());
    assert!(job.end_processing.is_none());
}

// ---------------------------------------------------------------------------
// Test: service isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engines_only_see_their_own_jobs() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

    let config_a = test_execution_config(root.path(), &["echo"]);
    let mut config_b = test_execution_config(root.path(), &["echo"]);
    config_b.service_id = "svc-b".into();

    let engine_a = JobEngine::new(Arc::clone(&store), config_a);
    let engine_b = JobEngine::new(Arc::clone(&store), config_b);

    engine_a.submit("job-a", &[]).await.unwrap();
    engine_a.wait_for_completion("job-a").await.unwrap();

    assert!(engine_a.job_info("job-a").await.unwrap().is_some());
    assert!(engine_b.job_info("job-a").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_waits_for_running_executions() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(
        Arc::clone(&store),
        test_execution_config(root.path(), &["sleep", "0.2"]),
    );

    engine.submit("job-1", &[]).await.unwrap();
    engine.wait_for_start("job-1").await.unwrap();
    assert_eq!(engine.active_executions(), 1);

    assert!(engine.shutdown(Duration::from_secs(5)).await);

    assert_eq!(engine.active_executions(), 0);
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.state(), JobState::Completed);
}

#[tokio::test]
async fn shutdown_gives_up_after_timeout() {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::new(store, test_execution_config(root.path(), &["sleep", "2"]));

    engine.submit("job-1", &[]).await.unwrap();
    engine.wait_for_start("job-1").await.unwrap();

    assert!(!engine.shutdown(Duration::from_millis(50)).await);
    assert_eq!(engine.active_executions(), 1);
}
