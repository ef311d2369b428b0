//! Recording fakes for every collaborator the runner talks to.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use actionrunner_core::artifact::{ArtifactBody, ArtifactFetchError, ArtifactStore};
use actionrunner_core::execution::ExecutionError;
use actionrunner_core::job::TargetEndpoint;
use actionrunner_core::metric::{Metric, MetricSink, PublishError};
use actionrunner_core::outcome::{JobReporter, ReportError};
use actionrunner_core::types::JobId;
use actionrunner_db::script::{ScriptLines, ScriptSource};
use actionrunner_db::{RecordSet, SessionCache, SessionConnector, SqlError, SqlSession};
use actionrunner_pipeline::{ActionRunner, Collaborators, JobProfile};

// ---------------------------------------------------------------------------
// Artifact store
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Serve,
    Panic,
    Hang,
}

pub struct FakeStore {
    objects: HashMap<String, Vec<u8>>,
    mode: StoreMode,
    pub fetches: AtomicUsize,
}

impl FakeStore {
    pub fn new(mode: StoreMode) -> Self {
        Self {
            objects: HashMap::new(),
            mode,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, key: &str, script: &str) -> Self {
        self.objects.insert(key.to_string(), script.as_bytes().to_vec());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn fetch(&self, key: &str) -> Result<ArtifactBody, ArtifactFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            StoreMode::Panic => panic!("store exploded"),
            StoreMode::Hang => futures::future::pending::<()>().await,
            StoreMode::Serve => {}
        }
        let bytes = self
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ArtifactFetchError::NotFound(key.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(bytes)))
    }
}

// ---------------------------------------------------------------------------
// Target sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSession {
    pub statements: Mutex<Vec<String>>,
    pub record_sets: Vec<RecordSet>,
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&self, statement: &str) -> Result<u64, SqlError> {
        self.statements.lock().unwrap().push(statement.to_string());
        if statement.contains("broken") {
            return Err(SqlError::Statement("You have an error in your SQL syntax".into()));
        }
        Ok(1)
    }

    async fn query(&self, statement: &str) -> Result<Vec<RecordSet>, SqlError> {
        self.statements.lock().unwrap().push(statement.to_string());
        Ok(self.record_sets.clone())
    }
}

pub struct FakeConnector {
    pub session: Arc<FakeSession>,
    pub refuse: bool,
    pub connects: AtomicUsize,
    pub targets: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(session: FakeSession) -> Self {
        Self {
            session: Arc::new(session),
            refuse: false,
            connects: AtomicUsize::new(0),
            targets: Mutex::new(vec![]),
        }
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(FakeSession::default())
        }
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, target: &TargetEndpoint) -> Result<Arc<dyn SqlSession>, SqlError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(target.to_string());
        if self.refuse {
            return Err(SqlError::Connect {
                target: target.to_string(),
                message: "connection refused".into(),
            });
        }
        Ok(self.session.clone())
    }
}

// ---------------------------------------------------------------------------
// Script source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeScripts {
    pub lines: Vec<String>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeScripts {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            opened: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl ScriptSource for FakeScripts {
    async fn open(&self, location: &str) -> Result<ScriptLines, ExecutionError> {
        self.opened.lock().unwrap().push(location.to_string());
        let items: Vec<std::io::Result<String>> = self.lines.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

// ---------------------------------------------------------------------------
// Metric sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub hang: bool,
    pub metrics: Mutex<Vec<Metric>>,
    pub attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Metric> {
        self.metrics.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn put_metric(&self, metric: &Metric) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if self.fail {
            return Err(PublishError::Transport("sink unreachable".into()));
        }
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Success(String),
    Failure(String, String),
}

#[derive(Default)]
pub struct RecordingReporter {
    pub fail: bool,
    pub reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    /// Wait up to a second for `n` reports to arrive (drop-path reports are
    /// delivered from a spawned task).
    pub async fn wait_for(&self, n: usize) -> Vec<Report> {
        for _ in 0..100 {
            if self.reports().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.reports()
    }
}

#[async_trait]
impl JobReporter for RecordingReporter {
    async fn report_success(&self, job_id: &JobId) -> Result<(), ReportError> {
        self.reports
            .lock()
            .unwrap()
            .push(Report::Success(job_id.to_string()));
        if self.fail {
            return Err(ReportError::Transport("orchestrator unreachable".into()));
        }
        Ok(())
    }

    async fn report_failure(&self, job_id: &JobId, diagnostic: &str) -> Result<(), ReportError> {
        self.reports
            .lock()
            .unwrap()
            .push(Report::Failure(job_id.to_string(), diagnostic.to_string()));
        if self.fail {
            return Err(ReportError::Transport("orchestrator unreachable".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// All fakes wired into one runner.
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub connector: Arc<FakeConnector>,
    pub scripts: Arc<FakeScripts>,
    pub sink: Arc<RecordingSink>,
    pub reporter: Arc<RecordingReporter>,
    pub runner: ActionRunner,
}

pub struct HarnessBuilder {
    profile: JobProfile,
    store: FakeStore,
    connector: FakeConnector,
    scripts: FakeScripts,
    sink: RecordingSink,
    reporter: RecordingReporter,
}

impl HarnessBuilder {
    pub fn new(profile: JobProfile) -> Self {
        Self {
            profile,
            store: FakeStore::new(StoreMode::Serve),
            connector: FakeConnector::new(FakeSession::default()),
            scripts: FakeScripts::default(),
            sink: RecordingSink::default(),
            reporter: RecordingReporter::default(),
        }
    }

    pub fn store(mut self, store: FakeStore) -> Self {
        self.store = store;
        self
    }

    pub fn connector(mut self, connector: FakeConnector) -> Self {
        self.connector = connector;
        self
    }

    pub fn scripts(mut self, scripts: FakeScripts) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn sink(mut self, sink: RecordingSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn reporter(mut self, reporter: RecordingReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn build(self, scratch_root: &Path) -> Harness {
        let store = Arc::new(self.store);
        let connector = Arc::new(self.connector);
        let scripts = Arc::new(self.scripts);
        let sink = Arc::new(self.sink);
        let reporter = Arc::new(self.reporter);

        let runner = ActionRunner::new(
            self.profile,
            Collaborators {
                artifacts: store.clone(),
                sessions: Arc::new(SessionCache::new(connector.clone())),
                scripts: scripts.clone(),
                metrics: sink.clone(),
                reporter: reporter.clone(),
                scratch_root: scratch_root.to_path_buf(),
            },
        );

        Harness {
            store,
            connector,
            scripts,
            sink,
            reporter,
            runner,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A CodePipeline invocation event carrying `params` as its UserParameters.
pub fn event(job_id: &str, params: serde_json::Value) -> Vec<u8> {
    serde_json::json!({
        "CodePipeline.job": {
            "id": job_id,
            "accountId": "111111111111",
            "data": {
                "actionConfiguration": {
                    "configuration": {
                        "FunctionName": "runner",
                        "UserParameters": params.to_string(),
                    }
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// The minimal valid parameter object.
pub fn cluster_params() -> serde_json::Value {
    serde_json::json!({
        "TiDBPublicIp": "10.0.0.5",
        "TiDBInstanceID": "i-0aaa",
        "TiKV1InstanceID": "i-0bbb",
        "TiKV2InstanceID": "i-0ccc",
    })
}

/// A shell script that prints the given stdout and exits with `code`.
pub fn workload_script(stdout: &str, code: i32) -> String {
    format!("#!/bin/sh\ncat <<'OUT'\n{stdout}\nOUT\nexit {code}\n")
}
