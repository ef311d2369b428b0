//! Test app wiring with in-memory collaborators.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use actionrunner_api::config::ServerConfig;
use actionrunner_api::router::build_app_router;
use actionrunner_api::state::AppState;
use actionrunner_core::artifact::{ArtifactBody, ArtifactFetchError, ArtifactStore};
use actionrunner_core::execution::ExecutionError;
use actionrunner_core::job::{JobKind, TargetEndpoint};
use actionrunner_core::metric::{Metric, MetricSink, PublishError};
use actionrunner_core::outcome::{JobReporter, ReportError};
use actionrunner_core::types::JobId;
use actionrunner_db::script::{ScriptLines, ScriptSource};
use actionrunner_db::{RecordSet, SessionCache, SessionConnector, SqlError, SqlSession};
use actionrunner_pipeline::{ActionRunner, Collaborators, JobProfile};

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct NoArtifacts;

#[async_trait]
impl ArtifactStore for NoArtifacts {
    async fn fetch(&self, key: &str) -> Result<ArtifactBody, ArtifactFetchError> {
        Err(ArtifactFetchError::NotFound(key.to_string()))
    }
}

struct NoScripts;

#[async_trait]
impl ScriptSource for NoScripts {
    async fn open(&self, location: &str) -> Result<ScriptLines, ExecutionError> {
        Err(ExecutionError::Transport(format!("{location} unavailable")))
    }
}

struct NullSink;

#[async_trait]
impl MetricSink for NullSink {
    async fn put_metric(&self, _metric: &Metric) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Session returning one fixed record set; statements containing "oops" fail.
struct CannedSession;

#[async_trait]
impl SqlSession for CannedSession {
    async fn execute(&self, _statement: &str) -> Result<u64, SqlError> {
        Ok(0)
    }

    async fn query(&self, statement: &str) -> Result<Vec<RecordSet>, SqlError> {
        if statement.contains("oops") {
            return Err(SqlError::Statement("syntax error near 'oops'".into()));
        }
        Ok(vec![RecordSet {
            columns: vec!["1".into()],
            rows: vec![vec!["1".into()]],
        }])
    }
}

/// Refuses hosts starting with "down", serves everything else.
#[derive(Default)]
pub struct Connector {
    pub targets: Mutex<Vec<String>>,
}

impl Connector {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for Connector {
    async fn connect(&self, target: &TargetEndpoint) -> Result<Arc<dyn SqlSession>, SqlError> {
        self.targets.lock().unwrap().push(target.to_string());
        if target.host.starts_with("down") {
            return Err(SqlError::Connect {
                target: target.to_string(),
                message: "connection refused".into(),
            });
        }
        Ok(Arc::new(CannedSession))
    }
}

#[derive(Default)]
pub struct Reporter {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl Reporter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobReporter for Reporter {
    async fn report_success(&self, job_id: &JobId) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(format!("success:{job_id}"));
        if self.fail {
            return Err(ReportError::Transport("unreachable".into()));
        }
        Ok(())
    }

    async fn report_failure(&self, job_id: &JobId, _diagnostic: &str) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(format!("failure:{job_id}"));
        if self.fail {
            return Err(ReportError::Transport("unreachable".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub app: Router,
    pub reporter: Arc<Reporter>,
    pub connector: Arc<Connector>,
}

/// Port the test app assumes for targets given without one.
pub const TEST_TARGET_PORT: u16 = 4001;

/// Build the full router with verify and sql runners enabled.
pub fn build_test_app(scratch: &Path, reporter: Reporter, sql_target: Option<&str>) -> TestApp {
    let reporter = Arc::new(reporter);
    let connector = Arc::new(Connector::default());
    let sessions = Arc::new(SessionCache::new(connector.clone()));

    let deps = Collaborators {
        artifacts: Arc::new(NoArtifacts),
        sessions: Arc::clone(&sessions),
        scripts: Arc::new(NoScripts),
        metrics: Arc::new(NullSink),
        reporter: reporter.clone(),
        scratch_root: scratch.to_path_buf(),
    };

    let runners = [JobKind::Verify, JobKind::Sql]
        .into_iter()
        .map(|kind| {
            let profile = JobProfile::for_kind(kind).with_target_port(TEST_TARGET_PORT);
            let runner = ActionRunner::new(profile, deps.clone());
            (kind, Arc::new(runner))
        })
        .collect();

    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        runners: Arc::new(runners),
        sessions,
        sql_target: sql_target.and_then(|raw| TargetEndpoint::parse(raw, TEST_TARGET_PORT)),
        target_port: TEST_TARGET_PORT,
        shutdown: CancellationToken::new(),
    };

    TestApp {
        app: build_app_router(state, &config),
        reporter,
        connector,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, json.to_string()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// CodePipeline event with the given job id and user parameters.
pub fn event(job_id: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "CodePipeline.job": {
            "id": job_id,
            "data": {
                "actionConfiguration": {
                    "configuration": { "UserParameters": params.to_string() }
                }
            }
        }
    })
}
