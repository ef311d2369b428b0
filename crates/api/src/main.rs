use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use actionrunner_api::config::{RunnerConfig, ServerConfig};
use actionrunner_api::router::build_app_router;
use actionrunner_api::state::{build_runners, AppState};
use actionrunner_cloud::cloudwatch::CloudWatchMetricSink;
use actionrunner_cloud::codepipeline::CodePipelineReporter;
use actionrunner_cloud::http_script::HttpScriptSource;
use actionrunner_cloud::s3::S3ArtifactStore;
use actionrunner_db::mysql::MySqlConnector;
use actionrunner_db::SessionCache;
use actionrunner_pipeline::Collaborators;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let runner_config = RunnerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        bucket = %runner_config.artifact_bucket,
        scratch_dir = %runner_config.scratch_dir.display(),
        workload_timeout_secs = runner_config.workload_timeout.as_secs(),
        "Loaded runner configuration"
    );

    // --- AWS collaborators ---
    let sdk_config = actionrunner_cloud::load_sdk_config(runner_config.aws_region.as_deref()).await;
    let scripts = HttpScriptSource::new().expect("Failed to build HTTP client");

    // --- Target sessions (created once, shared by every runner) ---
    let sessions = Arc::new(
        SessionCache::new(Arc::new(MySqlConnector::new(runner_config.credentials())))
            .with_idle_ttl(runner_config.session_idle_ttl),
    );

    let deps = Collaborators {
        artifacts: Arc::new(S3ArtifactStore::from_conf(
            &sdk_config,
            &runner_config.artifact_bucket,
        )),
        sessions: Arc::clone(&sessions),
        scripts: Arc::new(scripts),
        metrics: Arc::new(CloudWatchMetricSink::from_conf(&sdk_config)),
        reporter: Arc::new(CodePipelineReporter::from_conf(&sdk_config)),
        scratch_root: runner_config.scratch_dir.clone(),
    };
    let runners: HashMap<_, _> = build_runners(&runner_config, &deps);
    tracing::info!(job_types = runners.len(), "Runners ready");

    // --- App state ---
    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(config.clone()),
        runners: Arc::new(runners),
        sessions,
        sql_target: runner_config.sql_target(),
        target_port: runner_config.target_port,
        shutdown: shutdown.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // In-flight invocations are cancelled once the grace period expires so
    // each still reports a verdict before the process exits.
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let cancel_jobs = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            tracing::warn!("Grace period expired, cancelling in-flight invocations");
            cancel_jobs.cancel();
        });
    });

    server.await.expect("Server error");
    shutdown.cancel();
    tracing::info!("Graceful shutdown complete");
}

/// `LOG_FORMAT=json` switches to JSON lines; anything else is human-readable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "actionrunner_api=debug,actionrunner_pipeline=debug,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
