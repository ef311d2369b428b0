use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use actionrunner_core::error::CoreError;
use actionrunner_core::invocation::DecodeError;
use actionrunner_db::SqlError;
use actionrunner_pipeline::RunnerError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent `{error, code}` JSON.
/// Job failures are not errors here: they are reported to the orchestrator
/// and returned as a normal outcome.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invocation without a usable job id.
    #[error("Invalid invocation: {0}")]
    Decode(#[from] DecodeError),

    /// The completion callback failed; the orchestrator may not know the verdict.
    #[error("Completion report failed: {0}")]
    Report(String),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<RunnerError> for AppError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Decode(e) => Self::Decode(e),
            report @ RunnerError::Report { .. } => Self::Report(report.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::UnknownJobType(name) => (
                    StatusCode::NOT_FOUND,
                    "UNKNOWN_JOB_TYPE",
                    format!("Unknown job type '{name}'"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            AppError::Decode(e) => (StatusCode::BAD_REQUEST, "INVALID_INVOCATION", e.to_string()),

            AppError::Report(msg) => {
                tracing::error!(error = %msg, "Completion report failed");
                (StatusCode::BAD_GATEWAY, "REPORT_FAILED", msg.clone())
            }

            AppError::Sql(e) => match e {
                SqlError::Connect { .. } => {
                    tracing::warn!(error = %e, "Target unavailable");
                    (StatusCode::BAD_GATEWAY, "TARGET_UNAVAILABLE", e.to_string())
                }
                SqlError::Statement(_) => (StatusCode::BAD_REQUEST, "SQL_ERROR", e.to_string()),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
