//! Pipeline invocations.
//!
//! The body is the raw orchestrator event; the job type comes from the
//! path. A job that fails is still a `200`: its verdict has been reported
//! and is returned in the outcome.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};

use actionrunner_core::error::CoreError;
use actionrunner_core::job::JobKind;
use actionrunner_core::outcome::JobOutcome;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /invoke/{job_type}
async fn invoke(
    State(state): State<AppState>,
    Path(job_type): Path<String>,
    body: Bytes,
) -> AppResult<Json<DataResponse<JobOutcome>>> {
    let kind = JobKind::from_name(&job_type)?;
    let runner = state
        .runner(kind)
        .ok_or_else(|| CoreError::UnknownJobType(job_type.clone()))?;

    let outcome = runner.handle(&body, state.shutdown.child_token()).await?;
    Ok(Json(DataResponse { data: outcome }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/invoke/{job_type}", post(invoke))
}
