//! Direct SQL execution against a target cluster.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use actionrunner_core::job::TargetEndpoint;
use actionrunner_db::inline::{execute_inline, render_record_sets};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
    /// `host[:port]`; defaults to the configured target.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SqlResponse {
    pub output: String,
    pub record_sets: usize,
}

/// POST /sql
async fn exec_sql(
    State(state): State<AppState>,
    Json(request): Json<SqlRequest>,
) -> AppResult<Json<DataResponse<SqlResponse>>> {
    if request.sql.trim().is_empty() {
        return Err(AppError::BadRequest("sql must not be empty".into()));
    }

    let target = match request.target.as_deref() {
        Some(raw) => TargetEndpoint::parse(raw, state.target_port)
            .ok_or_else(|| AppError::BadRequest(format!("'{raw}' is not a valid target")))?,
        None => state
            .sql_target
            .clone()
            .ok_or_else(|| AppError::BadRequest("no target given and none configured".into()))?,
    };

    let session = state.sessions.get_or_connect(&target).await?;
    let sets = execute_inline(&*session, &request.sql).await?;
    tracing::info!(target = %target, record_sets = sets.len(), "Direct SQL executed");

    Ok(Json(DataResponse {
        data: SqlResponse {
            output: render_record_sets(&sets),
            record_sets: sets.len(),
        },
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sql", post(exec_sql))
}
