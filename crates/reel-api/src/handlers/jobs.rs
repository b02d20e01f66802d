//! Background job handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reel_models::{sanitize_output_name, RenderRequest};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::handlers::render::parse_body;
use crate::state::AppState;

/// Response for an accepted job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: String,
    pub output_file: String,
    pub status_key: String,
}

/// Accept a render job and return before it runs.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request = parse_body(body)?;
    let handle = state.orchestrator.submit(&request)?;

    info!(
        job_id = %handle.job_id,
        status_key = %handle.status_key,
        "Render job accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: handle.job_id.to_string(),
            output_file: handle.output_name.clone(),
            status_key: handle.status_key.clone(),
        }),
    ))
}

/// Status of the job writing `output_file`.
///
/// A running job reports `running`; otherwise the stored terminal record is
/// returned as written.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(output_file): Path<String>,
) -> ApiResult<Response> {
    let output_name = sanitize_output_name(&output_file).map_err(ApiError::Validation)?;

    if state.orchestrator.is_running(&output_name) {
        let body = json!({ "status": "running", "outputName": output_name });
        return Ok(Json(body).into_response());
    }

    match state
        .orchestrator
        .status_store()
        .fetch(&output_name)
        .await?
    {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(ApiError::not_found(format!(
            "no status recorded for {}",
            output_name
        ))),
    }
}
