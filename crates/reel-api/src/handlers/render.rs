//! Synchronous render handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use reel_models::{RenderRequest, Resolution};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for a finished render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub message: String,
    pub output_file: String,
    pub resolution: Resolution,
    pub duration_secs: f64,
    pub scene_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Unwrap a JSON body, turning every rejection into a 400.
pub(crate) fn parse_body(
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<RenderRequest> {
    body.map(|Json(request)| request)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Render a video and respond once it is uploaded.
pub async fn render_video(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> ApiResult<Json<RenderResponse>> {
    let request = parse_body(body)?;
    info!(
        output_file = %request.output_file,
        scenes = request.scenes.len(),
        "Synchronous render requested"
    );

    let summary = state.orchestrator.run(&request).await?;

    Ok(Json(RenderResponse {
        message: "Video created successfully".to_string(),
        output_file: summary.output_name,
        resolution: summary.resolution,
        duration_secs: summary.duration_secs,
        scene_count: summary.scene_count,
        warnings: summary.warnings,
    }))
}
