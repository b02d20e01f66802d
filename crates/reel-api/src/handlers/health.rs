//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use reel_media::{check_ffmpeg, check_ffprobe};
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    pub storage: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks that the media tools are on PATH and the blob store is reachable.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let tool_check = |result: Result<_, reel_media::MediaError>| match result {
        Ok(_) => CheckStatus::ok(None),
        Err(e) => CheckStatus::error(e.to_string()),
    };
    let ffmpeg = tool_check(check_ffmpeg());
    let ffprobe = tool_check(check_ffprobe());

    let storage = {
        let start = Instant::now();
        match state.storage.check_connectivity().await {
            Ok(()) => CheckStatus::ok(Some(start.elapsed().as_millis() as u64)),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let all_ok = ffmpeg.is_ok() && ffprobe.is_ok() && storage.is_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            ffmpeg,
            ffprobe,
            storage,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
