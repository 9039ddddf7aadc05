//! Admin HTTP server for the playout daemon.
//!
//! Exposes the status snapshot and the process-wide quality control on a
//! loopback port. This is the daemon's only HTTP surface; the full API layer
//! lives elsewhere.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

use crate::quality::QualityLevel;
use crate::status::{StatusReport, StatusReporter};

/// Default admin port
pub const DEFAULT_STATUS_PORT: u16 = 7879;

/// Errors that can occur when running the status server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct SetQualityRequest {
    quality: String,
}

#[derive(Debug, Serialize)]
struct SetQualityResponse {
    quality: String,
}

/// Handler for GET /status
async fn get_status(State(reporter): State<StatusReporter>) -> Json<StatusReport> {
    Json(reporter.report().await)
}

/// Handler for PUT /quality
///
/// Accepts one of the four level names; anything else is a 400, never a
/// silent fallback. The new level applies from each stream's next segment.
async fn put_quality(
    State(reporter): State<StatusReporter>,
    Json(request): Json<SetQualityRequest>,
) -> Response {
    match request.quality.parse::<QualityLevel>() {
        Ok(level) => {
            *reporter.quality().write().await = level;
            tracing::info!(quality = %level, "Quality level changed");
            Json(SetQualityResponse {
                quality: level.to_string(),
            })
            .into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Creates the axum Router with the admin endpoints
pub fn create_status_router(reporter: StatusReporter) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/quality", put(put_quality))
        .with_state(reporter)
}

/// Runs the admin HTTP server on 127.0.0.1:<port>
pub async fn run_status_server(reporter: StatusReporter, port: u16) -> Result<(), ServerError> {
    let app = create_status_router(reporter);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Status server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::new_shared_quality;
    use crate::registry::StreamRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rtmp_playout_config::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_reporter() -> StatusReporter {
        let mut config = Config::default();
        config.encoder.ffmpeg_path = "/nonexistent/ffmpeg-binary".to_string();
        StatusReporter::new(
            StreamRegistry::new(),
            new_shared_quality(QualityLevel::Medium),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn test_get_status_returns_json_report() {
        let reporter = test_reporter();
        *reporter.quality().write().await = QualityLevel::Low;
        let app = create_status_router(reporter);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["activeStreams"], 0);
        assert_eq!(json["maxStreams"], 2);
        assert!(json["availableMemoryMB"].is_u64());
        assert_eq!(json["currentQuality"], "low");
        assert_eq!(json["ffmpegAvailable"], false);
    }

    #[tokio::test]
    async fn test_put_quality_updates_shared_level() {
        let reporter = test_reporter();
        let quality = reporter.quality().clone();
        let app = create_status_router(reporter);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/quality")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"quality":"high"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*quality.read().await, QualityLevel::High);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["quality"], "high");
    }

    #[tokio::test]
    async fn test_put_quality_rejects_unknown_level() {
        let reporter = test_reporter();
        let quality = reporter.quality().clone();
        let app = create_status_router(reporter);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/quality")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"quality":"4k"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // The level is untouched.
        assert_eq!(*quality.read().await, QualityLevel::Medium);
    }
}
