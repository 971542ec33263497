//! HTTP boundary: one analysis endpoint plus a health probe.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::data::loader::TableFormat;
use crate::error::PipelineError;
use crate::pipeline::Analyzer;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Multipart field carrying the table.
const FILE_FIELD: &str = "file";

/// Read-only state shared by all requests.
#[derive(Debug, Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
    pub default_limit: usize,
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Errors → HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Pipeline(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Pipeline(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("server error: {e}"),
            ),
        };
        error!("request failed ({status}): {detail}");
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyzeParams>,
    mut multipart: Multipart,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    let limit = params.limit.unwrap_or(state.default_limit);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((file_name, bytes));
        break;
    }
    let Some((file_name, payload)) = upload else {
        return Err(ApiError::BadRequest(format!(
            "multipart field '{FILE_FIELD}' is required"
        )));
    };

    info!(
        "analyzing upload {} ({} bytes, limit {limit})",
        file_name.as_deref().unwrap_or("<unnamed>"),
        payload.len()
    );
    let format = TableFormat::detect(file_name.as_deref(), &payload);

    // Parsing and interpolation are CPU-bound; keep them off the event loop.
    let rows = tokio::task::spawn_blocking(move || state.analyzer.analyze(&payload, format, limit))
        .await
        .map_err(|e| PipelineError::Internal(format!("analysis task failed: {e}")))??;
    Ok(Json(rows))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(Arc::new(state))
}

/// Serve until Ctrl-C.
pub async fn serve(bind: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening on http://{bind}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "abyss-test-boundary";

    fn state() -> AppState {
        AppState {
            analyzer: Analyzer::default(),
            default_limit: 100,
        }
    }

    fn multipart_request(uri: &str, field: &str, file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, JsonValue) {
        let response = router(state()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn analyze_returns_rows() {
        let csv = "Depthm,T_degC,Salnty\n500,10,34\n1500,4,34.5\n10,18,33\n";
        let (status, body) = send(multipart_request("/analyze?limit=2", "file", "b.csv", csv)).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["TALK_interpolated"], json!(2370.0));
        assert_eq!(rows[1]["TALK_interpolated"], json!(2356.0));
    }

    #[tokio::test]
    async fn missing_column_is_bad_request() {
        let csv = "Depthm,T_degC\n500,10\n";
        let (status, body) = send(multipart_request("/analyze", "file", "b.csv", csv)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("salinity"));
    }

    #[tokio::test]
    async fn malformed_payload_is_server_error() {
        let (status, body) =
            send(multipart_request("/analyze", "file", "b.json", "{not json")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("server error:"));
    }

    #[tokio::test]
    async fn zero_limit_and_missing_file_are_rejected() {
        let csv = "Depthm,T_degC,Salnty\n500,10,34\n";
        let (status, _) = send(multipart_request("/analyze?limit=0", "file", "b.csv", csv)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(multipart_request("/analyze", "upload", "b.csv", csv)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn health_answers_while_an_analysis_runs() {
        let app = router(state());
        let mut csv = String::from("Depthm,T_degC,Salnty\n");
        for i in 0..20_000 {
            csv.push_str(&format!("{},{},34\n", i % 3000, 4 + i % 10));
        }
        let analysis = tokio::spawn(
            app.clone()
                .oneshot(multipart_request("/analyze?limit=1", "file", "b.csv", &csv)),
        );

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let health = app.oneshot(request).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let response = analysis.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
