use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use claquete_core::{
    MediaExtractor, Orchestrator, RemoteVideoHost, StoreError, SubmitError, SubmitRequest,
    VideoFilter,
};

/// Builds the API router. Generic over extractor and host so tests can
/// inject doubles.
pub fn router<E, H>(orchestrator: Orchestrator<E, H>) -> Router
where
    E: MediaExtractor,
    H: RemoteVideoHost,
{
    Router::new()
        .route("/api/videos", post(submit_video::<E, H>))
        .route("/api/videos/status", get(queue_status::<E, H>))
        .route("/api/videos/{id}", delete(remove_video::<E, H>))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub url: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub additional_categories: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    success: bool,
    video_id: String,
    message: &'static str,
}

async fn submit_video<E, H>(
    State(orchestrator): State<Orchestrator<E, H>>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, AppError>
where
    E: MediaExtractor,
    H: RemoteVideoHost,
{
    let receipt = orchestrator
        .submit(SubmitRequest {
            url: body.url.unwrap_or_default(),
            category_id: body.category_id.unwrap_or_default(),
            additional_categories: body.additional_categories,
        })
        .await?;
    Ok(Json(SubmitResponse {
        success: true,
        video_id: receipt.video_id,
        message: if receipt.started {
            "video processing started"
        } else {
            "video queued for processing"
        },
    }))
}

async fn queue_status<E, H>(
    State(orchestrator): State<Orchestrator<E, H>>,
) -> Result<Json<serde_json::Value>, AppError>
where
    E: MediaExtractor,
    H: RemoteVideoHost,
{
    let queue = orchestrator.store().list(&VideoFilter::default())?;
    let counts = orchestrator.store().counts_by_status()?;
    Ok(Json(json!({ "queue": queue, "counts": counts })))
}

async fn remove_video<E, H>(
    State(orchestrator): State<Orchestrator<E, H>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    E: MediaExtractor,
    H: RemoteVideoHost,
{
    orchestrator.remove(&id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Maps domain failures to the API's HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Submit(SubmitError::AlreadyQueued { .. }) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Submit(SubmitError::Store(StoreError::NotFound(_)))
            | AppError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::Submit(SubmitError::Store(_)) | AppError::Store(_) => {
                warn!(error = %self, "internal error handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
            AppError::Submit(SubmitError::Extraction(_)) => {
                // A format listing that fails at submission time is a
                // validation outcome for the caller, same as a missing track.
                warn!(error = %self, "extraction failed during submission");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Submit(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
