//! Read-only HTTP view over a live run.
//!
//! Two endpoints, both JSON and both served concurrently with the run:
//! `GET /status` returns run-wide and per-step progress, `GET /outputs` the
//! extracted outputs of succeeded steps. Handlers read snapshots taken
//! under the run lock; serialization happens outside it. Internal failures
//! map to `500 {"error": ...}`. No mutating verbs are exposed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use trellis_runner::{RunHandle, StatusView};

/// Build the status router around a run handle.
pub fn router(handle: RunHandle) -> Router {
  Router::new()
    .route("/status", get(status))
    .route("/outputs", get(outputs))
    .with_state(handle)
}

/// Serve the status API until the caller drops the task.
pub async fn serve(listener: TcpListener, handle: RunHandle) -> std::io::Result<()> {
  tracing::info!(addr = ?listener.local_addr(), "status api listening");
  axum::serve(listener, router(handle)).await
}

async fn status(State(handle): State<RunHandle>) -> ApiResult<Json<StatusView>> {
  Ok(Json(handle.status()))
}

async fn outputs(State(handle): State<RunHandle>) -> ApiResult<Response> {
  let outputs = handle.outputs();
  let body = serde_json::to_value(outputs)?;
  Ok(Json(body).into_response())
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub error: String,
}

/// Maps any internal failure to `500 {"error": ...}`.
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = ErrorResponse {
      error: self.0.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
  }
}

impl<E> From<E> for ApiError
where
  E: Into<anyhow::Error>,
{
  fn from(err: E) -> Self {
    Self(err.into())
  }
}
