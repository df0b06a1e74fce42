//! JSON API over the scheduler, session registry and word storage.

pub mod flashcards;
pub mod words;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::db::DbLockError;
use crate::session::SessionLockError;
use crate::srs::SrsError;
use crate::state::AppState;

pub use flashcards::{
  get_session, practice_start, refresh_session, reset_session, start_session, submit_review,
  summary, suspend_card,
};
pub use words::{add_word, delete_word};

#[derive(Error, Debug)]
pub enum ApiError {
  #[error(transparent)]
  Srs(#[from] SrsError),

  #[error("Database error: {0}")]
  Db(#[from] rusqlite::Error),

  #[error(transparent)]
  DbLock(#[from] DbLockError),

  #[error(transparent)]
  SessionLock(#[from] SessionLockError),

  #[error("{0} not found")]
  NotFound(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      Self::Srs(SrsError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
      Self::Srs(SrsError::EmptyQueue) => StatusCode::CONFLICT,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Db(_) | Self::DbLock(_) | Self::SessionLock(_) => {
        tracing::error!("Request failed: {}", self);
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    (
      status,
      Json(serde_json::json!({
        "error": self.to_string()
      })),
    )
      .into_response()
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/api/users/{user_id}/words", post(add_word))
    .route("/api/users/{user_id}/words/{word_id}", delete(delete_word))
    .route("/api/users/{user_id}/flashcards/summary", get(summary))
    .route(
      "/api/users/{user_id}/flashcards/session",
      get(get_session).post(start_session).delete(reset_session),
    )
    .route("/api/users/{user_id}/flashcards/practice", post(practice_start))
    .route("/api/users/{user_id}/flashcards/review", post(submit_review))
    .route("/api/users/{user_id}/flashcards/suspend", post(suspend_card))
    .route("/api/users/{user_id}/flashcards/refresh", post(refresh_session))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
