//! Word dictionary endpoints.
//!
//! Saving a word creates a NEW card; deleting a word drops its card and
//! history. Editing content is left to the wider application.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::db;
use crate::domain::WordContent;
use crate::srs::SrsError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddWordRequest {
  /// Flat `word_<lang>` / `sentence_<lang>` map
  pub content: WordContent,
}

#[derive(Debug, Serialize)]
pub struct AddWordResponse {
  pub id: i64,
}

/// POST /api/users/{user_id}/words
pub async fn add_word(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
  Json(request): Json<AddWordRequest>,
) -> Result<impl IntoResponse, ApiError> {
  let content = request.content.normalized();
  if content.is_empty() {
    return Err(SrsError::InvalidArgument("a word needs at least one word_<lang> field".into()).into());
  }

  let conn = db::try_lock(&state.db)?;
  let id = db::insert_word(&conn, user_id, &content, Utc::now())?;
  tracing::info!(user_id, word_id = id, "Word saved");

  Ok((StatusCode::CREATED, Json(AddWordResponse { id })))
}

/// DELETE /api/users/{user_id}/words/{word_id}
pub async fn delete_word(
  State(state): State<AppState>,
  Path((user_id, word_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
  let conn = db::try_lock(&state.db)?;
  if !db::delete_word(&conn, user_id, word_id)? {
    return Err(ApiError::NotFound(format!("word {}", word_id)));
  }
  tracing::info!(user_id, word_id, "Word deleted");
  Ok(StatusCode::NO_CONTENT)
}
