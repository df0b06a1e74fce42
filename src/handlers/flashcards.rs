//! Flashcard review session endpoints.
//!
//! Every grade or suspension is applied to the in-memory session first and
//! then written back to storage best-effort: a failed write is logged and the
//! session carries on.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::config::CardsLimit;
use crate::db::{self, LogOnError};
use crate::domain::{Card, RawWord, ReviewButton, ReviewLog};
use crate::srs::{self, ReviewSession, SessionStats};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ButtonPreview {
  pub button: ReviewButton,
  pub label: String,
  pub seconds: i64,
}

/// What the client needs to render the current step of a session
#[derive(Debug, Serialize)]
pub struct SessionView {
  pub stats: SessionStats,
  pub card: Option<Card>,
  pub buttons: Vec<ButtonPreview>,
}

impl SessionView {
  fn of(session: &ReviewSession, now: DateTime<Utc>) -> Self {
    let card = session.current_card().cloned();
    let buttons = card
      .as_ref()
      .and_then(|card| {
        srs::preview_intervals(card, now, session.config())
          .log_warn("Failed to preview intervals")
      })
      .map(|previews| {
        previews
          .into_iter()
          .map(|(button, delay)| ButtonPreview {
            button,
            label: srs::format_interval(delay),
            seconds: delay.num_seconds(),
          })
          .collect()
      })
      .unwrap_or_default();

    Self {
      stats: session.stats(now),
      card,
      buttons,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
  pub due_count: i64,
  pub total_cards: i64,
  pub next_review_at: Option<DateTime<Utc>>,
  pub next_review_in: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
  /// Falls back to the configured limit when absent
  #[serde(default)]
  pub cards_limit: Option<CardsLimit>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeRequest {
  pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
  /// `again|hard|good|easy` or a 1-4 rating
  pub button: String,
}

#[derive(Debug, Serialize)]
pub struct CardActionResponse {
  pub card: Card,
  pub requeued: bool,
  pub session: SessionView,
}

fn load_words(state: &AppState, user_id: i64) -> Result<Vec<RawWord>, ApiError> {
  let conn = db::try_lock(&state.db)?;
  Ok(db::get_user_words(&conn, user_id)?)
}

/// Best-effort write-back of an updated card (and its review log)
fn persist(state: &AppState, user_id: i64, card: &Card, log: Option<&ReviewLog>) {
  let Some(conn) = db::try_lock(&state.db).log_warn("Card not persisted") else {
    return;
  };

  match db::save_card_state(&conn, user_id, card) {
    Ok(true) => {}
    Ok(false) => tracing::warn!(user_id, card_id = card.id, "Card vanished before write-back"),
    Err(e) => tracing::warn!(user_id, card_id = card.id, "Failed to persist card: {}", e),
  }

  if let Some(log) = log {
    db::insert_review_log(&conn, user_id, log).log_warn("Failed to record review");
  }
}

/// GET /api/users/{user_id}/flashcards/summary
pub async fn summary(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
) -> Result<Json<SummaryResponse>, ApiError> {
  let now = Utc::now();
  let conn = db::try_lock(&state.db)?;

  let due_count = db::get_due_count(&conn, user_id, now)?;
  let total_cards = db::get_total_count(&conn, user_id)?;
  let next_review_at = if due_count == 0 {
    db::get_next_review_time(&conn, user_id)?
  } else {
    None
  };

  Ok(Json(SummaryResponse {
    due_count,
    total_cards,
    next_review_at,
    next_review_in: next_review_at.map(|at| srs::format_interval(at - now)),
  }))
}

/// POST /api/users/{user_id}/flashcards/session
pub async fn start_session(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
  Json(request): Json<StartSessionRequest>,
) -> Result<Json<SessionView>, ApiError> {
  let words = load_words(&state, user_id)?;
  let limit = request
    .cards_limit
    .unwrap_or(state.session_config.cards_limit);
  let now = Utc::now();

  let view = state.sessions.with_session(user_id, now, |session| {
    session.initialize(&words, limit, now);
    SessionView::of(session, now)
  })?;
  Ok(Json(view))
}

/// GET /api/users/{user_id}/flashcards/session
pub async fn get_session(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
) -> Result<Json<SessionView>, ApiError> {
  let now = Utc::now();
  let view = state
    .sessions
    .with_session(user_id, now, |session| SessionView::of(session, now))?;
  Ok(Json(view))
}

/// POST /api/users/{user_id}/flashcards/practice
pub async fn practice_start(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
  Json(request): Json<PracticeRequest>,
) -> Result<Json<SessionView>, ApiError> {
  let words = load_words(&state, user_id)?;
  let now = Utc::now();

  let view = state.sessions.with_session(user_id, now, |session| {
    session.start_random_practice(&words, request.count, now);
    SessionView::of(session, now)
  })?;
  Ok(Json(view))
}

/// POST /api/users/{user_id}/flashcards/review
pub async fn submit_review(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
  Json(request): Json<ReviewRequest>,
) -> Result<Json<CardActionResponse>, ApiError> {
  let button: ReviewButton = request.button.parse()?;
  let now = Utc::now();

  let (outcome, view) = state.sessions.with_session(user_id, now, |session| {
    let outcome = session.submit_review(button, now)?;
    Ok::<_, ApiError>((outcome, SessionView::of(session, now)))
  })??;

  persist(&state, user_id, &outcome.card, Some(&outcome.log));
  if view.stats.is_complete {
    tracing::info!(
      user_id,
      reviewed = view.stats.reviewed_count,
      seconds = view.stats.elapsed_seconds,
      "Review session complete"
    );
  }

  Ok(Json(CardActionResponse {
    card: outcome.card,
    requeued: outcome.requeued,
    session: view,
  }))
}

/// POST /api/users/{user_id}/flashcards/suspend
pub async fn suspend_card(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
) -> Result<Json<CardActionResponse>, ApiError> {
  let now = Utc::now();

  let (card, view) = state.sessions.with_session(user_id, now, |session| {
    let card = session.suspend_current_card()?;
    Ok::<_, ApiError>((card, SessionView::of(session, now)))
  })??;

  persist(&state, user_id, &card, None);

  Ok(Json(CardActionResponse {
    card,
    requeued: false,
    session: view,
  }))
}

/// POST /api/users/{user_id}/flashcards/refresh
pub async fn refresh_session(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
) -> Result<Json<SessionView>, ApiError> {
  let words = load_words(&state, user_id)?;
  let now = Utc::now();

  let view = state.sessions.with_session(user_id, now, |session| {
    session.refresh(&words, now);
    SessionView::of(session, now)
  })?;
  Ok(Json(view))
}

/// DELETE /api/users/{user_id}/flashcards/session
pub async fn reset_session(
  State(state): State<AppState>,
  Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
  let now = Utc::now();
  state
    .sessions
    .with_session(user_id, now, |session| session.reset(now))?;
  Ok(StatusCode::NO_CONTENT)
}
