//! Raw word records as they come out of storage.
//!
//! Scheduler fields are optional: a word saved but never scheduled carries
//! none of them and is stamped with defaults when converted into a [`Card`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::card::{Card, CardState, WordContent};
use crate::config::SchedulerConfig;
use crate::srs::SrsError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWord {
  pub id: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub card_state: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ease_factor: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interval: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub learning_step: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next_review_date: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_review_date: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reviews_count: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lapses: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_suspended: Option<bool>,
  /// Content fields (`word_<lang>`, `sentence_<lang>`) and anything else
  #[serde(flatten)]
  pub fields: BTreeMap<String, serde_json::Value>,
}

impl RawWord {
  /// String-valued fields as card content; other values are storage metadata
  pub fn content(&self) -> WordContent {
    WordContent::from_fields(
      self
        .fields
        .iter()
        .filter_map(|(key, value)| value.as_str().map(|text| (key.as_str(), text))),
    )
  }

  /// Validate the record into a scheduler-ready card.
  pub fn to_card(&self, config: &SchedulerConfig) -> Result<Card, SrsError> {
    let content = self.content();

    let Some(state) = self.card_state.as_deref() else {
      return Ok(Card::with_ease(self.id, content, config.initial_ease_factor));
    };

    let card_state = CardState::from_str(state).ok_or_else(|| {
      SrsError::InvalidArgument(format!("word {}: unknown card_state {:?}", self.id, state))
    })?;
    let ease_factor = self.ease_factor.ok_or_else(|| missing(self.id, "ease_factor"))?;
    let interval = self.interval.ok_or_else(|| missing(self.id, "interval"))?;
    let learning_step = match self.learning_step {
      Some(step) if step < 0 => {
        return Err(SrsError::InvalidArgument(format!(
          "word {}: negative learning_step",
          self.id
        )));
      }
      Some(step) => Some(step as usize),
      None => None,
    };

    let card = Card {
      id: self.id,
      content,
      card_state,
      ease_factor,
      interval,
      learning_step,
      next_review_date: self.next_review_date,
      last_review_date: self.last_review_date,
      reviews_count: self.reviews_count.unwrap_or(0),
      lapses: self.lapses.unwrap_or(0),
      is_suspended: self.is_suspended.unwrap_or(false),
    };
    crate::srs::validate_card(&card, config)?;
    Ok(card)
  }
}

fn missing(id: i64, field: &str) -> SrsError {
  SrsError::InvalidArgument(format!("word {}: missing {}", id, field))
}

impl From<&Card> for RawWord {
  fn from(card: &Card) -> Self {
    let content: BTreeMap<String, String> = card.content.clone().into();
    Self {
      id: card.id,
      card_state: Some(card.card_state.as_str().to_string()),
      ease_factor: Some(card.ease_factor),
      interval: Some(card.interval),
      learning_step: card.learning_step.map(|s| s as i64),
      next_review_date: card.next_review_date,
      last_review_date: card.last_review_date,
      reviews_count: Some(card.reviews_count),
      lapses: Some(card.lapses),
      is_suspended: Some(card.is_suspended),
      fields: content
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect(),
    }
  }
}
