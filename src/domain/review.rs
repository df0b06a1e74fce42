use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::card::{Card, CardState};
use crate::srs::SrsError;

/// Feedback grade pressed after revealing a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewButton {
  Again,
  Hard,
  Good,
  Easy,
}

impl ReviewButton {
  pub const ALL: [ReviewButton; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

  /// Map UI rating (1-4: Again, Hard, Good, Easy)
  pub fn from_rating(rating: u8) -> Option<Self> {
    match rating {
      1 => Some(Self::Again),
      2 => Some(Self::Hard),
      3 => Some(Self::Good),
      4 => Some(Self::Easy),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Again => "again",
      Self::Hard => "hard",
      Self::Good => "good",
      Self::Easy => "easy",
    }
  }
}

impl FromStr for ReviewButton {
  type Err = SrsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if let Ok(rating) = trimmed.parse::<u8>() {
      return Self::from_rating(rating)
        .ok_or_else(|| SrsError::InvalidArgument(format!("unknown rating: {}", rating)));
    }
    match trimmed.to_ascii_lowercase().as_str() {
      "again" => Ok(Self::Again),
      "hard" => Ok(Self::Hard),
      "good" => Ok(Self::Good),
      "easy" => Ok(Self::Easy),
      _ => Err(SrsError::InvalidArgument(format!("unknown button: {:?}", s))),
    }
  }
}

/// Record of one review transition, handed to storage with the updated card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
  pub card_id: i64,
  pub button: ReviewButton,
  pub state_before: CardState,
  pub state_after: CardState,
  pub interval_before: i64,
  pub interval_after: i64,
  pub ease_factor_after: f64,
  pub reviewed_at: DateTime<Utc>,
}

impl ReviewLog {
  pub fn new(before: &Card, after: &Card, button: ReviewButton, reviewed_at: DateTime<Utc>) -> Self {
    Self {
      card_id: after.id,
      button,
      state_before: before.card_state,
      state_after: after.card_state,
      interval_before: before.interval,
      interval_after: after.interval,
      ease_factor_after: after.ease_factor,
      reviewed_at,
    }
  }
}
