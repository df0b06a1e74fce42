//! Review session: the queue of cards for one sitting.
//!
//! The session owns its queue outright. Cards still on a step ladder after a
//! review go to the back of the queue and come around again in the same
//! sitting; graduated cards leave it until a future session finds them due.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::SrsError;
use super::scheduler::{is_due, review_card, suspend_card};
use crate::config::{CardsLimit, SchedulerConfig};
use crate::domain::{Card, RawWord, ReviewButton, ReviewLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
  /// Due cards only
  Scheduled,
  /// Random drill ignoring due dates
  Practice,
}

/// Result of grading the front card
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
  /// Updated card, to be persisted by the caller
  pub card: Card,
  pub log: ReviewLog,
  /// True if the card went back into the queue
  pub requeued: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
  pub mode: SessionMode,
  pub reviewed_count: u32,
  pub remaining: usize,
  pub started_at: DateTime<Utc>,
  pub elapsed_seconds: i64,
  pub is_complete: bool,
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
  config: Arc<SchedulerConfig>,
  cards: VecDeque<Card>,
  cards_limit: CardsLimit,
  reviewed_count: u32,
  started_at: DateTime<Utc>,
  initialized: bool,
  fetch_pending: bool,
  mode: SessionMode,
}

impl ReviewSession {
  pub fn new(config: Arc<SchedulerConfig>, now: DateTime<Utc>) -> Self {
    Self {
      config,
      cards: VecDeque::new(),
      cards_limit: CardsLimit::Unlimited,
      reviewed_count: 0,
      started_at: now,
      initialized: false,
      fetch_pending: false,
      mode: SessionMode::Scheduled,
    }
  }

  /// Build the queue from raw storage records.
  ///
  /// Does nothing while an initialized session still has cards queued.
  /// Returns the number of queued cards.
  pub fn initialize(&mut self, words: &[RawWord], cards_limit: CardsLimit, now: DateTime<Utc>) -> usize {
    let leaving_practice = self.mode == SessionMode::Practice;
    if self.initialized && !self.cards.is_empty() && !leaving_practice {
      tracing::debug!(
        remaining = self.cards.len(),
        "Session already initialized, skipping"
      );
      return self.cards.len();
    }

    let mut due: Vec<Card> = self
      .to_cards(words)
      .into_iter()
      .filter(|card| is_due(card, now))
      .collect();

    // Stable: ties keep storage order
    due.sort_by_key(queue_priority);
    if let Some(limit) = cards_limit.as_option() {
      due.truncate(limit);
    }

    if due.is_empty() && self.fetch_pending {
      tracing::debug!("No due cards yet, waiting for pending fetch");
      return 0;
    }

    if leaving_practice {
      tracing::debug!(dropped = self.cards.len(), "Leaving practice for scheduled review");
      self.reviewed_count = 0;
    }
    if self.reviewed_count == 0 {
      self.started_at = now;
    }
    self.cards = due.into();
    self.cards_limit = cards_limit;
    self.mode = SessionMode::Scheduled;
    self.initialized = true;

    tracing::info!(
      due = self.cards.len(),
      total = words.len(),
      limit = ?cards_limit.as_option(),
      "Review session initialized"
    );
    self.cards.len()
  }

  /// Start a drill over random non-suspended cards regardless of due dates.
  pub fn start_random_practice(
    &mut self,
    words: &[RawWord],
    practice_count: usize,
    now: DateTime<Utc>,
  ) -> usize {
    self.start_random_practice_with_rng(words, practice_count, now, &mut rand::rng())
  }

  pub fn start_random_practice_with_rng<R: Rng + ?Sized>(
    &mut self,
    words: &[RawWord],
    practice_count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
  ) -> usize {
    let mut pool: Vec<Card> = self
      .to_cards(words)
      .into_iter()
      .filter(|card| !card.is_suspended)
      .collect();
    pool.shuffle(rng);
    pool.truncate(practice_count);

    self.cards = pool.into();
    self.cards_limit = CardsLimit::Limited(practice_count.max(1));
    self.reviewed_count = 0;
    self.started_at = now;
    self.mode = SessionMode::Practice;
    self.initialized = true;
    self.fetch_pending = false;

    tracing::info!(cards = self.cards.len(), "Practice session started");
    self.cards.len()
  }

  /// Grade the front card.
  ///
  /// On error the queue is left exactly as it was.
  pub fn submit_review(
    &mut self,
    button: ReviewButton,
    now: DateTime<Utc>,
  ) -> Result<ReviewOutcome, SrsError> {
    let card = self.cards.pop_front().ok_or(SrsError::EmptyQueue)?;

    let updated = match review_card(&card, button, now, &self.config) {
      Ok(updated) => updated,
      Err(e) => {
        self.cards.push_front(card);
        return Err(e);
      }
    };

    self.reviewed_count += 1;
    let log = ReviewLog::new(&card, &updated, button, now);

    let requeued = updated.learning_step.is_some();
    if requeued {
      self.cards.push_back(updated.clone());
    }

    tracing::debug!(
      card_id = updated.id,
      requeued,
      remaining = self.cards.len(),
      reviewed = self.reviewed_count,
      "Review submitted"
    );

    Ok(ReviewOutcome {
      card: updated,
      log,
      requeued,
    })
  }

  /// Suspend the front card and drop it from the session for good.
  pub fn suspend_current_card(&mut self) -> Result<Card, SrsError> {
    let card = self.cards.pop_front().ok_or(SrsError::EmptyQueue)?;
    let suspended = suspend_card(&card);
    tracing::debug!(card_id = suspended.id, remaining = self.cards.len(), "Card suspended");
    Ok(suspended)
  }

  /// Re-derive the queue after the underlying word set changed.
  ///
  /// Queued cards keep their in-session state (content is refreshed); cards
  /// that disappeared or got suspended are dropped; in scheduled mode newly
  /// due cards are appended while the limit allows.
  pub fn refresh(&mut self, words: &[RawWord], now: DateTime<Utc>) -> usize {
    if !self.initialized {
      return self.initialize(words, self.cards_limit, now);
    }

    let fresh = self.to_cards(words);
    let by_id: HashMap<i64, &Card> = fresh.iter().map(|card| (card.id, card)).collect();

    let before = self.cards.len();
    self.cards.retain_mut(|queued| match by_id.get(&queued.id) {
      Some(card) if !card.is_suspended => {
        queued.content = card.content.clone();
        true
      }
      _ => false,
    });
    let dropped = before - self.cards.len();

    let mut added = 0;
    if self.mode == SessionMode::Scheduled {
      let queued: HashSet<i64> = self.cards.iter().map(|card| card.id).collect();
      let mut due: Vec<&Card> = fresh
        .iter()
        .filter(|card| !queued.contains(&card.id) && is_due(card, now))
        .collect();
      due.sort_by_key(|card| queue_priority(card));

      for card in due {
        if !self.cards_limit.allows(self.cards.len()) {
          break;
        }
        self.cards.push_back(card.clone());
        added += 1;
      }
    }

    tracing::debug!(dropped, added, remaining = self.cards.len(), "Session refreshed");
    self.cards.len()
  }

  /// Clear everything so `initialize` can run again.
  pub fn reset(&mut self, now: DateTime<Utc>) {
    self.cards.clear();
    self.reviewed_count = 0;
    self.initialized = false;
    self.fetch_pending = false;
    self.mode = SessionMode::Scheduled;
    self.started_at = now;
  }

  /// Host signals that more words may still arrive, so an empty due set
  /// is not final yet.
  pub fn set_fetch_pending(&mut self, pending: bool) {
    self.fetch_pending = pending;
  }

  pub fn current_card(&self) -> Option<&Card> {
    self.cards.front()
  }

  pub fn cards(&self) -> impl Iterator<Item = &Card> {
    self.cards.iter()
  }

  pub fn remaining(&self) -> usize {
    self.cards.len()
  }

  pub fn reviewed_count(&self) -> u32 {
    self.reviewed_count
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  pub fn mode(&self) -> SessionMode {
    self.mode
  }

  pub fn config(&self) -> &SchedulerConfig {
    &self.config
  }

  /// Finished all cards, as opposed to never having had any
  pub fn is_complete(&self) -> bool {
    self.cards.is_empty() && self.reviewed_count > 0
  }

  pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
    now - self.started_at
  }

  pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
    SessionStats {
      mode: self.mode,
      reviewed_count: self.reviewed_count,
      remaining: self.cards.len(),
      started_at: self.started_at,
      elapsed_seconds: self.elapsed(now).num_seconds().max(0),
      is_complete: self.is_complete(),
    }
  }

  /// Validate raw records, skipping bad ones and duplicate ids
  fn to_cards(&self, words: &[RawWord]) -> Vec<Card> {
    let mut seen = HashSet::new();
    words
      .iter()
      .filter(|word| seen.insert(word.id))
      .filter_map(|word| match word.to_card(&self.config) {
        Ok(card) => Some(card),
        Err(e) => {
          tracing::warn!("Skipping word {}: {}", word.id, e);
          None
        }
      })
      .collect()
  }
}

/// Mid-ladder cards first, then graduated cards most overdue first, then new.
fn queue_priority(card: &Card) -> (u8, Option<DateTime<Utc>>) {
  if card.learning_step.is_some() && !card.is_suspended {
    (0, card.next_review_date)
  } else if card.is_review_active() {
    (1, card.next_review_date)
  } else {
    (2, None)
  }
}
