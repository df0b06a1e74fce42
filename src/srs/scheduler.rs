//! SM-2 style card scheduling with Anki-like learning steps.
//!
//! Cards in acquisition (new, learning, relearning) walk a short ladder of
//! minute-scale steps:
//!   - Again restarts the ladder at step 0
//!   - Hard repeats the current step
//!   - Good advances one step, graduating after the last one
//!   - Easy graduates immediately with a longer first interval
//!
//! Graduated cards are scheduled in days:
//!   - Again is a lapse: ease drops, interval shrinks, card relearns
//!   - Hard: interval * hard_multiplier, ease drops slightly
//!   - Good: interval * ease
//!   - Easy: interval * ease * easy_bonus, ease rises

use chrono::{DateTime, Duration, Utc};

use super::SrsError;
use crate::config::SchedulerConfig;
use crate::domain::{Card, CardState, ReviewButton};

/// Reject cards whose scheduler fields break the documented invariants.
pub fn validate_card(card: &Card, config: &SchedulerConfig) -> Result<(), SrsError> {
  let fail = |what: &str| {
    Err(SrsError::InvalidArgument(format!(
      "card {}: {}",
      card.id, what
    )))
  };

  // Tolerate float noise from storage round-trips
  if !card.ease_factor.is_finite() || card.ease_factor < config.min_ease_factor - 1e-9 {
    return fail("ease_factor below floor");
  }
  if card.interval < 0 {
    return fail("negative interval");
  }
  if card.interval > config.maximum_interval_days {
    return fail("interval beyond maximum_interval_days");
  }
  if card.reviews_count < 0 || card.lapses < 0 {
    return fail("negative counter");
  }
  if card.card_state == CardState::New
    && (card.reviews_count != 0 || card.next_review_date.is_some())
  {
    return fail("new card with review history");
  }
  Ok(())
}

/// Compute the card's next state after a button press.
///
/// Pure: the input is left untouched and the returned card carries the
/// incremented review count, review date and new schedule.
pub fn review_card(
  card: &Card,
  button: ReviewButton,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<Card, SrsError> {
  validate_card(card, config)?;
  if card.is_suspended {
    return Err(SrsError::InvalidArgument(format!(
      "card {} is suspended",
      card.id
    )));
  }

  let mut next = card.clone();
  next.reviews_count += 1;
  next.last_review_date = Some(now);

  if card.is_in_ladder() {
    review_in_ladder(card, &mut next, button, now, config);
  } else {
    review_graduated(card, &mut next, button, now, config);
  }

  tracing::debug!(
    card_id = card.id,
    button = button.as_str(),
    from = card.card_state.as_str(),
    to = next.card_state.as_str(),
    step = ?next.learning_step,
    interval = next.interval,
    ease = next.ease_factor,
    "Card reviewed"
  );

  Ok(next)
}

/// Steps (in minutes) the card is walking through
fn ladder_for<'a>(card: &Card, config: &'a SchedulerConfig) -> &'a [i64] {
  match card.card_state {
    CardState::Relearning => &config.relearning_steps_minutes,
    _ => &config.learning_steps_minutes,
  }
}

fn review_in_ladder(
  card: &Card,
  next: &mut Card,
  button: ReviewButton,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) {
  let relearning = card.card_state == CardState::Relearning;
  let steps = ladder_for(card, config);
  // Ladder may have been shortened by a config change since the last review
  let step = card.learning_step.unwrap_or(0).min(steps.len() - 1);
  let ladder_state = if relearning {
    CardState::Relearning
  } else {
    CardState::Learning
  };

  match button {
    ReviewButton::Again => {
      next.card_state = ladder_state;
      next.learning_step = Some(0);
      next.next_review_date = Some(now + Duration::minutes(steps[0]));
    }
    ReviewButton::Hard => {
      next.card_state = ladder_state;
      next.learning_step = Some(step);
      next.next_review_date = Some(now + Duration::minutes(steps[step]));
    }
    ReviewButton::Good => {
      if step + 1 < steps.len() {
        next.card_state = ladder_state;
        next.learning_step = Some(step + 1);
        next.next_review_date = Some(now + Duration::minutes(steps[step + 1]));
      } else {
        let interval = graduation_interval(card, config.graduating_interval_days, relearning);
        graduate(next, interval, now, config);
      }
    }
    ReviewButton::Easy => {
      let interval = graduation_interval(card, config.easy_interval_days, relearning);
      next.ease_factor = card.ease_factor + config.easy_ease_bonus;
      graduate(next, interval, now, config);
    }
  }
}

/// Relearning cards keep the interval they retained at the lapse
fn graduation_interval(card: &Card, target: i64, relearning: bool) -> i64 {
  if relearning {
    target.max(card.interval)
  } else {
    target
  }
}

fn graduate(next: &mut Card, interval: i64, now: DateTime<Utc>, config: &SchedulerConfig) {
  let interval = clamp_interval(interval, config);
  next.card_state = CardState::Learning;
  next.learning_step = None;
  next.interval = interval;
  next.next_review_date = Some(now + Duration::days(interval));
}

fn review_graduated(
  card: &Card,
  next: &mut Card,
  button: ReviewButton,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) {
  let interval = card.interval as f64;
  let ease = card.ease_factor;

  match button {
    ReviewButton::Again => {
      next.lapses = card.lapses + 1;
      next.ease_factor = (ease - config.lapse_ease_penalty).max(config.min_ease_factor);
      next.card_state = CardState::Relearning;
      next.learning_step = Some(0);
      next.interval = lapsed_interval(card.interval, config);
      next.next_review_date =
        Some(now + Duration::minutes(config.relearning_steps_minutes[0]));
      return;
    }
    ReviewButton::Hard => {
      next.interval = clamp_interval((interval * config.hard_multiplier).round() as i64, config);
      next.ease_factor = (ease - config.hard_ease_penalty).max(config.min_ease_factor);
    }
    ReviewButton::Good => {
      next.interval = clamp_interval((interval * ease).round() as i64, config);
    }
    ReviewButton::Easy => {
      next.interval = clamp_interval((interval * ease * config.easy_bonus).round() as i64, config);
      next.ease_factor = ease + config.easy_ease_bonus;
    }
  }

  next.next_review_date = Some(now + Duration::days(next.interval));
}

/// Float-to-int casts saturate, so the clamp holds for any ease
fn clamp_interval(days: i64, config: &SchedulerConfig) -> i64 {
  days
    .max(config.minimum_interval_days)
    .min(config.maximum_interval_days)
}

/// Interval kept after a lapse: always shorter than before once above a day
fn lapsed_interval(interval: i64, config: &SchedulerConfig) -> i64 {
  if interval <= 1 {
    return 1;
  }
  let reduced = ((interval as f64) * config.lapse_multiplier).round() as i64;
  reduced.max(config.minimum_interval_days).min(interval - 1)
}

/// Suspend a card. Not a review: only the flag changes.
pub fn suspend_card(card: &Card) -> Card {
  let mut next = card.clone();
  next.is_suspended = true;
  next
}

/// Whether a card belongs in a due-card query at `now`.
pub fn is_due(card: &Card, now: DateTime<Utc>) -> bool {
  if card.is_suspended {
    return false;
  }
  card.card_state == CardState::New
    || card.next_review_date.is_none_or(|due| due <= now)
}

/// Delay until the next review that each button would produce, in button
/// order. Used to label the buttons.
pub fn preview_intervals(
  card: &Card,
  now: DateTime<Utc>,
  config: &SchedulerConfig,
) -> Result<Vec<(ReviewButton, Duration)>, SrsError> {
  ReviewButton::ALL
    .into_iter()
    .map(|button| {
      let next = review_card(card, button, now, config)?;
      let due = next.next_review_date.unwrap_or(now);
      Ok((button, due - now))
    })
    .collect()
}

/// Format a delay to a short human-readable string
pub fn format_interval(delay: Duration) -> String {
  let minutes = delay.num_minutes();
  let hours = delay.num_hours();
  let days = delay.num_days();

  if minutes < 1 {
    "now".to_string()
  } else if minutes < 60 {
    format!("{}m", minutes)
  } else if hours < 24 {
    format!("{}h", hours)
  } else if days < 7 {
    format!("{}d", days)
  } else if days < 30 {
    format!("{}w", days / 7)
  } else if days < 365 {
    format!("{}mo", days / 30)
  } else {
    format!("{}y", days / 365)
  }
}
