//! In-memory registry of live review sessions.
//!
//! One [`ReviewSession`] per user. Entries auto-expire after a configurable
//! duration of inactivity. Each access runs under the registry lock, so review
//! actions for the same user are serialized.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::{self, SchedulerConfig};
use crate::srs::ReviewSession;

/// Error returned when the registry lock is poisoned
#[derive(Debug, thiserror::Error)]
#[error("Session store unavailable")]
pub struct SessionLockError;

/// Session entry with last access time for expiration
struct SessionEntry {
  session: ReviewSession,
  last_access: DateTime<Utc>,
}

pub struct SessionRegistry {
  sessions: Mutex<HashMap<i64, SessionEntry>>,
  scheduler: Arc<SchedulerConfig>,
  expiry: Duration,
}

impl SessionRegistry {
  pub fn new(scheduler: Arc<SchedulerConfig>, expiry_hours: i64) -> Self {
    Self {
      sessions: Mutex::new(HashMap::new()),
      scheduler,
      expiry: Duration::hours(expiry_hours),
    }
  }

  /// Run `f` on the user's session, creating one if needed.
  pub fn with_session<T>(
    &self,
    user_id: i64,
    now: DateTime<Utc>,
    f: impl FnOnce(&mut ReviewSession) -> T,
  ) -> Result<T, SessionLockError> {
    let mut sessions = self.sessions.lock().map_err(|_| {
      tracing::error!("Session store mutex poisoned");
      SessionLockError
    })?;

    // Clean up expired sessions occasionally (~10% chance)
    if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
      self.cleanup_expired(&mut sessions, now);
    }

    let entry = sessions.entry(user_id).or_insert_with(|| SessionEntry {
      session: ReviewSession::new(self.scheduler.clone(), now),
      last_access: now,
    });

    // An idle session is stale; start over
    if now - entry.last_access > self.expiry {
      tracing::debug!(user_id, "Session expired, starting fresh");
      entry.session = ReviewSession::new(self.scheduler.clone(), now);
    }
    entry.last_access = now;

    Ok(f(&mut entry.session))
  }

  fn cleanup_expired(&self, sessions: &mut HashMap<i64, SessionEntry>, now: DateTime<Utc>) {
    let cutoff = now - self.expiry;
    let before = sessions.len();
    sessions.retain(|_, entry| entry.last_access > cutoff);
    tracing::debug!(removed = before - sessions.len(), "Expired review sessions cleaned up");
  }
}
