pub mod scheduler;
pub mod session;

use thiserror::Error;

pub use scheduler::{
  format_interval, is_due, preview_intervals, review_card, suspend_card, validate_card,
};
pub use session::{ReviewOutcome, ReviewSession, SessionMode, SessionStats};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SrsError {
  /// Contract violation by the caller: bad grade, malformed card
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("No cards left in the session queue")]
  EmptyQueue,
}
