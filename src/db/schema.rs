use rusqlite::{Connection, Result};

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Scheduler columns are nullable: a saved word has none of them until its
  // first review writes them back.
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS user_words (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      content TEXT NOT NULL,
      card_state TEXT,
      ease_factor REAL,
      interval INTEGER,
      learning_step INTEGER,
      next_review_date TEXT,
      last_review_date TEXT,
      reviews_count INTEGER,
      lapses INTEGER,
      is_suspended INTEGER,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS review_logs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      card_id INTEGER NOT NULL,
      button TEXT NOT NULL,
      state_before TEXT NOT NULL,
      state_after TEXT NOT NULL,
      interval_before INTEGER NOT NULL,
      interval_after INTEGER NOT NULL,
      ease_factor_after REAL NOT NULL,
      reviewed_at TEXT NOT NULL,
      FOREIGN KEY (card_id) REFERENCES user_words(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_user_words_user ON user_words(user_id);
    CREATE INDEX IF NOT EXISTS idx_user_words_due ON user_words(user_id, next_review_date);
    CREATE INDEX IF NOT EXISTS idx_review_logs_card ON review_logs(card_id);
    "#,
  )?;

  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  Ok(())
}
