//! Word/card CRUD and scheduler write-back

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::collections::BTreeMap;

use crate::domain::{Card, RawWord, ReviewLog, WordContent};

const WORD_COLUMNS: &str = "id, content, card_state, ease_factor, interval, learning_step, \
  next_review_date, last_review_date, reviews_count, lapses, is_suspended";

/// Fixed-width UTC timestamps so string comparison in SQL orders correctly
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn row_to_word(row: &Row) -> Result<RawWord> {
    let content: String = row.get(1)?;
    let fields: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(RawWord {
        id: row.get(0)?,
        card_state: row.get(2)?,
        ease_factor: row.get(3)?,
        interval: row.get(4)?,
        learning_step: row.get(5)?,
        next_review_date: parse_timestamp(6, row.get(6)?)?,
        last_review_date: parse_timestamp(7, row.get(7)?)?,
        reviews_count: row.get(8)?,
        lapses: row.get(9)?,
        is_suspended: row.get(10)?,
        fields,
    })
}

/// Save a new word. Scheduler fields stay empty until the first review.
pub fn insert_word(
    conn: &Connection,
    user_id: i64,
    content: &WordContent,
    now: DateTime<Utc>,
) -> Result<i64> {
    let json = serde_json::to_string(content)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO user_words (user_id, content, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, json, format_timestamp(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user_words(conn: &Connection, user_id: i64) -> Result<Vec<RawWord>> {
    let query = format!(
        "SELECT {} FROM user_words WHERE user_id = ?1 ORDER BY id ASC",
        WORD_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;
    let words = stmt
        .query_map(params![user_id], row_to_word)?
        .collect::<Result<Vec<_>>>()?;
    Ok(words)
}

pub fn get_word(conn: &Connection, user_id: i64, word_id: i64) -> Result<Option<RawWord>> {
    let query = format!(
        "SELECT {} FROM user_words WHERE user_id = ?1 AND id = ?2",
        WORD_COLUMNS
    );
    conn.query_row(&query, params![user_id, word_id], row_to_word)
        .optional()
}

/// Returns false if no such word exists for the user
pub fn delete_word(conn: &Connection, user_id: i64, word_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM user_words WHERE user_id = ?1 AND id = ?2",
        params![user_id, word_id],
    )?;
    Ok(deleted > 0)
}

/// Write the scheduler fields of a reviewed or suspended card.
/// Content is left alone. Returns false if the word is gone.
pub fn save_card_state(conn: &Connection, user_id: i64, card: &Card) -> Result<bool> {
    let updated = conn.execute(
        r#"
        UPDATE user_words
        SET card_state = ?1, ease_factor = ?2, interval = ?3, learning_step = ?4,
            next_review_date = ?5, last_review_date = ?6, reviews_count = ?7,
            lapses = ?8, is_suspended = ?9
        WHERE user_id = ?10 AND id = ?11
        "#,
        params![
            card.card_state.as_str(),
            card.ease_factor,
            card.interval,
            card.learning_step.map(|s| s as i64),
            card.next_review_date.map(format_timestamp),
            card.last_review_date.map(format_timestamp),
            card.reviews_count,
            card.lapses,
            card.is_suspended,
            user_id,
            card.id,
        ],
    )?;
    Ok(updated > 0)
}

pub fn insert_review_log(conn: &Connection, user_id: i64, log: &ReviewLog) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO review_logs (user_id, card_id, button, state_before, state_after,
                                 interval_before, interval_after, ease_factor_after, reviewed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            user_id,
            log.card_id,
            log.button.as_str(),
            log.state_before.as_str(),
            log.state_after.as_str(),
            log.interval_before,
            log.interval_after,
            log.ease_factor_after,
            format_timestamp(log.reviewed_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Count of cards a due-card query would return right now
pub fn get_due_count(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<i64> {
    conn.query_row(
        r#"
        SELECT COUNT(*) FROM user_words
        WHERE user_id = ?1
          AND COALESCE(is_suspended, 0) = 0
          AND (card_state IS NULL OR card_state = 'new'
               OR next_review_date IS NULL OR next_review_date <= ?2)
        "#,
        params![user_id, format_timestamp(now)],
        |row| row.get(0),
    )
}

pub fn get_total_count(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM user_words WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Earliest scheduled review among active cards
pub fn get_next_review_time(conn: &Connection, user_id: i64) -> Result<Option<DateTime<Utc>>> {
    let next: Option<String> = conn.query_row(
        r#"
        SELECT MIN(next_review_date) FROM user_words
        WHERE user_id = ?1 AND COALESCE(is_suspended, 0) = 0 AND next_review_date IS NOT NULL
        "#,
        params![user_id],
        |row| row.get(0),
    )?;
    parse_timestamp(0, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::db::run_migrations;
    use crate::domain::{CardState, ReviewButton};
    use crate::srs::{is_due, review_card, suspend_card};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 18, 30, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn content(en: &str, es: &str) -> WordContent {
        WordContent::from_fields([("word_en", en), ("word_es", es)])
    }

    #[test]
    fn test_inserted_word_loads_unscheduled() {
        let conn = setup();
        let id = insert_word(&conn, 1, &content("dog", "perro"), now()).unwrap();

        let words = get_user_words(&conn, 1).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].id, id);
        assert!(words[0].card_state.is_none());
        assert_eq!(words[0].fields["word_es"], serde_json::json!("perro"));

        let card = words[0].to_card(&SchedulerConfig::default()).unwrap();
        assert_eq!(card.card_state, CardState::New);
        assert_eq!(card.content, content("dog", "perro"));
    }

    #[test]
    fn test_words_scoped_by_user() {
        let conn = setup();
        insert_word(&conn, 1, &content("cat", "gato"), now()).unwrap();
        let other = insert_word(&conn, 2, &content("sun", "sol"), now()).unwrap();

        assert_eq!(get_user_words(&conn, 1).unwrap().len(), 1);
        assert!(get_word(&conn, 1, other).unwrap().is_none());
        assert!(get_word(&conn, 2, other).unwrap().is_some());
        assert!(!delete_word(&conn, 1, other).unwrap());
        assert!(delete_word(&conn, 2, other).unwrap());
        assert_eq!(get_total_count(&conn, 2).unwrap(), 0);
    }

    #[test]
    fn test_save_card_state_round_trip() {
        let conn = setup();
        let config = SchedulerConfig::default();
        let id = insert_word(&conn, 1, &content("water", "agua"), now()).unwrap();

        let card = get_word(&conn, 1, id).unwrap().unwrap().to_card(&config).unwrap();
        let reviewed = review_card(&card, ReviewButton::Good, now(), &config).unwrap();
        assert!(save_card_state(&conn, 1, &reviewed).unwrap());

        let loaded = get_word(&conn, 1, id).unwrap().unwrap().to_card(&config).unwrap();
        assert_eq!(loaded, reviewed);
        assert_eq!(loaded.learning_step, Some(1));
    }

    #[test]
    fn test_save_missing_card_returns_false() {
        let conn = setup();
        let card = Card::new(404, WordContent::default());
        assert!(!save_card_state(&conn, 1, &card).unwrap());
    }

    #[test]
    fn test_due_count_matches_predicate() {
        let conn = setup();
        let config = SchedulerConfig::default();

        let fresh = insert_word(&conn, 1, &content("one", "uno"), now()).unwrap();
        let graduated = insert_word(&conn, 1, &content("two", "dos"), now()).unwrap();
        let suspended = insert_word(&conn, 1, &content("three", "tres"), now()).unwrap();

        let load = |id| get_word(&conn, 1, id).unwrap().unwrap().to_card(&config).unwrap();

        let easy = review_card(&load(graduated), ReviewButton::Easy, now(), &config).unwrap();
        save_card_state(&conn, 1, &easy).unwrap();
        save_card_state(&conn, 1, &suspend_card(&load(suspended))).unwrap();

        assert_eq!(get_due_count(&conn, 1, now()).unwrap(), 1);
        assert!(is_due(&load(fresh), now()));

        let later = now() + Duration::days(5);
        assert_eq!(get_due_count(&conn, 1, later).unwrap(), 2);
        let due_in_memory = get_user_words(&conn, 1)
            .unwrap()
            .iter()
            .map(|w| w.to_card(&config).unwrap())
            .filter(|c| is_due(c, later))
            .count();
        assert_eq!(due_in_memory, 2);

        assert_eq!(
            get_next_review_time(&conn, 1).unwrap(),
            easy.next_review_date
        );
    }

    #[test]
    fn test_next_review_time_empty() {
        let conn = setup();
        assert_eq!(get_next_review_time(&conn, 1).unwrap(), None);
    }

    fn review_log_count(conn: &Connection, card_id: i64) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM review_logs WHERE card_id = ?1",
            params![card_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_review_log_cascade_on_delete() {
        let conn = setup();
        let config = SchedulerConfig::default();
        let id = insert_word(&conn, 1, &content("bread", "pan"), now()).unwrap();
        let card = get_word(&conn, 1, id).unwrap().unwrap().to_card(&config).unwrap();
        let after = review_card(&card, ReviewButton::Again, now(), &config).unwrap();

        insert_review_log(&conn, 1, &ReviewLog::new(&card, &after, ReviewButton::Again, now()))
            .unwrap();
        assert_eq!(review_log_count(&conn, id), 1);

        delete_word(&conn, 1, id).unwrap();
        assert_eq!(review_log_count(&conn, id), 0);
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(now());
        let b = format_timestamp(now() + Duration::milliseconds(500));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_corrupt_content_is_error() {
        let conn = setup();
        conn.execute(
            "INSERT INTO user_words (user_id, content, created_at) VALUES (1, 'not json', ?1)",
            params![format_timestamp(now())],
        )
        .unwrap();
        assert!(get_user_words(&conn, 1).is_err());
    }
}
