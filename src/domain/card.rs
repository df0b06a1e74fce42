use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::config::DEFAULT_EASE_FACTOR;
use crate::srs::SrsError;

/// Lifecycle state of a card.
///
/// A `Learning` card with no `learning_step` has graduated and is on the
/// day-scale interval ladder (review-active).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
  New,
  Learning,
  Relearning,
}

impl CardState {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "new" | "NEW" => Some(Self::New),
      "learning" | "LEARNING" | "review" | "REVIEW" => Some(Self::Learning),
      "relearning" | "RELEARNING" => Some(Self::Relearning),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Learning => "learning",
      Self::Relearning => "relearning",
    }
  }
}

/// Lowercase language tag such as `en`, `pt-br` or `zh_hans`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
  pub fn parse(raw: &str) -> Result<Self, SrsError> {
    let code = raw.trim().to_ascii_lowercase();
    let valid = (2..=12).contains(&code.len())
      && code.starts_with(|c: char| c.is_ascii_lowercase())
      && code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
      return Err(SrsError::InvalidArgument(format!(
        "invalid language code: {:?}",
        raw
      )));
    }
    Ok(Self(code))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for LanguageCode {
  type Error = SrsError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<LanguageCode> for String {
  fn from(code: LanguageCode) -> Self {
    code.0
  }
}

impl fmt::Display for LanguageCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Field prefix for the word itself in a given language
pub const WORD_PREFIX: &str = "word_";
/// Field prefix for an example sentence in a given language
pub const SENTENCE_PREFIX: &str = "sentence_";

/// Learnable content of a card, keyed by language.
///
/// Stored and transported as a flat map (`word_en`, `word_ru`,
/// `sentence_en`, ...). The scheduler never looks inside, and values are
/// carried through exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct WordContent {
  pub words: BTreeMap<LanguageCode, String>,
  pub sentences: BTreeMap<LanguageCode, String>,
  /// Fields without a `<prefix><lang>` key we understand, kept as-is
  pub extra: BTreeMap<String, String>,
}

impl WordContent {
  /// Sort flat `<prefix><lang>` fields into words and sentences.
  ///
  /// A key with an unknown prefix or an unparseable language lands in
  /// `extra` instead of failing the whole record.
  pub fn from_fields<'a, I>(fields: I) -> Self
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut content = Self::default();
    for (key, value) in fields {
      let placed = if let Some(lang) = key.strip_prefix(WORD_PREFIX) {
        insert_lang(&mut content.words, lang, value)
      } else if let Some(lang) = key.strip_prefix(SENTENCE_PREFIX) {
        insert_lang(&mut content.sentences, lang, value)
      } else {
        false
      };

      if !placed {
        content.extra.insert(key.to_string(), value.to_string());
      }
    }
    content
  }

  /// Clean up user input before it is first saved: NFC, trimmed, blanks
  /// dropped.
  pub fn normalized(self) -> Self {
    fn clean(map: BTreeMap<LanguageCode, String>) -> BTreeMap<LanguageCode, String> {
      map
        .into_iter()
        .map(|(lang, text)| (lang, text.trim().nfc().collect::<String>()))
        .filter(|(_, text)| !text.is_empty())
        .collect()
    }

    Self {
      words: clean(self.words),
      sentences: clean(self.sentences),
      extra: self.extra,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }
}

fn insert_lang(map: &mut BTreeMap<LanguageCode, String>, lang: &str, value: &str) -> bool {
  match LanguageCode::parse(lang) {
    Ok(lang) => {
      map.insert(lang, value.to_string());
      true
    }
    Err(_) => false,
  }
}

impl From<BTreeMap<String, String>> for WordContent {
  fn from(map: BTreeMap<String, String>) -> Self {
    Self::from_fields(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
  }
}

impl From<WordContent> for BTreeMap<String, String> {
  fn from(content: WordContent) -> Self {
    let words = content
      .words
      .into_iter()
      .map(|(lang, text)| (format!("{}{}", WORD_PREFIX, lang), text));
    let sentences = content
      .sentences
      .into_iter()
      .map(|(lang, text)| (format!("{}{}", SENTENCE_PREFIX, lang), text));
    words.chain(sentences).chain(content.extra).collect()
  }
}

/// One learnable word/translation pair for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
  pub id: i64,
  pub content: WordContent,

  pub card_state: CardState,
  pub ease_factor: f64,
  /// Day-scale interval
  pub interval: i64,
  /// Index into the step ladder while learning or relearning
  pub learning_step: Option<usize>,
  pub next_review_date: Option<DateTime<Utc>>,
  pub last_review_date: Option<DateTime<Utc>>,
  pub reviews_count: i64,
  pub lapses: i64,
  pub is_suspended: bool,
}

impl Card {
  pub fn new(id: i64, content: WordContent) -> Self {
    Self::with_ease(id, content, DEFAULT_EASE_FACTOR)
  }

  /// A never-reviewed card with the given starting ease
  pub fn with_ease(id: i64, content: WordContent, ease_factor: f64) -> Self {
    Self {
      id,
      content,
      card_state: CardState::New,
      ease_factor,
      interval: 0,
      learning_step: None,
      next_review_date: None,
      last_review_date: None,
      reviews_count: 0,
      lapses: 0,
      is_suspended: false,
    }
  }

  /// Still acquiring: new, or somewhere on a step ladder
  pub fn is_in_ladder(&self) -> bool {
    self.card_state == CardState::New || self.learning_step.is_some()
  }

  /// Graduated and scheduled in days
  pub fn is_review_active(&self) -> bool {
    !self.is_in_ladder()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
  }

  #[test]
  fn test_card_state_from_str() {
    assert_eq!(CardState::from_str("new"), Some(CardState::New));
    assert_eq!(CardState::from_str("LEARNING"), Some(CardState::Learning));
    assert_eq!(CardState::from_str("review"), Some(CardState::Learning));
    assert_eq!(CardState::from_str("relearning"), Some(CardState::Relearning));
    assert_eq!(CardState::from_str("graduated"), None);
  }

  #[test]
  fn test_card_state_as_str_roundtrip() {
    for state in [CardState::New, CardState::Learning, CardState::Relearning] {
      assert_eq!(CardState::from_str(state.as_str()), Some(state));
    }
  }

  #[test]
  fn test_language_code_normalized() {
    assert_eq!(lang("EN").as_str(), "en");
    assert_eq!(lang(" pt-br ").as_str(), "pt-br");
    assert_eq!(lang("zh_Hans").as_str(), "zh_hans");
  }

  #[test]
  fn test_language_code_rejects_garbage() {
    assert!(LanguageCode::parse("").is_err());
    assert!(LanguageCode::parse("e").is_err());
    assert!(LanguageCode::parse("1en").is_err());
    assert!(LanguageCode::parse("en us").is_err());
  }

  #[test]
  fn test_content_from_fields_verbatim() {
    let content = WordContent::from_fields([
      ("word_en", "house"),
      ("word_ru", " дом "),
      ("sentence_en", "The house is big."),
      ("sentence_ru", "   "),
      ("notes", "kept"),
    ]);

    assert_eq!(content.words[&lang("en")], "house");
    assert_eq!(content.words[&lang("ru")], " дом ");
    assert_eq!(content.sentences[&lang("en")], "The house is big.");
    assert_eq!(content.sentences[&lang("ru")], "   ");
    assert_eq!(content.extra["notes"], "kept");
  }

  #[test]
  fn test_unparseable_language_kept_as_extra() {
    let content = WordContent::from_fields([("word_en", "cat"), ("word_", "x"), ("word_9z", "y")]);
    assert_eq!(content.words.len(), 1);
    assert_eq!(content.extra["word_"], "x");
    assert_eq!(content.extra["word_9z"], "y");
  }

  #[test]
  fn test_normalized_cleans_input() {
    // "e" + combining acute accent
    let content = WordContent::from_fields([
      ("word_fr", " cafe\u{301} "),
      ("word_ru", "   "),
      ("sentence_fr", ""),
    ])
    .normalized();
    assert_eq!(content.words[&lang("fr")], "caf\u{e9}");
    assert_eq!(content.words.len(), 1);
    assert!(content.sentences.is_empty());

    let blank = WordContent::from_fields([("word_en", "  ")]).normalized();
    assert!(blank.is_empty());
  }

  #[test]
  fn test_content_serializes_flat() {
    let content = WordContent::from_fields([
      ("word_en", "cat"),
      ("sentence_en", "A cat."),
      ("word_zh_hans", "猫"),
      ("source", "lesson 3"),
    ]);
    let json = serde_json::to_value(&content).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "word_en": "cat",
        "sentence_en": "A cat.",
        "word_zh_hans": "猫",
        "source": "lesson 3"
      })
    );

    let back: WordContent = serde_json::from_value(json).unwrap();
    assert_eq!(back, content);
  }

  #[test]
  fn test_card_new_defaults() {
    let card = Card::new(7, WordContent::default());
    assert_eq!(card.id, 7);
    assert_eq!(card.card_state, CardState::New);
    assert!((card.ease_factor - 2.5).abs() < f64::EPSILON);
    assert_eq!(card.interval, 0);
    assert!(card.learning_step.is_none());
    assert!(card.next_review_date.is_none());
    assert!(card.last_review_date.is_none());
    assert_eq!(card.reviews_count, 0);
    assert_eq!(card.lapses, 0);
    assert!(!card.is_suspended);
    assert!(card.is_in_ladder());
    assert!(!card.is_review_active());
  }

  #[test]
  fn test_review_active_detection() {
    let mut card = Card::new(1, WordContent::default());
    card.card_state = CardState::Learning;
    card.learning_step = Some(1);
    assert!(card.is_in_ladder());

    card.learning_step = None;
    assert!(card.is_review_active());
  }
}
