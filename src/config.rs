//! Application configuration.
//!
//! Scheduler tuning, session sizing, and server/database settings. Every
//! scheduler value has a documented default so an empty `config.toml` yields
//! a working setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ==================== Errors ====================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ==================== Scheduler Defaults ====================

/// Ease factor stamped on every new card
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Hard floor for the ease factor
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Learning steps in minutes: 1min → 10min, then graduate
pub const LEARNING_STEPS_MINUTES: [i64; 2] = [1, 10];

/// Relearning steps in minutes after a lapse
pub const RELEARNING_STEPS_MINUTES: [i64; 1] = [10];

/// Interval (days) given when a card graduates with Good
pub const GRADUATING_INTERVAL_DAYS: i64 = 1;

/// Interval (days) given when a card graduates with Easy
pub const EASY_INTERVAL_DAYS: i64 = 4;

pub const HARD_MULTIPLIER: f64 = 1.2;
pub const EASY_BONUS: f64 = 1.3;

/// Share of the old interval a lapsed card keeps for re-graduation
pub const LAPSE_MULTIPLIER: f64 = 0.5;

pub const LAPSE_EASE_PENALTY: f64 = 0.2;
pub const HARD_EASE_PENALTY: f64 = 0.15;
pub const EASY_EASE_BONUS: f64 = 0.15;

/// Shortest day-scale interval a review-active card can get
pub const MINIMUM_INTERVAL_DAYS: i64 = 1;

/// Longest interval (days) any card can be scheduled out, about 100 years
pub const MAXIMUM_INTERVAL_DAYS: i64 = 36500;

// ==================== Scheduler Configuration ====================

/// Tunable constants for the card state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub initial_ease_factor: f64,
    pub min_ease_factor: f64,
    pub learning_steps_minutes: Vec<i64>,
    pub relearning_steps_minutes: Vec<i64>,
    pub graduating_interval_days: i64,
    pub easy_interval_days: i64,
    pub hard_multiplier: f64,
    pub easy_bonus: f64,
    pub lapse_multiplier: f64,
    pub lapse_ease_penalty: f64,
    pub hard_ease_penalty: f64,
    pub easy_ease_bonus: f64,
    pub minimum_interval_days: i64,
    pub maximum_interval_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease_factor: DEFAULT_EASE_FACTOR,
            min_ease_factor: MIN_EASE_FACTOR,
            learning_steps_minutes: LEARNING_STEPS_MINUTES.to_vec(),
            relearning_steps_minutes: RELEARNING_STEPS_MINUTES.to_vec(),
            graduating_interval_days: GRADUATING_INTERVAL_DAYS,
            easy_interval_days: EASY_INTERVAL_DAYS,
            hard_multiplier: HARD_MULTIPLIER,
            easy_bonus: EASY_BONUS,
            lapse_multiplier: LAPSE_MULTIPLIER,
            lapse_ease_penalty: LAPSE_EASE_PENALTY,
            hard_ease_penalty: HARD_EASE_PENALTY,
            easy_ease_bonus: EASY_EASE_BONUS,
            minimum_interval_days: MINIMUM_INTERVAL_DAYS,
            maximum_interval_days: MAXIMUM_INTERVAL_DAYS,
        }
    }
}

impl SchedulerConfig {
    /// Check that the values are internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ladder("learning_steps_minutes", &self.learning_steps_minutes)?;
        validate_ladder("relearning_steps_minutes", &self.relearning_steps_minutes)?;

        if !(self.min_ease_factor >= MIN_EASE_FACTOR) {
            return Err(invalid(format!(
                "min_ease_factor must be at least {}",
                MIN_EASE_FACTOR
            )));
        }
        if !(self.initial_ease_factor >= self.min_ease_factor) {
            return Err(invalid("initial_ease_factor is below min_ease_factor"));
        }
        if self.minimum_interval_days < 1 {
            return Err(invalid("minimum_interval_days must be positive"));
        }
        if self.graduating_interval_days < self.minimum_interval_days {
            return Err(invalid(
                "graduating_interval_days is below minimum_interval_days",
            ));
        }
        if self.easy_interval_days <= self.graduating_interval_days {
            return Err(invalid(
                "easy_interval_days must exceed graduating_interval_days",
            ));
        }
        if !(self.easy_interval_days..=MAXIMUM_INTERVAL_DAYS).contains(&self.maximum_interval_days) {
            return Err(invalid(format!(
                "maximum_interval_days must be between easy_interval_days and {}",
                MAXIMUM_INTERVAL_DAYS
            )));
        }
        let max_step = self.maximum_interval_days * 24 * 60;
        for (name, steps) in [
            ("learning_steps_minutes", &self.learning_steps_minutes),
            ("relearning_steps_minutes", &self.relearning_steps_minutes),
        ] {
            if steps.iter().any(|&step| step > max_step) {
                return Err(invalid(format!(
                    "{} must stay within maximum_interval_days",
                    name
                )));
            }
        }
        if !(self.hard_multiplier >= 1.0) {
            return Err(invalid("hard_multiplier must be at least 1.0"));
        }
        if !(self.easy_bonus > 1.0) {
            return Err(invalid("easy_bonus must be greater than 1.0"));
        }
        if !(0.0..1.0).contains(&self.lapse_multiplier) {
            return Err(invalid("lapse_multiplier must be in [0, 1)"));
        }
        for (name, value) in [
            ("lapse_ease_penalty", self.lapse_ease_penalty),
            ("hard_ease_penalty", self.hard_ease_penalty),
            ("easy_ease_bonus", self.easy_ease_bonus),
        ] {
            if !(value >= 0.0) {
                return Err(invalid(format!("{} must be non-negative", name)));
            }
        }
        Ok(())
    }
}

fn validate_ladder(name: &str, steps: &[i64]) -> Result<(), ConfigError> {
    if steps.is_empty() {
        return Err(invalid(format!("{} must have at least one step", name)));
    }
    if steps[0] <= 0 {
        return Err(invalid(format!("{} must start above zero", name)));
    }
    if steps.windows(2).any(|w| w[1] <= w[0]) {
        return Err(invalid(format!("{} must be strictly increasing", name)));
    }
    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

// ==================== Session Configuration ====================

/// Maximum number of due cards pulled into a session.
///
/// Serialized as an optional integer: absent or `null` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<usize>", into = "Option<usize>")]
pub enum CardsLimit {
    #[default]
    Unlimited,
    Limited(usize),
}

impl CardsLimit {
    pub fn as_option(self) -> Option<usize> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(n),
        }
    }

    /// Whether a queue of `len` cards has room for another
    pub fn allows(self, len: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(n) => len < n,
        }
    }
}

impl TryFrom<Option<usize>> for CardsLimit {
    type Error = ConfigError;

    fn try_from(value: Option<usize>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Self::Unlimited),
            Some(0) => Err(invalid("cards_limit must be positive")),
            Some(n) => Ok(Self::Limited(n)),
        }
    }
}

impl From<CardsLimit> for Option<usize> {
    fn from(limit: CardsLimit) -> Self {
        limit.as_option()
    }
}

/// Session expiration time in hours
pub const SESSION_EXPIRY_HOURS: i64 = 1;

/// Probability threshold for session cleanup (0-255, lower = more frequent)
/// Value of 25 means ~10% chance (25/256) on each session access
pub const SESSION_CLEANUP_THRESHOLD: u8 = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cards_limit: CardsLimit,
    pub expiry_hours: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cards_limit: CardsLimit::Unlimited,
            expiry_hours: SESSION_EXPIRY_HOURS,
        }
    }
}

// ==================== Server & Database ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Default database location
pub const DEFAULT_DATABASE_PATH: &str = "data/lexicard.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SERVER_ADDR.to_string(),
            port: SERVER_PORT,
        }
    }
}

impl ServerConfig {
    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Configuration file structure for config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Load configuration with priority: config.toml > .env / environment > defaults.
    ///
    /// A missing config file is not an error; a malformed one is.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config_path =
            std::env::var("LEXICARD_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::load_file(Path::new(&config_path))?;

        if config.database.path.is_none() {
            if let Ok(path) = std::env::var("DATABASE_PATH") {
                tracing::info!("Using database from DATABASE_PATH env: {}", path);
                config.database.path = Some(PathBuf::from(path));
            }
        }

        if let Ok(port) = std::env::var("LEXICARD_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| invalid(format!("LEXICARD_PORT is not a port: {}", port)))?;
        }

        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!("Using configuration from {}", path.display());
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No {} found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scheduler_config_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_ladder_must_increase() {
        let config = SchedulerConfig {
            learning_steps_minutes: vec![10, 10],
            ..SchedulerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SchedulerConfig {
            relearning_steps_minutes: vec![],
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ease_floor_cannot_be_lowered() {
        let config = SchedulerConfig {
            min_ease_factor: 1.1,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_easy_interval_must_beat_good() {
        let config = SchedulerConfig {
            easy_interval_days: 1,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_maximum_interval_bounds() {
        let below_easy = SchedulerConfig {
            maximum_interval_days: 3,
            ..SchedulerConfig::default()
        };
        assert!(below_easy.validate().is_err());

        let beyond_cap = SchedulerConfig {
            maximum_interval_days: MAXIMUM_INTERVAL_DAYS + 1,
            ..SchedulerConfig::default()
        };
        assert!(beyond_cap.validate().is_err());

        let huge_step = SchedulerConfig {
            maximum_interval_days: 10,
            learning_steps_minutes: vec![1, 11 * 24 * 60],
            ..SchedulerConfig::default()
        };
        assert!(huge_step.validate().is_err());
    }

    #[test]
    fn test_multipliers_checked() {
        let hard = SchedulerConfig {
            hard_multiplier: 0.9,
            ..SchedulerConfig::default()
        };
        assert!(hard.validate().is_err());

        let easy = SchedulerConfig {
            easy_bonus: 1.0,
            ..SchedulerConfig::default()
        };
        assert!(easy.validate().is_err());

        let lapse = SchedulerConfig {
            lapse_multiplier: 1.0,
            ..SchedulerConfig::default()
        };
        assert!(lapse.validate().is_err());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.session.cards_limit, CardsLimit::Unlimited);
        assert_eq!(config.database_path(), PathBuf::from(DEFAULT_DATABASE_PATH));
    }

    #[test]
    fn test_toml_overrides() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            path = "/tmp/words.db"

            [server]
            port = 8080

            [scheduler]
            learning_steps_minutes = [1, 5, 15]
            easy_bonus = 1.5

            [session]
            cards_limit = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/words.db"));
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.scheduler.learning_steps_minutes, vec![1, 5, 15]);
        assert!((config.scheduler.easy_bonus - 1.5).abs() < f64::EPSILON);
        assert!((config.scheduler.hard_multiplier - HARD_MULTIPLIER).abs() < f64::EPSILON);
        assert_eq!(config.session.cards_limit, CardsLimit::Limited(20));
    }

    #[test]
    fn test_invalid_scheduler_in_toml_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [scheduler]
            learning_steps_minutes = [10, 1]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_cards_limit_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [session]
            cards_limit = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cards_limit_json() {
        let limit: CardsLimit = serde_json::from_str("null").unwrap();
        assert_eq!(limit, CardsLimit::Unlimited);
        let limit: CardsLimit = serde_json::from_str("5").unwrap();
        assert_eq!(limit, CardsLimit::Limited(5));
        assert_eq!(serde_json::to_string(&CardsLimit::Limited(5)).unwrap(), "5");
        assert!(serde_json::from_str::<CardsLimit>("0").is_err());
    }

    #[test]
    fn test_cards_limit_allows() {
        assert!(CardsLimit::Unlimited.allows(10_000));
        assert!(CardsLimit::Limited(2).allows(1));
        assert!(!CardsLimit::Limited(2).allows(2));
    }

    #[test]
    fn test_missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler\n").unwrap();
        assert!(matches!(
            AppConfig::load_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
