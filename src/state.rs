//! Application state shared by all handlers.

use std::sync::Arc;

use crate::config::{AppConfig, SessionConfig};
use crate::db::DbPool;
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    /// Word/card storage
    pub db: DbPool,

    /// Live review sessions, one per user
    pub sessions: Arc<SessionRegistry>,

    pub session_config: SessionConfig,
}

impl AppState {
    pub fn new(db: DbPool, config: &AppConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            Arc::new(config.scheduler.clone()),
            config.session.expiry_hours,
        ));
        Self {
            db,
            sessions,
            session_config: config.session.clone(),
        }
    }
}
