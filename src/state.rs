//! Shared application state.

use crate::config::Config;
use crate::db::Database;
use crate::security::RateLimitManager;
use crate::uploads::{UploadError, UploadStore};
use std::path::Path;
use std::sync::Arc;

/// State handed to every handler. Cheap to clone; all fields are shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub limiter: Arc<RateLimitManager>,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Wire up the state from a validated config and a connected database.
    pub fn new(config: Config, db: Database) -> Result<Self, UploadError> {
        let limiter = Arc::new(RateLimitManager::new(config.security.rate_limits.clone()));
        let uploads = Arc::new(UploadStore::new(Path::new(&config.storage.data_dir))?);

        Ok(Self {
            config: Arc::new(config),
            db,
            limiter,
            uploads,
        })
    }

    /// Session lifetime in seconds, from config.
    pub fn session_ttl_secs(&self) -> i64 {
        (self.config.security.session_ttl_hours * 3600) as i64
    }
}
