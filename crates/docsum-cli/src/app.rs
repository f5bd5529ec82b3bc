//! Wiring shared by every command.

use std::path::Path;
use std::sync::Arc;

use docsum::config::Config;
use docsum::db::Database;
use docsum::error::{ConfigError, DocsumError};
use docsum::queue::SqliteQueue;
use docsum::store::{JobStore, SqliteJobStore};

pub struct App {
    pub config: Config,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<SqliteQueue>,
}

impl App {
    pub fn open(config: Config) -> Result<Self, DocsumError> {
        let db_path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "databasePath is not set and no home directory was found".to_string(),
        })?;

        let db = Database::open(&db_path, config.timeouts.store())?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db.clone()));
        let queue = Arc::new(SqliteQueue::new(
            db,
            config.queue.visibility_timeout(),
            config.queue.poll_interval(),
        ));

        Ok(Self {
            config,
            store,
            queue,
        })
    }
}

/// Loads the file when given, otherwise runs on defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, DocsumError> {
    match path {
        Some(path) => Ok(docsum::config::load_config(path)?),
        None => Ok(Config::default()),
    }
}
