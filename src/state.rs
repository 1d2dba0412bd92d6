use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::db::{DbError, DbGuest, ResponseFields, RsvpDb};
use crate::error::{ConfigError, SyncError};
use crate::schedule::ScheduleSettings;
use crate::scheduler::{sync_channel, SyncHandle, SyncSignals};
use crate::sheets::SheetSource;
use crate::types::Config;

/// The store connection shared by the worker and request handlers.
///
/// Lock only around synchronous store calls; never hold it across `.await`.
pub type SharedDb = Arc<Mutex<RsvpDb>>;

/// Composition root: everything the sync worker and the API layer share.
pub struct AppState {
    pub config: Config,
    pub db: SharedDb,
    pub sheet: Arc<dyn SheetSource>,
    pub schedule: ScheduleSettings,
    pub sync_interval: Duration,
    sync: SyncHandle,
}

impl AppState {
    /// Build the state and the signal receiver for `run_sync_worker`.
    pub fn new(
        config: Config,
        db: RsvpDb,
        sheet: Arc<dyn SheetSource>,
    ) -> Result<(Self, SyncSignals), ConfigError> {
        let schedule = ScheduleSettings::from_config(&config.schedule)?;
        let sync_interval = config.sync.interval()?;
        let (sync, signals) = sync_channel();

        let state = Self {
            config,
            db: Arc::new(Mutex::new(db)),
            sheet,
            schedule,
            sync_interval,
            sync,
        };
        Ok((state, signals))
    }

    pub fn sync_handle(&self) -> SyncHandle {
        self.sync.clone()
    }

    /// Record a guest response and nudge the worker to export it.
    ///
    /// Only store failures surface here; the export itself happens later.
    pub fn record_response(
        &self,
        invite_code: &str,
        fields: &ResponseFields,
        response_country: Option<&str>,
    ) -> Result<DbGuest, SyncError> {
        let guest = self
            .db
            .lock()
            .record_response(invite_code, fields, response_country)?;
        self.sync.request_sync_soon();
        Ok(guest)
    }
}

/// Resolve the config file: `$RSVP_SYNC_CONFIG`, else `~/.rsvp-sync/config.json`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os("RSVP_SYNC_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".rsvp-sync").join("config.json"))
}

/// Load configuration from the default location plus the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?, |key| std::env::var(key).ok())
}

/// Load configuration from `path` (missing file = defaults), apply
/// environment overrides, and validate.
pub fn load_config_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content)?
    } else {
        log::info!("No config file at {}; using defaults", path.display());
        Config::default()
    };

    config.apply_env_overrides(env)?;
    config.validate()?;
    Ok(config)
}

/// Open the store at the configured path, or the default one.
pub fn open_db(config: &Config) -> Result<RsvpDb, DbError> {
    match config.db_path() {
        Some(path) => RsvpDb::open_at(path),
        None => RsvpDb::open(),
    }
}
