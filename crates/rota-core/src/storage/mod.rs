mod config;
pub mod migrations;
pub mod roster_db;
pub mod traits;

pub use config::{Config, ReleaseConfig, SlackConfig};
pub use roster_db::RosterDb;
pub use traits::{EngineerPool, ReleaseStore, ReminderStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `ROTA_DATA_DIR` wins when set. Otherwise `~/.config/rota[-dev]/` based on
/// `ROTA_ENV` (set `ROTA_ENV=dev` to use the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ROTA_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("ROTA_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("rota-dev")
            } else {
                base_dir.join("rota")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
