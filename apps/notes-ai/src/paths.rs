use crate::error::AppError;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "notes-ai";
const LOG_DIR_NAME: &str = "logs";

/// Where the CLI keeps `config.json`, `credentials.json` and its log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolve directories, preferring explicit overrides.
    ///
    /// Without overrides the config directory is the platform config dir
    /// (`~/.config/notes-ai` on Linux) and logs live in `logs/` beneath it.
    pub fn resolve(
        config_dir: Option<&Path>,
        log_dir: Option<&Path>,
    ) -> Result<Self, AppError> {
        let config_dir = match config_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::config_dir()
                .ok_or_else(|| AppError::App {
                    message: "Could not determine the platform config directory".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?
                .join(APP_DIR_NAME),
        };

        let log_dir = match log_dir {
            Some(dir) => dir.to_path_buf(),
            None => config_dir.join(LOG_DIR_NAME),
        };

        Ok(Self {
            config_dir,
            log_dir,
        })
    }

    pub fn ensure_exists(&self) -> Result<(), AppError> {
        for dir in [&self.config_dir, &self.log_dir] {
            create_dir_all(dir).map_err(|e| AppError::App {
                message: format!("Failed to create directory {}: {e}", dir.display()),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }
        Ok(())
    }
}
