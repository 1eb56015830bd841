pub mod ai;
pub mod listen;

use crate::error::AppError;

use common::ErrorLocation;

use std::io::{Read, stdin};
use std::panic::Location;
use std::path::Path;

use log::debug;

const STDIN_PATH: &str = "-";

/// Read a note body from `path`, or from stdin when `path` is `-`.
pub fn read_note(path: &Path) -> Result<String, AppError> {
    if path.as_os_str() == STDIN_PATH {
        let mut content = String::new();
        stdin()
            .read_to_string(&mut content)
            .map_err(|e| AppError::Input {
                message: format!("Failed to read note from stdin: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        debug!("Read {} bytes from stdin", content.len());
        return Ok(content);
    }

    let content = std::fs::read_to_string(path).map_err(|e| AppError::Input {
        message: format!("Failed to read note {}: {e}", path.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;
    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(content)
}
