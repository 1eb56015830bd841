use crate::error::AppError;
use crate::state::AppState;

use common::ErrorLocation;

use std::io::Write;
use std::panic::Location;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

/// Write each notification as one JSON line to `out` until `signal` fires or
/// the connection gives up. Returns how many notifications were written.
pub async fn listen(
    state: &AppState,
    signal: &CancellationToken,
    out: &mut (dyn Write + Send),
) -> Result<usize, AppError> {
    let client = state.notification_client()?;
    let (mut notifications, handle) = client.subscribe(signal.child_token());

    info!("Listening for notifications");
    let mut written = 0;

    while let Some(notification) = notifications.recv().await {
        let line = serde_json::to_string(&notification).map_err(|e| AppError::App {
            message: format!("Failed to encode notification: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| AppError::App {
                message: format!("Failed to write notification: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        written += 1;
    }

    let finished = handle.await.map_err(|e| AppError::App {
        message: format!("Notification task failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    if let Err(e) = finished {
        warn!("Notifications stopped: {e}");
        return Err(AppError::from(e));
    }

    info!("Stopped listening after {written} notifications");
    Ok(written)
}
