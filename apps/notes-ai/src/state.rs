use crate::error::AppError;

use ai_client::NoteAiService;
use ai_client::config::AppConfig;
use ai_client::notifications::NotificationClient;

use common::RedactedToken;

use log::info;

/// Everything a command needs: the AI service and the means to open a
/// notification subscription.
///
/// Cloning is cheap; clones share the same service, cache and analytics queue.
#[derive(Clone)]
pub struct AppState {
    service: NoteAiService,
    token: Option<RedactedToken>,
}

impl AppState {
    pub fn new(config: AppConfig, token: Option<RedactedToken>) -> Result<Self, AppError> {
        let service = NoteAiService::new(config, token.clone())?;
        Ok(Self { service, token })
    }

    /// Start cache eviction and the analytics flush timer.
    pub fn start(&self) {
        self.service.start();
        info!("App state started");
    }

    pub fn service(&self) -> &NoteAiService {
        &self.service
    }

    pub fn notification_client(&self) -> Result<NotificationClient, AppError> {
        Ok(NotificationClient::from_config(
            self.service.config(),
            self.token.clone(),
        )?)
    }

    /// Stop background work and flush pending analytics.
    pub async fn shutdown(&self) {
        self.service.cleanup().await;
        info!("App state shut down");
    }
}
