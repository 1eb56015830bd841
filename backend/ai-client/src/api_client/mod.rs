//! HTTP client for the note backend's AI and analytics endpoints.
//!
//! Every non-success response is classified into a [`RequestError`] here, so
//! retry decisions downstream never look at raw reqwest types.

use crate::analytics::{AnalyticsBatch, AnalyticsSink};
use crate::error::{AnalyticsError, RequestError};

use common::RedactedToken;
use models::{AiSummary, Difficulty, Flashcard, SummaryOptions, TagSuggestion};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const SUMMARIZE_ENDPOINT: &str = "ai/summarize";
pub const FLASHCARDS_ENDPOINT: &str = "ai/generate-flashcards";
pub const SUGGEST_TAGS_ENDPOINT: &str = "ai/suggest-tags";
pub const ANALYTICS_ENDPOINT: &str = "api/analytics";

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    content: &'a str,
    options: &'a SummaryOptions,
}

#[derive(Serialize)]
struct FlashcardsRequest<'a> {
    content: &'a str,
    count: u32,
    difficulty: Difficulty,
}

#[derive(Serialize)]
struct SuggestTagsRequest<'a> {
    content: &'a str,
    existing_tags: &'a [String],
}

#[derive(Deserialize)]
struct AnalyticsAck {
    #[serde(default)]
    success: bool,
}

#[derive(Clone)]
pub struct AiApiClient {
    base_url: Url,
    client: Client,
    token: Option<Arc<RedactedToken>>,
}

impl AiApiClient {
    pub fn new(
        base_url_str: &str,
        timeout: Duration,
        token: Option<Arc<RedactedToken>>,
    ) -> Result<Self, RequestError> {
        // Url::join replaces the last path segment unless the base ends with '/'
        let base_url = if base_url_str.ends_with('/') {
            Url::parse(base_url_str)?
        } else {
            Url::parse(&format!("{base_url_str}/"))?
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::from_reqwest(&e))?;

        Ok(Self {
            base_url,
            client,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn prepare_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(token) = &self.token
            && !token.is_empty()
        {
            request = request.header(AUTHORIZATION, token.bearer_header());
        }
        request
    }

    pub async fn summarize(
        &self,
        content: &str,
        options: &SummaryOptions,
    ) -> Result<AiSummary, RequestError> {
        self.post_json(SUMMARIZE_ENDPOINT, &SummarizeRequest { content, options })
            .await
    }

    pub async fn generate_flashcards(
        &self,
        content: &str,
        count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<Flashcard>, RequestError> {
        self.post_json(
            FLASHCARDS_ENDPOINT,
            &FlashcardsRequest {
                content,
                count,
                difficulty,
            },
        )
        .await
    }

    pub async fn suggest_tags(
        &self,
        content: &str,
        existing_tags: &[String],
    ) -> Result<Vec<TagSuggestion>, RequestError> {
        self.post_json(
            SUGGEST_TAGS_ENDPOINT,
            &SuggestTagsRequest {
                content,
                existing_tags,
            },
        )
        .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        debug!("POST {url}");

        let response = self
            .prepare_request(self.client.post(url))
            .json(body)
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(RequestError::from_status(status.as_u16(), text, retry_after));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(&e))?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl AnalyticsSink for AiApiClient {
    async fn send(&self, batch: &AnalyticsBatch<'_>) -> Result<(), AnalyticsError> {
        let url = self.base_url.join(ANALYTICS_ENDPOINT)?;

        let response = self
            .prepare_request(self.client.post(url))
            .json(batch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AnalyticsError::rejected(format!(
                "HTTP {} - {}",
                response.status().as_u16(),
                response.text().await.unwrap_or_default()
            )));
        }

        let ack: AnalyticsAck = response.json().await?;
        if !ack.success {
            return Err(AnalyticsError::rejected("server reported success=false"));
        }

        Ok(())
    }
}

/// `retry-after` in delta-seconds. HTTP-date values, negative values and
/// values too large for a `Duration` are ignored and fall back to computed
/// backoff.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds: f64 = value.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}
