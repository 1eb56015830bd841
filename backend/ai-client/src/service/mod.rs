//! High-level AI operations for notes.
//!
//! Each operation follows the same path:
//! validate → cache lookup → join or start the in-flight call for the same key
//! → execute with retry → store in cache → return.
//!
//! # Coalescing
//! Concurrent calls with the same cache key share one underlying request. The
//! shared request runs under the service's shutdown token, not any single
//! caller's; each caller races its own signal against the shared result. When
//! every waiting caller has gone away the shared request is dropped with them.

mod options;

pub use options::CallOptions;

use crate::MAX_CONTENT_CHARS;
use crate::analytics::AnalyticsQueue;
use crate::api_client::{AiApiClient, FLASHCARDS_ENDPOINT, SUGGEST_TAGS_ENDPOINT, SUMMARIZE_ENDPOINT};
use crate::cache::{CacheKey, CacheLookup, CacheStats, ResponseCache};
use crate::config::AppConfig;
use crate::debounce::Debouncer;
use crate::error::{AbortReason, RequestError};
use crate::executor::{ExecuteOptions, RateLimiter, RequestExecutor};
use crate::retry::RetryPolicy;

use common::RedactedToken;
use models::{
    AiSummary, AnalyticsEvent, AnalyticsEventType, Difficulty, Flashcard, SummaryOptions,
    TagSuggestion,
};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use log::{debug, info, warn};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

pub const MIN_FLASHCARD_COUNT: u32 = 1;
pub const MAX_FLASHCARD_COUNT: u32 = 50;

const SUMMARY_OPERATION: &str = "summary";
const FLASHCARDS_OPERATION: &str = "flashcards";
const TAGS_OPERATION: &str = "tags";

/// Cached result of any AI operation.
#[derive(Debug, Clone)]
pub enum AiResponse {
    Summary(AiSummary),
    Flashcards(Vec<Flashcard>),
    Tags(Vec<TagSuggestion>),
}

type SharedCall = Shared<BoxFuture<'static, Result<AiResponse, RequestError>>>;

pub(crate) enum Joined {
    Cached(AiResponse),
    Call(SharedCall),
}

struct InFlight {
    id: u64,
    call: WeakShared<BoxFuture<'static, Result<AiResponse, RequestError>>>,
}

#[derive(Clone)]
pub struct NoteAiService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: AppConfig,
    api: AiApiClient,
    executor: RequestExecutor,
    analytics: AnalyticsQueue,
    retry_policy: RetryPolicy,
    cache: Mutex<ResponseCache<AiResponse>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_call_id: AtomicU64,
    debouncer: Debouncer,
    eviction: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl NoteAiService {
    /// Wire up every component from `config`. Nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] if the configured base URL is invalid.
    pub fn new(config: AppConfig, token: Option<RedactedToken>) -> Result<Self, RequestError> {
        let api = AiApiClient::new(
            &config.server.base_url,
            config.request.timeout(),
            token.map(Arc::new),
        )?;

        let analytics = AnalyticsQueue::new(config.analytics.clone(), Arc::new(api.clone()));
        let executor = RequestExecutor::new(
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            analytics.clone(),
            config.request.timeout(),
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                retry_policy: RetryPolicy::from_config(&config.retry),
                cache: Mutex::new(ResponseCache::from_config(&config.cache)),
                in_flight: Mutex::new(HashMap::new()),
                next_call_id: AtomicU64::new(0),
                debouncer: Debouncer::new(),
                eviction: Mutex::new(None),
                shutdown: CancellationToken::new(),
                config,
                api,
                executor,
                analytics,
            }),
        })
    }

    /// Start the cache eviction task and the analytics flush timer.
    pub fn start(&self) {
        let period = self.inner.config.cache.ttl();
        let weak: Weak<ServiceInner> = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = lock(&inner.cache).evict();
                if removed > 0 {
                    debug!("Periodic cache eviction removed {removed} entries");
                }
            }
        });

        if let Some(previous) = lock(&self.inner.eviction).replace(handle) {
            previous.abort();
        }

        self.inner.analytics.start();
        info!("NoteAiService started (cache eviction every {period:?})");
    }

    /// Stop background work, abort in-flight and pending debounced calls,
    /// flush analytics one last time and clear the cache.
    pub async fn cleanup(&self) {
        self.inner.shutdown.cancel();

        if let Some(handle) = lock(&self.inner.eviction).take() {
            handle.abort();
        }

        self.inner.debouncer.cancel_all();
        lock(&self.inner.in_flight).clear();
        lock(&self.inner.cache).clear();
        self.inner.analytics.cleanup().await;

        info!("NoteAiService cleaned up");
    }

    pub async fn generate_summary(
        &self,
        content: &str,
        options: &SummaryOptions,
        call: &CallOptions,
    ) -> Result<AiSummary, RequestError> {
        self.validate_content(SUMMARIZE_ENDPOINT, content)?;

        let key = summary_key(content, options)?;

        let api = self.inner.api.clone();
        let content = Arc::<str>::from(content);
        let options = options.clone();

        let response = self
            .run_cached(SUMMARIZE_ENDPOINT, key, call, move || {
                let api = api.clone();
                let content = Arc::clone(&content);
                let options = options.clone();
                async move {
                    api.summarize(&content, &options)
                        .await
                        .map(AiResponse::Summary)
                }
            })
            .await?;

        match response {
            AiResponse::Summary(summary) => Ok(summary),
            other => Err(unexpected_response(SUMMARY_OPERATION, &other)),
        }
    }

    pub async fn generate_flashcards(
        &self,
        content: &str,
        count: u32,
        difficulty: Difficulty,
        call: &CallOptions,
    ) -> Result<Vec<Flashcard>, RequestError> {
        self.validate_content(FLASHCARDS_ENDPOINT, content)?;

        if !(MIN_FLASHCARD_COUNT..=MAX_FLASHCARD_COUNT).contains(&count) {
            return Err(self.validation_failure(
                FLASHCARDS_ENDPOINT,
                format!(
                    "Flashcard count must be between {MIN_FLASHCARD_COUNT} and {MAX_FLASHCARD_COUNT}, got {count}"
                ),
            ));
        }

        let key = CacheKey::new(
            FLASHCARDS_OPERATION,
            &json!({ "content": content, "count": count, "difficulty": difficulty }),
        )?;

        let api = self.inner.api.clone();
        let content = Arc::<str>::from(content);

        let response = self
            .run_cached(FLASHCARDS_ENDPOINT, key, call, move || {
                let api = api.clone();
                let content = Arc::clone(&content);
                async move {
                    api.generate_flashcards(&content, count, difficulty)
                        .await
                        .map(AiResponse::Flashcards)
                }
            })
            .await?;

        match response {
            AiResponse::Flashcards(cards) => Ok(cards),
            other => Err(unexpected_response(FLASHCARDS_OPERATION, &other)),
        }
    }

    pub async fn suggest_tags(
        &self,
        content: &str,
        existing_tags: &[String],
        call: &CallOptions,
    ) -> Result<Vec<TagSuggestion>, RequestError> {
        self.validate_content(SUGGEST_TAGS_ENDPOINT, content)?;

        let key = CacheKey::new(
            TAGS_OPERATION,
            &json!({ "content": content, "existing_tags": existing_tags }),
        )?;

        let api = self.inner.api.clone();
        let content = Arc::<str>::from(content);
        let existing_tags: Arc<[String]> = Arc::from(existing_tags);

        let response = self
            .run_cached(SUGGEST_TAGS_ENDPOINT, key, call, move || {
                let api = api.clone();
                let content = Arc::clone(&content);
                let existing_tags = Arc::clone(&existing_tags);
                async move {
                    api.suggest_tags(&content, &existing_tags)
                        .await
                        .map(AiResponse::Tags)
                }
            })
            .await?;

        match response {
            AiResponse::Tags(tags) => Ok(tags),
            other => Err(unexpected_response(TAGS_OPERATION, &other)),
        }
    }

    /// [`generate_summary`](Self::generate_summary) after `delay` of quiet on
    /// `debounce_key`. A newer call with the same key supersedes this one.
    pub async fn generate_summary_debounced(
        &self,
        debounce_key: &str,
        delay: Duration,
        content: &str,
        options: &SummaryOptions,
        call: &CallOptions,
    ) -> Result<AiSummary, RequestError> {
        self.debounce(debounce_key, delay, call).await?;
        self.generate_summary(content, options, call).await
    }

    pub async fn generate_flashcards_debounced(
        &self,
        debounce_key: &str,
        delay: Duration,
        content: &str,
        count: u32,
        difficulty: Difficulty,
        call: &CallOptions,
    ) -> Result<Vec<Flashcard>, RequestError> {
        self.debounce(debounce_key, delay, call).await?;
        self.generate_flashcards(content, count, difficulty, call)
            .await
    }

    pub async fn suggest_tags_debounced(
        &self,
        debounce_key: &str,
        delay: Duration,
        content: &str,
        existing_tags: &[String],
        call: &CallOptions,
    ) -> Result<Vec<TagSuggestion>, RequestError> {
        self.debounce(debounce_key, delay, call).await?;
        self.suggest_tags(content, existing_tags, call).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        lock(&self.inner.cache).stats()
    }

    pub fn clear_cache(&self) {
        lock(&self.inner.cache).clear();
        info!("Response cache cleared");
    }

    pub fn analytics(&self) -> &AnalyticsQueue {
        &self.inner.analytics
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    async fn debounce(
        &self,
        debounce_key: &str,
        delay: Duration,
        call: &CallOptions,
    ) -> Result<(), RequestError> {
        let signal = call.signal.clone().unwrap_or_default();
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(RequestError::aborted(AbortReason::Cancelled)),
            _ = self.inner.shutdown.cancelled() => Err(RequestError::aborted(AbortReason::Cancelled)),
            waited = self.inner.debouncer.wait(debounce_key, delay) => waited,
        }
    }

    async fn run_cached<F, Fut>(
        &self,
        endpoint: &'static str,
        key: CacheKey,
        call: &CallOptions,
        request: F,
    ) -> Result<AiResponse, RequestError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AiResponse, RequestError>> + Send + 'static,
    {
        let signal = call.signal.clone().unwrap_or_default();
        if signal.is_cancelled() || self.inner.shutdown.is_cancelled() {
            return Err(RequestError::aborted(AbortReason::Cancelled));
        }

        let lookup = lock(&self.inner.cache).get(&key);
        match lookup {
            CacheLookup::Hit(response) => {
                debug!("Cache hit for {key}");
                self.track(AnalyticsEventType::CacheHit, endpoint);
                return Ok(response);
            }
            CacheLookup::Miss => self.track(AnalyticsEventType::CacheMiss, endpoint),
            CacheLookup::Expired => self.track(AnalyticsEventType::CacheExpired, endpoint),
        }

        let shared = match self.join_or_start(endpoint, key, call, request) {
            Joined::Cached(response) => return Ok(response),
            Joined::Call(shared) => shared,
        };

        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(RequestError::aborted(AbortReason::Cancelled)),
            result = shared => result,
        }
    }

    /// Join the in-flight call for `key`, or start one.
    ///
    /// The cache is checked again under the in-flight lock: a call that
    /// finished between the caller's lookup and this point has already stored
    /// its result and left the map.
    pub(crate) fn join_or_start<F, Fut>(
        &self,
        endpoint: &'static str,
        key: CacheKey,
        call: &CallOptions,
        mut request: F,
    ) -> Joined
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AiResponse, RequestError>> + Send + 'static,
    {
        let mut in_flight = lock(&self.inner.in_flight);

        if let Some(existing) = in_flight.get(&key)
            && let Some(shared) = existing.call.upgrade()
        {
            debug!("Joining in-flight request for {key}");
            self.track(AnalyticsEventType::RequestCoalesced, endpoint);
            return Joined::Call(shared);
        }

        if let Some(response) = lock(&self.inner.cache).peek(&key) {
            debug!("Result for {key} stored while joining");
            return Joined::Cached(response);
        }

        let id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let options = ExecuteOptions {
            timeout: call.timeout,
            signal: Some(self.inner.shutdown.child_token()),
            request_id: None,
            on_retry: call.on_retry.clone(),
        };
        let call_key = key.clone();

        let shared = async move {
            let result = inner
                .executor
                .execute_with_retry(endpoint, &options, &inner.retry_policy, || request())
                .await;

            if let Ok(response) = &result {
                lock(&inner.cache).set(call_key.clone(), response.clone(), None);
            }

            let mut in_flight = lock(&inner.in_flight);
            if in_flight.get(&call_key).is_some_and(|entry| entry.id == id) {
                in_flight.remove(&call_key);
            }

            result
        }
        .boxed()
        .shared();

        if let Some(weak) = shared.downgrade() {
            in_flight.insert(key, InFlight { id, call: weak });
        }

        Joined::Call(shared)
    }

    fn validate_content(&self, endpoint: &str, content: &str) -> Result<(), RequestError> {
        if content.trim().is_empty() {
            return Err(self.validation_failure(endpoint, "Content cannot be empty"));
        }

        let chars = content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(self.validation_failure(
                endpoint,
                format!("Content is too long ({chars} characters, maximum {MAX_CONTENT_CHARS})"),
            ));
        }

        Ok(())
    }

    #[track_caller]
    fn validation_failure(&self, endpoint: &str, message: impl Into<String>) -> RequestError {
        let error = RequestError::validation(message);
        warn!("{endpoint}: {error}");
        self.inner.analytics.track(
            AnalyticsEvent::new(AnalyticsEventType::ValidationError, endpoint)
                .with_metadata("error", error.to_string()),
        );
        error
    }

    fn track(&self, event_type: AnalyticsEventType, endpoint: &str) {
        self.inner
            .analytics
            .track(AnalyticsEvent::new(event_type, endpoint));
    }
}

pub(crate) fn summary_key(
    content: &str,
    options: &SummaryOptions,
) -> Result<CacheKey, RequestError> {
    CacheKey::new(
        SUMMARY_OPERATION,
        &json!({ "content": content, "options": options }),
    )
}

#[track_caller]
fn unexpected_response(operation: &str, response: &AiResponse) -> RequestError {
    let kind = match response {
        AiResponse::Summary(_) => SUMMARY_OPERATION,
        AiResponse::Flashcards(_) => FLASHCARDS_OPERATION,
        AiResponse::Tags(_) => TAGS_OPERATION,
    };
    RequestError::decode(format!("Expected {operation} response, got {kind}"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
