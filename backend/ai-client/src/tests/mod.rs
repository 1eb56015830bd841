mod analytics;
mod cache;
mod config;
mod credentials;
mod debounce;
mod rate_limiter;
mod service;
mod support;
