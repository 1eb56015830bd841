mod analytics;
mod helpers;
mod notifications;
mod service;
