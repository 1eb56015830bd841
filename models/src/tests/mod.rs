mod ai;
mod analytics;
