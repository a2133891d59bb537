pub mod api;
pub mod cache;
pub mod card;
pub mod config;
pub mod error;
pub mod mailer;
pub mod model;
pub mod monitor;
pub mod notifier;
pub mod novelty;
pub mod reducer;
pub mod scraper;
pub mod state;

use std::sync::Arc;
use config::Config;
use monitor::Monitor;

/// Application state that will be shared across handlers
pub struct AppState<S, M> {
    pub config: Arc<Config>,
    pub monitor: Arc<Monitor<S, M>>,
}

impl<S, M> Clone for AppState<S, M> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            monitor: Arc::clone(&self.monitor),
        }
    }
}
