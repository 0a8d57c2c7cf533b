// Application state for HTTP handlers
use crate::application::feed_service::TelemetryFeed;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<TelemetryFeed>,
}
