// HTTP request handlers
use crate::application::feed_service::RefreshOutcome;
use crate::domain::telemetry::ChartView;
use crate::presentation::app_state::AppState;
use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<RefreshOutcome> for RefreshResponse {
    fn from(outcome: RefreshOutcome) -> Self {
        let label = outcome.label();
        let (samples, error) = match outcome {
            RefreshOutcome::Published { samples } => (Some(samples), None),
            RefreshOutcome::Failed(err) => (None, Some(err.to_string())),
            RefreshOutcome::Skipped | RefreshOutcome::Inactive => (None, None),
        };
        Self {
            outcome: label,
            samples,
            error,
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current window as three parallel series
pub async fn get_window(State(state): State<Arc<AppState>>) -> Json<ChartView> {
    Json(state.feed.snapshot().to_chart_view())
}

/// Current window now, then again on every publish. Ends when the feed stops.
pub async fn stream_window(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let feed = Arc::clone(&state.feed);
    let mut rx = feed.subscribe();

    let stream = async_stream::stream! {
        loop {
            let view = rx.borrow_and_update().to_chart_view();
            match Event::default().event("window").json_data(&view) {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode window event: {}", e),
            }

            let more = tokio::select! {
                changed = rx.changed() => changed.is_ok(),
                _ = feed.stopped() => false,
            };
            if !more {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Out-of-band refresh; overlapping calls report `skipped`
pub async fn trigger_refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    Json(state.feed.refresh().await.into())
}
