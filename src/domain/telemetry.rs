// Telemetry domain models
use super::time_basis::TimeBasis;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

/// One meter reading. A `None` power value renders as a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub active_power: Option<f64>,
    pub reactive_power: Option<f64>,
}

impl Sample {
    pub fn new(
        timestamp: DateTime<Utc>,
        active_power: Option<f64>,
        reactive_power: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            active_power,
            reactive_power,
        }
    }
}

/// Ordered samples of one refresh cycle with their display labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryWindow {
    samples: Vec<Sample>,
    labels: Vec<String>,
}

impl TelemetryWindow {
    pub fn new(samples: Vec<Sample>, basis: &TimeBasis) -> Self {
        let labels = samples
            .iter()
            .map(|s| basis.format_label(s.timestamp))
            .collect();
        Self { samples, labels }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn active_power(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.active_power).collect()
    }

    pub fn reactive_power(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.reactive_power).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Published state of the feed. Replaced as a whole on every publish.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedSnapshot {
    pub window: Arc<TelemetryWindow>,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl FeedSnapshot {
    pub fn published(window: TelemetryWindow, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            window: Arc::new(window),
            error: None,
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Same window as `self`, with `message` surfaced next to it.
    pub fn with_error(&self, message: String) -> Self {
        Self {
            window: Arc::clone(&self.window),
            error: Some(message),
            refreshed_at: self.refreshed_at,
        }
    }

    pub fn to_chart_view(&self) -> ChartView {
        ChartView {
            labels: self.window.labels().to_vec(),
            active_power: self.window.active_power(),
            reactive_power: self.window.reactive_power(),
            error: self.error.clone(),
            refreshed_at: self
                .refreshed_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Renderer-facing shape: three parallel series plus an optional error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub labels: Vec<String>,
    pub active_power: Vec<Option<f64>>,
    pub reactive_power: Vec<Option<f64>>,
    pub error: Option<String>,
    pub refreshed_at: Option<String>,
}
