// Normalizer - raw payload to a filtered, labelled window
use crate::domain::error::FeedError;
use crate::domain::payload::{RawTelemetryResponse, coerce_power, coerce_timestamp};
use crate::domain::telemetry::{Sample, TelemetryWindow};
use crate::domain::time_basis::{TimeBasis, WindowMode};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub window_days: u32,
    /// Spacing assumed when the payload carries no timestamps.
    pub sample_interval: Duration,
    pub window_mode: WindowMode,
    pub basis: TimeBasis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub window: TelemetryWindow,
    /// Coercions applied along the way. Informational only.
    pub issues: Vec<FeedError>,
    /// Samples dropped for lacking a usable timestamp.
    pub dropped: usize,
}

/// Deterministic in `body`, `now` and `settings`.
pub fn normalize(
    body: Value,
    now: DateTime<Utc>,
    settings: &WindowSettings,
) -> Result<Normalized, FeedError> {
    let (raw, mut issues) = RawTelemetryResponse::from_value(body)?;

    let timestamps: Vec<Option<DateTime<Utc>>> = if raw.kw_ts.is_empty() {
        synthesize_timestamps(raw.kw_values.len(), now, settings.sample_interval)
    } else {
        raw.kw_ts
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let ts = coerce_timestamp(v, &settings.basis);
                if ts.is_none() {
                    issues.push(FeedError::malformed(
                        "kw_ts",
                        format!("index {} is not a timestamp: {}", i, v),
                    ));
                }
                ts
            })
            .collect()
    };

    check_length("kw_values", raw.kw_values.len(), timestamps.len(), &mut issues);
    check_length("kvah_values", raw.kvah_values.len(), timestamps.len(), &mut issues);

    let start = settings
        .basis
        .window_start(now, settings.window_days, settings.window_mode);

    let mut dropped = 0;
    let mut samples = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.into_iter().enumerate() {
        let Some(timestamp) = ts else {
            dropped += 1;
            continue;
        };
        if timestamp < start {
            continue;
        }
        let active_power = power_at("kw_values", &raw.kw_values, i, &mut issues);
        let reactive_power = power_at("kvah_values", &raw.kvah_values, i, &mut issues);
        samples.push(Sample::new(timestamp, active_power, reactive_power));
    }

    Ok(Normalized {
        window: TelemetryWindow::new(samples, &settings.basis),
        issues,
        dropped,
    })
}

/// The i-th of `count` stamps is `now - interval * (count - 1 - i)`. Stamps
/// that fall outside the representable range are `None`.
pub fn synthesize_timestamps(
    count: usize,
    now: DateTime<Utc>,
    interval: Duration,
) -> Vec<Option<DateTime<Utc>>> {
    (0..count)
        .map(|i| {
            let steps = i32::try_from(count - 1 - i).ok()?;
            let offset = interval.checked_mul(steps)?;
            now.checked_sub_signed(offset)
        })
        .collect()
}

fn check_length(field: &'static str, actual: usize, expected: usize, issues: &mut Vec<FeedError>) {
    if actual != expected {
        issues.push(FeedError::malformed(
            field,
            format!("length {} does not match {} timestamps", actual, expected),
        ));
    }
}

// Out-of-range and null entries are gaps; other unusable entries are reported.
fn power_at(
    field: &'static str,
    values: &[Value],
    i: usize,
    issues: &mut Vec<FeedError>,
) -> Option<f64> {
    let raw = values.get(i)?;
    let value = coerce_power(raw);
    if value.is_none() && !raw.is_null() {
        issues.push(FeedError::malformed(field, format!("index {} is not numeric: {}", i, raw)));
    }
    value
}
