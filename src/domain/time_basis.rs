// Time basis - calendar arithmetic and label formatting in one zone
use chrono::{DateTime, Days, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use serde::Deserialize;

/// Chart label layout: day/month/year, 24-hour clock, zero-padded.
const LABEL_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// How the trailing window's lower bound is derived from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Step the local calendar date back, keeping the wall-clock time.
    /// Across a DST change the window is 23h or 25h long.
    #[default]
    Calendar,
    /// Subtract a fixed `days * 24h`.
    Duration,
}

/// The zone used for calendar steps, for naive timestamps and for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBasis {
    Local,
    Fixed(FixedOffset),
}

impl TimeBasis {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// `None` selects the host's local zone. Offsets beyond ±24h are rejected.
    pub fn from_offset_minutes(minutes: Option<i32>) -> Option<Self> {
        match minutes {
            None => Some(Self::Local),
            Some(m) => m
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(Self::Fixed),
        }
    }

    /// Lower bound of the trailing window. Saturates at the earliest
    /// representable instant when `days` reaches past it.
    pub fn window_start(&self, now: DateTime<Utc>, days: u32, mode: WindowMode) -> DateTime<Utc> {
        let by_duration = chrono::Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span));
        let start = match mode {
            WindowMode::Duration => by_duration,
            WindowMode::Calendar => {
                let stepped = match self {
                    Self::Local => calendar_days_back(now.with_timezone(&Local), days),
                    Self::Fixed(offset) => calendar_days_back(now.with_timezone(offset), days),
                };
                stepped.or(by_duration)
            }
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn format_label(&self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Local => ts.with_timezone(&Local).format(LABEL_FORMAT).to_string(),
            Self::Fixed(offset) => ts.with_timezone(offset).format(LABEL_FORMAT).to_string(),
        }
    }

    /// Resolve a timestamp without offset. Ambiguous times take the earlier
    /// instant; nonexistent ones yield `None`.
    pub fn interpret_naive(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

// A stepped wall-clock time that is ambiguous (DST fall-back) takes the
// earlier instant; one inside a DST gap has no instant and yields `None`.
fn calendar_days_back<Tz: TimeZone>(local: DateTime<Tz>, days: u32) -> Option<DateTime<Utc>> {
    let stepped = local
        .naive_local()
        .checked_sub_days(Days::new(u64::from(days)))?;
    local
        .timezone()
        .from_local_datetime(&stepped)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
