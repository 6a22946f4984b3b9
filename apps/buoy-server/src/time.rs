use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Timestamp layout the telemetry vendor uses both for query windows and
/// for the `date` field of every sample.
pub const VENDOR_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_RANGE_HOURS: i64 = 24;
pub const MAX_RAW_HOURS: i64 = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    Last12Hours,
    #[default]
    Last24Hours,
    Last48Hours,
    Last7Days,
}

impl TimeRange {
    /// Unknown or missing values fall back to 24h instead of failing.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("12h") => Self::Last12Hours,
            Some("24h") => Self::Last24Hours,
            Some("48h") => Self::Last48Hours,
            Some("7d") => Self::Last7Days,
            _ => Self::default(),
        }
    }

    pub fn hours(self) -> i64 {
        match self {
            Self::Last12Hours => 12,
            Self::Last24Hours => 24,
            Self::Last48Hours => 48,
            Self::Last7Days => 168,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Last12Hours => "12h",
            Self::Last24Hours => "24h",
            Self::Last48Hours => "48h",
            Self::Last7Days => "7d",
        }
    }
}

/// Accepts a raw `hours` query value. Returns `None` for anything that is not
/// a positive integer so the caller can fall back to `range`.
pub fn parse_raw_hours(raw: Option<&str>) -> Option<i64> {
    let hours = raw?.trim().parse::<i64>().ok()?;
    if hours <= 0 {
        return None;
    }
    Some(hours.min(MAX_RAW_HOURS))
}

/// Half-open query window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    pub fn ending_at(end: DateTime<Utc>, hours: i64) -> Self {
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }

    pub fn for_range(end: DateTime<Utc>, range: TimeRange) -> Self {
        Self::ending_at(end, range.hours())
    }

    pub fn vendor_start(&self) -> String {
        format_vendor_timestamp(self.start)
    }

    pub fn vendor_end(&self) -> String {
        format_vendor_timestamp(self.end)
    }
}

pub fn format_vendor_timestamp(value: DateTime<Utc>) -> String {
    value.format(VENDOR_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_vendor_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, VENDOR_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// `HH:MM` on a 24h clock in the dashboard's display timezone.
pub fn display_clock(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%H:%M").to_string()
}
