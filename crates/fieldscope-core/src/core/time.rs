// crates/fieldscope-core/src/core/time.rs
// ============================================================================
// Module: Fieldscope Time Model
// Description: Timestamp parsing, resolved record timestamps, and clocks.
// Purpose: Turn legacy stored date spellings into calendar-safe time values.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Stored records carry dates in many shapes: RFC 3339 strings, bare calendar
//! dates, browser `datetime-local` values, day-first dates, and epoch numbers.
//! [`parse_timestamp`] accepts all of them. Pure normalization code never reads
//! wall-clock time directly; callers supply "now" through a [`Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use time::Date;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Epoch values below this magnitude are interpreted as seconds, not milliseconds.
const EPOCH_SECONDS_THRESHOLD: i64 = 100_000_000_000;
/// Minimum digit count for a numeric string to be read as an epoch value.
const MIN_EPOCH_DIGITS: usize = 9;

// ============================================================================
// SECTION: Resolved Timestamps
// ============================================================================

/// Origin of a resolved record timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Parsed from a stored field.
    Stored,
    /// Stored value missing or unparsable; the caller-supplied "now" was used.
    Fallback,
}

/// Timestamp attached to every canonical record.
///
/// # Invariants
/// - `value` is always populated so time bucketing never fails.
/// - `source == Fallback` marks values that bounded date ranges must exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedTimestamp {
    /// Timestamp value, keeping the stored UTC offset.
    pub value: OffsetDateTime,
    /// Where the value came from.
    pub source: TimestampSource,
}

impl ResolvedTimestamp {
    /// Creates a timestamp parsed from a stored field.
    #[must_use]
    pub const fn stored(value: OffsetDateTime) -> Self {
        Self {
            value,
            source: TimestampSource::Stored,
        }
    }

    /// Creates a fallback timestamp from the caller-supplied "now".
    #[must_use]
    pub const fn fallback(now: OffsetDateTime) -> Self {
        Self {
            value: now,
            source: TimestampSource::Fallback,
        }
    }

    /// Returns the calendar date in the timestamp's own offset.
    #[must_use]
    pub const fn date(&self) -> Date {
        self.value.date()
    }

    /// Returns true when the timestamp was parsed from stored data.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        self.source == TimestampSource::Stored
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a stored JSON value into a timestamp.
///
/// Accepts strings (see [`parse_timestamp_str`]) and epoch numbers
/// (milliseconds, or seconds when the magnitude is below 10^11).
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(text) => parse_timestamp_str(text),
        Value::Number(number) => {
            if let Some(raw) = number.as_i64() {
                return from_epoch(raw);
            }
            number.as_f64().and_then(f64_to_epoch).and_then(from_epoch)
        }
        _ => None,
    }
}

/// Parses a stored date string into a timestamp.
///
/// Accepted shapes, in order: RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]`
/// and `YYYY-MM-DD HH:MM[:SS]` (assumed UTC), `DD/MM/YYYY`, and digit-only
/// epoch strings.
#[must_use]
pub fn parse_timestamp_str(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(value);
    }
    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }
    let local_formats = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ];
    for format in local_formats {
        if let Ok(value) = PrimitiveDateTime::parse(text, format) {
            return Some(value.assume_utc());
        }
    }
    if let Ok(date) = Date::parse(text, format_description!("[day]/[month]/[year]")) {
        return Some(date.midnight().assume_utc());
    }
    if text.len() >= MIN_EPOCH_DIGITS && text.bytes().all(|byte| byte.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(from_epoch);
    }
    None
}

/// Converts an epoch value (milliseconds or seconds) into a timestamp.
fn from_epoch(raw: i64) -> Option<OffsetDateTime> {
    if raw.unsigned_abs() < EPOCH_SECONDS_THRESHOLD.unsigned_abs() {
        return OffsetDateTime::from_unix_timestamp(raw).ok();
    }
    let nanos = i128::from(raw).checked_mul(1_000_000)?;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

/// Truncates a finite float epoch into an integer epoch.
#[allow(
    clippy::cast_possible_truncation,
    reason = "Value is truncated and range-checked against i64 bounds before casting."
)]
fn f64_to_epoch(raw: f64) -> Option<i64> {
    if !raw.is_finite() {
        return None;
    }
    let truncated = raw.trunc();
    if truncated < -9.0e18 || truncated > 9.0e18 {
        return None;
    }
    Some(truncated as i64)
}

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns a monotonic instant used for cache ages and fetch latency.
    fn instant(&self) -> Instant;

    /// Returns the current wall-clock time in UTC.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for tests and deterministic replays.
///
/// # Invariants
/// - Both the instant and wall-clock readings advance by the same offset.
#[derive(Debug)]
pub struct ManualClock {
    /// Instant captured at construction.
    base_instant: Instant,
    /// Wall-clock value reported at zero offset.
    base_wall: OffsetDateTime,
    /// Accumulated offset.
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a manual clock reporting `wall` as the current time.
    #[must_use]
    pub fn new(wall: OffsetDateTime) -> Self {
        Self {
            base_instant: Instant::now(),
            base_wall: wall,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Advances the clock by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }

    /// Returns the accumulated offset.
    fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn instant(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn now_utc(&self) -> OffsetDateTime {
        self.base_wall + self.elapsed()
    }
}
