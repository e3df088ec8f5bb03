//! Time provider anchored to Asia/Manila civil time.
//!
//! Every "now", every stored instant and every day/time-of-day comparison in
//! the workspace goes through this module so the host's local zone never
//! leaks into occurrence math. Manila has observed a fixed `+08:00` offset
//! with no DST since 1978, so a `FixedOffset` reproduces it exactly.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Offset east of UTC, in seconds.
pub const MANILA_OFFSET_SECS: i32 = 8 * 3600;

/// An instant carrying the Manila offset.
pub type ManilaTime = DateTime<FixedOffset>;

/// The fixed `+08:00` zone.
pub fn manila() -> FixedOffset {
    FixedOffset::east_opt(MANILA_OFFSET_SECS).expect("+08:00 is within the valid offset range")
}

/// Convert any instant to Manila wall-clock representation.
pub fn to_manila<Tz: TimeZone>(instant: &DateTime<Tz>) -> ManilaTime {
    instant.with_timezone(&manila())
}

/// Source of the current instant. Swappable so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> ManilaTime;
}

/// Wall clock, converted to Manila time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> ManilaTime {
        to_manila(&Utc::now())
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<ManilaTime>,
}

impl ManualClock {
    pub fn new(now: ManilaTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Build from an RFC 3339 literal. Panics on malformed input; intended
    /// for fixtures.
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339).expect("fixture instant must be RFC 3339");
        Self::new(to_manila(&now))
    }

    pub fn set(&self, now: ManilaTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to_manila(&now);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ManilaTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `YYYY-MM-DD` of the Manila calendar day containing `instant`.
pub fn today_key(instant: &ManilaTime) -> String {
    to_manila(instant).format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DDTHH:MM:SS+08:00`, the format kill times are persisted in.
pub fn iso_string(instant: &ManilaTime) -> String {
    to_manila(instant).format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Parse a stored instant.
///
/// Accepts RFC 3339 with any offset, and offset-less `YYYY-MM-DDTHH:MM[:SS]`
/// which is read as Manila wall time. Anything else is `None`.
pub fn parse_instant(raw: &str) -> Option<ManilaTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(to_manila(&parsed));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| manila().from_local_datetime(&naive).single())
}

/// Parse an `HH:MM` time of day. Out-of-range or non-numeric parts are `None`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Normalise a time of day to zero-padded `HH:MM`.
pub fn format_time_label(raw: &str) -> Option<String> {
    parse_time_of_day(raw).map(|t| t.format("%H:%M").to_string())
}

/// `MM/DD - hh:mm AM`, used in notification lines.
pub fn format_month_day_time_12(instant: &ManilaTime) -> String {
    to_manila(instant).format("%m/%d - %I:%M %p").to_string()
}

/// `Mon. DD, YYYY - HH:MM`, the long display format.
pub fn format_display_date_time(instant: &ManilaTime) -> String {
    to_manila(instant).format("%b. %d, %Y - %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_reported_in_plus_eight() {
        let now = SystemClock.now();
        assert_eq!(now.offset().local_minus_utc(), MANILA_OFFSET_SECS);
    }

    #[test]
    fn utc_instants_are_shifted_into_manila_day() {
        // 17:30 UTC on the 13th is already the 14th in Manila.
        let utc = DateTime::parse_from_rfc3339("2026-02-13T17:30:00Z").unwrap();
        let local = to_manila(&utc);
        assert_eq!(today_key(&local), "2026-02-14");
        assert_eq!(iso_string(&local), "2026-02-14T01:30:00+08:00");
    }

    #[test]
    fn parse_instant_accepts_offsets_and_local_forms() {
        let explicit = parse_instant("2026-02-13T19:00:00+08:00").unwrap();
        let utc = parse_instant("2026-02-13T11:00:00Z").unwrap();
        let local = parse_instant("2026-02-13T19:00").unwrap();
        assert_eq!(explicit, utc);
        assert_eq!(explicit, local);
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert!(parse_instant("").is_none());
        assert!(parse_instant("   ").is_none());
        assert!(parse_instant("yesterday").is_none());
        assert!(parse_instant("2026-13-40T99:00").is_none());
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!(parse_time_of_day("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse_time_of_day("9:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("10").is_none());
        assert!(parse_time_of_day("ab:cd").is_none());
    }

    #[test]
    fn display_formats() {
        let instant = parse_instant("2026-02-14T13:05:00+08:00").unwrap();
        assert_eq!(format_month_day_time_12(&instant), "02/14 - 01:05 PM");
        assert_eq!(format_display_date_time(&instant), "Feb. 14, 2026 - 13:05");
        assert_eq!(format_time_label("7:5").as_deref(), Some("07:05"));
        assert_eq!(format_time_label("x"), None);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at("2026-02-13T19:00:00+08:00");
        clock.advance(Duration::minutes(90));
        assert_eq!(iso_string(&clock.now()), "2026-02-13T20:30:00+08:00");
    }
}
