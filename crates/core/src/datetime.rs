//! Date and duration helpers shared by the layout, filters and views.

use chrono::{
    DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc,
};
use std::str::FromStr;

/// Display format for date inputs without a timezone suffix.
pub const ISO_FORMAT_WITHOUT_TZ: &str = "%Y-%m-%dT%H:%M:%S";

/// Naive datetime layouts accepted from users, tried in order.
const NAIVE_INPUT_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
];

/// Timezone used to present instants to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayTimezone {
    /// The machine's local timezone.
    #[default]
    Local,
    /// Coordinated Universal Time.
    Utc,
}

impl DisplayTimezone {
    /// Returns the string representation used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTimezone::Local => "local",
            DisplayTimezone::Utc => "utc",
        }
    }

    /// Format an instant in this timezone with a chrono format string.
    pub fn format(&self, dt: DateTime<Utc>, fmt: &str) -> String {
        match self {
            DisplayTimezone::Local => dt.with_timezone(&Local).format(fmt).to_string(),
            DisplayTimezone::Utc => dt.format(fmt).to_string(),
        }
    }

    /// Interpret a naive datetime as wall-clock time in this timezone.
    ///
    /// Ambiguous local times resolve to the earlier instant; nonexistent
    /// ones (DST gaps) yield `None`.
    pub fn from_naive(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DisplayTimezone::Utc => Some(Utc.from_utc_datetime(&naive)),
            DisplayTimezone::Local => match Local.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
                LocalResult::None => None,
            },
        }
    }
}

impl FromStr for DisplayTimezone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(DisplayTimezone::Local),
            "utc" | "z" => Ok(DisplayTimezone::Utc),
            _ => Err(format!("invalid timezone '{}'. Valid values: local, utc", s)),
        }
    }
}

impl std::fmt::Display for DisplayTimezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milliseconds between two optional instants; a missing bound means `now`.
pub fn duration_ms(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let start = start.unwrap_or(now);
    let end = end.unwrap_or(now);
    end.signed_duration_since(start).num_milliseconds()
}

/// Format a duration in milliseconds as `HH:MM:SS`, prefixed with days when needed.
pub fn format_duration(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let total_secs = ms.unsigned_abs() / 1000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!(
            "{}{} days {:02}:{:02}:{:02}",
            sign, days, hours, minutes, seconds
        )
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds)
    }
}

/// Parse a user-supplied date.
///
/// RFC 3339 strings carry their own offset; naive values are read as
/// wall-clock time in `tz`. A bare date means midnight.
pub fn parse_date_input(value: &str, tz: DisplayTimezone) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_INPUT_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return tz.from_naive(naive);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_naive(naive))
}

/// Format an instant the way query parameters store it: `2024-01-01T10:00:00Z`.
pub fn to_utc_param(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format an instant as ISO 8601 with milliseconds: `2024-01-01T10:00:00.000Z`.
pub fn to_iso_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_duration_ms_with_both_bounds() {
        let now = utc(2024, 1, 1, 12, 0, 0);
        let ms = duration_ms(
            Some(utc(2024, 1, 1, 9, 5, 0)),
            Some(utc(2024, 1, 1, 9, 15, 0)),
            now,
        );
        assert_eq!(ms, 10 * 60 * 1000);
    }

    #[test]
    fn test_duration_ms_missing_end_uses_now() {
        let now = utc(2024, 1, 1, 10, 0, 0);
        let ms = duration_ms(Some(utc(2024, 1, 1, 9, 0, 0)), None, now);
        assert_eq!(ms, 3_600_000);
    }

    #[test]
    fn test_duration_ms_missing_both_is_zero() {
        let now = utc(2024, 1, 1, 10, 0, 0);
        assert_eq!(duration_ms(None, None, now), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(61_000), "00:01:01");
        assert_eq!(format_duration(3_600_000 * 26 + 5_000), "1 days 02:00:05");
        assert_eq!(format_duration(-1_000), "-00:00:01");
    }

    #[test]
    fn test_parse_date_input_rfc3339() {
        let parsed = parse_date_input("2024-01-01T10:00:00+02:00", DisplayTimezone::Local);
        assert_eq!(parsed, Some(utc(2024, 1, 1, 8, 0, 0)));
    }

    #[test]
    fn test_parse_date_input_naive_in_utc() {
        let parsed = parse_date_input("2024-01-01T10:30", DisplayTimezone::Utc);
        assert_eq!(parsed, Some(utc(2024, 1, 1, 10, 30, 0)));

        let parsed = parse_date_input("2024-01-01 10:30:15", DisplayTimezone::Utc);
        assert_eq!(parsed, Some(utc(2024, 1, 1, 10, 30, 15)));
    }

    #[test]
    fn test_parse_date_input_bare_date() {
        let parsed = parse_date_input("2024-03-05", DisplayTimezone::Utc);
        assert_eq!(parsed, Some(utc(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn test_parse_date_input_rejects_garbage() {
        assert_eq!(parse_date_input("", DisplayTimezone::Utc), None);
        assert_eq!(parse_date_input("yesterday", DisplayTimezone::Utc), None);
    }

    #[test]
    fn test_param_formats() {
        let dt = utc(2024, 1, 1, 10, 0, 0);
        assert_eq!(to_utc_param(dt), "2024-01-01T10:00:00Z");
        assert_eq!(to_iso_millis(dt), "2024-01-01T10:00:00.000Z");
    }

    #[test]
    fn test_display_timezone_from_str() {
        assert_eq!("UTC".parse::<DisplayTimezone>(), Ok(DisplayTimezone::Utc));
        assert_eq!("local".parse::<DisplayTimezone>(), Ok(DisplayTimezone::Local));
        assert!("mars".parse::<DisplayTimezone>().is_err());
    }

    #[test]
    fn test_display_timezone_utc_format() {
        let dt = utc(2024, 1, 1, 8, 5, 9);
        assert_eq!(DisplayTimezone::Utc.format(dt, "%H:%M:%S"), "08:05:09");
    }
}
