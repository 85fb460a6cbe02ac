//! Filter state for the task-instance timeline.
//!
//! The filters (`base_date`, `num_runs`, `time_range`) live in a
//! [`QueryParams`] object owned by [`FilterState`]. Every consumer derives
//! [`Filters`] from the same parameters; converting to and from a URL query
//! string is done at the boundary by [`QueryParams::from_query_string`] and
//! [`QueryParams::to_query_string`].

use std::time::Instant;

use chrono::{DateTime, Duration, DurationRound, Months, Utc};
use tracing::{debug, warn};

use crate::datetime::{DisplayTimezone, parse_date_input, to_iso_millis, to_utc_param};

/// Query parameter holding the end of the time window.
pub const BASE_DATE_PARAM: &str = "base_date";
/// Query parameter holding the maximum number of runs.
pub const NUM_RUNS_PARAM: &str = "num_runs";
/// Query parameter holding the window length, e.g. `4h`.
pub const TIME_RANGE_PARAM: &str = "time_range";

/// Number of runs requested when the parameter is absent.
pub const DEFAULT_NUM_RUNS: u32 = 200;
/// Window length used when the parameter is absent.
pub const DEFAULT_TIME_RANGE: &str = "4h";

/// Choices offered by the filter bar for the run count.
pub const NUM_RUNS_OPTIONS: [u32; 5] = [25, 100, 200, 500, 1000];
/// Choices offered by the filter bar for the window length.
pub const TIME_RANGE_OPTIONS: [&str; 8] = ["1h", "2h", "3h", "4h", "8h", "12h", "24h", "2d"];

/// Ordered query parameters, with URLSearchParams-like semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string (a leading `?` is allowed).
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// Serialize to a form-urlencoded query string (no leading `?`).
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value for `key` with a single value, keeping its position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.pairs[index].1 = value;
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k == key {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Remove every value for `key`.
    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// Check if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Unit letter of a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    /// Map a unit letter (`s m h d w M y`) to a unit.
    fn from_letter(c: char) -> Option<Self> {
        match c {
            's' => Some(TimeUnit::Seconds),
            'm' => Some(TimeUnit::Minutes),
            'h' => Some(TimeUnit::Hours),
            'd' => Some(TimeUnit::Days),
            'w' => Some(TimeUnit::Weeks),
            'M' => Some(TimeUnit::Months),
            'y' => Some(TimeUnit::Years),
            _ => None,
        }
    }
}

/// A parsed window length such as `2h` or `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub amount: u32,
    pub unit: TimeUnit,
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange {
            amount: 4,
            unit: TimeUnit::Hours,
        }
    }
}

impl TimeRange {
    /// Instant `self` before `end`. Saturates at `end` on calendar overflow.
    pub fn subtract_from(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        let amount = i64::from(self.amount);
        let result = match self.unit {
            TimeUnit::Seconds => end.checked_sub_signed(Duration::seconds(amount)),
            TimeUnit::Minutes => end.checked_sub_signed(Duration::minutes(amount)),
            TimeUnit::Hours => end.checked_sub_signed(Duration::hours(amount)),
            TimeUnit::Days => end.checked_sub_signed(Duration::days(amount)),
            TimeUnit::Weeks => end.checked_sub_signed(Duration::weeks(amount)),
            TimeUnit::Months => end.checked_sub_months(Months::new(self.amount)),
            TimeUnit::Years => end.checked_sub_months(Months::new(self.amount.saturating_mul(12))),
        };
        result.unwrap_or(end)
    }
}

/// Parse `<digits><unit letter>` found anywhere in `value`.
///
/// Anything else yields the 4 hour default.
pub fn parse_time_range(value: &str) -> TimeRange {
    let chars: Vec<char> = value.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let digits: String = chars[start..i].iter().collect();
        if let (Some(unit), Ok(amount)) = (
            chars.get(i).copied().and_then(TimeUnit::from_letter),
            digits.parse::<u32>(),
        ) {
            return TimeRange { amount, unit };
        }
    }
    TimeRange::default()
}

/// Parse the leading integer of `value`, like `parseInt(value, 10)`.
fn parse_leading_u32(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Now rounded up past the next quarter hour: `minutes = (ceil(m/15) + 1) * 15`.
pub fn now_rounded_to_next_15min(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour_start = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    let minutes = now.signed_duration_since(hour_start).num_minutes();
    let quarters = (minutes + 14) / 15 + 1;
    hour_start + Duration::minutes(quarters * 15)
}

/// The effective filters derived from query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub num_runs: u32,
    pub time_range: String,
}

impl Filters {
    /// The filter subset that keys a task-instance fetch.
    pub fn fetch_filters(&self) -> FetchFilters {
        FetchFilters {
            start_date: self.start_date,
            end_date: self.end_date,
            num_runs: self.num_runs,
        }
    }
}

/// Filters sent to the task-instance endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFilters {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub num_runs: u32,
}

impl FetchFilters {
    /// Serialize as `startDate=...&endDate=...&numRuns=...`.
    ///
    /// Dates use ISO 8601 with milliseconds; this string is the cache key.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("startDate", &to_iso_millis(self.start_date))
            .append_pair("endDate", &to_iso_millis(self.end_date))
            .append_pair("numRuns", &self.num_runs.to_string())
            .finish()
    }
}

/// Filter state backed by query parameters.
#[derive(Debug, Clone)]
pub struct FilterState {
    params: QueryParams,
    default_base_date: DateTime<Utc>,
    timezone: DisplayTimezone,
}

impl FilterState {
    /// Create filter state from parameters; `now` seeds the default base date.
    pub fn new(params: QueryParams, now: DateTime<Utc>, timezone: DisplayTimezone) -> Self {
        Self {
            params,
            default_base_date: now_rounded_to_next_15min(now),
            timezone,
        }
    }

    /// Create filter state from a URL query string.
    pub fn from_query_string(query: &str, now: DateTime<Utc>, timezone: DisplayTimezone) -> Self {
        Self::new(QueryParams::from_query_string(query), now, timezone)
    }

    /// The underlying parameters.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Current parameters as a query string.
    pub fn to_query_string(&self) -> String {
        self.params.to_query_string()
    }

    /// The timezone used for naive date input.
    pub fn timezone(&self) -> DisplayTimezone {
        self.timezone
    }

    /// Derive the effective filters from the current parameters.
    pub fn filters(&self) -> Filters {
        let end_date = match self.params.get(BASE_DATE_PARAM) {
            Some(raw) => parse_date_input(raw, self.timezone).unwrap_or_else(|| {
                warn!(base_date = raw, "Unparseable base date, using default");
                self.default_base_date
            }),
            None => self.default_base_date,
        };

        let num_runs = self
            .params
            .get(NUM_RUNS_PARAM)
            .and_then(parse_leading_u32)
            .unwrap_or(DEFAULT_NUM_RUNS);

        let time_range = self
            .params
            .get(TIME_RANGE_PARAM)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_TIME_RANGE)
            .to_string();

        let start_date = parse_time_range(&time_range).subtract_from(end_date);

        Filters {
            start_date,
            end_date,
            num_runs,
            time_range,
        }
    }

    /// Set or clear a parameter; empty values delete it.
    fn write_param(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            debug!(param = name, "Clearing filter parameter");
            self.params.delete(name);
        } else {
            debug!(param = name, value, "Setting filter parameter");
            self.params.set(name, value);
        }
    }

    /// Change the base (end) date. Naive input is read in the viewer's timezone
    /// and stored as UTC.
    pub fn on_base_date_change(&mut self, value: &str) {
        if value.trim().is_empty() {
            self.write_param(BASE_DATE_PARAM, "");
            return;
        }
        match parse_date_input(value, self.timezone) {
            Some(dt) => self.write_param(BASE_DATE_PARAM, &to_utc_param(dt)),
            None => warn!(value, "Ignoring unparseable base date"),
        }
    }

    /// Change the maximum number of runs.
    pub fn on_num_runs_change(&mut self, value: &str) {
        self.write_param(NUM_RUNS_PARAM, value.trim());
    }

    /// Change the window length.
    pub fn on_time_range_change(&mut self, value: &str) {
        self.write_param(TIME_RANGE_PARAM, value.trim());
    }

    /// Move the end date by `delta`.
    pub fn shift_base_date(&mut self, delta: Duration) {
        let end = self.filters().end_date;
        let shifted = end.checked_add_signed(delta).unwrap_or(end);
        self.write_param(BASE_DATE_PARAM, &to_utc_param(shifted));
    }

    /// Set the end date to the next quarter hour after `now`.
    pub fn reset_base_date(&mut self, now: DateTime<Utc>) {
        self.write_param(
            BASE_DATE_PARAM,
            &to_utc_param(now_rounded_to_next_15min(now)),
        );
    }

    /// Step through [`NUM_RUNS_OPTIONS`].
    pub fn cycle_num_runs(&mut self, forward: bool) {
        let current = self.filters().num_runs;
        let next = cycle_option(&NUM_RUNS_OPTIONS, |o| *o == current, forward);
        self.on_num_runs_change(&next.to_string());
    }

    /// Step through [`TIME_RANGE_OPTIONS`].
    pub fn cycle_time_range(&mut self, forward: bool) {
        let current = self.filters().time_range;
        let next = cycle_option(&TIME_RANGE_OPTIONS, |o| *o == current, forward);
        self.on_time_range_change(next);
    }
}

/// How long filter edits settle before they drive a fetch.
pub const DEBOUNCE_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

/// A value that follows its input only after the input stops changing.
///
/// Updates equal to the settled value cancel any pending change; a new
/// distinct value restarts the delay.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    value: T,
    pending: Option<(T, Instant)>,
    delay: std::time::Duration,
}

impl<T: Clone + PartialEq> Debounced<T> {
    pub fn new(value: T, delay: std::time::Duration) -> Self {
        Self {
            value,
            pending: None,
            delay,
        }
    }

    /// The settled value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether an input is waiting out the delay.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed the latest input.
    pub fn update(&mut self, next: T, now: Instant) {
        if next == self.value {
            self.pending = None;
            return;
        }
        if self.pending.as_ref().is_some_and(|(p, _)| *p == next) {
            return;
        }
        self.pending = Some((next, now + self.delay));
    }

    /// Settle the pending input if its delay passed. Returns true when the value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending.take() {
            Some((next, due)) if now >= due => {
                self.value = next;
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }
}

/// Next (or previous) option, wrapping; unknown current values start at the ends.
fn cycle_option<T: Copy>(options: &[T], is_current: impl Fn(&T) -> bool, forward: bool) -> T {
    let len = options.len();
    let index = match options.iter().position(is_current) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None if forward => 0,
        None => len - 1,
    };
    options[index]
}
