//! Calendar-day keys and the clock that produces them.
//!
//! A [`DateKey`] scopes "today" queries and token sequences. It is a calendar
//! date, never a timestamp, and is derived from UTC so every front-desk client
//! agrees on where one day ends.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar-day identifier (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Day key of a UTC instant.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar day.
    pub fn succ(&self) -> Self {
        Self(self.0 + Duration::days(1))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, Self::FORMAT).map(Self)
    }
}

impl TryFrom<String> for DateKey {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> DateKey {
        DateKey::from_instant(self.now())
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at midday UTC on the given date.
    pub fn at_date(date: NaiveDate) -> Self {
        let start = date
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_key_format() {
        let key = DateKey::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(key.to_string(), "2024-03-07");
        assert_eq!("2024-03-07".parse::<DateKey>().unwrap(), key);
    }

    #[test]
    fn test_date_key_rejects_timestamps() {
        assert!("2024-03-07T10:00:00Z".parse::<DateKey>().is_err());
        assert!("not a date".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_date_key_uses_utc_day() {
        let late = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 59).unwrap();
        assert_eq!(DateKey::from_instant(late).to_string(), "2024-03-07");

        let early = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        assert_eq!(DateKey::from_instant(early).to_string(), "2024-03-08");
    }

    #[test]
    fn test_manual_clock_crosses_midnight() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 7, 23, 30, 0).unwrap());
        let before = clock.today();

        clock.advance(Duration::hours(1));

        assert_eq!(clock.today(), before.succ());
    }

    #[test]
    fn test_date_key_serde() {
        let key = DateKey::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"2024-12-31\"");

        let back: DateKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
