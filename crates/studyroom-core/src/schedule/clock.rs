//! Minute-precision wall-clock times in `HH:mm` form.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;
pub const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY as u32;

/// A time of day with minute precision, serialized as `"HH:mm"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidClockTime(format!(
                "{hour}:{minute:02}"
            )));
        }
        Ok(Self(u16::from(hour) * 60 + u16::from(minute)))
    }

    /// Build from minutes since midnight, wrapping at 24h.
    pub fn from_minutes(minutes: u16) -> Self {
        Self(minutes % MINUTES_PER_DAY)
    }

    /// Truncates seconds.
    pub fn from_naive(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.0
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour()), u32::from(self.minute()), 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidClockTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Parse a weekday from a name ("mon", "Monday") or a number (0=Sun ... 6=Sat).
pub fn parse_weekday(s: &str) -> Result<Weekday, ValidationError> {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<u8>() {
        return match n {
            0 => Ok(Weekday::Sun),
            1 => Ok(Weekday::Mon),
            2 => Ok(Weekday::Tue),
            3 => Ok(Weekday::Wed),
            4 => Ok(Weekday::Thu),
            5 => Ok(Weekday::Fri),
            6 => Ok(Weekday::Sat),
            _ => Err(ValidationError::InvalidWeekday(s.into())),
        };
    }
    trimmed
        .parse::<Weekday>()
        .map_err(|_| ValidationError::InvalidWeekday(s.into()))
}

/// Minutes from Monday 00:00 for a (day, time) pair.
pub fn week_minute(day: Weekday, time: ClockTime) -> u32 {
    day.num_days_from_monday() * u32::from(MINUTES_PER_DAY) + u32::from(time.minutes_since_midnight())
}
