use std::{fmt, str::FromStr};

use chrono::{Days, Local, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// one of the bundled alarm tones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ToneId {
    #[default]
    MorningBliss,
    BeepFest,
}

impl ToneId {
    pub const ALL: [Self; 2] = [Self::MorningBliss, Self::BeepFest];

    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::MorningBliss => 1,
            Self::BeepFest => 2,
        }
    }
}

impl TryFrom<u8> for ToneId {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::MorningBliss),
            2 => Ok(Self::BeepFest),
            other => Err(Error::UnknownTone(other)),
        }
    }
}

impl From<ToneId> for u8 {
    fn from(tone: ToneId) -> Self {
        tone.number()
    }
}

impl FromStr for ToneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<u8>()
            .map_err(|_| Error::InvalidTone(s.to_string()))?;
        Self::try_from(id)
    }
}

impl fmt::Display for ToneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Once,
    Daily,
    Weekdays,
    Weekends,
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekdays => "weekdays",
            Self::Weekends => "weekends",
        })
    }
}

/// what the user asked for, before it is turned into notifications
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRequest {
    pub time: NaiveDateTime,
    pub message: String,
    pub tone: ToneId,
    pub repeat: RepeatMode,
    pub vibrate: bool,
}

impl AlarmRequest {
    #[must_use]
    pub const fn new(
        time: NaiveDateTime,
        message: String,
        tone: ToneId,
        repeat: RepeatMode,
        vibrate: bool,
    ) -> Self {
        Self {
            time,
            message,
            tone,
            repeat,
            vibrate,
        }
    }

    /// request for `time` on today's date, like a time picker would produce
    #[must_use]
    pub fn today_at(
        time: NaiveTime,
        message: String,
        tone: ToneId,
        repeat: RepeatMode,
        vibrate: bool,
    ) -> Self {
        let today = Local::now().date_naive();
        Self::new(today.and_time(time), message, tone, repeat, vibrate)
    }

    /// the instant the alarm will actually ring, see [`next_occurrence`]
    #[must_use]
    pub fn target_time(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_occurrence(self.time, now)
    }
}

/// Truncates `requested` to the whole minute and, if that is not after `now`,
/// moves it to the same time on the next day.
#[must_use]
pub fn next_occurrence(requested: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
    let requested = requested
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(requested);
    if requested <= now {
        requested
            .checked_add_days(Days::new(1))
            .unwrap_or(requested)
    } else {
        requested
    }
}

/// parses `HH:MM` (24 hour clock)
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| Error::InvalidTime(input.to_string()))
}
