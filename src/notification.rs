//! The notification model shared by the scheduler, the player and whatever
//! delivers notifications.

use std::{fmt, sync::mpsc::Sender};

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::{
    alarm::{RepeatMode, ToneId},
    error::Result,
};

pub type NotificationId = u64;
pub type ListenerId = u64;

/// Monday to Friday, see [`weekday_number`]
pub const WEEKDAYS: [u8; 5] = [2, 3, 4, 5, 6];
/// Sunday and Saturday, see [`weekday_number`]
pub const WEEKENDS: [u8; 2] = [1, 7];

/// Weekday numbering used by recurring triggers: 1 is Sunday, 7 is Saturday.
#[must_use]
pub fn weekday_number(day: Weekday) -> u8 {
    // num_days_from_sunday is 0..=6
    u8::try_from(day.num_days_from_sunday()).unwrap_or_default() + 1
}

/// when the store should deliver a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    At(#[serde(with = "toml_datetime_compat")] NaiveDateTime),
    Recurring(RecurringTrigger),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(f, "once at {}", at.format("%Y-%m-%d %H:%M:%S")),
            Self::Recurring(recurring) => {
                write!(
                    f,
                    "{:02}:{:02}:{:02}",
                    recurring.hour, recurring.minute, recurring.second
                )?;
                match recurring.weekdays.as_slice() {
                    [] => f.write_str(" every day"),
                    days => write!(f, " on days {days:?}"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTrigger {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub repeats: bool,
    /// every day when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekdays: Vec<u8>,
}

impl RecurringTrigger {
    #[must_use]
    pub fn matches_day(&self, day: Weekday) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&weekday_number(day))
    }
}

/// data the player needs when a notification arrives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub tone: ToneId,
    pub repeat: RepeatMode,
    /// only the first notification of a burst starts playback
    pub is_first: bool,
    #[serde(with = "toml_datetime_compat")]
    pub alarm_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: String,
    /// vibration pattern in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<Vec<u64>>,
    pub data: AlarmPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub content: NotificationContent,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: NotificationId,
    pub request: NotificationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Delivered(ScheduledNotification),
    /// the user interacted with a delivered notification
    Responded(ScheduledNotification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCapabilities {
    pub alert: bool,
    pub badge: bool,
    pub sound: bool,
    pub announcements: bool,
}

impl PermissionCapabilities {
    /// everything an alarm needs to be heard
    #[must_use]
    pub const fn alarm() -> Self {
        Self {
            alert: true,
            badge: true,
            sound: true,
            announcements: true,
        }
    }
}

/// The platform notification service.
///
/// Implementations are shared between the scheduler, the player thread and
/// the delivery loop, so every method takes `&self`.
pub trait NotificationService: Send + Sync {
    /// false when running somewhere that can't show notifications at all
    fn is_device(&self) -> bool;

    fn get_permissions(&self) -> Result<PermissionStatus>;

    fn request_permissions(&self, capabilities: &PermissionCapabilities)
        -> Result<PermissionStatus>;

    fn schedule_notification(&self, request: NotificationRequest) -> Result<NotificationId>;

    /// cancels every notification of this app that hasn't been delivered
    fn cancel_all_scheduled(&self) -> Result<()>;

    fn scheduled(&self) -> Result<Vec<ScheduledNotification>>;

    /// `sender` gets every delivered and responded event until removed
    fn add_listener(&self, sender: Sender<NotificationEvent>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sunday_is_one() {
        assert_eq!(weekday_number(Weekday::Sun), 1);
        assert_eq!(weekday_number(Weekday::Mon), 2);
        assert_eq!(weekday_number(Weekday::Sat), 7);
    }

    #[test]
    fn weekday_filters() {
        let weekdays = RecurringTrigger {
            hour: 7,
            minute: 0,
            second: 0,
            repeats: true,
            weekdays: WEEKDAYS.to_vec(),
        };
        assert!(weekdays.matches_day(Weekday::Mon));
        assert!(weekdays.matches_day(Weekday::Fri));
        assert!(!weekdays.matches_day(Weekday::Sat));
        assert!(!weekdays.matches_day(Weekday::Sun));

        let weekends = RecurringTrigger {
            weekdays: WEEKENDS.to_vec(),
            ..weekdays.clone()
        };
        assert!(weekends.matches_day(Weekday::Sun));
        assert!(!weekends.matches_day(Weekday::Wed));

        let daily = RecurringTrigger {
            weekdays: Vec::new(),
            ..weekdays
        };
        assert!(daily.matches_day(Weekday::Tue));
        assert!(daily.matches_day(Weekday::Sat));
        assert_eq!(Trigger::Recurring(daily).to_string(), "07:00:00 every day");
        assert_eq!(
            Trigger::Recurring(weekends).to_string(),
            "07:00:00 on days [1, 7]"
        );
    }
}
