use crate::{
    notification::{NotificationContent, NotificationId},
    prompt::{AlertButton, ButtonStyle},
};

/// What the player thread is told.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageType,
    pub notification_id: NotificationId,
}

impl Message {
    #[must_use]
    pub const fn new(kind: MessageType, notification_id: NotificationId) -> Self {
        Self {
            kind,
            notification_id,
        }
    }

    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(MessageType::Shutdown, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageType {
    Delivered(NotificationContent),
    /// the user answered the stop prompt of a delivered notification
    Responded(StopChoice),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopChoice {
    KeepRunning,
    StopAlarm,
}

impl StopChoice {
    pub const TITLE: &'static str = "Stop Alarm";
    pub const MESSAGE: &'static str = "Do you want to stop the alarm notifications?";
    pub const BUTTONS: [AlertButton; 2] = [
        AlertButton::new("Keep Running", ButtonStyle::Cancel),
        AlertButton::new("Stop Alarm", ButtonStyle::Destructive),
    ];

    /// maps a button index of [`Self::BUTTONS`]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        if index == 1 {
            Self::StopAlarm
        } else {
            Self::KeepRunning
        }
    }
}
