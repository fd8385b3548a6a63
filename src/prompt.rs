//! User facing surfaces: alerts, choices, the permission dialog and the
//! system settings link.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::Command,
};

use crate::{error::Result, notification::PermissionCapabilities};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Default,
    Cancel,
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertButton {
    pub label: &'static str,
    pub style: ButtonStyle,
}

impl AlertButton {
    #[must_use]
    pub const fn new(label: &'static str, style: ButtonStyle) -> Self {
        Self { label, style }
    }
}

/// modal alerts shown to the user
pub trait Prompt: Send + Sync {
    fn alert(&self, title: &str, message: &str);

    /// Blocks until the user picks one of `buttons` and returns its index.
    /// Dismissing the prompt picks the cancel button.
    fn choose(&self, title: &str, message: &str, buttons: &[AlertButton]) -> usize;

    fn success(&self, message: &str);
}

/// the platform's own "allow notifications?" dialog
pub trait PermissionDialog: Send + Sync {
    /// `None` if nobody was there to answer
    fn request(&self, capabilities: &PermissionCapabilities) -> Option<bool>;
}

pub trait SystemSettings: Send + Sync {
    fn open_system_settings(&self) -> Result<()>;
}

/// index of the cancel button, or the first one
#[must_use]
pub fn cancel_index(buttons: &[AlertButton]) -> usize {
    buttons
        .iter()
        .position(|button| button.style == ButtonStyle::Cancel)
        .unwrap_or(0)
}

/// Matches a typed answer against `buttons`, either by 1-based number or by
/// label (case insensitive).
#[must_use]
pub fn parse_choice(answer: &str, buttons: &[AlertButton]) -> Option<usize> {
    let answer = answer.trim();
    if let Ok(number) = answer.parse::<usize>() {
        return (1..=buttons.len()).contains(&number).then(|| number - 1);
    }
    buttons
        .iter()
        .position(|button| button.label.eq_ignore_ascii_case(answer))
}

/// renders the choice so it can be answered with [`parse_choice`]
#[must_use]
pub fn format_choice(title: &str, message: &str, buttons: &[AlertButton]) -> String {
    let options = buttons
        .iter()
        .enumerate()
        .map(|(i, button)| format!("[{}] {}", i + 1, button.label))
        .collect::<Vec<_>>()
        .join("  ");
    format!("{title}: {message}\n{options}")
}

/// Prompts on stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line() -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn alert(&self, title: &str, message: &str) {
        eprintln!("{title}: {message}");
    }

    fn choose(&self, title: &str, message: &str, buttons: &[AlertButton]) -> usize {
        println!("{}", format_choice(title, message, buttons));
        let _ = io::stdout().flush();
        Self::read_line()
            .and_then(|line| parse_choice(&line, buttons))
            .unwrap_or_else(|| cancel_index(buttons))
    }

    fn success(&self, message: &str) {
        println!("{message}");
    }
}

const PERMISSION_BUTTONS: [AlertButton; 2] = [
    AlertButton::new("Don't Allow", ButtonStyle::Cancel),
    AlertButton::new("Allow", ButtonStyle::Default),
];

/// An answer that can't be read leaves the question open, anything that
/// isn't "Allow" declines.
fn permission_answer(line: Option<&str>) -> Option<bool> {
    line.map(|line| parse_choice(line, &PERMISSION_BUTTONS) == Some(1))
}

impl PermissionDialog for TerminalPrompt {
    fn request(&self, capabilities: &PermissionCapabilities) -> Option<bool> {
        let mut wanted = vec!["alerts"];
        if capabilities.sound {
            wanted.push("sounds");
        }
        if capabilities.badge {
            wanted.push("badges");
        }
        if capabilities.announcements {
            wanted.push("announcements");
        }
        let message = format!("noti_alarm would like to send you {}", wanted.join(", "));
        println!(
            "{}",
            format_choice("Notifications", &message, &PERMISSION_BUTTONS)
        );
        let _ = io::stdout().flush();
        permission_answer(Self::read_line().as_deref())
    }
}

/// Opens the notification store with the desktop's default handler, that is
/// where the permission of this app lives.
#[derive(Debug, Clone)]
pub struct DesktopSettings {
    path: PathBuf,
}

impl DesktopSettings {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn opener() -> Command {
        if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        } else {
            Command::new("xdg-open")
        }
    }
}

impl SystemSettings for DesktopSettings {
    fn open_system_settings(&self) -> Result<()> {
        log::info!("opening settings at {}", self.path.display());
        println!(
            "change notification permissions with `noti_alarm permissions grant` or edit {}",
            self.path.display()
        );
        Self::opener().arg(&self.path).spawn()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUTTONS: [AlertButton; 2] = [
        AlertButton::new("Keep Running", ButtonStyle::Cancel),
        AlertButton::new("Stop Alarm", ButtonStyle::Destructive),
    ];

    #[test]
    fn choice_by_number_or_label() {
        assert_eq!(parse_choice("2\n", &BUTTONS), Some(1));
        assert_eq!(parse_choice(" stop alarm ", &BUTTONS), Some(1));
        assert_eq!(parse_choice("Keep Running", &BUTTONS), Some(0));
        assert_eq!(parse_choice("3", &BUTTONS), None);
        assert_eq!(parse_choice("0", &BUTTONS), None);
        assert_eq!(parse_choice("snooze", &BUTTONS), None);
    }

    #[test]
    fn dismissing_picks_cancel() {
        let buttons = [
            AlertButton::new("Settings", ButtonStyle::Default),
            AlertButton::new("Cancel", ButtonStyle::Cancel),
        ];
        assert_eq!(cancel_index(&buttons), 1);
        assert_eq!(cancel_index(&[]), 0);
    }

    #[test]
    fn unanswered_permission_stays_open() {
        assert_eq!(permission_answer(None), None);
        assert_eq!(permission_answer(Some("2\n")), Some(true));
        assert_eq!(permission_answer(Some("allow")), Some(true));
        assert_eq!(permission_answer(Some("1")), Some(false));
        assert_eq!(permission_answer(Some("")), Some(false));
    }

    #[test]
    fn formats_numbered_options() {
        assert_eq!(
            format_choice("Stop Alarm", "Stop?", &BUTTONS),
            "Stop Alarm: Stop?\n[1] Keep Running  [2] Stop Alarm"
        );
    }
}
