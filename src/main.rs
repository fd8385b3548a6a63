use std::{error::Error, fs, path::PathBuf, thread};

use clap::{command, Parser, Subcommand, ValueEnum};
use noti_alarm::{
    alarm::{parse_time_of_day, AlarmRequest, RepeatMode, ToneId},
    audio::{RodioBackend, ToneLibrary, TonePreview},
    center::LocalNotificationCenter,
    config::{Config, Tone},
    daemon,
    notification::{NotificationService, PermissionStatus},
    permission::PermissionGate,
    prompt::{DesktopSettings, Prompt, TerminalPrompt},
    scheduler::AlarmScheduler,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config and create the sounds folder
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// copy a sound file in as one of the alarm tones
    SetTone { tone: ToneId, path: PathBuf },
    /// set the alarm, replacing any alarm already set
    Schedule {
        /// time of day as HH:MM
        time: String,
        #[clap(long, short)]
        message: Option<String>,
        #[clap(long, short)]
        tone: Option<ToneId>,
        #[clap(long, short, value_enum)]
        repeat: Option<RepeatMode>,
        #[clap(long)]
        no_vibrate: bool,
    },
    /// play a few seconds of a tone
    Preview { tone: ToneId },
    /// cancel every scheduled notification
    Cancel,
    /// show the scheduled notifications
    List,
    /// change the notification permission
    Permissions {
        #[clap(value_enum)]
        action: PermissionAction,
    },
    /// deliver notifications and ring alarms (the default)
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum PermissionAction {
    Grant,
    Deny,
    Reset,
}

impl From<PermissionAction> for PermissionStatus {
    fn from(action: PermissionAction) -> Self {
        match action {
            PermissionAction::Grant => Self::Granted,
            PermissionAction::Deny => Self::Denied,
            PermissionAction::Reset => Self::Undetermined,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("noti_alarm").expect("couldn't initialize logger");

    let args = Args::parse();
    let config = Config::load_or_default()?;
    match args.command {
        Some(Command::Init { force }) => {
            if force || !Config::is_config_present() {
                Config::new().save(Config::config_path()?)?;
                fs::create_dir_all(Config::sounds_path()?)?;
                println!("wrote {}", Config::config_path()?.display());
            }
            for (tone, path) in ToneLibrary::from_config(&config).missing() {
                println!("tone {tone} needs a sound file at {}", path.display());
            }
        }
        Some(Command::SetTone { tone, path }) => {
            let destination = match config.tone(tone) {
                Some(tone) => tone.path.clone(),
                None => Config::sounds_path()?.join(Tone::file_name(tone)),
            };
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&path, &destination)?;
            log::info!("{} copied to {}", path.display(), destination.display());
        }
        Some(Command::Schedule {
            time,
            message,
            tone,
            repeat,
            no_vibrate,
        }) => {
            let request = AlarmRequest::today_at(
                parse_time_of_day(&time)?,
                message.unwrap_or_else(|| config.default_message.clone()),
                tone.unwrap_or(config.default_tone),
                repeat.unwrap_or(config.default_repeat),
                !no_vibrate,
            );
            let center = LocalNotificationCenter::from_config(&config, Box::new(TerminalPrompt))?;
            let prompt = TerminalPrompt;
            let settings = DesktopSettings::new(Config::store_path()?);
            let gate = PermissionGate::new(&center, &prompt, &settings);
            // nobody was asked yet, do what the app would have done on start
            if center.get_permissions()? == PermissionStatus::Undetermined {
                gate.ensure_permission();
            }
            let outcome = AlarmScheduler::new(&center, gate, &prompt, config.scheduler.clone())
                .schedule_alarm(&request)?;
            log::info!("scheduled {} notifications", outcome.scheduled.len());
        }
        Some(Command::Preview { tone }) => {
            let mut preview = TonePreview::new(
                RodioBackend::new(),
                ToneLibrary::from_config(&config),
                config.preview_length(),
            );
            match preview.play_tone(tone) {
                Ok(()) => thread::sleep(preview.length()),
                Err(e) => {
                    log::error!("couldn't preview tone {tone}: {e}");
                    TerminalPrompt.alert("Error", "Could not play the selected tone");
                }
            }
        }
        Some(Command::Cancel) => {
            LocalNotificationCenter::from_config(&config, Box::new(TerminalPrompt))?
                .cancel_all_scheduled()?;
            println!("alarm cancelled");
        }
        Some(Command::List) => {
            let center = LocalNotificationCenter::from_config(&config, Box::new(TerminalPrompt))?;
            let scheduled = center.scheduled()?;
            if scheduled.is_empty() {
                println!("no alarm set");
            }
            for notification in scheduled {
                let data = &notification.request.content.data;
                println!(
                    "{:>4} {} tone {}{}",
                    notification.id,
                    notification.request.trigger,
                    data.tone,
                    if data.is_first { " (rings)" } else { "" }
                );
            }
        }
        Some(Command::Permissions { action }) => {
            LocalNotificationCenter::from_config(&config, Box::new(TerminalPrompt))?
                .set_permission(action.into())?;
        }
        Some(Command::Run) | None => daemon::run(&config)?,
    }
    Ok(())
}
