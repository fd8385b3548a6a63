//! The long running side of `noti_alarm`: delivers due notifications, plays
//! the alarm and takes the user's answers from the terminal.

use std::{
    io::{self, BufRead},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        Arc,
    },
    thread,
};

use chrono::Local;

use crate::{
    audio::{RodioBackend, ToneLibrary},
    center::LocalNotificationCenter,
    communication::{Message, MessageType, StopChoice},
    config::Config,
    error::Result,
    notification::{NotificationEvent, NotificationId, NotificationService},
    permission::PermissionGate,
    player::AlarmPlayer,
    prompt::{cancel_index, format_choice, parse_choice, DesktopSettings, Prompt, TerminalPrompt},
};

/// everything the main loop waits on
#[derive(Debug)]
enum Event {
    Notification(NotificationEvent),
    Line(String),
    ConsoleClosed,
}

/// what the main loop does about an [`Event`]
#[derive(Debug, PartialEq)]
enum Action {
    /// hand over to the player, printing the notice first if there is one
    Play(Message, Option<String>),
    Show(String),
    Quit,
    Nothing,
}

/// The console side of the daemon. `awaiting` is the notification whose
/// stop prompt is on screen.
fn handle(
    event: Event,
    awaiting: &mut Option<NotificationId>,
    center: &LocalNotificationCenter,
) -> Action {
    match event {
        Event::Notification(NotificationEvent::Delivered(notification)) => {
            let content = notification.request.content;
            let notice = content
                .data
                .is_first
                .then(|| format!("{}: {} (press enter to respond)", content.title, content.body));
            Action::Play(
                Message::new(MessageType::Delivered(content), notification.id),
                notice,
            )
        }
        // the prompt went up when the response was made
        Event::Notification(NotificationEvent::Responded(notification)) => {
            log::trace!("response to {} seen", notification.id);
            Action::Nothing
        }
        Event::Line(line) => {
            if let Some(id) = awaiting.take() {
                let index = parse_choice(&line, &StopChoice::BUTTONS)
                    .unwrap_or_else(|| cancel_index(&StopChoice::BUTTONS));
                return Action::Play(
                    Message::new(MessageType::Responded(StopChoice::from_index(index)), id),
                    None,
                );
            }
            if line.trim().eq_ignore_ascii_case("quit") {
                return Action::Quit;
            }
            match center.respond_to_latest() {
                Some(notification) => {
                    *awaiting = Some(notification.id);
                    Action::Show(format_choice(
                        StopChoice::TITLE,
                        StopChoice::MESSAGE,
                        &StopChoice::BUTTONS,
                    ))
                }
                None => Action::Show("nothing has rung yet".to_string()),
            }
        }
        Event::ConsoleClosed => {
            log::warn!("stdin closed, alarms still ring and stop by themselves");
            Action::Nothing
        }
    }
}

fn spawn_console(events: Sender<Event>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if events.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = events.send(Event::ConsoleClosed);
    });
}

/// Runs until the user types `quit` or the process is stopped. Without a
/// console alarms still ring and stop after the auto stop delay.
pub fn run(config: &Config) -> Result<()> {
    let prompt = Arc::new(TerminalPrompt);
    let center = Arc::new(LocalNotificationCenter::from_config(
        config,
        Box::new(TerminalPrompt),
    )?);
    let settings = DesktopSettings::new(Config::store_path()?);
    if !PermissionGate::new(center.as_ref(), prompt.as_ref(), &settings).ensure_permission() {
        log::warn!("running without notification permission, alarms won't ring");
    }

    let tones = ToneLibrary::from_config(config);
    for (tone, path) in tones.missing() {
        log::warn!("no sound file for tone {tone} at {}", path.display());
        prompt.alert(
            "Missing tone",
            &format!(
                "{} does not exist, use `noti_alarm set-tone {}`",
                path.display(),
                tone.number()
            ),
        );
    }

    let (player_tx, player_rx) = mpsc::channel::<Message>();
    let player = {
        let notifications: Arc<dyn NotificationService> = center.clone();
        let prompt: Arc<dyn Prompt> = prompt.clone();
        let player_config = config.player.clone();
        thread::spawn(move || {
            // the output stream is opened on this thread and never leaves it
            AlarmPlayer::new(RodioBackend::new(), tones, notifications, prompt)
                .with_auto_stop(player_config.auto_stop())
                .with_volume(player_config.volume)
                .run(&player_rx);
        })
    };

    let running = Arc::new(AtomicBool::new(true));
    let ticker = {
        let center = center.clone();
        let running = running.clone();
        let interval = config.daemon.poll_interval();
        thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if let Err(e) = center.deliver_due(Local::now().naive_local()) {
                    log::error!("couldn't deliver notifications: {e}");
                }
                thread::sleep(interval);
            }
        })
    };

    let (events_tx, events_rx) = mpsc::channel();
    let (notification_tx, notification_rx) = mpsc::channel();
    let listener = center.add_listener(notification_tx);
    {
        let events = events_tx.clone();
        thread::spawn(move || {
            for event in notification_rx {
                if events.send(Event::Notification(event)).is_err() {
                    break;
                }
            }
        });
    }
    spawn_console(events_tx);

    println!("waiting for alarms, press enter when one rings, type quit to exit");
    let mut awaiting = None;
    for event in &events_rx {
        match handle(event, &mut awaiting, &center) {
            Action::Play(message, notice) => {
                if let Some(notice) = notice {
                    println!("{notice}");
                }
                if player_tx.send(message).is_err() {
                    log::error!("the player thread is gone");
                    break;
                }
            }
            Action::Show(text) => println!("{text}"),
            Action::Quit => break,
            Action::Nothing => {}
        }
    }

    log::info!("shutting down");
    center.remove_listener(listener);
    running.store(false, Ordering::Relaxed);
    let _ = player_tx.send(Message::shutdown());
    if player.join().is_err() {
        log::error!("the player thread panicked");
    }
    if ticker.join().is_err() {
        log::error!("the delivery thread panicked");
    }
    Ok(())
}
