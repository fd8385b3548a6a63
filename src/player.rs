//! Alarm playback.
//!
//! [`AlarmPlayer`] is a two state machine (idle / playing) owned by a single
//! thread and fed through a channel of [`Message`]s. It owns the one
//! [`PlaybackSession`] that may exist at a time.

use std::{
    sync::{
        mpsc::{Receiver, RecvTimeoutError},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{
    audio::{AudioBackend, PlaybackOptions, ToneLibrary},
    communication::{Message, MessageType, StopChoice},
    error::Result,
    notification::{NotificationContent, NotificationService},
    prompt::Prompt,
};

/// longest an alarm rings by itself
pub const MAX_AUTO_STOP: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
}

/// A loaded alarm sound together with the instant it stops on its own.
#[derive(Debug)]
pub struct PlaybackSession<H> {
    sound: H,
    stop_at: Instant,
}

impl<H> PlaybackSession<H> {
    #[must_use]
    pub const fn stop_at(&self) -> Instant {
        self.stop_at
    }
}

pub struct AlarmPlayer<A: AudioBackend> {
    audio: A,
    tones: ToneLibrary,
    notifications: Arc<dyn NotificationService>,
    prompt: Arc<dyn Prompt>,
    auto_stop: Duration,
    volume: f32,
    session: Option<PlaybackSession<A::Handle>>,
}

impl<A: AudioBackend> AlarmPlayer<A> {
    pub fn new(
        audio: A,
        tones: ToneLibrary,
        notifications: Arc<dyn NotificationService>,
        prompt: Arc<dyn Prompt>,
    ) -> Self {
        Self {
            audio,
            tones,
            notifications,
            prompt,
            auto_stop: Duration::from_secs(60),
            volume: 1.0,
            session: None,
        }
    }

    #[must_use]
    pub fn with_auto_stop(mut self, auto_stop: Duration) -> Self {
        self.auto_stop = auto_stop.min(MAX_AUTO_STOP);
        self
    }

    #[must_use]
    pub const fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    #[must_use]
    pub const fn state(&self) -> PlayerState {
        if self.session.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }

    /// when the current session stops by itself
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().map(PlaybackSession::stop_at)
    }

    pub const fn audio(&self) -> &A {
        &self.audio
    }

    /// Starts playback for the first notification of a burst. The rest of
    /// the burst only exists so that something gets through and is ignored.
    pub fn on_delivered(&mut self, content: &NotificationContent, now: Instant) -> Result<()> {
        if !content.data.is_first {
            log::trace!("ignoring follow-up notification");
            return Ok(());
        }
        self.release();
        let asset = self.tones.asset(content.data.tone)?;
        let sound = self
            .audio
            .load_sound(asset, &PlaybackOptions::alarm(self.volume))?;
        self.session = Some(PlaybackSession {
            sound,
            stop_at: now.checked_add(self.auto_stop).unwrap_or(now),
        });
        log::info!(
            "alarm for {} ringing with tone {}",
            content.data.alarm_time,
            content.data.tone
        );
        Ok(())
    }

    pub fn on_response(&mut self, choice: StopChoice) {
        match choice {
            StopChoice::KeepRunning => log::debug!("user kept the alarm running"),
            StopChoice::StopAlarm => {
                log::info!("user stopped the alarm");
                self.stop();
            }
        }
    }

    /// Stops the session if its time is up. Returns true if it did.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(stop_at) if stop_at <= now => {
                log::info!("alarm stopped after {:?}", self.auto_stop);
                self.stop();
                true
            }
            _ => false,
        }
    }

    /// Releases the session and cancels whatever is still scheduled.
    /// Returns whether something was playing.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.release();
        if let Err(e) = self.notifications.cancel_all_scheduled() {
            log::error!("couldn't cancel scheduled notifications: {e}");
        }
        was_playing
    }

    /// teardown, the schedule stays as it is
    pub fn shutdown(&mut self) {
        if self.release() {
            log::info!("alarm sound released on shutdown");
        }
    }

    fn release(&mut self) -> bool {
        self.session.take().map_or(false, |session| {
            self.audio.unload(session.sound);
            true
        })
    }

    /// Handles one message. Playback errors end here, they are logged and
    /// shown but never reach the sender. Returns false on shutdown.
    pub fn dispatch(&mut self, message: Message, now: Instant) -> bool {
        match message.kind {
            MessageType::Delivered(content) => {
                if let Err(e) = self.on_delivered(&content, now) {
                    log::error!(
                        "couldn't play alarm for notification {}: {e}",
                        message.notification_id
                    );
                    self.prompt.alert("Error", "Could not play the alarm tone");
                }
            }
            MessageType::Responded(choice) => self.on_response(choice),
            MessageType::Shutdown => return false,
        }
        true
    }

    /// Runs until a shutdown message arrives or every sender is gone.
    pub fn run(mut self, receiver: &Receiver<Message>) {
        loop {
            self.on_tick(Instant::now());
            let message = match self.next_deadline() {
                Some(stop_at) => {
                    receiver.recv_timeout(stop_at.saturating_duration_since(Instant::now()))
                }
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match message {
                Ok(message) => {
                    if !self.dispatch(message, Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc::{self, Sender},
            Mutex,
        },
    };

    use chrono::NaiveDate;

    use super::*;
    use crate::{
        alarm::{RepeatMode, ToneId},
        config::Tone,
        error::Error,
        notification::{
            AlarmPayload, ListenerId, NotificationEvent, NotificationId, NotificationRequest,
            PermissionCapabilities, PermissionStatus, ScheduledNotification,
        },
        prompt::AlertButton,
    };

    #[derive(Default)]
    struct Counting {
        loads: usize,
        unloads: usize,
        live: Vec<usize>,
    }

    impl AudioBackend for Counting {
        type Handle = usize;

        fn load_sound(&mut self, asset: &Path, _: &PlaybackOptions) -> Result<usize> {
            if !asset.exists() && asset.to_string_lossy().contains("missing") {
                return Err(Error::PlaybackFailure("missing".to_string()));
            }
            self.loads += 1;
            self.live.push(self.loads);
            Ok(self.loads)
        }

        fn unload(&mut self, handle: usize) {
            self.unloads += 1;
            self.live.retain(|h| *h != handle);
        }
    }

    #[derive(Default)]
    struct Cancels(AtomicUsize);

    impl NotificationService for Cancels {
        fn is_device(&self) -> bool {
            true
        }
        fn get_permissions(&self) -> Result<PermissionStatus> {
            Ok(PermissionStatus::Granted)
        }
        fn request_permissions(&self, _: &PermissionCapabilities) -> Result<PermissionStatus> {
            Ok(PermissionStatus::Granted)
        }
        fn schedule_notification(&self, _: NotificationRequest) -> Result<NotificationId> {
            Ok(1)
        }
        fn cancel_all_scheduled(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn scheduled(&self) -> Result<Vec<ScheduledNotification>> {
            Ok(Vec::new())
        }
        fn add_listener(&self, _: Sender<NotificationEvent>) -> ListenerId {
            1
        }
        fn remove_listener(&self, _: ListenerId) {}
    }

    #[derive(Default)]
    struct Alerts(Mutex<Vec<String>>);

    impl Prompt for Alerts {
        fn alert(&self, _: &str, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
        fn choose(&self, _: &str, _: &str, _: &[AlertButton]) -> usize {
            0
        }
        fn success(&self, _: &str) {}
    }

    struct Fixture {
        player: AlarmPlayer<Counting>,
        cancels: Arc<Cancels>,
        alerts: Arc<Alerts>,
    }

    fn fixture() -> Fixture {
        let cancels = Arc::new(Cancels::default());
        let alerts = Arc::new(Alerts::default());
        let tones = ToneLibrary::new(vec![
            Tone::new(ToneId::MorningBliss, "a".to_string(), "a.mp3".into()),
            Tone::new(ToneId::BeepFest, "b".to_string(), "missing.mp3".into()),
        ]);
        let player = AlarmPlayer::new(Counting::default(), tones, cancels.clone(), alerts.clone());
        Fixture {
            player,
            cancels,
            alerts,
        }
    }

    fn content(is_first: bool, tone: ToneId) -> NotificationContent {
        NotificationContent {
            title: "Alarm".to_string(),
            body: "Wake up".to_string(),
            sound: "default".to_string(),
            vibrate: None,
            data: AlarmPayload {
                tone,
                repeat: RepeatMode::Once,
                is_first,
                alarm_time: NaiveDate::from_ymd_opt(2026, 10, 20)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            },
        }
    }

    fn cancels(fixture: &Fixture) -> usize {
        fixture.cancels.0.load(Ordering::SeqCst)
    }

    #[test]
    fn first_delivery_starts_playing() {
        let mut f = fixture();
        let now = Instant::now();
        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        assert_eq!(f.player.state(), PlayerState::Playing);
        assert_eq!(f.player.next_deadline(), Some(now + Duration::from_secs(60)));
        assert_eq!(f.player.audio().live.len(), 1);
    }

    #[test]
    fn follow_up_deliveries_change_nothing() {
        let mut f = fixture();
        let now = Instant::now();
        f.player
            .on_delivered(&content(false, ToneId::MorningBliss), now)
            .unwrap();
        assert_eq!(f.player.state(), PlayerState::Idle);

        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        let later = now + Duration::from_secs(30);
        f.player
            .on_delivered(&content(false, ToneId::MorningBliss), later)
            .unwrap();
        // not restarted, not extended
        assert_eq!(f.player.audio().loads, 1);
        assert_eq!(f.player.next_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn restarting_keeps_one_sound() {
        let mut f = fixture();
        let now = Instant::now();
        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now + Duration::from_secs(5))
            .unwrap();
        assert_eq!(f.player.audio().live, vec![2]);
        assert_eq!(f.player.audio().unloads, 1);
        assert_eq!(
            f.player.next_deadline(),
            Some(now + Duration::from_secs(65))
        );
        // restarting isn't a stop
        assert_eq!(cancels(&f), 0);
    }

    #[test]
    fn stops_itself_at_the_deadline() {
        let mut f = fixture();
        let now = Instant::now();
        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        assert!(!f.player.on_tick(now + Duration::from_secs(59)));
        assert_eq!(f.player.state(), PlayerState::Playing);
        assert!(f.player.on_tick(now + Duration::from_secs(60)));
        assert_eq!(f.player.state(), PlayerState::Idle);
        assert!(f.player.audio().live.is_empty());
        assert_eq!(cancels(&f), 1);
    }

    #[test]
    fn user_stop_disarms_the_timer() {
        let mut f = fixture();
        let now = Instant::now();
        f.player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        f.player.on_response(StopChoice::KeepRunning);
        assert_eq!(f.player.state(), PlayerState::Playing);

        f.player.on_response(StopChoice::StopAlarm);
        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(f.player.next_deadline(), None);
        assert!(!f.player.on_tick(now + Duration::from_secs(60)));
        assert_eq!(f.player.audio().unloads, 1);
        assert_eq!(cancels(&f), 1);
    }

    #[test]
    fn huge_auto_stop_is_capped() {
        let f = fixture();
        let mut player = f.player.with_auto_stop(Duration::MAX);
        let now = Instant::now();
        player
            .on_delivered(&content(true, ToneId::MorningBliss), now)
            .unwrap();
        assert_eq!(player.next_deadline(), Some(now + MAX_AUTO_STOP));
    }

    #[test]
    fn playback_errors_are_shown_not_raised() {
        let mut f = fixture();
        let delivered = Message::new(MessageType::Delivered(content(true, ToneId::BeepFest)), 7);
        assert!(f.player.dispatch(delivered, Instant::now()));
        assert_eq!(f.player.state(), PlayerState::Idle);
        assert_eq!(
            *f.alerts.0.lock().unwrap(),
            vec!["Could not play the alarm tone".to_string()]
        );
    }

    #[test]
    fn run_loop_times_out_and_shuts_down() {
        let f = fixture();
        let player = f.player.with_auto_stop(Duration::from_millis(20));
        let (tx, rx) = mpsc::channel();
        tx.send(Message::new(
            MessageType::Delivered(content(true, ToneId::MorningBliss)),
            1,
        ))
        .unwrap();
        let handle = std::thread::spawn(move || player.run(&rx));
        std::thread::sleep(Duration::from_millis(200));
        tx.send(Message::shutdown()).unwrap();
        handle.join().unwrap();
        assert_eq!(f.cancels.0.load(Ordering::SeqCst), 1);
    }
}
