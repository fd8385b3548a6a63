//! A local notification store for desktops.
//!
//! Scheduled notifications live in a TOML file so that `noti_alarm schedule`
//! and the daemon, which delivers them, can run as separate processes. The
//! file is re-read before every operation.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::Sender,
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    config::Config,
    error::{Error, Result},
    notification::{
        ListenerId, NotificationContent, NotificationEvent, NotificationId,
        NotificationRequest, NotificationService, PermissionCapabilities, PermissionStatus,
        ScheduledNotification, Trigger,
    },
    prompt::PermissionDialog,
};

/// recurring triggers are only looked for this far back after a long sleep
const MAX_CATCH_UP_DAYS: i64 = 7;
/// how many delivered notifications are kept for responses
const DELIVERED_KEPT: usize = 64;
/// an empty store file is read again this often before giving up
const EMPTY_READ_ATTEMPTS: u32 = 5;
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Store {
    #[serde(default)]
    next_id: NotificationId,
    #[serde(default)]
    permission: PermissionStatus,
    #[serde(default)]
    scheduled: Vec<ScheduledNotification>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LocalNotificationCenter {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    store: Mutex<Store>,
    listeners: Mutex<Vec<(ListenerId, Sender<NotificationEvent>)>>,
    next_listener: AtomicU64,
    delivered: Mutex<Vec<ScheduledNotification>>,
    last_checked: Mutex<Option<NaiveDateTime>>,
    dialog: Box<dyn PermissionDialog>,
    device: bool,
    banners: bool,
    missed_grace: TimeDelta,
}

impl std::fmt::Debug for LocalNotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNotificationCenter")
            .field("path", &self.path)
            .field("device", &self.device)
            .field("banners", &self.banners)
            .finish_non_exhaustive()
    }
}

impl LocalNotificationCenter {
    /// store backed by the file at `path`, created on first write
    pub fn open(path: PathBuf, dialog: Box<dyn PermissionDialog>) -> Result<Self> {
        let store = Self::read_store(&path)?;
        Ok(Self::with_store(Some(path), store, dialog))
    }

    #[must_use]
    pub fn in_memory(dialog: Box<dyn PermissionDialog>) -> Self {
        Self::with_store(None, Store::default(), dialog)
    }

    fn with_store(path: Option<PathBuf>, store: Store, dialog: Box<dyn PermissionDialog>) -> Self {
        Self {
            path,
            store: Mutex::new(store),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            delivered: Mutex::new(Vec::new()),
            last_checked: Mutex::new(None),
            dialog,
            device: true,
            banners: false,
            missed_grace: TimeDelta::seconds(60),
        }
    }

    /// the store at [`Config::store_path`] set up as `config` says
    pub fn from_config(config: &Config, dialog: Box<dyn PermissionDialog>) -> Result<Self> {
        Ok(Self::open(Config::store_path()?, dialog)?
            .with_device(config.physical_device)
            .with_banners(config.daemon.desktop_banners)
            .with_missed_grace(Duration::from_secs(config.daemon.missed_grace_secs)))
    }

    #[must_use]
    pub const fn with_device(mut self, device: bool) -> Self {
        self.device = device;
        self
    }

    /// also show every delivered notification as a desktop banner
    #[must_use]
    pub const fn with_banners(mut self, banners: bool) -> Self {
        self.banners = banners;
        self
    }

    #[must_use]
    pub fn with_missed_grace(mut self, grace: Duration) -> Self {
        self.missed_grace = TimeDelta::from_std(grace).unwrap_or(TimeDelta::MAX);
        self
    }

    fn read_store(path: &Path) -> Result<Store> {
        for attempt in 0..EMPTY_READ_ATTEMPTS {
            if !path.exists() {
                return Ok(Store::default());
            }
            let text = std::fs::read_to_string(path)?;
            if !text.trim().is_empty() {
                return Ok(toml::from_str(&text)?);
            }
            log::debug!("store {} is empty (attempt {attempt})", path.display());
            std::thread::sleep(EMPTY_READ_BACKOFF);
        }
        Err(Error::EmptyStore(path.to_path_buf()))
    }

    /// replaces the store file in one rename so readers never see half of it
    fn write_store(path: &Path, store: &Store) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(toml::to_string(store)?.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// runs `f` against the freshest copy of the store, writing it back if `f` says so
    fn update<T>(&self, f: impl FnOnce(&mut Store) -> Result<(T, bool)>) -> Result<T> {
        let mut store = lock(&self.store);
        if let Some(path) = &self.path {
            *store = Self::read_store(path)?;
        }
        let (ret, changed) = f(&mut store)?;
        if changed {
            if let Some(path) = &self.path {
                Self::write_store(path, &store)?;
            }
        }
        Ok(ret)
    }

    /// what the system settings screen does
    pub fn set_permission(&self, status: PermissionStatus) -> Result<()> {
        self.update(|store| {
            store.permission = status;
            Ok(((), true))
        })
    }

    /// Delivers everything that became due since the last call.
    ///
    /// One-shot notifications are removed once delivered, or dropped without
    /// delivery if they were missed by more than the grace period. Recurring
    /// ones stay scheduled, an occurrence missed by more than the grace period
    /// is skipped.
    pub fn deliver_due(&self, now: NaiveDateTime) -> Result<Vec<ScheduledNotification>> {
        let after = {
            let mut last = lock(&self.last_checked);
            let after = last.unwrap_or(now);
            *last = Some(now);
            after
        };
        let grace = self.missed_grace;
        // occurrences missed by more than the grace period are skipped
        let recurring_after = now
            .checked_sub_signed(grace)
            .map_or(after, |earliest| after.max(earliest));
        let mut due = self.update(|store| {
            let mut due = Vec::new();
            let before = store.scheduled.len();
            store.scheduled.retain(|notification| match &notification.request.trigger {
                Trigger::At(at) if *at <= now => {
                    if now - *at <= grace {
                        due.push((*at, notification.clone()));
                    } else {
                        log::warn!("dropping notification {} missed at {at}", notification.id);
                    }
                    false
                }
                Trigger::At(_) => true,
                Trigger::Recurring(_) => {
                    if let Some(at) =
                        occurrence_between(&notification.request.trigger, recurring_after, now)
                    {
                        due.push((at, notification.clone()));
                    }
                    true
                }
            });
            let changed = store.scheduled.len() != before;
            Ok((due, changed))
        })?;
        due.sort_by_key(|(at, notification)| (*at, notification.id));
        let due: Vec<_> = due.into_iter().map(|(_, notification)| notification).collect();

        for notification in &due {
            log::debug!(
                "delivering notification {} (first: {})",
                notification.id,
                notification.request.content.data.is_first
            );
            if self.banners {
                show_banner(&notification.request.content);
            }
            self.emit(&NotificationEvent::Delivered(notification.clone()));
        }
        if !due.is_empty() {
            let mut delivered = lock(&self.delivered);
            delivered.extend(due.iter().cloned());
            let excess = delivered.len().saturating_sub(DELIVERED_KEPT);
            delivered.drain(..excess);
        }
        Ok(due)
    }

    /// The user tapped the most recently delivered notification.
    pub fn respond_to_latest(&self) -> Option<ScheduledNotification> {
        let latest = lock(&self.delivered).last().cloned()?;
        log::info!("user responded to notification {}", latest.id);
        self.emit(&NotificationEvent::Responded(latest.clone()));
        Some(latest)
    }

    fn emit(&self, event: &NotificationEvent) {
        lock(&self.listeners).retain(|(id, sender)| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                log::debug!("listener {id} went away");
            }
            alive
        });
    }
}

fn validate(request: &NotificationRequest) -> Result<()> {
    if let Trigger::Recurring(recurring) = &request.trigger {
        if NaiveTime::from_hms_opt(recurring.hour, recurring.minute, recurring.second).is_none() {
            return Err(Error::Rejected(format!(
                "{}:{}:{} is not a time of day",
                recurring.hour, recurring.minute, recurring.second
            )));
        }
        if let Some(day) = recurring.weekdays.iter().find(|day| !(1..=7).contains(*day)) {
            return Err(Error::Rejected(format!("{day} is not a weekday")));
        }
    }
    Ok(())
}

/// first time `trigger` fires in `(after, upto]`
fn occurrence_between(
    trigger: &Trigger,
    after: NaiveDateTime,
    upto: NaiveDateTime,
) -> Option<NaiveDateTime> {
    match trigger {
        Trigger::At(at) => (*at > after && *at <= upto).then_some(*at),
        Trigger::Recurring(recurring) => {
            let time = NaiveTime::from_hms_opt(recurring.hour, recurring.minute, recurring.second)?;
            if upto <= after {
                return None;
            }
            let earliest = upto.date() - TimeDelta::days(MAX_CATCH_UP_DAYS);
            let start = after.date().max(earliest);
            start
                .iter_days()
                .take_while(|day| *day <= upto.date())
                .filter(|day| recurring.matches_day(day.weekday()))
                .map(|day| day.and_time(time))
                .find(|at| *at > after && *at <= upto)
        }
    }
}

fn show_banner(content: &NotificationContent) {
    let summary = content.title.clone();
    let body = content.body.clone();
    std::thread::spawn(move || {
        if let Err(e) = notify_rust::Notification::new()
            .summary(&summary)
            .body(&body)
            .appname("noti_alarm")
            .timeout(notify_rust::Timeout::Milliseconds(1000))
            .show()
        {
            log::warn!("couldn't show desktop notification: {e}");
        }
    });
}

impl NotificationService for LocalNotificationCenter {
    fn is_device(&self) -> bool {
        self.device
    }

    fn get_permissions(&self) -> Result<PermissionStatus> {
        self.update(|store| Ok((store.permission, false)))
    }

    fn request_permissions(
        &self,
        capabilities: &PermissionCapabilities,
    ) -> Result<PermissionStatus> {
        // the dialog may block for a while, don't hold the store meanwhile
        let current = self.get_permissions()?;
        if current != PermissionStatus::Undetermined {
            return Ok(current);
        }
        let status = match self.dialog.request(capabilities) {
            Some(true) => PermissionStatus::Granted,
            Some(false) => PermissionStatus::Denied,
            None => {
                log::warn!("nobody answered the permission dialog");
                return Ok(PermissionStatus::Undetermined);
            }
        };
        log::info!("notification permission {status:?}");
        self.set_permission(status)?;
        Ok(status)
    }

    fn schedule_notification(&self, request: NotificationRequest) -> Result<NotificationId> {
        validate(&request)?;
        self.update(|store| {
            store.next_id += 1;
            let id = store.next_id;
            store.scheduled.push(ScheduledNotification { id, request });
            Ok((id, true))
        })
    }

    fn cancel_all_scheduled(&self) -> Result<()> {
        self.update(|store| {
            let changed = !store.scheduled.is_empty();
            if changed {
                log::info!("cancelling {} scheduled notifications", store.scheduled.len());
            }
            store.scheduled.clear();
            Ok(((), changed))
        })
    }

    fn scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        self.update(|store| Ok((store.scheduled.clone(), false)))
    }

    fn add_listener(&self, sender: Sender<NotificationEvent>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, sender));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        lock(&self.listeners).retain(|(listener, _)| *listener != id);
    }
}
