//! Turns one [`AlarmRequest`] into a burst of notifications.
//!
//! A single notification can get lost or arrive late, so an alarm is
//! scheduled as one notification per second for a whole minute. Only the
//! first of them starts the alarm sound.

use std::thread;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

use crate::{
    alarm::{AlarmRequest, RepeatMode},
    config::SchedulerConfig,
    error::{Error, Result},
    notification::{
        AlarmPayload, NotificationContent, NotificationId, NotificationRequest,
        NotificationService, RecurringTrigger, Trigger, WEEKDAYS, WEEKENDS,
    },
    permission::PermissionGate,
    prompt::Prompt,
};

/// milliseconds: wait, buzz, pause, buzz
pub const VIBRATION_PATTERN: [u64; 4] = [0, 250, 250, 250];

/// What happened to a batch of submissions.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub scheduled: Vec<NotificationId>,
    /// position in the batch and why it was refused
    pub failures: Vec<(usize, Error)>,
}

impl BatchOutcome {
    #[must_use]
    pub fn total(&self) -> usize {
        self.scheduled.len() + self.failures.len()
    }

    /// true if something was scheduled and nothing refused
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.scheduled.is_empty() && self.failures.is_empty()
    }
}

/// the trigger for the notification `offset` seconds into the burst
#[must_use]
pub fn trigger_for(repeat: RepeatMode, target: NaiveDateTime, offset: u32) -> Trigger {
    let weekdays = match repeat {
        RepeatMode::Once => {
            return Trigger::At(target + TimeDelta::seconds(i64::from(offset)));
        }
        RepeatMode::Daily => Vec::new(),
        RepeatMode::Weekdays => WEEKDAYS.to_vec(),
        RepeatMode::Weekends => WEEKENDS.to_vec(),
    };
    Trigger::Recurring(RecurringTrigger {
        hour: target.hour(),
        minute: target.minute(),
        second: offset,
        repeats: true,
        weekdays,
    })
}

/// Builds the whole burst for an alarm ringing at `target`. Fails if the
/// configured burst is empty or longer than a minute.
pub fn build_requests(
    request: &AlarmRequest,
    target: NaiveDateTime,
    config: &SchedulerConfig,
) -> Result<Vec<NotificationRequest>> {
    config.validate()?;
    Ok((0..config.burst_len)
        .map(|offset| NotificationRequest {
            content: NotificationContent {
                title: config.title.clone(),
                body: request.message.clone(),
                sound: "default".to_string(),
                vibrate: request.vibrate.then(|| VIBRATION_PATTERN.to_vec()),
                data: AlarmPayload {
                    tone: request.tone,
                    repeat: request.repeat,
                    is_first: offset == 0,
                    alarm_time: target,
                },
            },
            trigger: trigger_for(request.repeat, target, offset),
        })
        .collect())
}

/// Submits every request at once and waits for all of them. Nothing is
/// rolled back when some fail.
pub fn submit_batch(
    service: &dyn NotificationService,
    requests: Vec<NotificationRequest>,
) -> BatchOutcome {
    thread::scope(|scope| {
        let pending: Vec<_> = requests
            .into_iter()
            .map(|request| scope.spawn(move || service.schedule_notification(request)))
            .collect();
        let mut outcome = BatchOutcome::default();
        for (offset, handle) in pending.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(id)) => outcome.scheduled.push(id),
                Ok(Err(e)) => outcome.failures.push((offset, e)),
                Err(_) => outcome
                    .failures
                    .push((offset, Error::Rejected("submission panicked".to_string()))),
            }
        }
        outcome
    })
}

pub struct AlarmScheduler<'a> {
    service: &'a dyn NotificationService,
    gate: PermissionGate<'a>,
    prompt: &'a dyn Prompt,
    config: SchedulerConfig,
}

impl<'a> AlarmScheduler<'a> {
    #[must_use]
    pub const fn new(
        service: &'a dyn NotificationService,
        gate: PermissionGate<'a>,
        prompt: &'a dyn Prompt,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            gate,
            prompt,
            config,
        }
    }

    pub fn schedule_alarm(&self, request: &AlarmRequest) -> Result<BatchOutcome> {
        self.schedule_alarm_at(request, Local::now().naive_local())
    }

    /// Replaces whatever alarm was set with `request`, as seen at `now`.
    pub fn schedule_alarm_at(
        &self,
        request: &AlarmRequest,
        now: NaiveDateTime,
    ) -> Result<BatchOutcome> {
        self.gate.check_before_schedule()?;

        let target = request.target_time(now);
        let requests = match build_requests(request, target, &self.config) {
            Ok(requests) => requests,
            Err(e) => {
                log::error!("{e}");
                self.prompt.alert("Error", "Could not schedule the alarm");
                return Err(e);
            }
        };
        let total = requests.len();

        if let Err(e) = self.service.cancel_all_scheduled() {
            log::error!("couldn't clear the previous alarm: {e}");
            self.prompt.alert("Error", "Could not schedule the alarm");
            return Err(Error::SchedulingFailure {
                failed: total,
                total,
            });
        }

        let outcome = submit_batch(self.service, requests);
        if !outcome.is_success() {
            for (offset, e) in &outcome.failures {
                log::error!("notification {offset}s into the alarm was refused: {e}");
            }
            self.prompt.alert("Error", "Could not schedule the alarm");
            return Err(Error::SchedulingFailure {
                failed: outcome.failures.len(),
                total,
            });
        }

        log::info!(
            "alarm set for {target} ({}, tone {}), {total} notifications",
            request.repeat,
            request.tone
        );
        self.prompt.success("Alarm Set Successfully!");
        thread::sleep(self.config.success_delay());
        Ok(outcome)
    }
}
