use crate::{
    error::{Error, Result},
    notification::{NotificationService, PermissionCapabilities, PermissionStatus},
    prompt::{AlertButton, ButtonStyle, Prompt, SystemSettings},
};

const SETTINGS_BUTTONS: [AlertButton; 2] = [
    AlertButton::new("Cancel", ButtonStyle::Cancel),
    AlertButton::new("Settings", ButtonStyle::Default),
];

/// Makes sure notifications may be shown before anything is scheduled.
#[derive(Clone, Copy)]
pub struct PermissionGate<'a> {
    service: &'a dyn NotificationService,
    prompt: &'a dyn Prompt,
    settings: &'a dyn SystemSettings,
}

impl<'a> PermissionGate<'a> {
    #[must_use]
    pub const fn new(
        service: &'a dyn NotificationService,
        prompt: &'a dyn Prompt,
        settings: &'a dyn SystemSettings,
    ) -> Self {
        Self {
            service,
            prompt,
            settings,
        }
    }

    fn status(&self) -> PermissionStatus {
        self.service.get_permissions().unwrap_or_else(|e| {
            log::error!("couldn't read notification permission: {e}");
            PermissionStatus::Undetermined
        })
    }

    /// Startup check: asks for permission if it was never given. Returns
    /// false (after telling the user) if notifications can't be used.
    pub fn ensure_permission(&self) -> bool {
        if !self.service.is_device() {
            log::warn!("not running on a device, notifications are unavailable");
            return false;
        }
        let mut status = self.status();
        if status != PermissionStatus::Granted {
            status = self
                .service
                .request_permissions(&PermissionCapabilities::alarm())
                .unwrap_or_else(|e| {
                    log::error!("couldn't request notification permission: {e}");
                    PermissionStatus::Denied
                });
        }
        if status == PermissionStatus::Granted {
            true
        } else {
            log::warn!("notification permission {status:?}");
            self.prompt.alert(
                "Permission Required",
                "Please enable notifications to use the alarm feature",
            );
            false
        }
    }

    /// Check right before scheduling. Without permission the user is offered
    /// the system settings and the caller has to give up.
    pub fn check_before_schedule(&self) -> Result<()> {
        if self.status() == PermissionStatus::Granted {
            return Ok(());
        }
        let choice = self.prompt.choose(
            "Permission Required",
            "Please enable notifications to set alarms",
            &SETTINGS_BUTTONS,
        );
        if choice == 1 {
            if let Err(e) = self.settings.open_system_settings() {
                log::error!("couldn't open system settings: {e}");
            }
        }
        Err(Error::PermissionDenied)
    }
}
