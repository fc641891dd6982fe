//! Basic system notifications, used to surface failed monitor cycles.

use crate::types::errors::NotifyError;

/// Title of the notification raised when a monitor cycle fails.
pub const ERROR_NOTIFICATION_TITLE: &str = "Ticket Monitor Error";

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Desktop notification through the platform notification service.
#[cfg(feature = "desktop")]
pub struct DesktopNotifier {
    appname: String,
    timeout_ms: u32,
}

#[cfg(feature = "desktop")]
impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            appname: "ticketwatch".to_string(),
            timeout_ms: 5000,
        }
    }
}

#[cfg(feature = "desktop")]
impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "desktop")]
impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        notify_rust::Notification::new()
            .summary(title)
            .body(message)
            .appname(&self.appname)
            .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
            .show()
            .map(|_| ())
            .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        tracing::warn!(title, message, "notification");
        Ok(())
    }
}

/// The notifier matching the enabled features.
pub fn default_notifier() -> Box<dyn Notifier> {
    #[cfg(feature = "desktop")]
    {
        Box::new(DesktopNotifier::new())
    }
    #[cfg(not(feature = "desktop"))]
    {
        Box::new(LogNotifier)
    }
}
