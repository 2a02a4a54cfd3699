use crate::logging::{LogManager, SOURCE_UPDATES};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NotifyError {
    pub message: String,
}

impl NotifyError {
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self {
            message: cause.to_string(),
        }
    }
}

/// Native notification side channel.
pub trait Notifier: Send + Sync {
    fn permission_granted(&self) -> Result<bool, NotifyError>;

    /// Asks the user; returns whether permission ended up granted.
    fn request_permission(&self) -> Result<bool, NotifyError>;

    fn send(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Headless notifier: permission is never granted, so nothing is ever shown.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn permission_granted(&self) -> Result<bool, NotifyError> {
        Ok(false)
    }

    fn request_permission(&self) -> Result<bool, NotifyError> {
        Ok(false)
    }

    fn send(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Fire-and-forget "new release" notification.
///
/// Permission refusal and delivery failures are logged and swallowed; the
/// return value only reports whether a notification was handed to the OS.
pub fn notify_update_available(notifier: &dyn Notifier, logs: &LogManager, version: &str) -> bool {
    let granted = match notifier.permission_granted() {
        Ok(true) => true,
        Ok(false) => match notifier.request_permission() {
            Ok(granted) => granted,
            Err(e) => {
                logs.warning(SOURCE_UPDATES, &format!("Notification permission request failed: {e}"));
                false
            }
        },
        Err(e) => {
            logs.warning(SOURCE_UPDATES, &format!("Notification permission query failed: {e}"));
            false
        }
    };

    if !granted {
        logs.info(SOURCE_UPDATES, "Notification permission not granted, skipping native notification");
        return false;
    }

    let body = format!("Harbor {version} is available.");
    match notifier.send("Update available", &body) {
        Ok(()) => true,
        Err(e) => {
            logs.warning(SOURCE_UPDATES, &format!("Failed to show update notification: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeNotifier;

    #[test]
    fn test_silent_notifier_skips() {
        let logs = LogManager::new(10);
        assert!(!notify_update_available(&SilentNotifier, &logs, "v1.2.1"));
        assert_eq!(logs.get_logs(Some(SOURCE_UPDATES)).len(), 1);
    }

    #[test]
    fn test_requests_permission_before_sending() {
        let logs = LogManager::new(10);
        let notifier = FakeNotifier::new(false, true);

        assert!(notify_update_available(&notifier, &logs, "v1.2.1"));
        assert_eq!(notifier.permission_requests(), 1);
        assert_eq!(notifier.sent(), vec!["Harbor v1.2.1 is available.".to_string()]);
    }

    #[test]
    fn test_already_granted_does_not_request() {
        let logs = LogManager::new(10);
        let notifier = FakeNotifier::new(true, false);

        assert!(notify_update_available(&notifier, &logs, "v2.0.0"));
        assert_eq!(notifier.permission_requests(), 0);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[test]
    fn test_refused_permission_is_not_an_error() {
        let logs = LogManager::new(10);
        let notifier = FakeNotifier::new(false, false);

        assert!(!notify_update_available(&notifier, &logs, "v1.2.1"));
        assert!(notifier.sent().is_empty());
        assert!(logs.get_logs(None).iter().all(|l| l.level != "error"));
    }

    #[test]
    fn test_send_failure_is_swallowed() {
        let logs = LogManager::new(10);
        let notifier = FakeNotifier::new(true, true).failing_send();

        assert!(!notify_update_available(&notifier, &logs, "v1.2.1"));
        assert_eq!(logs.get_logs(None)[0].level, "warning");
    }
}
