use super::{AckSender, NotificationRequest, Notifier, Permission, ShownNotification};
use crate::error::{NotificationError, ReleaseError};

/// Desktop notifications through the platform notification service.
///
/// Desktop daemons need no permission prompt, so permission is always
/// granted. On freedesktop systems a click on the notification acknowledges
/// the bell; other platforms do not report clicks, so the bell is stopped
/// from the application instead.
#[cfg(feature = "desktop-notify")]
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

#[cfg(feature = "desktop-notify")]
impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

#[cfg(feature = "desktop-notify")]
impl Notifier for DesktopNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show(
        &mut self,
        request: &NotificationRequest,
        ack: AckSender,
    ) -> Result<Box<dyn ShownNotification>, NotificationError> {
        let mut notification = notify_rust::Notification::new();
        notification
            .summary(&request.title)
            .body(&request.body)
            .appname(&self.app_name);
        if let Some(icon) = &request.icon {
            notification.icon(icon);
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            notification.action(CLICK_ACTION, "Stop the bell");
            if request.require_interaction {
                notification
                    .urgency(notify_rust::Urgency::Critical)
                    .timeout(notify_rust::Timeout::Never);
            }
        }
        show_native(&notification, ack)
    }
}

/// Action id freedesktop servers invoke when the notification body is
/// clicked.
#[cfg(all(feature = "desktop-notify", unix, not(target_os = "macos")))]
const CLICK_ACTION: &str = "default";

#[cfg(all(feature = "desktop-notify", unix, not(target_os = "macos")))]
fn show_native(
    notification: &notify_rust::Notification,
    ack: AckSender,
) -> Result<Box<dyn ShownNotification>, NotificationError> {
    let handle = notification
        .show()
        .map_err(|e| NotificationError::ShowFailed(e.to_string()))?;
    let id = handle.id();

    // wait_for_action blocks until the notification is clicked or closed.
    let waiter = std::thread::Builder::new()
        .name("focusbell-notify".into())
        .spawn(move || handle.wait_for_action(|action| forward_action(action, &ack)));
    if let Err(e) = waiter {
        tracing::warn!("notification clicks will not stop the bell: {}", e);
    }

    Ok(Box::new(DesktopNotification {
        id,
        notification: notification.clone(),
    }))
}

#[cfg(all(feature = "desktop-notify", unix, not(target_os = "macos")))]
fn forward_action(action: &str, ack: &AckSender) {
    if action == CLICK_ACTION {
        ack.acknowledge();
    } else {
        tracing::debug!("bell notification finished with action {}", action);
    }
}

// Only the freedesktop backend reports clicks and can close a notification.
#[cfg(all(feature = "desktop-notify", not(all(unix, not(target_os = "macos")))))]
fn show_native(
    notification: &notify_rust::Notification,
    _ack: AckSender,
) -> Result<Box<dyn ShownNotification>, NotificationError> {
    notification
        .show()
        .map(|_| ())
        .map_err(|e| NotificationError::ShowFailed(e.to_string()))?;
    Ok(Box::new(LoggedNotification))
}

/// The click waiter owns the server handle, so closing replaces the
/// notification by id with one that expires at once. The server then reports
/// it closed and the waiter exits.
#[cfg(all(feature = "desktop-notify", unix, not(target_os = "macos")))]
struct DesktopNotification {
    id: u32,
    notification: notify_rust::Notification,
}

#[cfg(all(feature = "desktop-notify", unix, not(target_os = "macos")))]
impl ShownNotification for DesktopNotification {
    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        let DesktopNotification {
            id,
            mut notification,
        } = *self;
        notification
            .id(id)
            .urgency(notify_rust::Urgency::Low)
            .timeout(notify_rust::Timeout::Milliseconds(1))
            .show()
            .map(|_| ())
            .map_err(|e| ReleaseError::Notification(e.to_string()))
    }
}

/// Writes notifications to the log instead of the screen. Useful headless.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

struct LoggedNotification;

impl ShownNotification for LoggedNotification {
    fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        Ok(())
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    fn show(
        &mut self,
        request: &NotificationRequest,
        _ack: AckSender,
    ) -> Result<Box<dyn ShownNotification>, NotificationError> {
        tracing::info!("notification: {} - {}", request.title, request.body);
        Ok(Box::new(LoggedNotification))
    }
}

/// No notification support at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&mut self) -> Permission {
        Permission::Denied
    }

    fn show(
        &mut self,
        _request: &NotificationRequest,
        _ack: AckSender,
    ) -> Result<Box<dyn ShownNotification>, NotificationError> {
        Err(NotificationError::Unsupported)
    }
}
