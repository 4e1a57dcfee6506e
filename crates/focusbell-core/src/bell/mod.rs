//! Session-completion bell.
//!
//! The [`BellManager`] owns every resource of a ringing episode: the looping
//! audio, an optional wake lock and the persistent notification. Platform
//! access goes through three small traits so the manager can be exercised
//! without a sound card or a notification daemon:
//!
//! - [`AlertSound`]: looping alert playback
//! - [`Notifier`]: permission and notification display
//! - [`WakeLockProvider`]: keeps the display awake while ringing

mod manager;
mod notifier;
#[cfg(feature = "rodio")]
mod rodio_sound;
mod sound;
mod strategy;
mod wake_lock;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{NotificationError, PlaybackError, ReleaseError, WakeLockError};

pub use manager::{BellConfig, BellInterrupt, BellManager, BellOutcome};
#[cfg(feature = "desktop-notify")]
pub use notifier::DesktopNotifier;
pub use notifier::{LogNotifier, NullNotifier};
#[cfg(feature = "rodio")]
pub use rodio_sound::RodioSound;
pub use sound::{CommandSound, SilentSound};
pub use strategy::PlaybackStrategy;
pub use wake_lock::{InhibitWakeLock, NoWakeLock};

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; asking may still grant it.
    Default,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded or explicitly stopped.
    Stopped,
    Playing,
    /// Reached the end of the resource.
    Ended,
    /// Playback failed after it had started.
    Errored,
}

/// Looping alert audio.
pub trait AlertSound: Send {
    /// Start playback from position zero, replacing anything already playing.
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Drop buffered data and load the resource again.
    fn reload(&mut self) -> Result<(), PlaybackError>;

    /// Whether playback could start right away.
    fn is_ready(&self) -> bool;

    /// `None` when the backend has no output context at all.
    fn output_suspended(&self) -> Option<bool> {
        None
    }

    fn resume_output(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::NoOutputContext)
    }

    fn status(&mut self) -> PlaybackStatus;

    fn stop(&mut self) -> Result<(), ReleaseError>;
}

/// Content of a system notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Stay on screen until the user acts on it.
    pub require_interaction: bool,
    pub tag: String,
    pub silent: bool,
}

/// Reports a click on a shown notification back to the bell manager.
#[derive(Debug, Clone)]
pub struct AckSender {
    episode: u64,
    tx: mpsc::UnboundedSender<u64>,
}

impl AckSender {
    pub(crate) fn new(episode: u64, tx: mpsc::UnboundedSender<u64>) -> Self {
        Self { episode, tx }
    }

    /// Signal that the user acknowledged the notification.
    pub fn acknowledge(&self) {
        if self.tx.send(self.episode).is_err() {
            tracing::debug!("bell manager gone, dropping acknowledgement");
        }
    }
}

pub trait Notifier: Send {
    fn permission(&self) -> Permission;

    /// Idempotent. Returns the resulting permission.
    fn request_permission(&mut self) -> Permission;

    fn show(
        &mut self,
        request: &NotificationRequest,
        ack: AckSender,
    ) -> Result<Box<dyn ShownNotification>, NotificationError>;
}

/// A notification currently on screen.
pub trait ShownNotification: Send {
    fn close(self: Box<Self>) -> Result<(), ReleaseError>;
}

pub trait WakeLockProvider: Send {
    /// `Ok(None)` when the platform offers no wake lock.
    fn acquire(&mut self, reason: &str) -> Result<Option<Box<dyn WakeLockGuard>>, WakeLockError>;
}

pub trait WakeLockGuard: Send {
    fn release(self: Box<Self>) -> Result<(), ReleaseError>;
}

pub(crate) type SharedSound = Arc<Mutex<Box<dyn AlertSound>>>;

pub(crate) fn lock_sound(sound: &SharedSound) -> MutexGuard<'_, Box<dyn AlertSound>> {
    sound.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Look a program up on `PATH`.
pub(crate) fn find_program(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
