use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{lock_sound, SharedSound};
use crate::error::PlaybackError;

/// One way of getting the alert to sound. Tried in [`CASCADE`] order until
/// one succeeds.
///
/// [`CASCADE`]: PlaybackStrategy::CASCADE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStrategy {
    /// Play immediately.
    Direct,
    /// Reload the resource, wait for it to buffer, play.
    ReloadAndRetry,
    /// Wake a suspended output context, play.
    ResumeOutputAndRetry,
}

impl PlaybackStrategy {
    pub const CASCADE: [PlaybackStrategy; 3] = [
        PlaybackStrategy::Direct,
        PlaybackStrategy::ReloadAndRetry,
        PlaybackStrategy::ResumeOutputAndRetry,
    ];

    pub(crate) async fn attempt(
        self,
        sound: &SharedSound,
        ready_timeout: Duration,
        ready_poll: Duration,
    ) -> Result<(), PlaybackError> {
        match self {
            PlaybackStrategy::Direct => lock_sound(sound).play(),
            PlaybackStrategy::ReloadAndRetry => {
                lock_sound(sound).reload()?;
                wait_until_ready(sound, ready_timeout, ready_poll).await?;
                lock_sound(sound).play()
            }
            PlaybackStrategy::ResumeOutputAndRetry => {
                let suspended = lock_sound(sound).output_suspended();
                match suspended {
                    None => return Err(PlaybackError::NoOutputContext),
                    Some(true) => lock_sound(sound).resume_output()?,
                    Some(false) => {}
                }
                lock_sound(sound).play()
            }
        }
    }
}

impl std::fmt::Display for PlaybackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PlaybackStrategy::Direct => "direct",
            PlaybackStrategy::ReloadAndRetry => "reload-and-retry",
            PlaybackStrategy::ResumeOutputAndRetry => "resume-output-and-retry",
        })
    }
}

/// Try every strategy in order. Returns the one that worked.
pub(crate) async fn play_cascade(
    sound: &SharedSound,
    ready_timeout: Duration,
    ready_poll: Duration,
) -> Option<PlaybackStrategy> {
    for strategy in PlaybackStrategy::CASCADE {
        match strategy.attempt(sound, ready_timeout, ready_poll).await {
            Ok(()) => {
                tracing::debug!("bell playing via {} strategy", strategy);
                return Some(strategy);
            }
            Err(e) => tracing::warn!("bell {} strategy failed: {}", strategy, e),
        }
    }
    None
}

async fn wait_until_ready(
    sound: &SharedSound,
    timeout: Duration,
    poll: Duration,
) -> Result<(), PlaybackError> {
    let wait = async {
        loop {
            let ready = lock_sound(sound).is_ready();
            if ready {
                return;
            }
            tokio::time::sleep(poll).await;
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| PlaybackError::NotReady { timeout })
}
