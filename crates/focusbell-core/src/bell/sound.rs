//! Alert sound backends that need no native audio libraries.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::{find_program, AlertSound, PlaybackStatus};
use crate::error::{PlaybackError, ReleaseError};

/// Bell sounds shipped with common desktops, most bell-like first.
const SYSTEM_SOUNDS: &[&str] = &[
    "/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga",
    "/usr/share/sounds/freedesktop/stereo/bell.oga",
    "/usr/share/sounds/freedesktop/stereo/complete.oga",
    "/usr/share/sounds/sound-icons/guitar-11.wav",
    "/System/Library/Sounds/Glass.aiff",
    "C:\\Windows\\Media\\Alarm01.wav",
];

/// Players tried in order when none is configured.
const PLAYERS: &[&str] = &["paplay", "pw-play", "aplay", "afplay", "ffplay"];

/// Plays the alert file through an external player process.
///
/// Each `play` spawns one pass over the file; the bell watchdog sees the
/// process exit as [`PlaybackStatus::Ended`] and starts the next pass.
#[derive(Debug)]
pub struct CommandSound {
    path: PathBuf,
    player: Option<String>,
    /// 0..=100
    volume: u8,
    child: Option<Child>,
}

impl CommandSound {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            player: None,
            volume: 100,
            child: None,
        }
    }

    /// The first system bell sound that exists on this machine.
    pub fn system_default() -> Option<Self> {
        SYSTEM_SOUNDS
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
            .map(Self::new)
    }

    /// Use `player` (a command line, the file path is appended) instead of
    /// probing for one.
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        let player = player.into();
        self.player = if player.trim().is_empty() {
            None
        } else {
            Some(player)
        };
        self
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = volume.min(100);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self) -> Option<Command> {
        if let Some(player) = &self.player {
            let mut parts = player.split_whitespace();
            let program = parts.next()?;
            let mut command = Command::new(program);
            command.args(parts);
            command.arg(&self.path);
            return Some(command);
        }

        let (name, program) = PLAYERS
            .iter()
            .find_map(|name| find_program(name).map(|p| (*name, p)))?;
        let mut command = Command::new(program);
        match name {
            "paplay" => {
                let level = u32::from(self.volume) * 65536 / 100;
                command.arg(format!("--volume={level}"));
            }
            "pw-play" => {
                command.arg(format!("--volume={:.2}", f32::from(self.volume) / 100.0));
            }
            "afplay" => {
                command.args(["-v", &format!("{:.2}", f32::from(self.volume) / 100.0)]);
            }
            "ffplay" => {
                command.args(["-nodisp", "-autoexit", "-loglevel", "quiet"]);
                command.args(["-volume", &self.volume.to_string()]);
            }
            _ => {
                command.arg("-q");
            }
        }
        command.arg(&self.path);
        Some(command)
    }

    fn kill_child(&mut self) -> std::io::Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill()?;
                child.wait()?;
            }
        }
        Ok(())
    }
}

impl AlertSound for CommandSound {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if let Err(e) = self.kill_child() {
            tracing::debug!("previous bell player did not exit cleanly: {}", e);
        }
        if !self.path.is_file() {
            return Err(PlaybackError::LoadFailed {
                path: self.path.clone(),
                message: "file not found".into(),
            });
        }
        let mut command = self
            .command()
            .ok_or_else(|| PlaybackError::NoOutput("no audio player found on PATH".into()))?;
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlaybackError::Refused(e.to_string()))?;
        self.child = Some(child);
        Ok(())
    }

    fn reload(&mut self) -> Result<(), PlaybackError> {
        if let Err(e) = self.kill_child() {
            tracing::debug!("bell player did not exit cleanly: {}", e);
        }
        std::fs::metadata(&self.path)
            .map(|_| ())
            .map_err(|e| PlaybackError::LoadFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn is_ready(&self) -> bool {
        self.path.is_file()
            && (self.player.is_some() || PLAYERS.iter().any(|p| find_program(p).is_some()))
    }

    fn status(&mut self) -> PlaybackStatus {
        let Some(child) = self.child.as_mut() else {
            return PlaybackStatus::Stopped;
        };
        match child.try_wait() {
            Ok(None) => PlaybackStatus::Playing,
            Ok(Some(exit)) if exit.success() => PlaybackStatus::Ended,
            Ok(Some(_)) | Err(_) => PlaybackStatus::Errored,
        }
    }

    fn stop(&mut self) -> Result<(), ReleaseError> {
        self.kill_child()
            .map_err(|e| ReleaseError::Audio(e.to_string()))
    }
}

impl Drop for CommandSound {
    fn drop(&mut self) {
        let _ = self.kill_child();
    }
}

/// Never makes a sound. Every playback strategy fails, so the bell falls
/// back to its notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSound;

impl AlertSound for SilentSound {
    fn play(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::NoOutput("sound disabled".into()))
    }

    fn reload(&mut self) -> Result<(), PlaybackError> {
        Err(PlaybackError::NoOutput("sound disabled".into()))
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn status(&mut self) -> PlaybackStatus {
        PlaybackStatus::Stopped
    }

    fn stop(&mut self) -> Result<(), ReleaseError> {
        Ok(())
    }
}
