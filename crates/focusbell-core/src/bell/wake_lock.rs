use std::process::{Child, Command, Stdio};

use super::{find_program, WakeLockGuard, WakeLockProvider};
use crate::error::{ReleaseError, WakeLockError};

/// Keeps the machine awake by holding an inhibitor process for as long as
/// the bell rings: `systemd-inhibit` on Linux, `caffeinate` on macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct InhibitWakeLock;

impl InhibitWakeLock {
    fn command(reason: &str) -> Option<Command> {
        if cfg!(target_os = "linux") {
            let program = find_program("systemd-inhibit")?;
            let mut command = Command::new(program);
            command.args([
                "--what=idle:sleep",
                "--mode=block",
                "--who=focusbell",
                &format!("--why={reason}"),
                "sleep",
                "infinity",
            ]);
            Some(command)
        } else if cfg!(target_os = "macos") {
            let program = find_program("caffeinate")?;
            let mut command = Command::new(program);
            command.arg("-di");
            Some(command)
        } else {
            None
        }
    }
}

impl WakeLockProvider for InhibitWakeLock {
    fn acquire(&mut self, reason: &str) -> Result<Option<Box<dyn WakeLockGuard>>, WakeLockError> {
        let Some(mut command) = Self::command(reason) else {
            tracing::debug!("no wake lock available on this system");
            return Ok(None);
        };
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| WakeLockError(e.to_string()))?;
        tracing::debug!("wake lock held by pid {}", child.id());
        Ok(Some(Box::new(InhibitorGuard { child })))
    }
}

struct InhibitorGuard {
    child: Child,
}

impl WakeLockGuard for InhibitorGuard {
    fn release(mut self: Box<Self>) -> Result<(), ReleaseError> {
        let exited = self
            .child
            .try_wait()
            .map_err(|e| ReleaseError::WakeLock(e.to_string()))?;
        if exited.is_none() {
            self.child
                .kill()
                .map_err(|e| ReleaseError::WakeLock(e.to_string()))?;
            self.child
                .wait()
                .map_err(|e| ReleaseError::WakeLock(e.to_string()))?;
        }
        Ok(())
    }
}

/// Never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWakeLock;

impl WakeLockProvider for NoWakeLock {
    fn acquire(&mut self, _reason: &str) -> Result<Option<Box<dyn WakeLockGuard>>, WakeLockError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_wake_lock_acquires_nothing() {
        assert!(NoWakeLock.acquire("bell").unwrap().is_none());
    }

    #[test]
    fn inhibitor_guard_releases_cleanly() {
        let Ok(Some(guard)) = InhibitWakeLock.acquire("bell ringing") else {
            // Not available in this environment.
            return;
        };
        assert!(guard.release().is_ok());
    }
}
