use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_WORK_DURATION_SECS: u64 = 25 * 60;
pub const DEFAULT_BREAK_DURATION_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Work,
    Break,
}

impl SessionType {
    /// The session that follows this one when it completes.
    pub fn next(self) -> Self {
        match self {
            SessionType::Work => SessionType::Break,
            SessionType::Break => SessionType::Work,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Work => "work",
            SessionType::Break => "break",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Observable timer state.
///
/// Written only by [`SessionMachine`](super::SessionMachine); everyone else
/// sees snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_secs: u64,
    pub status: TimerStatus,
    pub session_type: SessionType,
    pub completed_work_sessions: u32,
    /// True while the bell is ringing. Never true while `status` is Running.
    pub alerting: bool,
}

impl TimerState {
    pub fn new(settings: &TimerSettings) -> Self {
        Self {
            remaining_secs: settings.duration_for(SessionType::Work),
            status: TimerStatus::Idle,
            session_type: SessionType::Work,
            completed_work_sessions: 0,
            alerting: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }
}

/// Durations and preferences supplied by the settings gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub work_duration_secs: u64,
    pub break_duration_secs: u64,
    pub auto_start: bool,
    pub notifications_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration_secs: DEFAULT_WORK_DURATION_SECS,
            break_duration_secs: DEFAULT_BREAK_DURATION_SECS,
            auto_start: false,
            notifications_enabled: true,
        }
    }
}

impl TimerSettings {
    pub fn duration_for(&self, session_type: SessionType) -> u64 {
        match session_type {
            SessionType::Work => self.work_duration_secs,
            SessionType::Break => self.break_duration_secs,
        }
    }

    /// # Errors
    ///
    /// Returns an error if either duration is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.work_duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "work_duration_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.break_duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "break_duration_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
