use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bell::BellOutcome;
use crate::timer::SessionType;

/// Every change the session machine makes produces a SessionEvent.
/// Front ends render them; the `--json` CLI mode prints them one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    Started {
        session_type: SessionType,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    Paused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Resumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The displayed second changed.
    Tick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Completed {
        finished: SessionType,
        next: SessionType,
        completed_work_sessions: u32,
        /// `None` when notifications are turned off.
        bell: Option<BellOutcome>,
        /// An automatic start of `next` is pending.
        auto_start: bool,
        at: DateTime<Utc>,
    },
    Reset {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionSwitched {
        session_type: SessionType,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    BellStopped {
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::Started { at, .. }
            | SessionEvent::Paused { at, .. }
            | SessionEvent::Resumed { at, .. }
            | SessionEvent::Tick { at, .. }
            | SessionEvent::Completed { at, .. }
            | SessionEvent::Reset { at, .. }
            | SessionEvent::SessionSwitched { at, .. }
            | SessionEvent::BellStopped { at } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = SessionEvent::Paused {
            remaining_secs: 42,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Paused");
        assert_eq!(json["remaining_secs"], 42);
    }

    #[test]
    fn completed_carries_bell_outcome() {
        let event = SessionEvent::Completed {
            finished: SessionType::Work,
            next: SessionType::Break,
            completed_work_sessions: 1,
            bell: Some(BellOutcome::VisualOnly { notified: false }),
            auto_start: false,
            at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(json.contains("\"outcome\":\"visual_only\""));
        assert!(json.contains("\"finished\":\"work\""));
    }
}
