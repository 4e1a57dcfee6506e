//! # Focusbell Core Library
//!
//! This library provides the core logic for the focusbell focus-session timer.
//! Front ends (the `focusbell` CLI, or any GUI) are thin layers that send
//! commands to a [`TimerHandle`] and render the [`TimerState`] snapshots and
//! [`SessionEvent`]s it hands back.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: a tokio task that derives the remaining time from
//!   monotonic clock deltas and reports it every 100ms
//! - **Session Machine**: the single owner of the timer state; alternates
//!   work and break sessions and counts completed work sessions
//! - **Bell**: a looping completion alert with a strategy cascade, a
//!   restart watchdog, an optional wake lock and a persistent notification
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerService`]: runs a [`SessionMachine`] as an actor
//! - [`CountdownEngine`]: drift-free countdown task
//! - [`BellManager`]: completion alert lifecycle
//! - [`Config`]: application configuration management

pub mod bell;
pub mod error;
pub mod events;
pub mod format;
pub mod storage;
pub mod timer;

pub use bell::{BellConfig, BellManager, BellOutcome, Permission, PlaybackStrategy};
pub use error::{
    ConfigError, CoreError, EngineError, NotificationError, PermissionError, PlaybackError,
    ReleaseError, ValidationError, WakeLockError,
};
pub use events::SessionEvent;
pub use storage::Config;
pub use timer::{
    CountdownEngine, SessionMachine, SessionType, TimerHandle, TimerService, TimerSettings,
    TimerState, TimerStatus,
};
