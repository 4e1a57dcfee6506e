//! Session state machine.
//!
//! The single writer of [`TimerState`]. User commands arrive as method
//! calls; engine events, notification clicks and the auto-start deadline
//! arrive through [`SessionMachine::recv_input`] and are applied with
//! [`SessionMachine::apply`].
//!
//! ```text
//!            start                 pause
//!   Idle ─────────────▶ Running ─────────▶ Paused
//!    ▲  ◀───────────────  │  ◀─────────────  │
//!    │     Complete       │     resume       │
//!    └────────────────────┴──────────────────┘
//!                 reset / switch_session
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::engine::{CountdownEngine, CountdownHandle, EngineEnvelope, EngineEvent, TICK_PERIOD};
use super::session::{SessionType, TimerSettings, TimerState, TimerStatus};
use crate::bell::{BellManager, BellOutcome, Permission};
use crate::error::{CoreError, EngineError, ValidationError};
use crate::events::SessionEvent;

/// Default delay between a completion and the automatic start of the next
/// session.
pub const DEFAULT_AUTO_START_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineOptions {
    pub auto_start_delay: Duration,
    pub tick_period: Duration,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            auto_start_delay: DEFAULT_AUTO_START_DELAY,
            tick_period: TICK_PERIOD,
        }
    }
}

/// Something the machine has to react to besides a direct command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineInput {
    Engine(EngineEnvelope),
    /// The engine task is gone.
    EngineClosed,
    /// A bell notification of the given episode was clicked.
    Acknowledged(u64),
    AutoStart,
}

pub struct SessionMachine {
    state: TimerState,
    settings: TimerSettings,
    engine: CountdownHandle,
    engine_events: Option<mpsc::UnboundedReceiver<EngineEnvelope>>,
    bell: BellManager,
    /// Generation of the current engine run. Events from older runs are
    /// dropped.
    generation: u64,
    auto_start_at: Option<Instant>,
    auto_start_delay: Duration,
    state_tx: watch::Sender<TimerState>,
}

impl SessionMachine {
    /// Build a machine and spawn its countdown engine on the current runtime.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or when no tokio runtime is available.
    pub fn new(
        settings: TimerSettings,
        bell: BellManager,
        options: MachineOptions,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let (engine, engine_events) = CountdownEngine::spawn_with_period(options.tick_period)?;
        let state = TimerState::new(&settings);
        let (state_tx, _) = watch::channel(state.clone());
        Ok(Self {
            state,
            settings,
            engine,
            engine_events: Some(engine_events),
            bell,
            generation: 0,
            auto_start_at: None,
            auto_start_delay: options.auto_start_delay,
            state_tx,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state_tx.subscribe()
    }

    pub fn is_auto_start_pending(&self) -> bool {
        self.auto_start_at.is_some()
    }

    pub fn bell(&self) -> &BellManager {
        &self.bell
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start from Idle, or resume from Paused. No-op while Running.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine is gone; the state is forced to
    /// Idle first.
    pub fn start(&mut self) -> Result<Option<SessionEvent>, EngineError> {
        self.auto_start_at = None;
        match self.state.status {
            TimerStatus::Running => Ok(None),
            TimerStatus::Paused => self.resume(),
            TimerStatus::Idle => {
                self.silence_bell();
                self.generation += 1;
                if let Err(e) = self.engine.start(self.generation, self.state.remaining_secs) {
                    self.force_idle();
                    return Err(e);
                }
                self.state.status = TimerStatus::Running;
                self.publish();
                tracing::info!(
                    "{} session started ({}s)",
                    self.state.session_type,
                    self.state.remaining_secs
                );
                Ok(Some(SessionEvent::Started {
                    session_type: self.state.session_type,
                    duration_secs: self.state.remaining_secs,
                    at: Utc::now(),
                }))
            }
        }
    }

    /// Pause a running session. No-op otherwise.
    pub fn pause(&mut self) -> Option<SessionEvent> {
        if self.state.status != TimerStatus::Running {
            return None;
        }
        if let Err(e) = self.engine.pause() {
            tracing::error!("pause failed: {}", e);
            self.force_idle();
            return None;
        }
        self.state.status = TimerStatus::Paused;
        self.publish();
        tracing::info!("paused with {}s remaining", self.state.remaining_secs);
        Some(SessionEvent::Paused {
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Resume a paused session. No-op otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine is gone; the state is forced to
    /// Idle first.
    pub fn resume(&mut self) -> Result<Option<SessionEvent>, EngineError> {
        if self.state.status != TimerStatus::Paused {
            return Ok(None);
        }
        if let Err(e) = self.engine.resume(self.state.remaining_secs) {
            self.force_idle();
            return Err(e);
        }
        self.state.status = TimerStatus::Running;
        self.publish();
        tracing::info!("resumed with {}s remaining", self.state.remaining_secs);
        Ok(Some(SessionEvent::Resumed {
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// Pause when Running, resume when Paused, start when Idle.
    pub fn toggle(&mut self) -> Result<Option<SessionEvent>, EngineError> {
        match self.state.status {
            TimerStatus::Running => Ok(self.pause()),
            TimerStatus::Paused => self.resume(),
            TimerStatus::Idle => self.start(),
        }
    }

    /// Back to Idle with the full duration of the current session type.
    pub fn reset(&mut self) -> SessionEvent {
        self.auto_start_at = None;
        self.silence_bell();
        self.reset_engine();
        self.state.status = TimerStatus::Idle;
        self.state.remaining_secs = self.settings.duration_for(self.state.session_type);
        self.publish();
        tracing::info!("{} session reset", self.state.session_type);
        SessionEvent::Reset {
            session_type: self.state.session_type,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }
    }

    pub fn switch_session(&mut self, session_type: SessionType) -> SessionEvent {
        self.auto_start_at = None;
        self.silence_bell();
        self.reset_engine();
        self.state.session_type = session_type;
        self.state.status = TimerStatus::Idle;
        self.state.remaining_secs = self.settings.duration_for(session_type);
        self.publish();
        tracing::info!("switched to {} session", session_type);
        SessionEvent::SessionSwitched {
            session_type,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }
    }

    /// Silence the bell. Idempotent; returns an event only when something
    /// was actually stopped.
    pub fn stop_bell(&mut self) -> Option<SessionEvent> {
        let was_alerting = self.state.alerting;
        let stopped = self.bell.stop_bell();
        if !(stopped || was_alerting) {
            return None;
        }
        self.state.alerting = false;
        self.publish();
        Some(SessionEvent::BellStopped { at: Utc::now() })
    }

    /// Replace the settings. While Idle the remaining time follows the new
    /// duration; a running or paused countdown is left alone.
    ///
    /// # Errors
    ///
    /// Rejects settings with a zero duration.
    pub fn update_settings(&mut self, settings: TimerSettings) -> Result<(), ValidationError> {
        settings.validate()?;
        self.settings = settings;
        if self.state.status == TimerStatus::Idle {
            self.state.remaining_secs = settings.duration_for(self.state.session_type);
            self.publish();
        }
        if !settings.auto_start && self.auto_start_at.take().is_some() {
            tracing::debug!("auto-start disabled, pending start cancelled");
        }
        Ok(())
    }

    pub fn request_permission(&mut self) -> Permission {
        self.bell.request_permission()
    }

    /// Stop the bell and the engine task.
    pub async fn shutdown(&mut self) {
        self.auto_start_at = None;
        self.silence_bell();
        self.engine.shutdown().await;
        self.engine_events = None;
        tracing::debug!("session machine shut down");
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Wait for the next engine event, notification click or auto-start
    /// deadline. Cancel safe.
    pub async fn recv_input(&mut self) -> MachineInput {
        let auto_start_at = self.auto_start_at;
        tokio::select! {
            envelope = next_engine_event(&mut self.engine_events) => match envelope {
                Some(envelope) => MachineInput::Engine(envelope),
                None => MachineInput::EngineClosed,
            },
            episode = self.bell.acknowledged() => MachineInput::Acknowledged(episode),
            _ = sleep_until(auto_start_at) => MachineInput::AutoStart,
        }
    }

    pub async fn apply(&mut self, input: MachineInput) -> Option<SessionEvent> {
        match input {
            MachineInput::Engine(envelope) => self.on_engine_event(envelope).await,
            MachineInput::EngineClosed => {
                tracing::error!("{}", EngineError::Disconnected);
                self.engine_events = None;
                if self.state.status != TimerStatus::Idle {
                    self.force_idle();
                }
                None
            }
            MachineInput::Acknowledged(episode) => {
                if !self.bell.acknowledge(episode) {
                    return None;
                }
                self.state.alerting = false;
                self.publish();
                Some(SessionEvent::BellStopped { at: Utc::now() })
            }
            MachineInput::AutoStart => {
                self.auto_start_at = None;
                if self.state.status == TimerStatus::Running {
                    return None;
                }
                tracing::info!("auto-starting {} session", self.state.session_type);
                match self.start() {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!("auto-start failed: {}", e);
                        None
                    }
                }
            }
        }
    }

    /// Drive the machine until it produces an event. Returns `None` once the
    /// engine is gone and nothing else can happen.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.engine_events.is_none() && self.auto_start_at.is_none() && !self.bell.is_active()
            {
                return None;
            }
            let input = self.recv_input().await;
            if let Some(event) = self.apply(input).await {
                return Some(event);
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn on_engine_event(&mut self, envelope: EngineEnvelope) -> Option<SessionEvent> {
        if envelope.generation != self.generation {
            tracing::debug!(
                "dropping {:?} from stale generation {} (current {})",
                envelope.event,
                envelope.generation,
                self.generation
            );
            return None;
        }
        match envelope.event {
            EngineEvent::Tick { remaining_secs } => {
                if self.state.status != TimerStatus::Running
                    || remaining_secs == self.state.remaining_secs
                {
                    return None;
                }
                self.state.remaining_secs = remaining_secs;
                self.publish();
                Some(SessionEvent::Tick {
                    remaining_secs,
                    at: Utc::now(),
                })
            }
            EngineEvent::Paused { remaining_secs } | EngineEvent::Resumed { remaining_secs } => {
                if self.state.remaining_secs != remaining_secs {
                    self.state.remaining_secs = remaining_secs;
                    self.publish();
                }
                None
            }
            EngineEvent::Complete => {
                // A pause can race the engine finishing on its own; the run
                // is over either way.
                if self.state.status == TimerStatus::Idle {
                    tracing::debug!("ignoring completion while {:?}", self.state.status);
                    return None;
                }
                Some(self.on_complete().await)
            }
            EngineEvent::Reset => None,
        }
    }

    async fn on_complete(&mut self) -> SessionEvent {
        let finished = self.state.session_type;
        if finished == SessionType::Work {
            self.state.completed_work_sessions += 1;
        }
        let next = finished.next();
        self.state.session_type = next;
        self.state.status = TimerStatus::Idle;
        self.state.remaining_secs = self.settings.duration_for(next);
        tracing::info!(
            "{} session complete ({} work sessions done)",
            finished,
            self.state.completed_work_sessions
        );

        let bell = if self.settings.notifications_enabled {
            let outcome = self.bell.start_bell(finished).await;
            self.state.alerting = self.bell.is_active();
            Some(outcome)
        } else {
            None
        };
        self.publish();

        // An interrupted bell means a command is waiting to be applied.
        let interrupted = matches!(bell, Some(BellOutcome::Interrupted));
        let auto_start = self.settings.auto_start && !self.bell.is_ringing() && !interrupted;
        if auto_start {
            self.auto_start_at = Some(Instant::now() + self.auto_start_delay);
            tracing::debug!("auto-start armed in {:?}", self.auto_start_delay);
        }

        SessionEvent::Completed {
            finished,
            next,
            completed_work_sessions: self.state.completed_work_sessions,
            bell,
            auto_start,
            at: Utc::now(),
        }
    }

    fn silence_bell(&mut self) {
        if self.state.alerting || self.bell.is_active() {
            self.bell.stop_bell();
            self.state.alerting = false;
        }
    }

    fn reset_engine(&mut self) {
        self.generation += 1;
        if let Err(e) = self.engine.reset(self.generation) {
            tracing::error!("engine reset failed: {}", e);
        }
    }

    fn force_idle(&mut self) {
        self.generation += 1;
        self.state.status = TimerStatus::Idle;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

async fn next_engine_event(
    events: &mut Option<mpsc::UnboundedReceiver<EngineEnvelope>>,
) -> Option<EngineEnvelope> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
