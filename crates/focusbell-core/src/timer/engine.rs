//! Countdown engine.
//!
//! The engine runs on its own tokio task and talks to the session machine
//! only through channels: [`EngineCommand`]s in, [`EngineEnvelope`]s out.
//! Remaining time is always derived from monotonic clock deltas, never from
//! counting ticks, so a late or skipped tick cannot accumulate drift.
//!
//! ## Phases
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let (engine, mut events) = CountdownEngine::spawn()?;
//! engine.start(1, 1500)?;
//! while let Some(envelope) = events.recv().await {
//!     // EngineEvent::Tick every 100ms, then one EngineEvent::Complete
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::EngineError;

/// Fixed tick period.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Begin a fresh run. Cancels any run in progress.
    Start { generation: u64, duration_secs: u64 },
    Pause,
    /// Continue a paused run. `remaining_secs` is the caller's view.
    Resume { remaining_secs: u64 },
    Reset { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Tick { remaining_secs: u64 },
    Complete,
    Paused { remaining_secs: u64 },
    Resumed { remaining_secs: u64 },
    Reset,
}

/// An engine event tagged with the generation of the run that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEnvelope {
    pub generation: u64,
    pub event: EngineEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Pure countdown arithmetic, separated from the task so it can be driven
/// with explicit instants.
#[derive(Debug, Clone, Default)]
pub(crate) struct Countdown {
    duration_ms: u64,
    /// Running time folded in at each pause.
    elapsed_before_pause_ms: u64,
    /// Instant the current running stretch began.
    origin: Option<Instant>,
    phase: Phase,
}

impl Countdown {
    pub(crate) fn start(&mut self, duration_secs: u64, now: Instant) {
        self.duration_ms = duration_secs.saturating_mul(1000);
        self.elapsed_before_pause_ms = 0;
        self.origin = Some(now);
        self.phase = Phase::Running;
    }

    /// Returns false if the countdown was not running.
    pub(crate) fn pause(&mut self, now: Instant) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.elapsed_before_pause_ms = self.elapsed_ms(now);
        self.origin = None;
        self.phase = Phase::Paused;
        true
    }

    /// Returns false if the countdown was not paused.
    pub(crate) fn resume(&mut self, now: Instant) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        self.origin = Some(now);
        self.phase = Phase::Running;
        true
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    fn finish(&mut self) {
        self.elapsed_before_pause_ms = self.duration_ms;
        self.origin = None;
        self.phase = Phase::Idle;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        let stretch = self
            .origin
            .map(|origin| now.saturating_duration_since(origin).as_millis() as u64)
            .unwrap_or(0);
        self.elapsed_before_pause_ms.saturating_add(stretch)
    }

    pub(crate) fn remaining_ms(&self, now: Instant) -> u64 {
        self.duration_ms.saturating_sub(self.elapsed_ms(now))
    }

    /// Remaining whole seconds, rounded up so the display only drops once a
    /// full second has passed.
    pub(crate) fn remaining_secs(&self, now: Instant) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }
}

/// Sending side of a spawned engine.
///
/// Dropping the handle aborts the engine task.
#[derive(Debug)]
pub struct CountdownHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    /// # Errors
    ///
    /// Returns [`EngineError::Disconnected`] if the engine task has exited.
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }

    pub fn start(&self, generation: u64, duration_secs: u64) -> Result<(), EngineError> {
        self.send(EngineCommand::Start {
            generation,
            duration_secs,
        })
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Pause)
    }

    pub fn resume(&self, remaining_secs: u64) -> Result<(), EngineError> {
        self.send(EngineCommand::Resume { remaining_secs })
    }

    pub fn reset(&self, generation: u64) -> Result<(), EngineError> {
        self.send(EngineCommand::Reset { generation })
    }

    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the engine task and wait for it to exit.
    pub async fn shutdown(&mut self) {
        self.task.abort();
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::error!("countdown engine task failed: {}", e);
            }
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The engine task state.
pub struct CountdownEngine {
    countdown: Countdown,
    generation: u64,
    period: Duration,
    ticker: Option<Interval>,
    events: mpsc::UnboundedSender<EngineEnvelope>,
}

enum Wake {
    Command(Option<EngineCommand>),
    Tick,
}

impl CountdownEngine {
    /// Spawn an engine on the current tokio runtime with the fixed
    /// [`TICK_PERIOD`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SpawnFailed`] when called outside a runtime.
    pub fn spawn() -> Result<(CountdownHandle, mpsc::UnboundedReceiver<EngineEnvelope>), EngineError>
    {
        Self::spawn_with_period(TICK_PERIOD)
    }

    pub fn spawn_with_period(
        period: Duration,
    ) -> Result<(CountdownHandle, mpsc::UnboundedReceiver<EngineEnvelope>), EngineError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            countdown: Countdown::default(),
            generation: 0,
            period,
            ticker: None,
            events: event_tx,
        };
        let task = runtime.spawn(engine.run(command_rx));

        Ok((
            CountdownHandle {
                commands: command_tx,
                task,
            },
            event_rx,
        ))
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                _ = next_tick(&mut self.ticker) => Wake::Tick,
            };

            let delivered = match wake {
                Wake::Command(Some(command)) => self.handle(command),
                Wake::Command(None) => break,
                Wake::Tick => self.on_tick(),
            };
            if !delivered {
                // Nobody is listening any more.
                break;
            }
        }
        tracing::debug!("countdown engine stopped");
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn handle(&mut self, command: EngineCommand) -> bool {
        let now = Instant::now();
        match command {
            EngineCommand::Start {
                generation,
                duration_secs,
            } => {
                if self.ticker.take().is_some() {
                    tracing::debug!(
                        "restarting countdown, cancelled run of generation {}",
                        self.generation
                    );
                }
                self.generation = generation;
                self.countdown.start(duration_secs, now);
                self.ticker = Some(self.new_ticker(now));
                true
            }
            EngineCommand::Pause => {
                if !self.countdown.pause(now) {
                    return true;
                }
                self.ticker = None;
                let remaining_secs = self.countdown.remaining_secs(now);
                self.emit(EngineEvent::Paused { remaining_secs })
            }
            EngineCommand::Resume { remaining_secs } => {
                if !self.countdown.resume(now) {
                    return true;
                }
                let own = self.countdown.remaining_secs(now);
                if own.abs_diff(remaining_secs) > 1 {
                    tracing::warn!(
                        "resume with {}s remaining but engine has {}s; keeping engine time",
                        remaining_secs,
                        own
                    );
                }
                self.ticker = Some(self.new_ticker(now));
                self.emit(EngineEvent::Resumed { remaining_secs: own })
            }
            EngineCommand::Reset { generation } => {
                self.ticker = None;
                self.countdown.reset();
                self.generation = generation;
                self.emit(EngineEvent::Reset)
            }
        }
    }

    fn on_tick(&mut self) -> bool {
        if !self.countdown.is_running() {
            self.ticker = None;
            return true;
        }
        let now = Instant::now();
        let remaining_ms = self.countdown.remaining_ms(now);
        let remaining_secs = remaining_ms.div_ceil(1000);
        if !self.emit(EngineEvent::Tick { remaining_secs }) {
            return false;
        }
        if remaining_ms == 0 {
            self.ticker = None;
            self.countdown.finish();
            return self.emit(EngineEvent::Complete);
        }
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn new_ticker(&self, now: Instant) -> Interval {
        let mut interval = tokio::time::interval_at(now + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    fn emit(&self, event: EngineEvent) -> bool {
        self.events
            .send(EngineEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
