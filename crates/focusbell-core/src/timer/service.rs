//! Timer service actor.
//!
//! A [`SessionMachine`] moved onto its own task. Every command goes through
//! one channel, so commands, engine events and notification clicks are
//! applied strictly one at a time. Front ends hold a cloneable
//! [`TimerHandle`].

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::machine::{MachineInput, MachineOptions, SessionMachine};
use super::session::{SessionType, TimerSettings, TimerState};
use crate::bell::{BellManager, Permission};
use crate::error::{CoreError, EngineError, ValidationError};
use crate::events::SessionEvent;

/// Events buffered per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;

enum ServiceCommand {
    Start(Reply<Result<Option<SessionEvent>, EngineError>>),
    Pause(Reply<Option<SessionEvent>>),
    Resume(Reply<Result<Option<SessionEvent>, EngineError>>),
    Toggle(Reply<Result<Option<SessionEvent>, EngineError>>),
    Reset(Reply<SessionEvent>),
    SwitchSession(SessionType, Reply<SessionEvent>),
    StopBell(Reply<Option<SessionEvent>>),
    UpdateSettings(TimerSettings, Reply<Result<(), ValidationError>>),
    RequestPermission(Reply<Permission>),
    Shutdown(Reply<()>),
}

impl ServiceCommand {
    /// Commands that end or replace a ringing bell, and so should not wait
    /// for one that is still starting.
    fn preempts_bell(&self) -> bool {
        matches!(
            self,
            ServiceCommand::Start(_)
                | ServiceCommand::Toggle(_)
                | ServiceCommand::Reset(_)
                | ServiceCommand::SwitchSession(..)
                | ServiceCommand::StopBell(_)
                | ServiceCommand::Shutdown(_)
        )
    }
}

pub struct TimerService {
    machine: SessionMachine,
    commands: mpsc::UnboundedReceiver<ServiceCommand>,
    events: broadcast::Sender<SessionEvent>,
}

enum Wake {
    Command(Option<ServiceCommand>),
    Input(MachineInput),
}

impl TimerService {
    /// Build the machine and run it on a new task.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or outside a tokio runtime.
    pub fn spawn(
        settings: TimerSettings,
        bell: BellManager,
        options: MachineOptions,
    ) -> Result<TimerHandle, CoreError> {
        let machine = SessionMachine::new(settings, bell, options)?;
        let state = machine.subscribe();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let service = Self {
            machine,
            commands: command_rx,
            events: events.clone(),
        };
        let task = tokio::spawn(service.run());
        Ok(TimerHandle {
            commands: command_tx,
            state,
            events,
            task: std::sync::Arc::new(task),
        })
    }

    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                input = self.machine.recv_input() => Wake::Input(input),
            };

            let keep_running = match wake {
                Wake::Command(command) => self.dispatch(command).await,
                Wake::Input(input) => self.apply_input(input).await,
            };
            if !keep_running {
                break;
            }
        }
        tracing::debug!("timer service stopped");
    }

    /// Apply a machine input. A completion may spend a while starting the
    /// bell; commands arriving meanwhile are queued, and one that would stop
    /// the bell anyway interrupts the start.
    async fn apply_input(&mut self, input: MachineInput) -> bool {
        let interrupt = self.machine.bell().interrupter();
        let mut queued = Vec::new();
        let mut closed = false;

        let event = {
            let apply = self.machine.apply(input);
            tokio::pin!(apply);
            loop {
                tokio::select! {
                    event = &mut apply => break event,
                    command = self.commands.recv(), if !closed => match command {
                        Some(command) => {
                            if command.preempts_bell() {
                                interrupt.interrupt();
                            }
                            queued.push(command);
                        }
                        None => {
                            interrupt.interrupt();
                            closed = true;
                        }
                    },
                }
            }
        };
        if let Some(event) = event {
            self.emit(&event);
        }

        for command in queued {
            if !self.dispatch(Some(command)).await {
                return false;
            }
        }
        if closed {
            return self.dispatch(None).await;
        }
        true
    }

    /// Returns false once the service should stop.
    async fn dispatch(&mut self, command: Option<ServiceCommand>) -> bool {
        match command {
            Some(command) => self.handle(command).await,
            None => {
                tracing::debug!("all timer handles dropped");
                self.machine.shutdown().await;
                false
            }
        }
    }

    async fn handle(&mut self, command: ServiceCommand) -> bool {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            ServiceCommand::Start(reply) => {
                let result = self.machine.start();
                self.emit_result(&result);
                let _ = reply.send(result);
            }
            ServiceCommand::Pause(reply) => {
                let event = self.machine.pause();
                self.emit_opt(&event);
                let _ = reply.send(event);
            }
            ServiceCommand::Resume(reply) => {
                let result = self.machine.resume();
                self.emit_result(&result);
                let _ = reply.send(result);
            }
            ServiceCommand::Toggle(reply) => {
                let result = self.machine.toggle();
                self.emit_result(&result);
                let _ = reply.send(result);
            }
            ServiceCommand::Reset(reply) => {
                let event = self.machine.reset();
                self.emit(&event);
                let _ = reply.send(event);
            }
            ServiceCommand::SwitchSession(session_type, reply) => {
                let event = self.machine.switch_session(session_type);
                self.emit(&event);
                let _ = reply.send(event);
            }
            ServiceCommand::StopBell(reply) => {
                let event = self.machine.stop_bell();
                self.emit_opt(&event);
                let _ = reply.send(event);
            }
            ServiceCommand::UpdateSettings(settings, reply) => {
                let _ = reply.send(self.machine.update_settings(settings));
            }
            ServiceCommand::RequestPermission(reply) => {
                let _ = reply.send(self.machine.request_permission());
            }
            ServiceCommand::Shutdown(reply) => {
                self.machine.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn emit(&self, event: &SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
    }

    fn emit_opt(&self, event: &Option<SessionEvent>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn emit_result(&self, result: &Result<Option<SessionEvent>, EngineError>) {
        if let Ok(event) = result {
            self.emit_opt(event);
        }
    }
}

/// Cloneable front-end access to a running [`TimerService`].
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::UnboundedSender<ServiceCommand>,
    state: watch::Receiver<TimerState>,
    events: broadcast::Sender<SessionEvent>,
    task: std::sync::Arc<JoinHandle<()>>,
}

impl TimerHandle {
    /// Latest state snapshot.
    pub fn state(&self) -> TimerState {
        self.state.borrow().clone()
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.clone()
    }

    /// Stream of events from this point on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> ServiceCommand,
    ) -> Result<T, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| CoreError::ServiceStopped)?;
        rx.await.map_err(|_| CoreError::ServiceStopped)
    }

    pub async fn start(&self) -> Result<Option<SessionEvent>, CoreError> {
        Ok(self.call(ServiceCommand::Start).await??)
    }

    pub async fn pause(&self) -> Result<Option<SessionEvent>, CoreError> {
        self.call(ServiceCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<Option<SessionEvent>, CoreError> {
        Ok(self.call(ServiceCommand::Resume).await??)
    }

    pub async fn toggle(&self) -> Result<Option<SessionEvent>, CoreError> {
        Ok(self.call(ServiceCommand::Toggle).await??)
    }

    pub async fn reset(&self) -> Result<SessionEvent, CoreError> {
        self.call(ServiceCommand::Reset).await
    }

    pub async fn switch_session(
        &self,
        session_type: SessionType,
    ) -> Result<SessionEvent, CoreError> {
        self.call(|reply| ServiceCommand::SwitchSession(session_type, reply))
            .await
    }

    pub async fn stop_bell(&self) -> Result<Option<SessionEvent>, CoreError> {
        self.call(ServiceCommand::StopBell).await
    }

    pub async fn update_settings(&self, settings: TimerSettings) -> Result<(), CoreError> {
        Ok(self
            .call(|reply| ServiceCommand::UpdateSettings(settings, reply))
            .await??)
    }

    pub async fn request_permission(&self) -> Result<Permission, CoreError> {
        self.call(ServiceCommand::RequestPermission).await
    }

    /// Stop the bell and the engine, then end the service task. Succeeds if
    /// the service is already gone.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        match self.call(ServiceCommand::Shutdown).await {
            Ok(()) | Err(CoreError::ServiceStopped) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bell::{AlertSound, BellConfig, BellOutcome, NoWakeLock, NullNotifier, PlaybackStatus};
    use crate::error::{PlaybackError, ReleaseError};
    use crate::timer::TimerStatus;

    fn spawn(work: u64, brk: u64) -> TimerHandle {
        let settings = TimerSettings {
            work_duration_secs: work,
            break_duration_secs: brk,
            auto_start: false,
            notifications_enabled: false,
        };
        TimerService::spawn(settings, BellManager::silent(), MachineOptions::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn commands_round_trip_through_the_actor() {
        let timer = spawn(10, 5);
        assert!(matches!(timer.start().await, Ok(Some(SessionEvent::Started { .. }))));
        assert_eq!(timer.state().status, TimerStatus::Running);
        assert!(matches!(timer.pause().await, Ok(Some(SessionEvent::Paused { .. }))));
        assert!(matches!(timer.toggle().await, Ok(Some(SessionEvent::Resumed { .. }))));
        assert!(matches!(
            timer.switch_session(SessionType::Break).await,
            Ok(SessionEvent::SessionSwitched { remaining_secs: 5, .. })
        ));
        assert_eq!(timer.request_permission().await.unwrap(), Permission::Denied);
        timer.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn events_stream_reaches_completion() {
        let timer = spawn(2, 1);
        let mut events = timer.events();
        timer.start().await.unwrap();

        let mut ticks = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                SessionEvent::Tick { remaining_secs, .. } => ticks.push(remaining_secs),
                SessionEvent::Completed { completed_work_sessions, .. } => {
                    assert_eq!(completed_work_sessions, 1);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(ticks, vec![1, 0]);
        assert_eq!(timer.state().session_type, SessionType::Break);
        assert_eq!(timer.state().remaining_secs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_settings_are_rejected() {
        let timer = spawn(10, 5);
        let bad = TimerSettings {
            work_duration_secs: 0,
            ..TimerSettings::default()
        };
        assert!(matches!(
            timer.update_settings(bad).await,
            Err(CoreError::Validation(_))
        ));
    }

    /// Never buffers after a reload, so the bell keeps waiting on it.
    struct StalledSound;

    impl AlertSound for StalledSound {
        fn play(&mut self) -> Result<(), PlaybackError> {
            Err(PlaybackError::Refused("not loaded".into()))
        }
        fn reload(&mut self) -> Result<(), PlaybackError> {
            Ok(())
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

    #[tokio::test(start_paused = true)]
    async fn stop_bell_is_not_held_up_by_a_slow_bell_start() {
        let settings = TimerSettings {
            work_duration_secs: 1,
            break_duration_secs: 5,
            auto_start: true,
            notifications_enabled: true,
        };
        let bell = BellManager::new(
            Box::new(StalledSound),
            Box::new(NullNotifier),
            Box::new(NoWakeLock),
            BellConfig::default(),
        );
        let timer = TimerService::spawn(settings, bell, MachineOptions::default()).unwrap();
        let mut events = timer.events();
        timer.start().await.unwrap();

        // Completion lands at 1s and the bell then waits up to 10s for the
        // reloaded sound.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let asked = tokio::time::Instant::now();
        timer.stop_bell().await.unwrap();
        assert!(asked.elapsed() < Duration::from_secs(1));

        loop {
            if let SessionEvent::Completed { bell, auto_start, .. } = events.recv().await.unwrap() {
                assert_eq!(bell, Some(BellOutcome::Interrupted));
                assert!(!auto_start);
                break;
            }
        }
        assert!(!timer.state().alerting);
        assert_eq!(timer.state().status, TimerStatus::Idle);
        assert_eq!(timer.state().session_type, SessionType::Break);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_fail() {
        let timer = spawn(10, 5);
        timer.shutdown().await.unwrap();
        assert!(matches!(timer.start().await, Err(CoreError::ServiceStopped)));
        assert!(timer.shutdown().await.is_ok());
    }
}
