mod engine;
mod machine;
mod service;
mod session;

pub use engine::{
    CountdownEngine, CountdownHandle, EngineCommand, EngineEnvelope, EngineEvent, TICK_PERIOD,
};
pub use machine::{MachineInput, MachineOptions, SessionMachine, DEFAULT_AUTO_START_DELAY};
pub use service::{TimerHandle, TimerService};
pub use session::{
    SessionType, TimerSettings, TimerState, TimerStatus, DEFAULT_BREAK_DURATION_SECS,
    DEFAULT_WORK_DURATION_SECS,
};
