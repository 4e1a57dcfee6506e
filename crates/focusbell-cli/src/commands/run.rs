use std::io::Write;

use clap::Args;
use focusbell_core::format::{format_contextual, format_display, parse_duration, progress_pct};
use focusbell_core::storage::DisplayConfig;
use focusbell_core::{
    BellOutcome, Config, SessionEvent, SessionType, TimerHandle, TimerService, TimerSettings,
    TimerStatus,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Args)]
pub struct RunArgs {
    /// Work session length (e.g. "25m", "25:00", "1h 30m")
    #[arg(long, value_parser = parse_duration)]
    work: Option<u64>,
    /// Break session length
    #[arg(long = "break", value_parser = parse_duration)]
    break_: Option<u64>,
    /// Start the next session automatically after each completion
    #[arg(long)]
    auto_start: bool,
    /// No bell and no notification on completion
    #[arg(long)]
    no_notify: bool,
    /// Print every event as a JSON line instead of the interactive display
    #[arg(long)]
    json: bool,
}

const HELP: &str = "\
  enter/t  start, pause or resume
  p        pause
  r        reset
  w / b    switch to work / break
  s        stop the bell
  q        quit";

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut settings = config.timer_settings();
    if let Some(work) = args.work {
        settings.work_duration_secs = work;
    }
    if let Some(break_secs) = args.break_ {
        settings.break_duration_secs = break_secs;
    }
    if args.auto_start {
        settings.auto_start = true;
    }
    if args.no_notify {
        settings.notifications_enabled = false;
    }
    settings.validate()?;

    let runtime = super::runtime()?;
    runtime.block_on(session(&config, settings, args.json))
}

enum Wake {
    Line(std::io::Result<Option<String>>),
    Event(Result<SessionEvent, RecvError>),
}

async fn session(
    config: &Config,
    settings: TimerSettings,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bell = super::build_bell(config);
    let timer = TimerService::spawn(settings, bell, config.machine_options())?;
    let mut events = timer.events();
    let mut display = Display::new(settings, config.display.clone(), json);
    display.current = timer.state().session_type;
    display.intro(&timer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        let wake = tokio::select! {
            line = lines.next_line(), if stdin_open => Wake::Line(line),
            event = events.recv() => Wake::Event(event),
        };

        match wake {
            Wake::Line(Ok(Some(line))) => {
                if !handle_line(&timer, &display, line.trim()).await? {
                    break;
                }
            }
            Wake::Line(Ok(None)) => {
                // Without input, finish the session in progress and exit.
                tracing::debug!("stdin closed");
                stdin_open = false;
                if timer.state().status == TimerStatus::Idle {
                    break;
                }
            }
            Wake::Line(Err(e)) => return Err(e.into()),
            Wake::Event(Ok(event)) => {
                display.event(&event);
                if !stdin_open
                    && matches!(event, SessionEvent::Completed { auto_start: false, .. })
                {
                    break;
                }
            }
            Wake::Event(Err(RecvError::Lagged(missed))) => {
                tracing::warn!("display fell behind, {} events skipped", missed);
            }
            Wake::Event(Err(RecvError::Closed)) => break,
        }
    }

    timer.shutdown().await?;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_line(
    timer: &TimerHandle,
    display: &Display,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    // Resulting events arrive through the event stream.
    match line {
        "" | "t" => {
            timer.toggle().await?;
        }
        "p" => {
            timer.pause().await?;
        }
        "r" => {
            timer.reset().await?;
        }
        "w" => {
            timer.switch_session(SessionType::Work).await?;
        }
        "b" => {
            timer.switch_session(SessionType::Break).await?;
        }
        "s" => {
            if timer.stop_bell().await?.is_none() {
                display.note("the bell is not ringing");
            }
        }
        "q" => return Ok(false),
        "?" | "h" => display.note(HELP),
        other => display.note(&format!("unknown command '{other}', ? for help")),
    }
    Ok(true)
}

struct Display {
    settings: TimerSettings,
    prefs: DisplayConfig,
    json: bool,
    /// Session the incoming ticks belong to. Follows the event stream rather
    /// than the live state, which may already be ahead of queued ticks.
    current: SessionType,
}

impl Display {
    fn new(settings: TimerSettings, prefs: DisplayConfig, json: bool) -> Self {
        Self {
            settings,
            prefs,
            json,
            current: SessionType::Work,
        }
    }

    fn track(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started { session_type, .. }
            | SessionEvent::Reset { session_type, .. }
            | SessionEvent::SessionSwitched { session_type, .. } => self.current = *session_type,
            SessionEvent::Completed { next, .. } => self.current = *next,
            _ => {}
        }
    }

    fn progress(&self, remaining: u64) -> f64 {
        progress_pct(remaining, self.settings.duration_for(self.current))
    }

    fn progress_for(&self, event: &SessionEvent) -> Option<f64> {
        match event {
            SessionEvent::Tick { remaining_secs, .. } => Some(self.progress(*remaining_secs)),
            _ => None,
        }
    }

    fn intro(&self, timer: &TimerHandle) {
        if self.json {
            return;
        }
        let state = timer.state();
        println!(
            "focusbell: work {}, break {}",
            format_contextual(self.settings.work_duration_secs),
            format_contextual(self.settings.break_duration_secs)
        );
        println!("{HELP}");
        println!(
            "{} {}",
            state.session_type.label(),
            self.clock(state.remaining_secs)
        );
    }

    fn note(&self, message: &str) {
        if !self.json {
            println!("{message}");
        }
    }

    fn clock(&self, secs: u64) -> String {
        format_display(secs, self.prefs.show_seconds, self.prefs.compact)
    }

    fn event(&mut self, event: &SessionEvent) {
        let progress = self.progress_for(event);
        self.track(event);
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("failed to encode event: {}", e),
            }
            return;
        }

        match event {
            SessionEvent::Tick { remaining_secs, .. } => {
                // Redraw in place; the state line has no newline.
                let mut stdout = std::io::stdout();
                let _ = write!(
                    stdout,
                    "\r{}  {:>3.0}%   ",
                    self.clock(*remaining_secs),
                    progress.unwrap_or_default()
                );
                let _ = stdout.flush();
            }
            SessionEvent::Started {
                session_type,
                duration_secs,
                ..
            } => println!(
                "\n{} started, {}",
                session_type.label(),
                format_contextual(*duration_secs)
            ),
            SessionEvent::Paused { remaining_secs, .. } => {
                println!("\npaused at {}", self.clock(*remaining_secs))
            }
            SessionEvent::Resumed { remaining_secs, .. } => {
                println!("\nresumed at {}", self.clock(*remaining_secs))
            }
            SessionEvent::Completed {
                finished,
                next,
                completed_work_sessions,
                bell,
                auto_start,
                ..
            } => {
                println!(
                    "\n{} complete ({} work sessions done). Next: {}",
                    finished.label(),
                    completed_work_sessions,
                    next.label()
                );
                match bell {
                    Some(BellOutcome::Ringing { .. }) => println!("bell ringing, 's' to stop"),
                    Some(BellOutcome::VisualOnly { .. }) => {
                        println!("bell could not play a sound, 's' to dismiss")
                    }
                    Some(BellOutcome::AlreadyRinging | BellOutcome::Interrupted) | None => {}
                }
                if *auto_start {
                    println!("{} starts automatically", next.label());
                }
            }
            SessionEvent::Reset {
                session_type,
                remaining_secs,
                ..
            } => println!(
                "\n{} reset to {}",
                session_type.label(),
                self.clock(*remaining_secs)
            ),
            SessionEvent::SessionSwitched {
                session_type,
                remaining_secs,
                ..
            } => println!(
                "\nswitched to {} ({})",
                session_type.label(),
                self.clock(*remaining_secs)
            ),
            SessionEvent::BellStopped { .. } => println!("bell stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn display() -> Display {
        let settings = TimerSettings {
            work_duration_secs: 100,
            break_duration_secs: 10,
            auto_start: false,
            notifications_enabled: false,
        };
        Display::new(settings, DisplayConfig::default(), true)
    }

    #[test]
    fn queued_ticks_use_the_session_they_belong_to() {
        let mut d = display();
        d.event(&SessionEvent::Started {
            session_type: SessionType::Work,
            duration_secs: 100,
            at: Utc::now(),
        });
        // Measured against the 100s work session, not the 10s break.
        let tick = SessionEvent::Tick {
            remaining_secs: 50,
            at: Utc::now(),
        };
        assert_eq!(d.progress_for(&tick), Some(50.0));

        d.event(&SessionEvent::Completed {
            finished: SessionType::Work,
            next: SessionType::Break,
            completed_work_sessions: 1,
            bell: None,
            auto_start: false,
            at: Utc::now(),
        });
        let tick = SessionEvent::Tick {
            remaining_secs: 5,
            at: Utc::now(),
        };
        assert_eq!(d.progress_for(&tick), Some(50.0));
        assert_eq!(d.current, SessionType::Break);
    }

    #[test]
    fn switch_and_reset_move_the_tracked_session() {
        let mut d = display();
        d.track(&SessionEvent::SessionSwitched {
            session_type: SessionType::Break,
            remaining_secs: 10,
            at: Utc::now(),
        });
        assert_eq!(d.current, SessionType::Break);
        d.track(&SessionEvent::Reset {
            session_type: SessionType::Work,
            remaining_secs: 100,
            at: Utc::now(),
        });
        assert_eq!(d.current, SessionType::Work);
    }
}
