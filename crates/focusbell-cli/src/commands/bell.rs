use std::time::Duration;

use clap::Subcommand;
use focusbell_core::format::parse_duration;
use focusbell_core::{BellOutcome, Config, SessionType};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Subcommand)]
pub enum BellAction {
    /// Ring the bell until Enter is pressed or the notification is clicked
    Test {
        /// Stop on its own after this long (e.g. "5s", "1m")
        #[arg(long = "for", value_parser = parse_duration)]
        stop_after: Option<u64>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn permission() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut bell = super::build_bell(&config);
    println!("{}", bell.request_permission());
    Ok(())
}

pub fn run(action: BellAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        BellAction::Test { stop_after, json } => {
            let config = Config::load_or_default();
            let runtime = super::runtime()?;
            runtime.block_on(ring(&config, stop_after, json))
        }
    }
}

enum Stop {
    Enter,
    Clicked,
    Timeout,
}

async fn ring(
    config: &Config,
    stop_after: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bell = super::build_bell(config);
    let outcome = bell.start_bell(SessionType::Work).await;
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        match outcome {
            BellOutcome::Ringing { strategy, .. } => {
                println!("bell ringing via {strategy} strategy, press Enter to stop")
            }
            BellOutcome::VisualOnly { notified: true } => {
                println!("no sound could be played, showing the notification only")
            }
            BellOutcome::VisualOnly { notified: false } => {
                println!("no sound could be played and notifications are unavailable")
            }
            BellOutcome::AlreadyRinging => println!("bell already ringing"),
            BellOutcome::Interrupted => println!("bell start was interrupted"),
        }
    }

    let timeout = async {
        match stop_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let stop = tokio::select! {
        _ = lines.next_line() => Stop::Enter,
        episode = bell.acknowledged() => {
            bell.acknowledge(episode);
            Stop::Clicked
        }
        _ = timeout => Stop::Timeout,
    };

    bell.stop_bell();
    if !json {
        match stop {
            Stop::Enter => println!("bell stopped"),
            Stop::Clicked => println!("bell stopped from the notification"),
            Stop::Timeout => println!("bell stopped after {}s", stop_after.unwrap_or_default()),
        }
    }
    Ok(())
}
