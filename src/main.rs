//! Video Autopilot CLI
//!
//! Connects to an Appium server and either browses the feed or walks the
//! login flow.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use video_autopilot::app::ConsolePrompt;
use video_autopilot::clock::SystemClock;
use video_autopilot::config::Settings;
use video_autopilot::driver::AppiumSession;
use video_autopilot::{Autopilot, AutopilotError};

/// Command line interface
#[derive(Parser)]
#[command(name = "autopilot", about = "Browse a short-video app through Appium", version)]
struct Cli {
    /// JSON settings file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Appium server URL
    #[arg(long)]
    server: Option<String>,
    /// Device name capability
    #[arg(long)]
    device: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Browse the feed until stopped
    Run {
        /// Stop after this many videos (0 = never)
        #[arg(long)]
        max_videos: Option<u64>,
        /// Give up after this many app relaunches (0 = never)
        #[arg(long)]
        max_restarts: Option<u32>,
    },
    /// Log in with a phone number and SMS code
    Login,
    /// Print the effective settings as JSON
    ShowConfig,
}

fn load_settings(cli: &Cli) -> Result<Settings, AutopilotError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if let Some(server) = &cli.server {
        settings.server_url = server.clone();
    }
    if let Some(device) = &cli.device {
        settings.capabilities.device_name = device.clone();
    }
    if let Command::Run {
        max_videos,
        max_restarts,
    } = &cli.command
    {
        if let Some(n) = max_videos {
            settings.limits.max_videos = *n;
        }
        if let Some(n) = max_restarts {
            settings.limits.max_restarts = *n;
        }
    }

    settings.validate()?;
    Ok(settings)
}

fn connect(settings: Settings) -> Result<Autopilot<AppiumSession>, AutopilotError> {
    let session = AppiumSession::connect(
        &settings.server_url,
        &settings.capabilities,
        settings.timings.connect_timeout(),
        settings.timings.request_timeout(),
    )?;
    Ok(Autopilot::new(session, SystemClock, settings))
}

fn execute(cli: Cli) -> Result<(), AutopilotError> {
    let settings = load_settings(&cli)?;

    match cli.command {
        Command::ShowConfig => {
            println!("{}", settings.to_json()?);
        }
        Command::Login => {
            let mut pilot = connect(settings)?;
            pilot.login(&mut ConsolePrompt)?;
        }
        Command::Run { .. } => {
            let mut pilot = connect(settings)?;
            let stats = pilot.run()?;
            log::info!(
                "Done: {} videos, {} likes, {} reward boxes, {} check-ins, {} restarts",
                stats.videos_watched,
                stats.likes,
                stats.rewards_claimed,
                stats.check_ins,
                stats.restarts
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
