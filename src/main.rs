use anyhow::{Context, Result};
use clap::Parser;
use glyphreel::cli::{Cli, Command};
use glyphreel::config::Config;
use glyphreel::scheduler::PlaybackStats;
use glyphreel::{actions, PACKAGE_NAME, VERSION};
use log::{error, info, warn};
use std::future::Future;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    // Set up logging level
    if cli.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }

    info!("Starting {} v{}", PACKAGE_NAME, VERSION);

    // Only commands that draw or size frames query the terminal
    let config = || Config::from_cli(&cli).context("Could not determine the terminal size");

    match &cli.command {
        Command::Render(args) => {
            let config = config()?;
            actions::render(&config, args)
                .await
                .with_context(|| format!("Failed to render {}", args.input.display()))?;
        }
        Command::Play(args) => {
            let config = config()?;
            warn_if_not_terminal();
            let stats = interruptible(actions::play(&config, args))
                .await
                .with_context(|| format!("Failed to play {}", args.input.display()))?;
            report(stats);
        }
        Command::Stream(args) => {
            let config = config()?;
            warn_if_not_terminal();
            let stats = interruptible(actions::stream(&config, args))
                .await
                .with_context(|| format!("Failed to stream {}", args.input.display()))?;
            report(stats);
        }
        Command::Inspect(args) => {
            let info = actions::inspect(&args.input)
                .with_context(|| format!("Failed to inspect {}", args.input.display()))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// Run playback until it ends or Ctrl+C is pressed.
///
/// Dropping the playback future restores the terminal, stops the audio player
/// and kills a running frame producer.
async fn interruptible<F>(playback: F) -> glyphreel::Result<Option<PlaybackStats>>
where
    F: Future<Output = glyphreel::Result<PlaybackStats>>,
{
    tokio::select! {
        result = playback => result.map(Some),
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}

fn report(stats: Option<PlaybackStats>) {
    match stats {
        Some(stats) => {
            if let Some(e) = &stats.audio_error {
                warn!("The soundtrack stopped during playback: {}", e);
            }
            info!("Playback finished. Total frames: {}", stats.frames);
        }
        None => info!("Playback interrupted"),
    }
}

fn warn_if_not_terminal() {
    if !atty::is(atty::Stream::Stdout) {
        warn!("Standard output is not a terminal, frames are written as raw escape sequences");
    }
}
