mod config;
mod error;
mod generator;
mod logging;
mod mailer;
mod ports;
mod ranking;
mod retry;
mod spotify;
mod tracker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::{Result, eyre::Context};

use crate::{
    config::Config,
    generator::{Generator, GeneratorOptions},
    logging::init_tracing,
    mailer::MailApiClient,
    retry::RetryPolicy,
    spotify::{client::SpotifyClient, history::SpotifyHistory, playlist::SpotifyPlaylists},
    tracker::RunTracker,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "MOODIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Tracing filter (e.g. "info" or "moodify=debug")
    #[arg(long, default_value = "info", env = "MOODIFY_LOG")]
    log_level: String,

    /// Custom playlist name
    #[arg(long)]
    name: Option<String>,

    /// Number of tracks to include
    #[arg(long)]
    tracks: Option<usize>,

    /// Lookback window for play history, e.g. "7d" or "48h"
    #[arg(long, value_parser = humantime::parse_duration)]
    lookback: Option<std::time::Duration>,

    /// Make the playlist public (default: private)
    #[arg(long)]
    public: bool,

    /// Rank without publishing a playlist or sending email
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(&args.log_level)?;

    tracing::debug!("loading configuration");
    let mut config =
        Config::load(args.config.as_deref()).wrap_err("Failed to load moodify config")?;

    if let Some(name) = args.name {
        config.playlist_name = name;
    }
    if let Some(tracks) = args.tracks {
        config.top_tracks = tracks;
    }
    if let Some(lookback) = args.lookback {
        config.lookback = chrono::Duration::from_std(lookback)
            .wrap_err("Lookback window is out of range")?;
    }
    if args.public {
        config.public_playlist = true;
    }

    let retry = RetryPolicy::default();
    let client = Arc::new(SpotifyClient::new(config.spotify.clone()));
    let history = SpotifyHistory::new(Arc::clone(&client), retry);
    let playlists = SpotifyPlaylists::new(Arc::clone(&client), retry, config.public_playlist);
    let mailer = MailApiClient::new(config.mail.clone(), retry);
    let tracker = RunTracker::new(&config.data_dir);

    let generator = Generator::new(
        history,
        playlists,
        mailer,
        tracker,
        GeneratorOptions {
            playlist_name: config.playlist_name.clone(),
            top_tracks: config.top_tracks,
            lookback: config.lookback,
            deadline: config.deadline,
            dry_run: args.dry_run,
        },
    );

    let report = generator.run().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).wrap_err("Failed to serialize run report")?
    );

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
