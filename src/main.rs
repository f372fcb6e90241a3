//! tubekey - OAuth2 token manager and YouTube Data API gateway
//!
//! Keeps a YouTube OAuth2 credential fresh on disk and serves channel,
//! playlist and video metadata over HTTP or the command line.

mod api;
mod auth;
mod config;
mod models;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "tubekey")]
#[command(about = "OAuth2 token manager and API gateway for YouTube", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Authorize access to your YouTube account
    Login {
        /// Authorization code from the consent redirect
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Show current authentication status
    Status,

    /// Refresh the stored token if it has expired
    Refresh,

    /// Show channel details
    Channel { channel_id: String },

    /// Show playlist details
    Playlist { playlist_id: String },

    /// List the videos of a playlist
    Videos {
        playlist_id: String,

        /// Maximum number of videos to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Show video details
    Video { video_id: String },

    /// Print the HTML snippet embedding a playlist
    Embed { playlist_id: String },

    /// Open a playlist and its first video in the browser
    Play {
        playlist_id: String,

        /// Local time (HH:MM) the first video should line up with
        #[arg(short, long, default_value = "00:00")]
        at: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let state = AppState::from_config(&config)?;
            server::serve(state, &config).await?;
        }
        Commands::Login { code } => {
            tracing::info!("Starting authentication flow...");
            let state = AppState::from_config(&config)?;
            auth::login(&state.oauth, &state.manager, code.as_deref()).await?;
        }
        Commands::Status => {
            let state = AppState::from_config(&config)?;
            auth::status(&state.manager);
        }
        Commands::Refresh => {
            let state = AppState::from_config(&config)?;
            auth::refresh(&state.manager).await?;
        }
        Commands::Channel { channel_id } => {
            let state = AppState::from_config(&config)?;
            api::channels::show_channel(&state.youtube, &channel_id).await?;
        }
        Commands::Playlist { playlist_id } => {
            let state = AppState::from_config(&config)?;
            api::playlists::show_playlist(&state.youtube, &playlist_id).await?;
        }
        Commands::Videos { playlist_id, limit } => {
            tracing::info!("Fetching playlist videos...");
            let state = AppState::from_config(&config)?;
            api::playlists::list_playlist_videos(&state.youtube, &playlist_id, limit).await?;
        }
        Commands::Video { video_id } => {
            let state = AppState::from_config(&config)?;
            api::videos::show_video(&state.youtube, &video_id).await?;
        }
        Commands::Embed { playlist_id } => {
            println!("{}", api::embed::embed_code(&playlist_id));
        }
        Commands::Play { playlist_id, at } => {
            let state = AppState::from_config(&config)?;
            api::embed::play_playlist(&state.youtube, &playlist_id, &at).await?;
        }
    }

    Ok(())
}
