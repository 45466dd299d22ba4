//! Command-line interface for filerelay.
//!
//! Provides commands for running the relay bot, pushing a single file
//! through the upload sink, and inspecting the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::adapters::{TelegramClient, TelegramConfig, UploadClient};
use crate::config::{Settings, UploadSettings};
use crate::core::{health, Relay, Supervisor, TempStorage};

/// filerelay - relay chat attachments to a file-hosting service
#[derive(Parser, Debug)]
#[command(name = "filerelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot and the liveness endpoint (default)
    Serve {
        /// Liveness port (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Staging directory (overrides FILERELAY_STAGING_DIR)
        #[arg(long)]
        staging_dir: Option<PathBuf>,
    },

    /// Upload a local file and print its download link
    Upload {
        /// File to upload
        file: PathBuf,

        /// Name to upload under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command.unwrap_or(Commands::Serve {
            port: None,
            staging_dir: None,
        }) {
            Commands::Serve { port, staging_dir } => cmd_serve(port, staging_dir).await,
            Commands::Upload { file, name } => cmd_upload(file, name).await,
            Commands::Config => cmd_config(),
        }
    }
}

fn load_settings() -> Result<Settings> {
    Settings::load().map_err(|e| {
        error!("{}", e);
        anyhow::Error::new(e)
    })
}

async fn cmd_serve(port: Option<u16>, staging_dir: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(port) = port {
        settings.liveness_addr.set_port(port);
    }
    if let Some(dir) = staging_dir {
        settings.staging_dir = dir;
    }

    info!("Starting bot...");

    let telegram = Arc::new(TelegramClient::from_config(TelegramConfig {
        bot_token: settings.bot_token.clone(),
        api_base: settings.telegram_api_base.clone(),
        poll_timeout_secs: settings.poll_timeout.as_secs(),
    }));

    let uploader = UploadClient::new(&settings.upload_base)
        .context("Invalid upload configuration")?
        .with_timeout(settings.upload_timeout);
    let storage = TempStorage::new(&settings.staging_dir).with_isolated_runs(settings.isolate_runs);

    let relay = Arc::new(Relay::new(telegram.clone(), uploader, storage));
    let supervisor =
        Supervisor::new(telegram, relay).with_max_concurrent_runs(settings.max_concurrent_runs);

    let listener = health::bind(settings.liveness_addr).await?;
    supervisor.run(listener).await
}

async fn cmd_upload(file: PathBuf, name: Option<String>) -> Result<()> {
    // Uploading does not need a bot token, but a broken config is still fatal
    let settings = UploadSettings::load().map_err(|e| {
        error!("{}", e);
        e
    })?;

    let name = match name {
        Some(n) => n,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("File path has no file name")?,
    };

    let client = UploadClient::new(&settings.upload_base)?.with_timeout(settings.upload_timeout);
    let link = client.upload(&file, &name).await?;
    println!("{}", link);
    Ok(())
}

fn cmd_config() -> Result<()> {
    let settings = load_settings()?;

    println!("filerelay configuration");
    println!("=======================");
    println!();
    match &settings.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using env/defaults)"),
    }
    println!("Bot token:            {}", settings.redacted_token());
    println!("Telegram API:         {}", settings.telegram_api_base);
    println!("Poll timeout:         {:?}", settings.poll_timeout);
    println!("Liveness address:     {}", settings.liveness_addr);
    println!("Staging directory:    {}", settings.staging_dir.display());
    println!("Isolate runs:         {}", settings.isolate_runs);
    println!("Upload base:          {}", settings.upload_base);
    println!("Upload timeout:       {:?}", settings.upload_timeout);
    match settings.max_concurrent_runs {
        Some(n) => println!("Max concurrent runs:  {}", n),
        None => println!("Max concurrent runs:  unbounded"),
    }
    Ok(())
}
