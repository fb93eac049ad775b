use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::client::RemoClipClient;
use crate::config::Config;
use crate::server;

/// Exit code for failed requests and other runtime errors
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for invalid command-line arguments
pub const EXIT_USAGE: i32 = 2;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("REMOCLIP_TARGET"),
    ", built ",
    env!("REMOCLIP_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "remoclip")]
#[command(about = "Shared clipboard for several hosts over HTTP")]
#[command(version, long_version = LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    #[command(about = "Run the clipboard server")]
    Serve,

    #[command(visible_alias = "c", about = "Send stdin to the server clipboard and echo it")]
    Copy,

    #[command(visible_alias = "p", about = "Print the server clipboard")]
    Paste {
        /// Paste history entry ID instead of the live clipboard
        #[arg(long, value_parser = parse_id)]
        id: Option<i64>,
    },

    #[command(visible_alias = "h", about = "Show clipboard history as JSON")]
    History {
        #[arg(short, long, value_parser = parse_limit)]
        limit: Option<u32>,

        #[arg(long, value_parser = parse_id)]
        id: Option<i64>,
    },

    #[command(visible_alias = "d", about = "Delete a history entry")]
    Delete {
        #[arg(long, value_parser = parse_id)]
        id: i64,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

fn parse_id(raw: &str) -> Result<i64, String> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err("id must be a positive integer".to_string()),
    }
}

fn parse_limit(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err("limit must be a positive integer".to_string()),
    }
}

pub struct CliHandler {
    config_path: Option<PathBuf>,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    fn load_config(&self) -> Result<Config> {
        Config::load_config(self.config_path.as_deref()).context("Failed to load configuration")
    }

    fn client(&self) -> Result<RemoClipClient> {
        let config = self.load_config()?;
        let client = RemoClipClient::from_config(&config).context("Failed to create client")?;
        debug!("Sending requests as {}", client.hostname());
        Ok(client)
    }

    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Serve => self.serve().await,
            Commands::Copy => self.copy_stdin().await,
            Commands::Paste { id } => self.paste(id).await,
            Commands::History { limit, id } => self.show_history(limit, id).await,
            Commands::Delete { id } => self.delete(id).await,
            Commands::Config { action } => self.handle_config_action(action),
        }
    }

    async fn serve(&self) -> Result<()> {
        let config = self.load_config()?;
        info!(
            "Starting remoclip server on {}:{}",
            config.server.host, config.server.port
        );
        server::run(&config).await
    }

    async fn copy_stdin(&self) -> Result<()> {
        let client = self.client()?;

        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read stdin")?;

        client.copy(&content).await?;
        write_stdout(&content).await
    }

    async fn paste(&self, id: Option<i64>) -> Result<()> {
        let content = self.client()?.paste(id).await?;
        write_stdout(&content).await
    }

    async fn show_history(&self, limit: Option<u32>, id: Option<i64>) -> Result<()> {
        let history = self.client()?.history(limit, id).await?;
        println!("{}", serde_json::to_string_pretty(&history)?);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.client()?.delete(id).await?;
        println!("Deleted history entry {}", id);
        Ok(())
    }

    fn handle_config_action(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                let config = self.load_config()?;
                print!("{}", toml::to_string_pretty(&config.redacted())?);
            }
            ConfigAction::Init { force } => {
                let path = self.init_path()?;
                Config::write_example(&path, force)?;
                println!("Example configuration written to {}", path.display());
            }
            ConfigAction::Validate => {
                self.load_config()?;
                println!("Configuration is valid");
            }
        }
        Ok(())
    }

    fn init_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Config::default_path()
                .context("Could not determine the configuration directory"),
        }
    }
}

/// Write `content` to stdout without adding a newline
async fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(content.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
