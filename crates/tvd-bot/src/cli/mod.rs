//! CLI for the TVD bot: run the bot, plus admin and diagnostic commands.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tvd_core::config::{self, TvdConfig};
use tvd_core::store::Store;

use commands::{
    run_ban, run_bot, run_checksum, run_jobs, run_premium, run_probe, run_stats, run_users,
};

/// Top-level CLI for the TVD video download bot.
#[derive(Debug, Parser)]
#[command(name = "tvd")]
#[command(about = "TVD: Telegram bot that downloads videos, audio and subtitles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the Telegram bot and the download workers.
    Run {
        /// Override max_concurrent_downloads from the config.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Show global usage statistics.
    Stats,

    /// List users, most active first.
    Users {
        #[arg(long, default_value = "20", value_name = "N")]
        limit: i64,
    },

    /// Ban a user by Telegram id.
    Ban {
        user_id: i64,
    },

    /// Lift a ban.
    Unban {
        user_id: i64,
    },

    /// Grant (or with --off, revoke) the premium flag.
    Premium {
        user_id: i64,
        #[arg(long)]
        off: bool,
    },

    /// Show recent download jobs.
    Jobs {
        #[arg(long, default_value = "20", value_name = "N")]
        limit: i64,
    },

    /// Probe a URL with the extractor and print its formats.
    Probe {
        url: String,
    },

    /// Compute SHA-256 of a file (e.g. a file kept because it was too large to send).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run { workers } => run_bot(cfg, workers).await?,
            CliCommand::Stats => run_stats(&open_store(&cfg).await?).await?,
            CliCommand::Users { limit } => run_users(&open_store(&cfg).await?, limit).await?,
            CliCommand::Ban { user_id } => run_ban(&open_store(&cfg).await?, user_id, true).await?,
            CliCommand::Unban { user_id } => {
                run_ban(&open_store(&cfg).await?, user_id, false).await?
            }
            CliCommand::Premium { user_id, off } => {
                run_premium(&open_store(&cfg).await?, user_id, !off).await?
            }
            CliCommand::Jobs { limit } => run_jobs(&open_store(&cfg).await?, limit).await?,
            CliCommand::Probe { url } => run_probe(&cfg, &url).await?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
        }

        Ok(())
    }
}

async fn open_store(cfg: &TvdConfig) -> Result<Store> {
    Store::open_at(cfg.resolved_database_path()?).await
}

#[cfg(test)]
mod tests;
