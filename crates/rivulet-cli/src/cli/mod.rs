//! CLI for the rivulet streaming client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use rivulet_core::config;

use commands::{run_completions, run_config, run_man, run_tail, TailOptions};

/// Top-level CLI for rivulet.
#[derive(Debug, Parser)]
#[command(name = "rivulet")]
#[command(about = "rivulet: resilient client for long-lived HTTP streams", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Stream a newline-delimited HTTP response to stdout, reconnecting on transient failures.
    Tail {
        /// HTTP/HTTPS URL of the stream.
        url: String,

        /// Extra request header, `Name: value`. May be repeated.
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        headers: Vec<String>,

        /// Parse each line as JSON and print it compacted; invalid lines end the stream.
        #[arg(long)]
        json: bool,

        /// Stop after N tokens.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Show the config file path and the effective configuration.
    Config,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page (roff).
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Tail {
                url,
                headers,
                json,
                limit,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let opts = TailOptions {
                    url,
                    headers,
                    json,
                    limit,
                };
                run_tail(&cfg, &opts).await?;
            }
            CliCommand::Config => {
                let cfg = config::load_or_init()?;
                run_config(&cfg)?;
            }
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
