//! bulkmail command-line tool

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{SendCommand, SendersCommand, ServeCommand};

#[derive(Debug, Parser)]
#[command(name = "bulkmail")]
#[command(version)]
#[command(about = "Send one message to many recipients, one at a time", long_about = None)]
struct Cli {
    /// Emit JSON log lines instead of pretty output
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the delivery endpoint
    Serve(ServeCommand),
    /// List the configured sender addresses
    Senders(SendersCommand),
    /// Run a campaign against a delivery endpoint
    Send(SendCommand),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(cmd) => {
            cmd.execute(cli.log_json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Senders(cmd) => {
            cmd.execute()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Send(cmd) => {
            let all_sent = cmd.execute(cli.log_json).await?;
            Ok(if all_sent {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
