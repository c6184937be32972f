//! Desk Control - CLI client for the helpdesk daemon
//!
//! Provides operator access to ticket ingestion, pipeline stepping,
//! approval decisions, and queue inspection.

mod client;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::DeskdClient;

#[derive(Parser)]
#[command(name = "deskctl")]
#[command(about = "Helpdesk automation - operator CLI", long_about = None)]
#[command(version = desk_common::VERSION)]
struct Cli {
    /// Daemon address
    #[arg(long, default_value = client::DEFAULT_BASE_URL)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon health and queue counters
    Health,

    /// Ingest a JSON ticket batch file
    Ingest {
        /// Path to a JSON array of tickets
        file: String,
    },

    /// Process the next ticket in the backlog
    ProcessNext,

    /// Show the processing timeline, newest first
    Timeline,

    /// List tickets awaiting human approval
    Pending,

    /// Approve a pending ticket (terminal, keeps the candidate answer)
    Approve {
        /// Ticket id
        ticket_id: i64,
    },

    /// Reject a pending ticket (sends it to the scheduler)
    Reject {
        /// Ticket id
        ticket_id: i64,
    },

    /// Show scheduler lane depths and credits
    Queues,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DeskdClient::new(&cli.url)?;

    match cli.command {
        Commands::Health => commands::health(&client).await,
        Commands::Ingest { file } => commands::ingest(&client, &file).await,
        Commands::ProcessNext => commands::process_next(&client).await,
        Commands::Timeline => commands::timeline(&client).await,
        Commands::Pending => commands::pending(&client).await,
        Commands::Approve { ticket_id } => commands::resolve(&client, ticket_id, true).await,
        Commands::Reject { ticket_id } => commands::resolve(&client, ticket_id, false).await,
        Commands::Queues => commands::queues(&client).await,
    }
}
