//! # relayd
//!
//! `relayd serve` runs the gateway; `relayd chat` is a line-oriented client
//! for poking at a running relay.

#![deny(unsafe_code)]

mod chat;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

/// Presence-aware message relay.
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about = "Presence-aware WebSocket message relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gateway.
    Serve(ServeArgs),
    /// Connect as a client, send stdin lines, print received payloads.
    Chat(ChatArgs),
}

/// `relayd serve` flags. Each overrides the settings file.
#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Use the `SQLite` registry at this path.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

/// `relayd chat` flags.
#[derive(Args, Debug)]
struct ChatArgs {
    /// Bearer token.
    #[arg(long)]
    token: String,

    /// Client id the token was issued to.
    #[arg(long)]
    client_id: String,

    /// Issuer id the token comes from.
    #[arg(long)]
    user_pool_id: String,

    /// Relay endpoint (default from settings).
    #[arg(long)]
    url: Option<String>,

    /// Heartbeat period in seconds, 0 to disable (default from settings).
    #[arg(long)]
    heartbeat: Option<u64>,

    /// `Type` of outgoing application messages.
    #[arg(long = "type", default_value = "chat")]
    kind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Serve(args) => serve::run(args).await,
        Command::Chat(args) => chat::run(args).await,
    }
}
