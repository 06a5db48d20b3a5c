//! Raw UCI command console.
//!
//! Spawns a Stockfish process behind the transport and forwards stdin lines
//! to it verbatim. Engine output is echoed through the transport's global
//! stream hook, so every raw line shows up regardless of which command it
//! belongs to. Useful for poking at the engine by hand:
//!
//! ```text
//! $ uci-console
//! > position startpos moves e2e4
//! > go depth 12
//! info depth 1 seldepth 2 ...
//! bestmove e7e5 ponder g1f3
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use engine::{EngineConfig, StockfishEngine};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive console for sending raw UCI commands to a Stockfish engine.
#[derive(Parser)]
#[command(name = "uci-console", about = "Send raw UCI commands to a Stockfish engine")]
struct Cli {
    /// Path to the engine binary. Defaults to searching common install
    /// locations and PATH.
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Stockfish skill level (0-20).
    #[arg(long)]
    skill: Option<u8>,

    /// Number of search threads.
    #[arg(long)]
    threads: Option<u32>,

    /// Hash table size in MB.
    #[arg(long)]
    hash: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let engine = StockfishEngine::spawn(EngineConfig {
        engine_path: cli.engine,
        skill_level: cli.skill,
        threads: cli.threads,
        hash_mb: cli.hash,
    })
    .await
    .context("failed to start engine")?;

    // Firehose, not a per-command viewer: echo every raw engine line.
    engine.set_stream_hook(Box::new(|line| println!("{}", line)));

    println!("UCI console ready. Type UCI commands; 'quit' exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Err(e) = engine.send(line, None, None) {
            tracing::error!("Failed to send command: {}", e);
            break;
        }
    }

    engine.shutdown().await;
    Ok(())
}
