//! Stockfish subprocess backend.
//!
//! Wires a piped child process into the [`Transport`]: a writer task
//! serializes outbound lines into stdin, a reader task feeds stdout back
//! into the transport one line at a time. The reader task is the only
//! caller of `handle_payload`, which preserves the transport's ordered,
//! non-overlapping delivery contract.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use cozy_chess::Move;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};

use crate::channel::EngineChannel;
use crate::error::TransportError;
use crate::transport::{OnComplete, OnStream, Transport};
use crate::uci::{format_uci_move, parse_bestmove, BestMove};
use crate::GoParams;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Channel backed by the stdin writer task of the engine process.
pub struct ProcessChannel {
    stdin_tx: mpsc::UnboundedSender<String>,
}

impl EngineChannel for ProcessChannel {
    fn post_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.stdin_tx
            .send(line.to_string())
            .map_err(|_| TransportError::EngineUnavailable)
    }

    fn terminate(&mut self) {
        // Ask the engine to exit; the transport drops this channel right
        // after, which closes the sender and stops the writer task.
        let _ = self.stdin_tx.send("quit".to_string());
    }
}

/// Configuration for spawning the engine process.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Explicit engine binary; when unset, common install locations and
    /// `PATH` are searched.
    pub engine_path: Option<PathBuf>,
    pub skill_level: Option<u8>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

/// A running Stockfish process behind a [`Transport`].
pub struct StockfishEngine {
    transport: Arc<Mutex<Transport<ProcessChannel>>>,
    process: Child,
}

impl StockfishEngine {
    /// Spawn a Stockfish process and complete the UCI handshake.
    ///
    /// Fails without returning a partial instance if the binary cannot be
    /// found or started, or if the engine does not answer `uci`/`isready`
    /// within ten seconds.
    #[tracing::instrument(level = "info")]
    pub async fn spawn(config: EngineConfig) -> Result<Self, TransportError> {
        let path = match config.engine_path.clone() {
            Some(path) => path,
            None => find_stockfish_path()
                .ok_or_else(|| TransportError::Spawn("Stockfish not found".to_string()))?,
        };
        tracing::info!("Spawning engine at {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", path.display(), e)))?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("engine has no stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("engine has no stdout".to_string()))?;

        // Stdin writer task: serializes all outbound lines.
        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = stdin_rx.recv().await {
                if let Err(e) = stdin.write_all(format!("{}\n", line).as_bytes()).await {
                    tracing::error!("Failed to write to engine stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush engine stdin: {}", e);
                    break;
                }
            }
            tracing::debug!("Stdin writer task exiting");
        });

        let transport = Arc::new(Mutex::new(Transport::new(ProcessChannel { stdin_tx })));

        // Stdout reader task: feeds the transport one payload at a time.
        let transport_reader = Arc::clone(&transport);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF");
                        break;
                    }
                    Ok(_) => transport_reader.lock().handle_payload(&line),
                    Err(e) => {
                        tracing::error!("Error reading engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Output reader task exiting");
        });

        let engine = Self { transport, process };

        tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.request("uci"))
            .await
            .map_err(|_| TransportError::HandshakeTimeout)??;
        tracing::debug!("Received uciok");
        tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.request("isready"))
            .await
            .map_err(|_| TransportError::HandshakeTimeout)??;
        tracing::debug!("Received readyok");

        if let Some(level) = config.skill_level {
            let level = level.min(20);
            tracing::info!("Setting Skill Level to {}", level);
            engine.send(
                &format!("setoption name Skill Level value {}", level),
                None,
                None,
            )?;
        }
        if let Some(threads) = config.threads {
            let threads = threads.clamp(1, 16);
            tracing::info!("Setting Threads to {}", threads);
            engine.send(
                &format!("setoption name Threads value {}", threads),
                None,
                None,
            )?;
        }
        if let Some(hash_mb) = config.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            tracing::info!("Setting Hash to {} MB", hash_mb);
            engine.send(
                &format!("setoption name Hash value {}", hash_mb),
                None,
                None,
            )?;
        }

        tracing::info!("Engine spawned and initialized");
        Ok(engine)
    }

    /// Send a raw UCI command with optional callbacks.
    pub fn send(
        &self,
        text: &str,
        on_complete: Option<OnComplete>,
        on_stream: Option<OnStream>,
    ) -> Result<(), TransportError> {
        self.transport.lock().send(text, on_complete, on_stream)
    }

    /// Send a command and await its full accumulated response.
    pub async fn request(&self, text: &str) -> Result<String, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.send(
            text,
            Some(Box::new(move |response| {
                let _ = tx.send(response);
            })),
            None,
        )?;
        rx.await.map_err(|_| TransportError::EngineUnavailable)
    }

    /// Subscribe to every raw line coming back from the engine.
    pub fn set_stream_hook(&self, hook: OnStream) {
        self.transport.lock().set_stream_hook(hook);
    }

    pub fn loaded(&self) -> bool {
        self.transport.lock().loaded()
    }

    pub fn ready(&self) -> bool {
        self.transport.lock().ready()
    }

    /// Reset the engine for a new game.
    pub fn new_game(&self) -> Result<(), TransportError> {
        self.send("ucinewgame", None, None)
    }

    /// Set the current position from a FEN and an optional move list.
    pub fn set_position(&self, fen: &str, moves: &[Move]) -> Result<(), TransportError> {
        let mut cmd = format!("position fen {}", fen);
        if !moves.is_empty() {
            cmd.push_str(" moves");
            for mv in moves {
                cmd.push(' ');
                cmd.push_str(&format_uci_move(mv));
            }
        }
        self.send(&cmd, None, None)
    }

    /// Ask the engine to stop the current search. The pending `go` still
    /// completes through its `bestmove` line; use [`discard`](Self::discard)
    /// first if that result should be dropped.
    pub fn stop(&self) -> Result<(), TransportError> {
        self.send("stop", None, None)
    }

    /// Suppress the completion callback of the earliest queued command with
    /// this exact text.
    pub fn discard(&self, text: &str) {
        self.transport.lock().mark_discard(text);
    }

    /// Start a search and await the terminal `bestmove` line.
    pub async fn go(&self, params: &GoParams) -> Result<String, TransportError> {
        self.request(&params.to_command()).await
    }

    /// Start a search and return the parsed best move.
    pub async fn best_move(&self, params: &GoParams) -> Result<BestMove, TransportError> {
        let line = self.go(params).await?;
        Ok(parse_bestmove(&line)?)
    }

    /// Shut the engine down: terminate the transport, give the process a
    /// moment to exit on `quit`, then kill it.
    pub async fn shutdown(mut self) {
        self.transport.lock().quit();
        let _ = tokio::time::timeout(Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

/// Find a Stockfish executable in common locations.
fn find_stockfish_path() -> Option<PathBuf> {
    let candidates = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    for candidate in candidates {
        let path = Path::new(candidate);
        if path.exists() || candidate == "stockfish" {
            let probe = std::process::Command::new(candidate)
                .arg("--help")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if probe.is_ok() {
                return Some(PathBuf::from(candidate));
            }
        }
    }

    None
}
