use crate::uci::UciError;

/// Errors surfaced by the transport and the process backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel has been terminated (or never came up); the transport
    /// instance cannot be used again.
    #[error("engine not available")]
    EngineUnavailable,
    /// The engine process could not be started.
    #[error("failed to spawn engine: {0}")]
    Spawn(String),
    /// The engine did not answer the `uci`/`isready` handshake in time.
    #[error("timed out waiting for engine handshake")]
    HandshakeTimeout,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Uci(#[from] UciError),
}
