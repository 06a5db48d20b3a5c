//! UCI engine transport.
//!
//! UCI engines speak a line-oriented text protocol with no request
//! identifiers: the caller writes command lines, the engine streams back
//! response lines, and nothing on the wire says which response belongs to
//! which command. The [`Transport`] in this crate closes that gap. It keeps
//! an ordered queue of in-flight commands, classifies every incoming line
//! against the queue using UCI vocabulary, accumulates the lines per
//! command, and fires per-command completion/streaming callbacks once a
//! terminal line arrives.
//!
//! The channel to the engine is an injectable trait ([`EngineChannel`]), so
//! the correlation logic runs identically over a real subprocess
//! ([`StockfishEngine`]) or a scripted in-memory channel in tests.

mod classify;
mod error;

pub mod channel;
pub mod stockfish;
pub mod transport;
pub mod uci;

pub use channel::EngineChannel;
pub use error::TransportError;
pub use stockfish::{EngineConfig, StockfishEngine};
pub use transport::{OnComplete, OnStream, Transport};
pub use uci::{BestMove, UciError};

/// Parameters for the "go" command
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,     // Search depth
    pub infinite: bool,        // Search until "stop"
}

impl GoParams {
    /// Render as a `go` command line. Falls back to a one second movetime
    /// when no limit is set so a bare `go` never searches forever.
    pub fn to_command(&self) -> String {
        if let Some(movetime) = self.movetime {
            format!("go movetime {}", movetime)
        } else if let Some(depth) = self.depth {
            format!("go depth {}", depth)
        } else if self.infinite {
            "go infinite".to_string()
        } else {
            "go movetime 1000".to_string()
        }
    }
}
