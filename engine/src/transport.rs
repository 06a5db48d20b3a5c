//! Command-queue transport over a line-oriented engine channel.
//!
//! All queue mutation happens synchronously inside [`Transport::send`] and
//! [`Transport::handle_payload`]; the channel driver delivers payloads one
//! at a time, so no locking is needed inside the transport itself.

use std::collections::VecDeque;

use crate::channel::EngineChannel;
use crate::classify;
use crate::error::TransportError;

/// Completion callback: receives the full accumulated response text.
pub type OnComplete = Box<dyn FnOnce(String) + Send>;
/// Streaming callback: receives each line as it arrives.
pub type OnStream = Box<dyn FnMut(&str) + Send>;

/// Directives the engine never answers; sent but never queued.
const IMMEDIATE: [&str; 4] = ["ucinewgame", "flip", "stop", "ponderhit"];

/// Prefixes of lines that are never attributed to a queued command.
const UNATTRIBUTABLE: [&str; 3] = ["No such option", "id ", "Stockfish"];

/// One in-flight command and its accumulated response.
struct Command {
    text: String,
    on_complete: Option<OnComplete>,
    on_stream: Option<OnStream>,
    buffer: String,
    discard: bool,
}

/// Correlates the engine's unlabeled response stream back to the commands
/// that produced it.
///
/// One transport owns one channel exclusively. After [`Transport::quit`] the
/// instance is dead; a fresh one must be constructed for a new engine.
pub struct Transport<C: EngineChannel> {
    channel: Option<C>,
    queue: VecDeque<Command>,
    loaded: bool,
    ready: bool,
    stream: Option<OnStream>,
}

impl<C: EngineChannel> Transport<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Some(channel),
            queue: VecDeque::new(),
            loaded: false,
            ready: false,
            stream: None,
        }
    }

    /// Engine completed the `uci` handshake (`uciok` seen).
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    /// Engine confirmed readiness (`readyok` seen).
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Number of commands still awaiting a terminal line.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Subscribe to every raw line from the engine, delivered before any
    /// attribution or filtering.
    pub fn set_stream_hook(&mut self, hook: OnStream) {
        self.stream = Some(hook);
    }

    pub fn clear_stream_hook(&mut self) {
        self.stream = None;
    }

    /// Send a UCI command.
    ///
    /// Fire-and-forget directives (`ucinewgame`, `flip`, `stop`,
    /// `ponderhit`) and anything starting with `position` or `setoption`
    /// produce no engine response, so they are forwarded without tracking
    /// and their callbacks never fire. Every other command is queued until a
    /// terminal line completes it. Text reaches the channel synchronously,
    /// in call order.
    pub fn send(
        &mut self,
        text: &str,
        on_complete: Option<OnComplete>,
        on_stream: Option<OnStream>,
    ) -> Result<(), TransportError> {
        if self.channel.is_none() {
            return Err(TransportError::EngineUnavailable);
        }
        let text = text.trim().to_string();
        tracing::trace!("UCI >> {}", text);

        if !is_immediate(&text) {
            self.queue.push_back(Command {
                text: text.clone(),
                on_complete,
                on_stream,
                buffer: String::new(),
                discard: false,
            });
        }

        match self.channel.as_mut() {
            Some(channel) => channel.post_line(&text),
            None => Err(TransportError::EngineUnavailable),
        }
    }

    /// Mark the earliest queued command with this exact text as discarded:
    /// it still completes and leaves the queue, but its completion callback
    /// is suppressed. Used when a command is superseded, e.g. a pending
    /// `go infinite` whose result nobody wants after `stop`.
    pub fn mark_discard(&mut self, text: &str) {
        if let Some(cmd) = self.queue.iter_mut().find(|c| c.text == text) {
            cmd.discard = true;
        }
    }

    /// Process one raw payload from the channel.
    ///
    /// Payloads with embedded newlines are split and each non-blank
    /// sub-line is handled independently, in order, as if it had arrived on
    /// its own.
    pub fn handle_payload(&mut self, raw: &str) {
        for line in raw.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(line);
        }
    }

    fn handle_line(&mut self, line: &str) {
        tracing::trace!("UCI << {}", line);
        if let Some(hook) = self.stream.as_mut() {
            hook(line);
        }

        if self.queue.is_empty() || UNATTRIBUTABLE.iter().any(|p| line.starts_with(p)) {
            return;
        }

        let texts: Vec<&str> = self.queue.iter().map(|c| c.text.as_str()).collect();
        let idx = classify::attribute(line, &texts);

        let cmd = &mut self.queue[idx];
        if !cmd.buffer.is_empty() {
            cmd.buffer.push('\n');
        }
        cmd.buffer.push_str(line);
        if let Some(cb) = cmd.on_stream.as_mut() {
            cb(line);
        }

        // Completion state machine: first matching row decides.
        let done = if line == "uciok" {
            self.loaded = true;
            true
        } else if line == "readyok" {
            self.ready = true;
            true
        } else if line.starts_with("bestmove") && cmd.text != "bench" {
            // The bestmove line is the whole result; intermediate info
            // lines only ever mattered to the stream callback.
            cmd.buffer = line.to_string();
            true
        } else if cmd.text == "d" {
            line.starts_with("Legal uci moves") || line.starts_with("Key is")
        } else if cmd.text == "eval" {
            cmd.buffer.lines().any(|l| l.starts_with("Total Evaluation"))
        } else {
            line.starts_with("pawn key")
                || line.starts_with("Nodes/second")
                || line.starts_with("Unknown command")
        };

        if done {
            if let Some(cmd) = self.queue.remove(idx) {
                tracing::debug!(command = %cmd.text, "command complete");
                if !cmd.discard {
                    if let Some(cb) = cmd.on_complete {
                        cb(cmd.buffer);
                    }
                }
            }
        }
    }

    /// Terminate the channel and abandon all pending commands silently (no
    /// callback fires). Subsequent sends fail with
    /// [`TransportError::EngineUnavailable`]; a fresh transport is required
    /// to talk to an engine again.
    pub fn quit(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.terminate();
        }
        self.queue.clear();
        self.loaded = false;
        self.ready = false;
    }
}

fn is_immediate(text: &str) -> bool {
    IMMEDIATE.contains(&text) || text.starts_with("position") || text.starts_with("setoption")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryChannel {
        sent: Arc<Mutex<Vec<String>>>,
        terminated: Arc<Mutex<bool>>,
    }

    impl EngineChannel for MemoryChannel {
        fn post_line(&mut self, line: &str) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn terminate(&mut self) {
            *self.terminated.lock().unwrap() = true;
        }
    }

    fn transport() -> (Transport<MemoryChannel>, MemoryChannel) {
        let channel = MemoryChannel::default();
        (Transport::new(channel.clone()), channel)
    }

    /// Shared cell plus an `OnComplete` that records into it.
    fn completion_recorder() -> (Arc<Mutex<Vec<String>>>, OnComplete) {
        let cell = Arc::new(Mutex::new(Vec::new()));
        let writer = cell.clone();
        (
            cell,
            Box::new(move |response| writer.lock().unwrap().push(response)),
        )
    }

    fn stream_recorder() -> (Arc<Mutex<Vec<String>>>, OnStream) {
        let cell = Arc::new(Mutex::new(Vec::new()));
        let writer = cell.clone();
        (
            cell,
            Box::new(move |line: &str| writer.lock().unwrap().push(line.to_string())),
        )
    }

    #[test]
    fn immediate_commands_are_sent_but_never_queued() {
        let (mut transport, channel) = transport();
        let immediates = [
            "ucinewgame",
            "flip",
            "stop",
            "ponderhit",
            "position startpos moves e2e4",
            "setoption name Hash value 16",
        ];
        for cmd in immediates {
            let (completed, on_complete) = completion_recorder();
            transport.send(cmd, Some(on_complete), None).unwrap();
            assert_eq!(transport.pending(), 0, "{cmd} must not be queued");
            assert!(completed.lock().unwrap().is_empty());
        }
        assert_eq!(*channel.sent.lock().unwrap(), immediates);
    }

    #[test]
    fn queued_commands_reach_the_channel_trimmed_and_in_order() {
        let (mut transport, channel) = transport();
        transport.send("  uci  ", None, None).unwrap();
        transport.send("isready", None, None).unwrap();
        transport.send("go depth 3", None, None).unwrap();
        assert_eq!(transport.pending(), 3);
        assert_eq!(
            *channel.sent.lock().unwrap(),
            ["uci", "isready", "go depth 3"]
        );
    }

    #[test]
    fn uciok_completes_uci_and_sets_loaded() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("uci", Some(on_complete), None).unwrap();
        assert!(!transport.loaded());

        transport.handle_payload("uciok");
        assert!(transport.loaded());
        assert_eq!(transport.pending(), 0);
        assert_eq!(*completed.lock().unwrap(), ["uciok"]);
    }

    #[test]
    fn uci_accumulates_option_lines_before_uciok() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("uci", Some(on_complete), None).unwrap();

        // id/banner lines are filtered, option lines accumulate
        transport.handle_payload("Stockfish 16 by the Stockfish developers");
        transport.handle_payload("id name Stockfish 16");
        transport.handle_payload("option name Hash type spin default 16");
        transport.handle_payload("uciok");

        assert_eq!(
            *completed.lock().unwrap(),
            ["option name Hash type spin default 16\nuciok"]
        );
    }

    #[test]
    fn readyok_completes_isready_and_sets_ready() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("isready", Some(on_complete), None).unwrap();
        assert!(!transport.ready());

        transport.handle_payload("readyok");
        assert!(transport.ready());
        assert_eq!(*completed.lock().unwrap(), ["readyok"]);
    }

    #[test]
    fn go_streams_info_lines_and_completes_with_bestmove_only() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        let (streamed, on_stream) = stream_recorder();
        transport
            .send("go depth 10", Some(on_complete), Some(on_stream))
            .unwrap();

        transport.handle_payload("info depth 1 score cp 20 pv e2e4");
        transport.handle_payload("info depth 2 score cp 35 pv e2e4 e7e5");
        transport.handle_payload("bestmove e2e4 ponder e7e5");

        assert_eq!(streamed.lock().unwrap().len(), 3);
        assert_eq!(*completed.lock().unwrap(), ["bestmove e2e4 ponder e7e5"]);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn d_completes_on_key_is_with_full_buffer() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        let (streamed, on_stream) = stream_recorder();
        transport
            .send("d", Some(on_complete), Some(on_stream))
            .unwrap();

        transport.handle_payload("Fen: rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        transport.handle_payload("Checkers:");
        transport.handle_payload("Key is 0x463B96181691FC9C");

        assert_eq!(streamed.lock().unwrap().len(), 3);
        assert_eq!(
            *completed.lock().unwrap(),
            ["Fen: rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\nCheckers:\nKey is 0x463B96181691FC9C"]
        );
    }

    #[test]
    fn eval_completes_on_total_evaluation_block() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("eval", Some(on_complete), None).unwrap();

        transport.handle_payload("Contributing terms for the classical eval:");
        transport.handle_payload("Total Evaluation: 0.25 (white side)");

        let completed = completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].ends_with("Total Evaluation: 0.25 (white side)"));
    }

    #[test]
    fn two_go_commands_resolve_fifo_within_family() {
        let (mut transport, _channel) = transport();
        let (first, on_first) = completion_recorder();
        let (second, on_second) = completion_recorder();
        transport.send("go depth 5", Some(on_first), None).unwrap();
        transport.send("go depth 8", Some(on_second), None).unwrap();

        transport.handle_payload("info depth 1 score cp 10");
        transport.handle_payload("bestmove e2e4");
        assert_eq!(*first.lock().unwrap(), ["bestmove e2e4"]);
        assert!(second.lock().unwrap().is_empty());
        assert_eq!(transport.pending(), 1);

        transport.handle_payload("bestmove d2d4");
        assert_eq!(*second.lock().unwrap(), ["bestmove d2d4"]);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn multiline_payload_is_split_into_independent_lines() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        let (streamed, on_stream) = stream_recorder();
        transport
            .send("go depth 2", Some(on_complete), Some(on_stream))
            .unwrap();

        transport.handle_payload("info depth 1 score cp 5\r\nbestmove g1f3\n");

        assert_eq!(
            *streamed.lock().unwrap(),
            ["info depth 1 score cp 5", "bestmove g1f3"]
        );
        assert_eq!(*completed.lock().unwrap(), ["bestmove g1f3"]);
    }

    #[test]
    fn bench_at_head_swallows_lines_and_completes_on_nodes_per_second() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("bench", Some(on_complete), None).unwrap();

        // bestmove lines during bench do not complete it
        transport.handle_payload("info depth 10 score cp 40");
        transport.handle_payload("bestmove e2e4");
        assert_eq!(transport.pending(), 1);

        transport.handle_payload("Nodes/second    : 1234567");
        assert_eq!(transport.pending(), 0);
        assert_eq!(
            *completed.lock().unwrap(),
            ["info depth 10 score cp 40\nbestmove e2e4\nNodes/second    : 1234567"]
        );
    }

    #[test]
    fn unknown_command_line_completes_via_generic_terminator() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("frobnicate", Some(on_complete), None).unwrap();

        transport.handle_payload("Unknown command: 'frobnicate'. Type help for more information.");
        assert_eq!(transport.pending(), 0);
        assert_eq!(completed.lock().unwrap().len(), 1);
    }

    #[test]
    fn stream_hook_sees_every_raw_line_including_unattributed() {
        let (mut transport, _channel) = transport();
        let (seen, hook) = stream_recorder();
        transport.set_stream_hook(hook);

        // queue empty: lines are dropped after the hook fires
        transport.handle_payload("Stockfish 16 by the Stockfish developers");
        transport.handle_payload("id name Stockfish 16");
        transport.handle_payload("readyok");

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn discarded_command_completes_silently() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("go infinite", Some(on_complete), None).unwrap();
        transport.mark_discard("go infinite");

        transport.handle_payload("bestmove e2e4");
        assert_eq!(transport.pending(), 0);
        assert!(completed.lock().unwrap().is_empty());
    }

    #[test]
    fn quit_terminates_channel_and_rejects_further_sends() {
        let (mut transport, channel) = transport();
        transport.send("uci", None, None).unwrap();
        transport.handle_payload("uciok");
        assert!(transport.loaded());

        transport.quit();
        assert!(*channel.terminated.lock().unwrap());
        assert!(!transport.loaded());
        assert!(!transport.ready());
        assert_eq!(transport.pending(), 0);

        let sent_before = channel.sent.lock().unwrap().len();
        assert!(matches!(
            transport.send("isready", None, None),
            Err(TransportError::EngineUnavailable)
        ));
        assert_eq!(channel.sent.lock().unwrap().len(), sent_before);
    }

    #[test]
    fn quit_abandons_pending_commands_without_callbacks() {
        let (mut transport, _channel) = transport();
        let (completed, on_complete) = completion_recorder();
        transport.send("go infinite", Some(on_complete), None).unwrap();

        transport.quit();
        assert!(completed.lock().unwrap().is_empty());
    }
}
