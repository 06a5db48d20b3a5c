//! Attribution policy: deciding which queued command a response line
//! belongs to.
//!
//! Kept as pure functions over a snapshot of the queued command texts so the
//! policy can be unit-tested table-style, without a transport or channel.

/// Response-line family, derived from the line's leading token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    /// `uciok` and `option` lines, produced by the `uci` handshake.
    Uci,
    /// `readyok`, produced by `isready`.
    IsReady,
    /// `bestmove` and `info` lines, produced by a search.
    Go,
    /// Anything else: board dumps, eval tables, diagnostics.
    Other,
}

pub(crate) fn line_family(line: &str) -> Family {
    match leading_token(line) {
        "uciok" | "option" => Family::Uci,
        "readyok" => Family::IsReady,
        "bestmove" | "info" => Family::Go,
        _ => Family::Other,
    }
}

fn leading_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

/// Index of the queued command the line is attributed to.
///
/// `commands` is the FIFO queue snapshot (exact command texts) and must be
/// non-empty. A `bench` or `perft` at the head swallows every line while it
/// is outstanding, since their output is too heterogeneous to classify by
/// shape. Otherwise the earliest command matching the line's family wins;
/// lines of no known family go to the earliest `d` or `eval`.
///
/// Anything still unmatched is attributed to the head of the queue. That
/// fallback can misattribute responses when unrelated command families are
/// pipelined; it is preserved as-is for compatibility, favoring eventual
/// progress over strict correctness.
pub(crate) fn attribute(line: &str, commands: &[&str]) -> usize {
    if matches!(commands[0], "bench" | "perft") {
        return 0;
    }
    let family = line_family(line);
    commands
        .iter()
        .position(|cmd| match family {
            Family::Uci => leading_token(cmd) == "uci",
            Family::IsReady => leading_token(cmd) == "isready",
            Family::Go => leading_token(cmd) == "go",
            Family::Other => matches!(leading_token(cmd), "d" | "eval"),
        })
        .unwrap_or(0)
}
