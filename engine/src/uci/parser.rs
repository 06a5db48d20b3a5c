//! Parsing for the terminal `bestmove` line and UCI move notation.
//!
//! A UCI move is 4 or 5 characters: from-square, to-square, optional
//! promotion letter. This is the only response shape upstream consumers
//! need typed; everything else flows through the transport as raw text.

use cozy_chess::{File, Move, Piece, Rank, Square};

use super::UciError;

/// Parsed terminal `bestmove` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestMove {
    pub mv: Move,
    pub ponder: Option<Move>,
}

/// Parse a `bestmove <move> [ponder <move>]` line.
///
/// `bestmove (none)` (no legal move) is rejected as an invalid move; the
/// caller decides what a finished game means.
pub fn parse_bestmove(line: &str) -> Result<BestMove, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["bestmove", mv, rest @ ..] => {
            let mv = parse_uci_move(mv)?;
            let ponder = match rest {
                ["ponder", ponder, ..] => Some(parse_uci_move(ponder)?),
                _ => None,
            };
            Ok(BestMove { mv, ponder })
        }
        _ => Err(UciError::MalformedMessage(line.to_string())),
    }
}

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, UciError> {
    // Work on bytes throughout: indexing the str directly would panic on
    // move text containing a multi-byte character, and bad move text must
    // come back as an error.
    let bytes = s.as_bytes();
    if !matches!(bytes.len(), 4 | 5) {
        return Err(UciError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&bytes[0..2])?;
    let to = parse_square(&bytes[2..4])?;

    let promotion = match bytes.get(4) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return Err(UciError::InvalidPromotion(s.to_string())),
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(s: &[u8]) -> Result<Square, UciError> {
    let invalid = || UciError::InvalidSquare(String::from_utf8_lossy(s).into_owned());
    let &[file, rank] = s else {
        return Err(invalid());
    };
    let file = File::try_index(file.wrapping_sub(b'a') as usize);
    let rank = Rank::try_index(rank.wrapping_sub(b'1') as usize);
    match (file, rank) {
        (Some(file), Some(rank)) => Ok(Square::new(file, rank)),
        _ => Err(invalid()),
    }
}

/// Format move for UCI (cozy-chess Move -> "e2e4")
pub fn format_uci_move(mv: &Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(match promo {
            Piece::Queen => 'q',
            Piece::Rook => 'r',
            Piece::Bishop => 'b',
            Piece::Knight => 'n',
            _ => unreachable!(),
        });
    }
    s
}

fn format_square(sq: Square) -> String {
    let file = (b'a' + sq.file() as u8) as char;
    let rank = (b'1' + sq.rank() as u8) as char;
    format!("{}{}", file, rank)
}
