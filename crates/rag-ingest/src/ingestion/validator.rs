//! Chunk quality heuristics

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Default minimum trimmed length for a chunk
pub const DEFAULT_MIN_LENGTH: usize = 100;

const REPETITION_TOKEN_FLOOR: usize = 20;
const MIN_UNIQUE_RATIO: f64 = 0.3;
const MAX_IDENTIFIER_LINE_RATIO: f64 = 0.7;
const MIN_ALPHA_DENSITY: f64 = 0.4;

fn identifier_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{3,}[0-9]{5,}$").expect("Invalid regex"))
}

/// Rule that rejected a chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Trimmed length below the floor
    TooShort { length: usize, min_length: usize },
    /// Too few distinct tokens
    Repetitive { unique_ratio: f64 },
    /// Mostly identifier lines
    IdentifierLines { ratio: f64 },
    /// Mostly digits and symbols
    LowAlphabetic { density: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { length, min_length } => {
                write!(f, "too short ({} < {} chars)", length, min_length)
            }
            Self::Repetitive { unique_ratio } => {
                write!(f, "repetitive (unique token ratio {:.2})", unique_ratio)
            }
            Self::IdentifierLines { ratio } => {
                write!(f, "identifier lines ({:.0}% of lines)", ratio * 100.0)
            }
            Self::LowAlphabetic { density } => {
                write!(f, "low alphabetic density ({:.2})", density)
            }
        }
    }
}

/// Check a chunk, returning the first rule that rejects it
pub fn validate_chunk(text: &str, min_length: usize) -> Result<(), Rejection> {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length < min_length {
        return Err(Rejection::TooShort { length, min_length });
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > REPETITION_TOKEN_FLOOR {
        let unique: HashSet<&str> = tokens.iter().copied().collect();
        let unique_ratio = unique.len() as f64 / tokens.len() as f64;
        if unique_ratio < MIN_UNIQUE_RATIO {
            return Err(Rejection::Repetitive { unique_ratio });
        }
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let identifier_lines = lines
        .iter()
        .filter(|line| identifier_line().is_match(line.trim()))
        .count();
    let ratio = identifier_lines as f64 / lines.len() as f64;
    if ratio > MAX_IDENTIFIER_LINE_RATIO {
        return Err(Rejection::IdentifierLines { ratio });
    }

    let non_whitespace = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    let alphabetic = trimmed.chars().filter(char::is_ascii_alphabetic).count();
    let density = if non_whitespace == 0 {
        0.0
    } else {
        alphabetic as f64 / non_whitespace as f64
    };
    if density < MIN_ALPHA_DENSITY {
        return Err(Rejection::LowAlphabetic { density });
    }

    Ok(())
}

/// Whether a chunk passes every quality rule
pub fn is_valid_chunk(text: &str, min_length: usize) -> bool {
    validate_chunk(text, min_length).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose() -> String {
        "The committee reviewed the annual budget and approved funding for three new \
         community programs focused on literacy, nutrition and public transit access."
            .to_string()
    }

    #[test]
    fn test_accepts_prose() {
        assert_eq!(validate_chunk(&prose(), DEFAULT_MIN_LENGTH), Ok(()));
    }

    #[test]
    fn test_rejects_short() {
        let err = validate_chunk("  tiny chunk  ", 50).unwrap_err();
        assert_eq!(err, Rejection::TooShort { length: 10, min_length: 50 });
    }

    #[test]
    fn test_rejects_repetitive_tokens() {
        let text = "alpha beta gamma ".repeat(10);
        assert!(matches!(
            validate_chunk(&text, 50),
            Err(Rejection::Repetitive { .. })
        ));
    }

    #[test]
    fn test_identifier_lines_rejected_above_floor() {
        let text = "AAA00000001\n".repeat(8);
        assert!(text.trim().len() > 50);
        assert!(matches!(
            validate_chunk(&text, 50),
            Err(Rejection::IdentifierLines { .. })
        ));
    }

    #[test]
    fn test_rejects_numeric_tables() {
        let text = "12.5 33.1 -- 44/55 (99) 1000 2000 3000 4000 5000 6000 7000 8000 9000 ok";
        assert!(matches!(
            validate_chunk(text, 50),
            Err(Rejection::LowAlphabetic { .. })
        ));
    }

    #[test]
    fn test_threshold_monotonic() {
        let text = prose();
        assert!(is_valid_chunk(&text, 100));
        assert!(is_valid_chunk(&text, 50));
        assert!(!is_valid_chunk(&text, 1000));
    }

    #[test]
    fn test_rejection_display() {
        let msg = Rejection::TooShort { length: 3, min_length: 50 }.to_string();
        assert_eq!(msg, "too short (3 < 50 chars)");
    }
}
