//! Text normalization and scan-artifact removal

use regex::Regex;
use std::sync::OnceLock;

/// Longest unit considered by the repeated-phrase rule
const MAX_REPEAT_UNIT: usize = 50;
/// Minimum consecutive occurrences before a unit is collapsed
const MIN_REPEATS: usize = 5;

fn excess_newlines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("Invalid regex"))
}

fn horizontal_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("Invalid regex"))
}

fn identifier_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:[A-Z]{3,}[0-9]{8}\s*\n){5,}").expect("Invalid regex"))
}

/// Normalize raw loader text before splitting
///
/// Rules run in order:
/// 1. three or more newlines become a paragraph break
/// 2. runs of spaces and tabs become one space
/// 3. blocks of five or more identifier lines (`ABC12345678`) are removed
/// 4. a 1-50 character unit repeated five or more times collapses to one copy
/// 5. lines are trimmed and empty lines dropped
/// 6. the result is trimmed
///
/// The pass is repeated until the text stops changing, so `clean` is
/// idempotent. Every effective pass shortens the text, which bounds the loop.
pub fn clean(text: &str) -> String {
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let text = excess_newlines().replace_all(text, "\n\n");
    let text = horizontal_runs().replace_all(&text, " ");
    let text = identifier_block().replace_all(&text, "");
    let text = collapse_repeated_units(&text);

    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapse consecutive repeats of a short unit (leftmost, longest unit first)
fn collapse_repeated_units(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        match repeat_at(&chars, i) {
            Some((unit, count)) => {
                out.extend(&chars[i..i + unit]);
                i += unit * count;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    out
}

fn repeat_at(chars: &[char], start: usize) -> Option<(usize, usize)> {
    let remaining = chars.len() - start;
    let max_unit = MAX_REPEAT_UNIT.min(remaining / MIN_REPEATS);

    for unit in (1..=max_unit).rev() {
        let pattern = &chars[start..start + unit];
        // A unit never spans a line break
        if pattern.iter().any(|&c| c == '\n' || c == '\r') {
            continue;
        }

        let mut count = 1;
        while start + (count + 1) * unit <= chars.len()
            && chars[start + count * unit..start + (count + 1) * unit] == *pattern
        {
            count += 1;
        }

        if count >= MIN_REPEATS {
            return Some((unit, count));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_newlines_and_spaces() {
        assert_eq!(clean("Alpha\n\n\n\nBeta"), "Alpha\nBeta");
        assert_eq!(clean("one  \t two\tthree"), "one two\tthree");
    }

    #[test]
    fn test_removes_identifier_blocks() {
        let mut text = String::from("Header line\n");
        for i in 0..6 {
            text.push_str(&format!("ABC1234567{}\n", i));
        }
        text.push_str("Footer line");
        assert_eq!(clean(&text), "Header line\nFooter line");
    }

    #[test]
    fn test_keeps_short_identifier_runs() {
        let text = "ABC12345678\nABC12345679\nsome text";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn test_collapses_repeated_phrases() {
        assert_eq!(clean("Page break Page break Page break Page break Page break end"), "Page break end");
        assert_eq!(clean("wait!!!!!!"), "wait!");
        assert_eq!(clean("hmm.........."), "hmm..");
        assert_eq!(clean("abab"), "abab");
    }

    #[test]
    fn test_trims_lines_and_drops_empty() {
        assert_eq!(clean("  first  \n   \n\tsecond\t\n"), "first\nsecond");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean(" \n\n\t "), "");
    }

    #[test]
    fn test_idempotent_on_nested_repeats() {
        let text = "xyxyxyxyxy xyxyxyxyxy xyxyxyxyxy xyxyxyxyxy xyxyxyxyxy";
        let once = clean(text);
        assert_eq!(clean(&once), once);
    }
}
