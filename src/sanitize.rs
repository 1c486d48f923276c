//! Cleanup of raw model output.
//!
//! Local reasoning models wrap their actual answer in `<think>...</think>`
//! blocks. Stripping those is the one place where a careless implementation
//! silently loses data: removing "everything after an opening marker" discards
//! the model's real output (including embedded JSON) whenever the close tag is
//! missing. The stripper here removes only matched pairs; an unmatched opening
//! marker is dropped alone and the remainder kept.

const REASONING_MARKERS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
];

/// Remove paired reasoning blocks from model output.
///
/// Matched open/close pairs are removed together with their contents.
/// An opening marker with no matching close is removed by itself, leaving
/// everything after it intact.
pub fn strip_reasoning_blocks(text: &str) -> String {
    let mut out = text.to_string();
    for &(open, close) in REASONING_MARKERS {
        out = strip_one_marker(&out, open, close);
    }
    out.trim().to_string()
}

fn strip_one_marker(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + open.len()..];
        match after_open.find(close) {
            Some(end) => {
                // Matched pair: drop marker, contents, and close.
                rest = &after_open[end + close.len()..];
            }
            None => {
                // Unmatched open: drop only the marker, keep the tail.
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Drop characters a terminal or JSON parser would choke on.
///
/// Model streams occasionally emit lone surrogate fragments or control bytes
/// mid-token. These are filtered inline, never reported as errors.
pub fn clean_fragment(fragment: &str) -> String {
    fragment
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Collapse internal line breaks and runs of whitespace into single spaces.
///
/// Used on concept candidates, where a line break inside a phrase is an
/// extraction artifact, not content.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matched_pair() {
        let input = "<think>internal reasoning</think>The answer is 42.";
        assert_eq!(strip_reasoning_blocks(input), "The answer is 42.");
    }

    #[test]
    fn strips_multiple_pairs() {
        let input = "<think>a</think>first<think>b</think> second";
        assert_eq!(strip_reasoning_blocks(input), "first second");
    }

    #[test]
    fn unmatched_open_keeps_tail() {
        // Regression property: the tail after an unmatched open marker,
        // including embedded structured data, must survive.
        let input = "<think>partial no close {json:1}";
        let out = strip_reasoning_blocks(input);
        assert!(out.contains("{json:1}"), "got: {}", out);
    }

    #[test]
    fn strips_thinking_variant() {
        let input = "<thinking>hm</thinking>done";
        assert_eq!(strip_reasoning_blocks(input), "done");
    }

    #[test]
    fn no_markers_is_identity_modulo_trim() {
        assert_eq!(strip_reasoning_blocks("  plain text "), "plain text");
    }

    #[test]
    fn clean_fragment_drops_replacement_and_control() {
        let s = format!("ab{}c\u{0007}d\ne", char::REPLACEMENT_CHARACTER);
        assert_eq!(clean_fragment(&s), "abcd\ne");
    }

    #[test]
    fn collapse_whitespace_joins_lines() {
        assert_eq!(collapse_whitespace("machine\n  learning"), "machine learning");
    }
}
