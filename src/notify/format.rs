// src/notify/format.rs
//! Message splitting and the small markup subset the channel accepts.

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefixed to every segment after the first (caller side, see `with_continuation`).
pub const CONTINUED_MARKER: &str = "…continued\n\n";

/// Split `text` into ordered segments of at most `max_len` chars.
///
/// Each segment is the longest prefix that fits, cut after its last line
/// break when it has one, at exactly `max_len` chars otherwise. Segments
/// concatenate back to `text`. Empty input yields no segments.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = match rest.char_indices().nth(max_len) {
            Some((idx, _)) => idx,
            None => {
                out.push(rest.to_string());
                break;
            }
        };
        let cut = match rest[..end].rfind('\n') {
            Some(nl) => nl + 1,
            None => end,
        };
        out.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    out
}

/// Prefix every segment but the first with [`CONTINUED_MARKER`].
pub fn with_continuation(segments: Vec<String>) -> Vec<String> {
    segments
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            if i == 0 {
                s
            } else {
                format!("{CONTINUED_MARKER}{s}")
            }
        })
        .collect()
}

/// Split for a channel limit so that marker + segment still fits.
/// Limits too small to hold the marker plus one char get no marker.
pub fn split_for_channel(text: &str, channel_max: usize) -> Vec<String> {
    let marker = CONTINUED_MARKER.chars().count();
    if channel_max <= marker {
        return split_message(text, channel_max);
    }
    with_continuation(split_message(text, channel_max - marker))
}

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").unwrap());
static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").unwrap());

/// Render plain/markdown-ish text to Telegram HTML.
///
/// Everything is escaped first; only `**bold**` spans inside one line and
/// `#` headings become `<b>`, so tags are always balanced per line.
pub fn render_html(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let escaped = html_escape::encode_text(line).to_string();
            if let Some(caps) = RE_HEADING.captures(&escaped) {
                let inner = caps[1].replace("**", "");
                format!("<b>{inner}</b>")
            } else {
                RE_BOLD.replace_all(&escaped, "<b>$1</b>").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_line_boundaries() {
        let segs = split_message("line1\nline2\nline3", 12);
        assert_eq!(segs, vec!["line1\nline2\n", "line3"]);
    }

    #[test]
    fn hard_cut_without_newline() {
        let segs = split_message("abcdefghij", 4);
        assert_eq!(segs, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn continuation_fits_the_channel() {
        let text = "x".repeat(10_000);
        let segs = split_for_channel(&text, 4096);
        assert!(segs.len() >= 3);
        assert!(!segs[0].starts_with(CONTINUED_MARKER));
        for s in &segs[1..] {
            assert!(s.starts_with(CONTINUED_MARKER));
        }
        assert!(segs.iter().all(|s| s.chars().count() <= 4096));
    }

    #[test]
    fn tiny_channel_limit_skips_the_marker() {
        for max in [1, 5, CONTINUED_MARKER.chars().count()] {
            let segs = split_for_channel("abcdefghijklmnopqrstuvwxyz", max);
            assert!(segs.len() > 1);
            assert!(segs.iter().all(|s| s.chars().count() <= max), "max={max}");
            assert!(segs.iter().all(|s| !s.starts_with(CONTINUED_MARKER)));
            assert_eq!(segs.concat(), "abcdefghijklmnopqrstuvwxyz");
        }
    }

    #[test]
    fn html_is_escaped_and_bold_balanced() {
        let out = render_html("**Key** <script> & **open\n## Title **x**");
        assert_eq!(
            out,
            "<b>Key</b> &lt;script&gt; &amp; **open\n<b>Title x</b>"
        );
    }
}
