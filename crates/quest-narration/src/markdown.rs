//! Markdown to plain-text conversion.
//!
//! The conversion is line oriented: block syntax is recognised at the start
//! of each line, inline syntax is then stripped, and blank lines are dropped.
//! It is forgiving: unknown syntax passes through as text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholders for backslash-escaped characters that inline rules would
/// otherwise consume. Private-use code points never occur in model output.
const ESCAPED_STAR: char = '\u{E001}';
const ESCAPED_UNDERSCORE: char = '\u{E002}';
const ESCAPED_BACKTICK: char = '\u{E003}';

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        #[allow(clippy::expect_used)]
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("valid regex"));
    };
}

// Block level
pattern!(FENCE, r"^\s*(```|~~~)");
pattern!(HEADING, r"^\s{0,3}#{1,6}\s+(.*?)\s*#*\s*$");
pattern!(RULE, r"^\s{0,3}[-*_](\s*[-*_]){2,}\s*$");
pattern!(BLOCKQUOTE, r"^\s*(>\s?)+");
pattern!(BULLET, r"^\s*[-*+]\s+");
pattern!(ORDERED, r"^\s*\d+[.)]\s+");
pattern!(
    TABLE_SEPARATOR,
    r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$"
);

// Inline
pattern!(ESCAPE, r"\\([\\`*_{}\[\]()#+\-.!>|~])");
pattern!(IMAGE, r"!\[([^\]]*)\]\([^)]*\)");
pattern!(LINK, r"\[([^\]]+)\]\([^)]*\)");
pattern!(CODE, r"`+([^`]+?)`+");
pattern!(BOLD_STAR, r"\*\*(.+?)\*\*");
pattern!(BOLD_UNDERSCORE, r"__(.+?)__");
pattern!(ITALIC_STAR, r"\*([^*\s](?:[^*]*[^*\s])?)\*");
pattern!(
    ITALIC_UNDERSCORE,
    r"(^|[^A-Za-z0-9_])_([^_\s](?:[^_]*[^_\s])?)_([^A-Za-z0-9_]|$)"
);
pattern!(STRIKE, r"~~(.+?)~~");
pattern!(HTML_TAG, r"</?[A-Za-z][^>]*>");
pattern!(SPACES, r"[ \t]{2,}");

/// Converts Markdown to plain narration text.
///
/// Each non-empty block ends up on its own line. Returns an empty string
/// when the input has no readable content.
#[must_use]
pub fn markdown_to_text(markdown: &str) -> String {
    markdown
        .lines()
        .filter_map(convert_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn convert_line(line: &str) -> Option<String> {
    if FENCE.is_match(line) || RULE.is_match(line) || TABLE_SEPARATOR.is_match(line) {
        return None;
    }

    let line = strip_block_syntax(line);
    let line = strip_inline_syntax(&line);
    let line = SPACES.replace_all(line.trim(), " ").into_owned();

    if line.is_empty() {
        None
    } else {
        Some(line)
    }
}

fn strip_block_syntax(line: &str) -> String {
    if let Some(caps) = HEADING.captures(line) {
        return caps[1].to_string();
    }

    let line = BLOCKQUOTE.replace(line, "");
    let line = BULLET.replace(&line, "");
    let line = ORDERED.replace(&line, "").into_owned();

    let trimmed = line.trim();
    if trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1 {
        return trimmed[1..trimmed.len() - 1]
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
    }

    line
}

fn strip_inline_syntax(line: &str) -> String {
    let line = ESCAPE.replace_all(line, |caps: &regex::Captures<'_>| match &caps[1] {
        "*" => ESCAPED_STAR.to_string(),
        "_" => ESCAPED_UNDERSCORE.to_string(),
        "`" => ESCAPED_BACKTICK.to_string(),
        other => other.to_string(),
    });

    let line = IMAGE.replace_all(&line, "$1");
    let line = LINK.replace_all(&line, "$1");
    let line = CODE.replace_all(&line, "$1");
    let line = BOLD_STAR.replace_all(&line, "$1");
    let line = BOLD_UNDERSCORE.replace_all(&line, "$1");
    let line = ITALIC_STAR.replace_all(&line, "$1");
    let line = ITALIC_UNDERSCORE.replace_all(&line, "${1}${2}${3}");
    let line = STRIKE.replace_all(&line, "$1");
    let line = HTML_TAG.replace_all(&line, "");

    decode_entities(&line)
        .replace(ESCAPED_STAR, "*")
        .replace(ESCAPED_UNDERSCORE, "_")
        .replace(ESCAPED_BACKTICK, "`")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
