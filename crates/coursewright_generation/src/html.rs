//! HTML to plain text.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("Valid script regex")
});
static BLOCK_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/tr|/section|/article|/ul|/ol|/table|/blockquote)\b[^>]*>")
        .expect("Valid block regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Valid tag regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("Valid entity regex")
});
static SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{a0}]+").expect("Valid whitespace regex"));

/// Strip tags, decode entities and collapse whitespace.
///
/// Block-level boundaries become line breaks so paragraphs stay apart.
/// Blank lines are dropped.
///
/// # Examples
///
/// ```
/// use coursewright_generation::strip_tags;
///
/// let text = strip_tags("<h1>Moves</h1><p>A move&nbsp;transfers <b>ownership</b>.</p>");
/// assert_eq!(text, "Moves\nA move transfers ownership.");
/// ```
pub fn strip_tags(html: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(html, "");
    let with_breaks = BLOCK_BOUNDARY.replace_all(&without_code, "\n");
    let text = TAG.replace_all(&with_breaks, "");
    let decoded = ENTITY.replace_all(&text, |caps: &regex::Captures<'_>| decode_entity(&caps[1]));

    decoded
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entity(name: &str) -> String {
    let decoded = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "rsquo" => Some('\u{2019}'),
        "lsquo" => Some('\u{2018}'),
        "rdquo" => Some('\u{201d}'),
        "ldquo" => Some('\u{201c}'),
        numeric if numeric.starts_with("#x") || numeric.starts_with("#X") => {
            u32::from_str_radix(&numeric[2..], 16).ok().and_then(char::from_u32)
        }
        numeric if numeric.starts_with('#') => numeric[1..].parse().ok().and_then(char::from_u32),
        _ => None,
    };
    match decoded {
        Some(c) => c.to_string(),
        None => format!("&{};", name),
    }
}
