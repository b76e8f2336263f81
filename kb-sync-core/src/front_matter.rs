//! Minimal front matter extraction for Markdown documents.
//!
//! A front matter block is a run of `key: value` lines between two `---`
//! lines at the very start of a document. This is not a YAML
//! parser: nested structures, lists and multi-line values are not supported
//! and malformed lines are dropped.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Key/value pairs read from a front matter block.
pub type FrontMatter = BTreeMap<String, String>;

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
            .expect("front matter pattern is valid")
    })
}

/// Split `content` into its body and optional front matter.
///
/// Without a leading block the input comes back untouched with `None`.
/// When a block is present the returned body is the remainder with
/// surrounding whitespace trimmed, and the metadata is `None` if the block
/// held no usable `key: value` line.
pub fn parse(content: &str) -> (String, Option<FrontMatter>) {
    let Some(captures) = block_pattern().captures(content) else {
        return (content.to_string(), None);
    };

    let whole = captures.get(0).map_or(0, |m| m.end());
    let block = captures.get(1).map_or("", |m| m.as_str());
    let body = content[whole..].trim().to_string();

    let mut metadata = FrontMatter::new();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            debug!(line, "Ignoring front matter line without a colon");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        metadata.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    if metadata.is_empty() {
        (body, None)
    } else {
        (body, Some(metadata))
    }
}

/// Remove one matching pair of surrounding single or double quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_block() {
        let (body, meta) = parse("---\ntitle: Hello\n---\nBody text");
        assert_eq!(body, "Body text");
        let meta = meta.expect("front matter present");
        assert_eq!(meta.get("title").map(String::as_str), Some("Hello"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn text_without_block_is_returned_unchanged() {
        let (body, meta) = parse("No front matter here");
        assert_eq!(body, "No front matter here");
        assert!(meta.is_none());
    }

    #[test]
    fn block_must_start_the_text() {
        let text = "\n---\ntitle: Hello\n---\nBody";
        let (body, meta) = parse(text);
        assert_eq!(body, text);
        assert!(meta.is_none());
    }

    #[test]
    fn strips_matching_quotes_only() {
        let (_, meta) = parse(
            "---\na: \"double\"\nb: 'single'\nc: \"mixed'\nd: plain \n---\nx",
        );
        let meta = meta.unwrap();
        assert_eq!(meta["a"], "double");
        assert_eq!(meta["b"], "single");
        assert_eq!(meta["c"], "\"mixed'");
        assert_eq!(meta["d"], "plain");
    }

    #[test]
    fn value_keeps_everything_after_first_colon() {
        let (_, meta) = parse("---\nlink: https://example.com/a\n---\n");
        assert_eq!(meta.unwrap()["link"], "https://example.com/a");
    }

    #[test]
    fn lines_without_colon_and_empty_keys_are_dropped() {
        let (body, meta) = parse("---\njust words\n: orphan\nsidebar_position: 3\n---\n\n# Title\n");
        assert_eq!(body, "# Title");
        let meta = meta.unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["sidebar_position"], "3");
    }

    #[test]
    fn empty_block_yields_no_metadata_but_strips_block() {
        let (body, meta) = parse("---\n---\nContent");
        assert_eq!(body, "Content");
        assert!(meta.is_none());
    }

    #[test]
    fn handles_crlf_and_block_at_end_of_text() {
        let (body, meta) = parse("---\r\ntitle: Win\r\n---");
        assert_eq!(body, "");
        assert_eq!(meta.unwrap()["title"], "Win");
    }

    #[test]
    fn unterminated_block_is_not_front_matter() {
        let text = "---\ntitle: Hello\nno closing";
        let (body, meta) = parse(text);
        assert_eq!(body, text);
        assert!(meta.is_none());
    }
}
