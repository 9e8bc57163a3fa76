//! Extraction of `<mcp:NAME>body</mcp:NAME>` action tags from model output.
//!
//! Tags are non-nested; a tag only counts when its closing name matches the
//! opening name.

use std::sync::LazyLock;

use regex::Regex;

/// Tag kind for shell commands.
pub const TERMINAL: &str = "terminal";

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<mcp:(\w+)>").unwrap());

/// One extracted action tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTag {
    pub kind: String,
    /// Tag body with surrounding whitespace trimmed.
    pub body: String,
}

impl ActionTag {
    pub fn is_terminal(&self) -> bool {
        self.kind == TERMINAL
    }
}

/// All well-formed tags in document order.
pub fn all_tags(text: &str) -> Vec<ActionTag> {
    let mut tags = Vec::new();
    let mut cursor = 0;

    while let Some(caps) = OPEN_TAG_RE.captures_at(text, cursor) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let close = format!("</mcp:{}>", name.as_str());
        match text[whole.end()..].find(&close) {
            Some(offset) => {
                let body_end = whole.end() + offset;
                tags.push(ActionTag {
                    kind: name.as_str().to_string(),
                    body: text[whole.end()..body_end].trim().to_string(),
                });
                cursor = body_end + close.len();
            }
            // Unclosed tag: skip it and keep scanning.
            None => cursor = whole.end(),
        }
    }

    tags
}

/// First well-formed tag of any kind.
pub fn first_tag(text: &str) -> Option<ActionTag> {
    all_tags(text).into_iter().next()
}

/// Bodies of every tag of `kind`, in order.
pub fn tag_bodies(text: &str, kind: &str) -> Vec<String> {
    all_tags(text)
        .into_iter()
        .filter(|tag| tag.kind == kind)
        .map(|tag| tag.body)
        .collect()
}
