//! Link extraction.
//!
//! Parses page content as CommonMark and collects the raw target of
//! every outgoing reference: wiki-style `[[target]]` links and regular
//! `[text](destination)` links. Targets are recorded as written; whether
//! the target page exists is not checked here.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `[[target]]`, `[[target|label]]` and `[[target#fragment]]`.
static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]|#]*)(?:#[^\[\]|]*)?(?:\|[^\[\]]*)?\]\]").unwrap());

/// The sorted, deduplicated outgoing link targets of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkSet(Vec<String>);

impl LinkSet {
    /// Builds a link set, sorting and removing duplicates.
    pub fn from_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        targets.sort();
        targets.dedup();
        Self(targets)
    }

    pub fn contains(&self, target: &str) -> bool {
        self.0
            .binary_search_by(|t| t.as_str().cmp(target))
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Extracts all link targets from markdown `content`.
///
/// Autolinks (`<https://…>`) and images are not references to pages and
/// are skipped, as is anything inside code blocks or inline code.
pub fn extract_links(content: &str) -> LinkSet {
    let mut targets = Vec::new();
    let mut code_depth = 0usize;

    let parser = Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    for event in TextMergeStream::new(parser) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => code_depth += 1,
            Event::End(TagEnd::CodeBlock) => code_depth = code_depth.saturating_sub(1),
            Event::Start(Tag::Link {
                link_type, dest_url, ..
            }) => {
                if matches!(link_type, LinkType::Autolink | LinkType::Email) {
                    continue;
                }
                if !dest_url.is_empty() {
                    targets.push(dest_url.into_string());
                }
            }
            Event::Text(text) if code_depth == 0 => {
                for caps in WIKILINK.captures_iter(&text) {
                    let target = &caps[1];
                    if !target.is_empty() {
                        targets.push(target.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    LinkSet::from_targets(targets)
}
