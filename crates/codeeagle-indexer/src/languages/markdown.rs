//! Markdown document extractor
//!
//! No grammar needed: one `Document` node per file, named by its path
//! like `File` nodes, with YAML frontmatter keys exposed as
//! `frontmatter:*` properties and the first heading as `title`.

use std::sync::OnceLock;

use codeeagle_core::{GraphError, Node, NodeType, Result};
use regex::Regex;

use crate::parser::{ParseResult, Parser};

pub struct MarkdownParser;

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s+(.+?)\s*$").unwrap())
}

/// `key: value` lines between a leading pair of `---` fences.
fn frontmatter(source: &str) -> Vec<(String, String)> {
    let mut lines = source.lines();
    if lines.next().map(str::trim) != Some("---") {
        return Vec::new();
    }
    let mut pairs = Vec::new();
    for line in lines {
        if line.trim() == "---" {
            return pairs;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim().trim_matches(['"', '\'']);
            if !key.is_empty() && !value.is_empty() {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }
    // Unterminated fence: not frontmatter
    Vec::new()
}

impl Parser for MarkdownParser {
    fn language(&self) -> &'static str {
        "markdown"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["md", "mdx", "markdown"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        let source = std::str::from_utf8(content).map_err(|err| GraphError::parse(path, err))?;

        let mut document = Node::new(NodeType::Document, path, path).with_language("markdown");
        for (key, value) in frontmatter(source) {
            document = document.with_property(&format!("frontmatter:{key}"), value);
        }
        if let Some(title) = source
            .lines()
            .find_map(|line| heading_re().captures(line))
            .map(|captures| captures[1].to_string())
        {
            document = document.with_property("title", title);
        }

        Ok(ParseResult {
            language: "markdown".to_string(),
            nodes: vec![document],
            edges: Vec::new(),
        })
    }
}
