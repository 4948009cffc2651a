//! Language extractors for different programming languages

pub mod go;
pub mod java;
pub mod javascript;
pub mod markdown;
pub mod python;
pub mod typescript;

use codeeagle_core::{GraphError, Result};
use tree_sitter::{Language, Node, Tree};

/// One-shot parse. Parsers are created per call — they are cheap and
/// `tree_sitter::Parser` is not Sync, so sharing one across the worker
/// pool would cost more than it saves.
pub(crate) fn parse_tree(language: &Language, source: &str, path: &str) -> Result<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|err| GraphError::parse(path, err))?;
    parser
        .parse(source, None)
        .ok_or_else(|| GraphError::parse(path, "parser produced no tree"))
}

/// 1-based line span of a syntax node.
pub(crate) fn line_span(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

/// Depth-first visit of every node in the subtree.
pub(crate) fn walk_tree<'a>(node: Node<'a>, visit: &mut impl FnMut(Node<'a>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_tree(child, visit);
    }
}

/// Record a call site once, preserving discovery order.
pub(crate) fn push_call(calls: &mut Vec<String>, callee: impl Into<String>) {
    let callee = callee.into();
    if !callee.is_empty() && !calls.iter().any(|existing| *existing == callee) {
        calls.push(callee);
    }
}

/// Serialized form of the recorded call sites (`calls` property).
pub(crate) fn join_calls(calls: &[String]) -> String {
    calls.join(" ")
}
