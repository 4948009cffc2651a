//! JavaScript language extractor using tree-sitter
//!
//! Shares the statement walker with the TypeScript extractor; the
//! grammar has no interfaces or heritage clauses to speak of, and the
//! walker simply never encounters those kinds.

use codeeagle_core::Result;

use super::typescript::{extract, TsLike};
use crate::parser::{ParseResult, Parser};

pub struct JavaScriptParser;

fn javascript_grammar(_path: &str) -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

impl Parser for JavaScriptParser {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        extract(
            &TsLike {
                language: "javascript",
                grammar: javascript_grammar,
            },
            path,
            content,
        )
    }
}
