//! Parser port and extension registry
//!
//! Each language extractor is a pure function `(path, bytes) → (nodes,
//! edges)`: given identical input it must produce identical nodes and
//! edges, IDs included, and it must not touch the filesystem, network, or
//! clock. The pipeline treats parsers as opaque.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use codeeagle_core::{Edge, Node, Result};

/// Everything one file contributes to the graph.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub language: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub trait Parser: Send + Sync {
    /// Lowercase language tag, e.g. `"go"`.
    fn language(&self) -> &'static str;

    /// File extensions (without dot) this parser claims.
    fn extensions(&self) -> &'static [&'static str];

    /// Exact filenames with no useful extension, e.g. `Makefile`.
    fn filenames(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult>;
}

/// Static registry keyed by extension (or exact filename). Parsers are
/// plugged in at construction; there is no dynamic discovery.
#[derive(Default, Clone)]
pub struct ParserRegistry {
    by_extension: HashMap<String, Arc<dyn Parser>>,
    by_filename: HashMap<String, Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in language extractor.
    pub fn with_default_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::languages::go::GoParser));
        registry.register(Arc::new(crate::languages::python::PythonParser));
        registry.register(Arc::new(crate::languages::typescript::TypeScriptParser));
        registry.register(Arc::new(crate::languages::javascript::JavaScriptParser));
        registry.register(Arc::new(crate::languages::java::JavaParser));
        registry.register(Arc::new(crate::languages::markdown::MarkdownParser));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn Parser>) {
        for ext in parser.extensions() {
            self.by_extension.insert(ext.to_string(), parser.clone());
        }
        for name in parser.filenames() {
            self.by_filename.insert(name.to_string(), parser.clone());
        }
    }

    /// Exact filename wins over extension.
    pub fn parser_for(&self, path: &str) -> Option<Arc<dyn Parser>> {
        let path = Path::new(path);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(parser) = self.by_filename.get(name) {
                return Some(parser.clone());
            }
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(ext))
            .cloned()
    }

    pub fn languages(&self) -> Vec<&'static str> {
        let mut langs: Vec<&'static str> = self
            .by_extension
            .values()
            .chain(self.by_filename.values())
            .map(|parser| parser.language())
            .collect();
        langs.sort_unstable();
        langs.dedup();
        langs
    }

    /// Restrict to the named languages (project config `languages:`).
    pub fn retain_languages(&mut self, languages: &[String]) {
        if languages.is_empty() {
            return;
        }
        let keep: Vec<String> = languages.iter().map(|l| l.to_lowercase()).collect();
        self.by_extension
            .retain(|_, parser| keep.iter().any(|l| l == parser.language()));
        self.by_filename
            .retain(|_, parser| keep.iter().any(|l| l == parser.language()));
    }
}
