//! Core data structures for the code graph

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Branch used when the caller does not name one.
pub const DEFAULT_BRANCH: &str = "default";

/// Bytes of the SHA-256 digest kept in an identifier (24 hex chars).
const ID_BYTES: usize = 12;

fn stable_hash(kind: &str, key1: &str, key2: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0x1f]);
    hasher.update(key1.as_bytes());
    hasher.update([0x1f]);
    hasher.update(key2.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(ID_BYTES * 2);
    for byte in &digest[..ID_BYTES] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Unique, stable identifier for a node.
///
/// Derived by hashing the canonical `(kind, key1, key2)` tuple, so the same
/// input always yields the same ID across processes and hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Derive an ID from the canonical identity tuple.
    pub fn derive(kind: &str, key1: &str, key2: &str) -> Self {
        NodeId(stable_hash(kind, key1, key2))
    }

    /// Wrap an already-derived ID (e.g. decoded from a store key).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        NodeId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn derive(kind: &str, source: &NodeId, target: &NodeId) -> Self {
        EdgeId(stable_hash(kind, source.as_str(), target.as_str()))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        EdgeId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminates what kind of code entity a node represents. The set is
/// closed; readers switch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    // ── Files and containers ────────────────────────────────
    File,
    TestFile,
    Package,
    Module,

    // ── Symbols ─────────────────────────────────────────────
    Function,
    Method,
    TestFunction,
    Struct,
    Class,
    Interface,
    Field,
    Variable,
    Constant,
    TypeAlias,

    // ── Cross-cutting ───────────────────────────────────────
    Import,
    Document,
    Dependency,
    ApiEndpoint,
}

impl NodeType {
    /// Stable tag used in store keys and identity hashing.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::TestFile => "test_file",
            NodeType::Package => "package",
            NodeType::Module => "module",
            NodeType::Function => "function",
            NodeType::Method => "method",
            NodeType::TestFunction => "test_function",
            NodeType::Struct => "struct",
            NodeType::Class => "class",
            NodeType::Interface => "interface",
            NodeType::Field => "field",
            NodeType::Variable => "variable",
            NodeType::Constant => "constant",
            NodeType::TypeAlias => "type_alias",
            NodeType::Import => "import",
            NodeType::Document => "document",
            NodeType::Dependency => "dependency",
            NodeType::ApiEndpoint => "api_endpoint",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "file" => NodeType::File,
            "test_file" => NodeType::TestFile,
            "package" => NodeType::Package,
            "module" => NodeType::Module,
            "function" => NodeType::Function,
            "method" => NodeType::Method,
            "test_function" => NodeType::TestFunction,
            "struct" => NodeType::Struct,
            "class" => NodeType::Class,
            "interface" => NodeType::Interface,
            "field" => NodeType::Field,
            "variable" => NodeType::Variable,
            "constant" => NodeType::Constant,
            "type_alias" => NodeType::TypeAlias,
            "import" => NodeType::Import,
            "document" => NodeType::Document,
            "dependency" => NodeType::Dependency,
            "api_endpoint" => NodeType::ApiEndpoint,
            _ => return None,
        })
    }
}

/// What kind of relationship an edge represents. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    Implements,
    Imports,
    Contains,
    DependsOn,
    Consumes,
    Documents,
    Tests,
    References,
    Extends,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::Implements => "implements",
            EdgeType::Imports => "imports",
            EdgeType::Contains => "contains",
            EdgeType::DependsOn => "depends_on",
            EdgeType::Consumes => "consumes",
            EdgeType::Documents => "documents",
            EdgeType::Tests => "tests",
            EdgeType::References => "references",
            EdgeType::Extends => "extends",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "calls" => EdgeType::Calls,
            "implements" => EdgeType::Implements,
            "imports" => EdgeType::Imports,
            "contains" => EdgeType::Contains,
            "depends_on" => EdgeType::DependsOn,
            "consumes" => EdgeType::Consumes,
            "documents" => EdgeType::Documents,
            "tests" => EdgeType::Tests,
            "references" => EdgeType::References,
            "extends" => EdgeType::Extends,
            _ => return None,
        })
    }
}

/// A single node in the code graph.
///
/// Identity is content-derived: re-parsing an unchanged file produces
/// byte-identical nodes. `extra` carries fields this version does not know
/// about (e.g. from a newer export file) so they survive a round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub exported: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Node {
    pub fn new(
        node_type: NodeType,
        name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let mut node = Node {
            id: NodeId::default(),
            node_type,
            name: name.into(),
            file_path: file_path.into(),
            line: None,
            end_line: None,
            package: String::new(),
            language: String::new(),
            signature: None,
            exported: false,
            properties: HashMap::new(),
            extra: BTreeMap::new(),
        };
        node.refresh_id();
        node
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.line = Some(start);
        self.end_line = Some(end);
        self.refresh_id();
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self.refresh_id();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// The canonical identity of a node is `(type, file_path, package:name@line)`.
    /// Anything else (signature, properties) may change without changing
    /// which entity the node describes.
    pub fn compute_id(&self) -> NodeId {
        let key2 = format!(
            "{}:{}@{}",
            self.package,
            self.name,
            self.line.unwrap_or(0)
        );
        NodeId::derive(self.node_type.as_str(), &self.file_path, &key2)
    }

    /// Recompute `id` from the identity fields. Called by the builder
    /// methods that touch them and by path migration.
    pub fn refresh_id(&mut self) {
        self.id = self.compute_id();
    }
}

/// A typed, directed relation between two nodes in the same branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(edge_type: EdgeType, source: NodeId, target: NodeId) -> Self {
        let id = EdgeId::derive(edge_type.as_str(), &source, &target);
        Edge {
            id,
            edge_type,
            source,
            target,
            properties: HashMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn compute_id(&self) -> EdgeId {
        EdgeId::derive(self.edge_type.as_str(), &self.source, &self.target)
    }

    pub fn refresh_id(&mut self) {
        self.id = self.compute_id();
    }
}

/// Which side of a node's edges `get_neighbors` follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Structural node filter. All present fields must match; `name_pattern`
/// is a glob matched against the lowercased name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilter {
    pub node_type: Option<NodeType>,
    pub name_pattern: Option<String>,
    pub package: Option<String>,
    pub file_path: Option<String>,
    pub language: Option<String>,
}

impl NodeFilter {
    pub fn of_type(node_type: NodeType) -> Self {
        NodeFilter {
            node_type: Some(node_type),
            ..Default::default()
        }
    }

    pub fn in_file(file_path: impl Into<String>) -> Self {
        NodeFilter {
            file_path: Some(file_path.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_type.is_none()
            && self.name_pattern.is_none()
            && self.package.is_none()
            && self.file_path.is_none()
            && self.language.is_none()
    }
}

/// Counts by type, as returned by `stats()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub nodes_by_type: HashMap<NodeType, u64>,
    pub edges_by_type: HashMap<EdgeType, u64>,
}
