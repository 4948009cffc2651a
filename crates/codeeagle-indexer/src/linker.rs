//! Multi-phase cross-node edge synthesis
//!
//! Derives the edges a single-file parser cannot produce. Phases run in
//! a fixed order, are independently runnable, and are idempotent: IDs
//! are deterministic, so re-emitting an edge overwrites it. A failing
//! phase reports zero edges and later phases still run. Everything here
//! reads parser-recorded properties (`calls`, `methods`, `receiver`,
//! `implements`, `module`) — no re-parse needed.

use std::collections::{HashMap, HashSet};

use codeeagle_core::{CancelToken, Edge, EdgeType, Node, NodeFilter, NodeId, NodeType, Result};
use codeeagle_store::BranchStore;

use crate::heuristics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub edges: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub phases: Vec<PhaseReport>,
}

impl LinkReport {
    pub fn total_edges(&self) -> u64 {
        self.phases.iter().map(|phase| phase.edges).sum()
    }
}

pub struct Linker<'a> {
    store: &'a BranchStore,
    branch: &'a str,
}

impl<'a> Linker<'a> {
    pub fn new(store: &'a BranchStore, branch: &'a str) -> Self {
        Linker { store, branch }
    }

    /// All phases in fixed order. A cancelled token stops before the
    /// next phase; a failed phase logs and yields a zero count.
    pub fn run_all(&self, cancel: &CancelToken) -> LinkReport {
        let phases: [(&'static str, fn(&Self) -> Result<u64>); 5] = [
            ("imports", Self::resolve_imports),
            ("implements", Self::link_implements),
            ("calls", Self::resolve_calls),
            ("tests", Self::link_tests),
            ("cross_service", Self::link_cross_service),
        ];

        let mut report = LinkReport::default();
        for (name, phase) in phases {
            if cancel.is_cancelled() {
                break;
            }
            let edges = match phase(self) {
                Ok(edges) => edges,
                Err(err) => {
                    tracing::warn!(phase = name, error = %err, "linker phase failed");
                    0
                }
            };
            tracing::debug!(phase = name, edges, "linker phase done");
            report.phases.push(PhaseReport { phase: name, edges });
        }
        report
    }

    fn query(&self, node_type: NodeType) -> Result<Vec<Node>> {
        self.store
            .query_nodes(self.branch, &NodeFilter::of_type(node_type))
    }

    /// file_path → node ID for every file-like node.
    fn file_ids(&self) -> Result<HashMap<String, NodeId>> {
        let mut map = HashMap::new();
        for node_type in [NodeType::Document, NodeType::TestFile, NodeType::File] {
            for node in self.query(node_type)? {
                map.insert(node.file_path.clone(), node.id);
            }
        }
        Ok(map)
    }

    // ──────────────────────────────────────────────────────────────────
    // Phase 1: imports-resolve
    // ──────────────────────────────────────────────────────────────────

    /// Turn per-file import strings into `Imports` edges. Relative
    /// imports resolve to `File` nodes; everything else gets a lazily
    /// created `Package` node.
    fn resolve_imports(&self) -> Result<u64> {
        let imports = self.query(NodeType::Import)?;
        if imports.is_empty() {
            return Ok(0);
        }
        let files = self.file_ids()?;
        // path without extension → path, for relative-import resolution
        let stems: HashMap<String, String> = files
            .keys()
            .map(|path| (strip_extension(path).to_string(), path.clone()))
            .collect();

        let mut count = 0;
        for import in &imports {
            let module = import
                .properties
                .get("module")
                .unwrap_or(&import.name)
                .clone();
            let Some(source) = files.get(&import.file_path) else {
                continue;
            };

            let target = if module.starts_with('.') {
                let dir = parent_dir(&import.file_path);
                let resolved = normalize_path(&format!("{dir}/{module}"));
                stems
                    .get(&resolved)
                    .and_then(|path| files.get(path))
                    .cloned()
            } else {
                None
            };

            let target = match target {
                Some(file_id) => file_id,
                None => {
                    let package = Node::new(NodeType::Package, module.clone(), "")
                        .with_language(import.language.clone());
                    let package_id = package.id.clone();
                    self.store.add_node(self.branch, package)?;
                    package_id
                }
            };

            let edge = Edge::new(EdgeType::Imports, source.clone(), target)
                .with_property("module", module);
            self.store.add_edge(self.branch, edge)?;
            count += 1;
        }
        Ok(count)
    }

    // ──────────────────────────────────────────────────────────────────
    // Phase 2: cross-file implements
    // ──────────────────────────────────────────────────────────────────

    /// `Implements` edges from structs/classes to interfaces: explicit
    /// `implements` declarations where the language has them, method-set
    /// satisfaction (by name) where it does not. Declared `extends`
    /// parents become `Extends` edges in the same pass.
    fn link_implements(&self) -> Result<u64> {
        let interfaces = self.query(NodeType::Interface)?;
        let structs = self.query(NodeType::Struct)?;
        let classes = self.query(NodeType::Class)?;
        if interfaces.is_empty() && classes.is_empty() {
            return Ok(0);
        }

        // (package, receiver) → method names
        let mut method_sets: HashMap<(String, String), HashSet<String>> = HashMap::new();
        for method in self.query(NodeType::Method)? {
            if let Some(receiver) = method.properties.get("receiver") {
                method_sets
                    .entry((method.package.clone(), receiver.clone()))
                    .or_default()
                    .insert(method.name.clone());
            }
        }

        let by_name: HashMap<String, Node> = interfaces
            .iter()
            .map(|iface| (iface.name.clone(), iface.clone()))
            .collect();

        let mut emitted: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut count = 0;
        let mut emit = |source: &Node, target: &Node| -> Result<()> {
            if emitted.insert((source.id.clone(), target.id.clone())) {
                let edge =
                    Edge::new(EdgeType::Implements, source.id.clone(), target.id.clone());
                self.store.add_edge(self.branch, edge)?;
                count += 1;
            }
            Ok(())
        };

        // Declared implements (TypeScript, Java)
        for class in &classes {
            if let Some(declared) = class.properties.get("implements") {
                for name in declared.split(';').filter(|name| !name.is_empty()) {
                    if let Some(interface) = by_name.get(name) {
                        emit(class, interface)?;
                    }
                }
            }
        }

        // Method-set satisfaction (Go)
        for interface in &interfaces {
            let required: Vec<&str> = interface
                .properties
                .get("methods")
                .map(|methods| methods.split(';').filter(|m| !m.is_empty()).collect())
                .unwrap_or_default();
            if required.is_empty() {
                continue;
            }
            for strct in &structs {
                let Some(methods) = method_sets.get(&(strct.package.clone(), strct.name.clone()))
                else {
                    continue;
                };
                if required.iter().all(|name| methods.contains(*name)) {
                    emit(strct, interface)?;
                }
            }
        }
        drop(emit);

        // Declared extends: parent classes and super-interfaces
        let parents: HashMap<&str, &Node> = classes
            .iter()
            .chain(interfaces.iter())
            .map(|node| (node.name.as_str(), node))
            .collect();
        for class in &classes {
            if let Some(declared) = class.properties.get("extends") {
                for name in declared.split(';').filter(|name| !name.is_empty()) {
                    if let Some(parent) = parents.get(name) {
                        if parent.id == class.id {
                            continue;
                        }
                        let edge =
                            Edge::new(EdgeType::Extends, class.id.clone(), parent.id.clone());
                        self.store.add_edge(self.branch, edge)?;
                        count += 1;
                    }
                }
            }
        }
        Ok(count)
    }

    // ──────────────────────────────────────────────────────────────────
    // Phase 3: call resolution
    // ──────────────────────────────────────────────────────────────────

    /// Resolve parser-recorded call sites to `Function`/`Method` nodes
    /// by package + name. Ambiguous sites are skipped, not guessed.
    fn resolve_calls(&self) -> Result<u64> {
        let mut callables = self.query(NodeType::Function)?;
        callables.extend(self.query(NodeType::Method)?);
        callables.extend(self.query(NodeType::TestFunction)?);

        let mut by_name: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in &callables {
            by_name.entry(node.name.as_str()).or_default().push(node);
        }

        let mut count = 0;
        for caller in &callables {
            let Some(calls) = caller.properties.get("calls") else {
                continue;
            };
            for token in calls.split_whitespace() {
                let (qualifier, name) = match token.rsplit_once('.') {
                    Some((qualifier, name)) => (Some(qualifier), name),
                    None => (None, token),
                };
                let Some(candidates) = by_name.get(name) else {
                    continue;
                };
                let Some(target) = pick_callee(caller, qualifier, candidates) else {
                    tracing::trace!(caller = %caller.name, token, "ambiguous call site skipped");
                    continue;
                };
                if target.id == caller.id {
                    continue;
                }
                let edge = Edge::new(EdgeType::Calls, caller.id.clone(), target.id.clone());
                self.store.add_edge(self.branch, edge)?;
                count += 1;
            }
        }
        Ok(count)
    }

    // ──────────────────────────────────────────────────────────────────
    // Phase 4: tests coverage
    // ──────────────────────────────────────────────────────────────────

    /// `Tests` edges at file level (`kind=file_coverage`) and function
    /// level (`kind=function_coverage`), driven by the per-language
    /// filename/name heuristics.
    fn link_tests(&self) -> Result<u64> {
        let files = self.file_ids()?;
        let mut count = 0;

        for test_file in self.query(NodeType::TestFile)? {
            for candidate in
                heuristics::covered_file_candidates(&test_file.language, &test_file.file_path)
            {
                if let Some(covered) = files.get(&candidate) {
                    let edge = Edge::new(EdgeType::Tests, test_file.id.clone(), covered.clone())
                        .with_property("kind", "file_coverage");
                    self.store.add_edge(self.branch, edge)?;
                    count += 1;
                    break;
                }
            }
        }

        let functions = self.query(NodeType::Function)?;
        for test_function in self.query(NodeType::TestFunction)? {
            let Some(target_name) =
                heuristics::covered_function_name(&test_function.language, &test_function.name)
            else {
                continue;
            };
            let covered_files = heuristics::covered_file_candidates(
                &test_function.language,
                &test_function.file_path,
            );
            let matches: Vec<&Node> = functions
                .iter()
                .filter(|function| function.name.eq_ignore_ascii_case(&target_name))
                .filter(|function| {
                    covered_files.contains(&function.file_path)
                        || function.package == test_function.package
                })
                .collect();
            if let [target] = matches.as_slice() {
                let edge =
                    Edge::new(EdgeType::Tests, test_function.id.clone(), target.id.clone())
                        .with_property("kind", "function_coverage");
                self.store.add_edge(self.branch, edge)?;
                count += 1;
            }
        }
        Ok(count)
    }

    // ──────────────────────────────────────────────────────────────────
    // Phase 5: cross-service
    // ──────────────────────────────────────────────────────────────────

    /// Match `ApiEndpoint` consumers to producers on (method, normalized
    /// path). An LLM-assisted matcher for the leftovers is an external
    /// collaborator; only deterministic matches are emitted here.
    fn link_cross_service(&self) -> Result<u64> {
        let endpoints = self.query(NodeType::ApiEndpoint)?;
        if endpoints.is_empty() {
            return Ok(0);
        }

        let key_of = |endpoint: &Node| -> Option<(String, String)> {
            let method = endpoint.properties.get("method")?.to_uppercase();
            let path = normalize_route(endpoint.properties.get("path")?);
            Some((method, path))
        };

        let mut providers: HashMap<(String, String), &Node> = HashMap::new();
        for endpoint in &endpoints {
            if endpoint.properties.get("role").map(String::as_str) != Some("consumer") {
                if let Some(key) = key_of(endpoint) {
                    providers.insert(key, endpoint);
                }
            }
        }

        let mut count = 0;
        for consumer in &endpoints {
            if consumer.properties.get("role").map(String::as_str) != Some("consumer") {
                continue;
            }
            let Some(key) = key_of(consumer) else { continue };
            let Some(provider) = providers.get(&key) else {
                continue;
            };
            if provider.file_path == consumer.file_path {
                continue;
            }
            let edge = Edge::new(EdgeType::Consumes, consumer.id.clone(), provider.id.clone())
                .with_property("method", key.0.clone())
                .with_property("path", key.1.clone());
            self.store.add_edge(self.branch, edge)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Same package first, then a package named by the qualifier, then a
/// unique by-name match.
fn pick_callee<'n>(
    caller: &Node,
    qualifier: Option<&str>,
    candidates: &[&'n Node],
) -> Option<&'n Node> {
    let same_package: Vec<&&Node> = candidates
        .iter()
        .filter(|candidate| candidate.package == caller.package)
        .collect();
    if let [only] = same_package.as_slice() {
        return Some(**only);
    }
    if let Some(qualifier) = qualifier {
        let by_package: Vec<&&Node> = candidates
            .iter()
            .filter(|candidate| candidate.package == qualifier)
            .collect();
        if let [only] = by_package.as_slice() {
            return Some(**only);
        }
        // `recv.Method` — receiver-qualified methods
        let by_receiver: Vec<&&Node> = candidates
            .iter()
            .filter(|candidate| {
                candidate.properties.get("receiver").map(String::as_str) == Some(qualifier)
            })
            .collect();
        if let [only] = by_receiver.as_slice() {
            return Some(**only);
        }
    }
    if let [only] = candidates {
        return Some(*only);
    }
    None
}

fn parent_dir(path: &str) -> String {
    std::path::Path::new(path)
        .parent()
        .and_then(|dir| dir.to_str())
        .unwrap_or("")
        .to_string()
}

fn strip_extension(path: &str) -> &str {
    path.rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(path)
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Route template normalization: `/users/:id/` and `/users/{userId}`
/// compare equal.
fn normalize_route(path: &str) -> String {
    let mut segments = Vec::new();
    for segment in path.trim_matches('/').split('/') {
        if segment.starts_with(':') || segment.starts_with('{') {
            segments.push("*");
        } else if !segment.is_empty() {
            segments.push(segment);
        }
    }
    format!("/{}", segments.join("/")).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("src/./services/../user"), "src/user");
        assert_eq!(normalize_path("src/services/./user"), "src/services/user");
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/users/:id/"), "/users/*");
        assert_eq!(normalize_route("users/{userId}"), "/users/*");
        assert_eq!(normalize_route("/Users/All"), "/users/all");
    }
}
