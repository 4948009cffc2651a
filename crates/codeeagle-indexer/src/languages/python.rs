//! Python language extractor using tree-sitter

use codeeagle_core::{Edge, EdgeType, GraphError, Node, NodeId, NodeType, Result};
use tree_sitter::Node as SyntaxNode;

use super::{join_calls, line_span, node_text, parse_tree, push_call, walk_tree};
use crate::heuristics;
use crate::parser::{ParseResult, Parser};

pub struct PythonParser;

fn is_exported(name: &str) -> bool {
    !name.starts_with('_')
}

/// Dotted package from the directory part of the path:
/// `pkg/sub/mod.py` → `pkg.sub`.
fn package_of(path: &str) -> String {
    std::path::Path::new(path)
        .parent()
        .and_then(|dir| dir.to_str())
        .filter(|dir| !dir.is_empty())
        .map(|dir| dir.replace('/', "."))
        .unwrap_or_default()
}

fn collect_calls(body: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut calls = Vec::new();
    walk_tree(body, &mut |node| {
        if node.kind() != "call" {
            return;
        }
        if let Some(function) = node.child_by_field_name("function") {
            match function.kind() {
                "identifier" | "attribute" => {
                    push_call(&mut calls, node_text(function, source));
                }
                _ => {}
            }
        }
    });
    calls
}

fn signature_of(node: SyntaxNode, source: &[u8], name: &str) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source).to_string())
        .unwrap_or_else(|| "()".to_string());
    format!("def {name}{params}")
}

impl PythonParser {
    fn function_node(
        &self,
        syntax: SyntaxNode,
        source: &[u8],
        path: &str,
        package: &str,
        in_test_file: bool,
        class_name: Option<&str>,
    ) -> Option<Node> {
        let name_node = syntax.child_by_field_name("name")?;
        let name = node_text(name_node, source);
        let (start, end) = line_span(syntax);
        let node_type = if class_name.is_some() {
            NodeType::Method
        } else if heuristics::is_test_function("python", in_test_file, name) {
            NodeType::TestFunction
        } else {
            NodeType::Function
        };
        let mut node = Node::new(node_type, name, path)
            .with_lines(start, end)
            .with_package(package)
            .with_language("python")
            .with_signature(signature_of(syntax, source, name))
            .with_exported(is_exported(name));
        if let Some(class_name) = class_name {
            node = node.with_property("receiver", class_name);
        }
        if let Some(body) = syntax.child_by_field_name("body") {
            let calls = collect_calls(body, source);
            if !calls.is_empty() {
                node = node.with_property("calls", join_calls(&calls));
            }
        }
        Some(node)
    }

    fn import_modules(syntax: SyntaxNode, source: &[u8]) -> Vec<String> {
        let mut modules = Vec::new();
        if syntax.kind() == "import_statement" {
            let mut cursor = syntax.walk();
            for child in syntax.children(&mut cursor) {
                if matches!(child.kind(), "dotted_name" | "aliased_import") {
                    if let Some(module) = node_text(child, source).split_whitespace().next() {
                        modules.push(module.to_string());
                    }
                }
            }
        } else if syntax.kind() == "import_from_statement" {
            if let Some(module) = syntax.child_by_field_name("module_name") {
                modules.push(node_text(module, source).to_string());
            }
        }
        modules
    }
}

impl Parser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        let source = std::str::from_utf8(content).map_err(|err| GraphError::parse(path, err))?;
        let tree = parse_tree(&tree_sitter_python::LANGUAGE.into(), source, path)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let in_test_file = heuristics::is_test_file("python", path);
        let file_type = if in_test_file {
            NodeType::TestFile
        } else {
            NodeType::File
        };
        let package = package_of(path);

        let file = Node::new(file_type, path, path)
            .with_package(&package)
            .with_language("python");
        let file_id = file.id.clone();
        let mut nodes = vec![file];
        let mut edges = Vec::new();
        let contain = |nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, parent: &NodeId, node: Node| {
            edges.push(Edge::new(EdgeType::Contains, parent.clone(), node.id.clone()));
            nodes.push(node);
        };

        let mut cursor = root.walk();
        for top in root.children(&mut cursor) {
            // Decorated definitions wrap the real one
            let item = if top.kind() == "decorated_definition" {
                top.child_by_field_name("definition").unwrap_or(top)
            } else {
                top
            };
            match item.kind() {
                "import_statement" | "import_from_statement" => {
                    for module in Self::import_modules(item, bytes) {
                        let (start, end) = line_span(item);
                        let import = Node::new(NodeType::Import, module.clone(), path)
                            .with_lines(start, end)
                            .with_package(&package)
                            .with_language("python")
                            .with_property("module", module.clone());
                        contain(&mut nodes, &mut edges, &file_id, import);
                    }
                }
                "function_definition" => {
                    if let Some(function) =
                        self.function_node(item, bytes, path, &package, in_test_file, None)
                    {
                        contain(&mut nodes, &mut edges, &file_id, function);
                    }
                }
                "class_definition" => {
                    let Some(name_node) = item.child_by_field_name("name") else {
                        continue;
                    };
                    let class_name = node_text(name_node, bytes).to_string();
                    let (start, end) = line_span(item);
                    let class = Node::new(NodeType::Class, class_name.clone(), path)
                        .with_lines(start, end)
                        .with_package(&package)
                        .with_language("python")
                        .with_exported(is_exported(&class_name));
                    let class_id = class.id.clone();
                    contain(&mut nodes, &mut edges, &file_id, class);

                    if let Some(body) = item.child_by_field_name("body") {
                        let mut members = body.walk();
                        for member in body.children(&mut members) {
                            let member = if member.kind() == "decorated_definition" {
                                member.child_by_field_name("definition").unwrap_or(member)
                            } else {
                                member
                            };
                            if member.kind() == "function_definition" {
                                if let Some(method) = self.function_node(
                                    member,
                                    bytes,
                                    path,
                                    &package,
                                    in_test_file,
                                    Some(&class_name),
                                ) {
                                    contain(&mut nodes, &mut edges, &class_id, method);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(ParseResult {
            language: "python".to_string(),
            nodes,
            edges,
        })
    }
}
