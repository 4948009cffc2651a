//! Go language extractor using tree-sitter

use codeeagle_core::{Edge, EdgeType, GraphError, Node, NodeId, NodeType, Result};
use tree_sitter::Node as SyntaxNode;

use super::{join_calls, line_span, node_text, parse_tree, push_call, walk_tree};
use crate::heuristics;
use crate::parser::{ParseResult, Parser};

pub struct GoParser;

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Callee names referenced inside a function body: `foo`, `pkg.Bar`,
/// `recv.Method`.
fn collect_calls(body: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut calls = Vec::new();
    walk_tree(body, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        if let Some(function) = node.child_by_field_name("function") {
            match function.kind() {
                "identifier" | "selector_expression" => {
                    push_call(&mut calls, node_text(function, source));
                }
                _ => {}
            }
        }
    });
    calls
}

/// The receiver's type name, pointer stripped: `(r *FileReader)` →
/// `FileReader`.
fn receiver_type(receiver: SyntaxNode, source: &[u8]) -> Option<String> {
    let mut found = None;
    walk_tree(receiver, &mut |node| {
        if found.is_none() && node.kind() == "type_identifier" {
            found = Some(node_text(node, source).to_string());
        }
    });
    found
}

fn signature_of(node: SyntaxNode, source: &[u8], name: &str, receiver: Option<&str>) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| node_text(p, source).to_string())
        .unwrap_or_else(|| "()".to_string());
    let result = node
        .child_by_field_name("result")
        .map(|r| format!(" {}", node_text(r, source)))
        .unwrap_or_default();
    match receiver {
        Some(recv) => format!("func ({recv}) {name}{params}{result}"),
        None => format!("func {name}{params}{result}"),
    }
}

/// Interface method names, `;`-joined for the `methods` property. The
/// linker's implements phase consumes this without re-parsing.
fn interface_methods(interface: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut methods = Vec::new();
    let mut cursor = interface.walk();
    for child in interface.children(&mut cursor) {
        // method_elem in current grammars, method_spec in older ones
        if matches!(child.kind(), "method_elem" | "method_spec") {
            if let Some(name) = child.child_by_field_name("name") {
                methods.push(node_text(name, source).to_string());
            }
        }
    }
    methods
}

impl GoParser {
    fn symbol(
        &self,
        node_type: NodeType,
        name: &str,
        path: &str,
        package: &str,
        syntax: SyntaxNode,
    ) -> Node {
        let (start, end) = line_span(syntax);
        Node::new(node_type, name, path)
            .with_lines(start, end)
            .with_package(package)
            .with_language("go")
            .with_exported(is_exported(name))
    }
}

impl Parser for GoParser {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        let source = std::str::from_utf8(content).map_err(|err| GraphError::parse(path, err))?;
        let tree = parse_tree(&tree_sitter_go::LANGUAGE.into(), source, path)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let in_test_file = heuristics::is_test_file("go", path);
        let file_type = if in_test_file {
            NodeType::TestFile
        } else {
            NodeType::File
        };

        let mut package = String::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "package_clause" {
                let mut inner = child.walk();
                for sub in child.children(&mut inner) {
                    if sub.kind() == "package_identifier" {
                        package = node_text(sub, bytes).to_string();
                    }
                }
            }
        }

        let file = Node::new(file_type, path, path)
            .with_package(&package)
            .with_language("go");
        let file_id = file.id.clone();
        let mut nodes = vec![file];
        let mut edges = Vec::new();
        let contain = |nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, parent: &NodeId, node: Node| {
            edges.push(Edge::new(EdgeType::Contains, parent.clone(), node.id.clone()));
            nodes.push(node);
        };

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "import_declaration" => {
                    let mut modules = Vec::new();
                    walk_tree(child, &mut |node| {
                        if node.kind() == "interpreted_string_literal" {
                            let module = node_text(node, bytes).trim_matches('"').to_string();
                            if !module.is_empty() {
                                modules.push(module);
                            }
                        }
                    });
                    for module in modules {
                        let import = self
                            .symbol(NodeType::Import, &module, path, &package, child)
                            .with_property("module", module.clone());
                        contain(&mut nodes, &mut edges, &file_id, import);
                    }
                }
                "function_declaration" => {
                    let Some(name_node) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, bytes);
                    let node_type = if heuristics::is_test_function("go", in_test_file, name) {
                        NodeType::TestFunction
                    } else {
                        NodeType::Function
                    };
                    let mut function = self
                        .symbol(node_type, name, path, &package, child)
                        .with_signature(signature_of(child, bytes, name, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        let calls = collect_calls(body, bytes);
                        if !calls.is_empty() {
                            function = function.with_property("calls", join_calls(&calls));
                        }
                    }
                    contain(&mut nodes, &mut edges, &file_id, function);
                }
                "method_declaration" => {
                    let Some(name_node) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, bytes);
                    let receiver = child
                        .child_by_field_name("receiver")
                        .and_then(|r| receiver_type(r, bytes));
                    let mut method = self
                        .symbol(NodeType::Method, name, path, &package, child)
                        .with_signature(signature_of(
                            child,
                            bytes,
                            name,
                            receiver.as_deref(),
                        ));
                    if let Some(receiver) = &receiver {
                        method = method.with_property("receiver", receiver.clone());
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        let calls = collect_calls(body, bytes);
                        if !calls.is_empty() {
                            method = method.with_property("calls", join_calls(&calls));
                        }
                    }
                    contain(&mut nodes, &mut edges, &file_id, method);
                }
                "type_declaration" => {
                    let mut specs = child.walk();
                    for spec in child.children(&mut specs) {
                        if spec.kind() != "type_spec" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = node_text(name_node, bytes);
                        let Some(type_node) = spec.child_by_field_name("type") else {
                            continue;
                        };
                        match type_node.kind() {
                            "struct_type" => {
                                let strct =
                                    self.symbol(NodeType::Struct, name, path, &package, spec);
                                let struct_id = strct.id.clone();
                                contain(&mut nodes, &mut edges, &file_id, strct);
                                let mut fields = Vec::new();
                                walk_tree(type_node, &mut |node| {
                                    if node.kind() == "field_declaration" {
                                        fields.push(node);
                                    }
                                });
                                for field_decl in fields {
                                    let type_text = field_decl
                                        .child_by_field_name("type")
                                        .map(|t| node_text(t, bytes).to_string());
                                    let mut names = field_decl.walk();
                                    for part in field_decl.children(&mut names) {
                                        if part.kind() != "field_identifier" {
                                            continue;
                                        }
                                        let field_name = node_text(part, bytes);
                                        let mut field = self.symbol(
                                            NodeType::Field,
                                            field_name,
                                            path,
                                            &package,
                                            field_decl,
                                        );
                                        if let Some(type_text) = &type_text {
                                            field =
                                                field.with_property("type", type_text.clone());
                                        }
                                        contain(&mut nodes, &mut edges, &struct_id, field);
                                    }
                                }
                            }
                            "interface_type" => {
                                let methods = interface_methods(type_node, bytes);
                                let mut interface =
                                    self.symbol(NodeType::Interface, name, path, &package, spec);
                                if !methods.is_empty() {
                                    interface =
                                        interface.with_property("methods", methods.join(";"));
                                }
                                contain(&mut nodes, &mut edges, &file_id, interface);
                            }
                            _ => {
                                let alias =
                                    self.symbol(NodeType::TypeAlias, name, path, &package, spec);
                                contain(&mut nodes, &mut edges, &file_id, alias);
                            }
                        }
                    }
                }
                "const_declaration" | "var_declaration" => {
                    let node_type = if child.kind() == "const_declaration" {
                        NodeType::Constant
                    } else {
                        NodeType::Variable
                    };
                    let mut names = Vec::new();
                    walk_tree(child, &mut |node| {
                        if matches!(node.kind(), "const_spec" | "var_spec") {
                            if let Some(name_node) = node.child_by_field_name("name") {
                                names.push((node_text(name_node, bytes).to_string(), node));
                            }
                        }
                    });
                    for (name, spec) in names {
                        let symbol = self.symbol(node_type, &name, path, &package, spec);
                        contain(&mut nodes, &mut edges, &file_id, symbol);
                    }
                }
                _ => {}
            }
        }

        Ok(ParseResult {
            language: "go".to_string(),
            nodes,
            edges,
        })
    }
}
