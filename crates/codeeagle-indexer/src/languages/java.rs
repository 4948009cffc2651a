//! Java language extractor using tree-sitter

use codeeagle_core::{Edge, EdgeType, GraphError, Node, NodeId, NodeType, Result};
use tree_sitter::Node as SyntaxNode;

use super::{join_calls, line_span, node_text, parse_tree, push_call, walk_tree};
use crate::heuristics;
use crate::parser::{ParseResult, Parser};

pub struct JavaParser;

fn is_public(node: SyntaxNode, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifiers" {
            return node_text(child, source).contains("public");
        }
    }
    false
}

fn collect_calls(body: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut calls = Vec::new();
    walk_tree(body, &mut |node| {
        if node.kind() != "method_invocation" {
            return;
        }
        if let Some(name) = node.child_by_field_name("name") {
            match node.child_by_field_name("object") {
                Some(object) if object.kind() == "identifier" => {
                    push_call(
                        &mut calls,
                        format!("{}.{}", node_text(object, source), node_text(name, source)),
                    );
                }
                _ => push_call(&mut calls, node_text(name, source)),
            }
        }
    });
    calls
}

/// `implements X, Y` type names of a class.
fn implemented_interfaces(class_node: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(interfaces) = class_node.child_by_field_name("interfaces") {
        walk_tree(interfaces, &mut |node| {
            if node.kind() == "type_identifier" {
                names.push(node_text(node, source).to_string());
            }
        });
    }
    names
}

impl JavaParser {
    fn method_node(
        &self,
        syntax: SyntaxNode,
        source: &[u8],
        path: &str,
        package: &str,
        owner: &str,
        in_test_file: bool,
    ) -> Option<Node> {
        let name_node = syntax.child_by_field_name("name")?;
        let name = node_text(name_node, source);
        let (start, end) = line_span(syntax);
        let node_type = if heuristics::is_test_function("java", in_test_file, name) {
            NodeType::TestFunction
        } else {
            NodeType::Method
        };
        let params = syntax
            .child_by_field_name("parameters")
            .map(|p| node_text(p, source).to_string())
            .unwrap_or_else(|| "()".to_string());
        let mut node = Node::new(node_type, name, path)
            .with_lines(start, end)
            .with_package(package)
            .with_language("java")
            .with_signature(format!("{name}{params}"))
            .with_exported(is_public(syntax, source))
            .with_property("receiver", owner);
        if let Some(body) = syntax.child_by_field_name("body") {
            let calls = collect_calls(body, source);
            if !calls.is_empty() {
                node = node.with_property("calls", join_calls(&calls));
            }
        }
        Some(node)
    }
}

impl Parser for JavaParser {
    fn language(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        let source = std::str::from_utf8(content).map_err(|err| GraphError::parse(path, err))?;
        let tree = parse_tree(&tree_sitter_java::LANGUAGE.into(), source, path)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let in_test_file = heuristics::is_test_file("java", path);
        let file_type = if in_test_file {
            NodeType::TestFile
        } else {
            NodeType::File
        };

        let mut package = String::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "package_declaration" {
                let mut inner = child.walk();
                for sub in child.children(&mut inner) {
                    if matches!(sub.kind(), "scoped_identifier" | "identifier") {
                        package = node_text(sub, bytes).to_string();
                    }
                }
            }
        }

        let file = Node::new(file_type, path, path)
            .with_package(&package)
            .with_language("java");
        let file_id = file.id.clone();
        let mut nodes = vec![file];
        let mut edges = Vec::new();
        let contain = |nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, parent: &NodeId, node: Node| {
            edges.push(Edge::new(EdgeType::Contains, parent.clone(), node.id.clone()));
            nodes.push(node);
        };

        let mut cursor = root.walk();
        for top in root.children(&mut cursor) {
            let (start, end) = line_span(top);
            match top.kind() {
                "import_declaration" => {
                    let mut module = String::new();
                    walk_tree(top, &mut |node| {
                        if node.kind() == "scoped_identifier" && module.is_empty() {
                            module = node_text(node, bytes).to_string();
                        }
                    });
                    if !module.is_empty() {
                        let import = Node::new(NodeType::Import, module.clone(), path)
                            .with_lines(start, end)
                            .with_package(&package)
                            .with_language("java")
                            .with_property("module", module.clone());
                        contain(&mut nodes, &mut edges, &file_id, import);
                    }
                }
                "class_declaration" => {
                    let Some(name_node) = top.child_by_field_name("name") else {
                        continue;
                    };
                    let class_name = node_text(name_node, bytes).to_string();
                    let mut class = Node::new(NodeType::Class, class_name.clone(), path)
                        .with_lines(start, end)
                        .with_package(&package)
                        .with_language("java")
                        .with_exported(is_public(top, bytes));
                    let implements = implemented_interfaces(top, bytes);
                    if !implements.is_empty() {
                        class = class.with_property("implements", implements.join(";"));
                    }
                    let class_id = class.id.clone();
                    contain(&mut nodes, &mut edges, &file_id, class);

                    if let Some(body) = top.child_by_field_name("body") {
                        let mut members = body.walk();
                        for member in body.children(&mut members) {
                            match member.kind() {
                                "method_declaration" => {
                                    if let Some(method) = self.method_node(
                                        member,
                                        bytes,
                                        path,
                                        &package,
                                        &class_name,
                                        in_test_file,
                                    ) {
                                        contain(&mut nodes, &mut edges, &class_id, method);
                                    }
                                }
                                "field_declaration" => {
                                    let mut names = Vec::new();
                                    walk_tree(member, &mut |node| {
                                        if node.kind() == "variable_declarator" {
                                            if let Some(name) = node.child_by_field_name("name") {
                                                names.push(node_text(name, bytes).to_string());
                                            }
                                        }
                                    });
                                    let (f_start, f_end) = line_span(member);
                                    for name in names {
                                        let field = Node::new(NodeType::Field, name, path)
                                            .with_lines(f_start, f_end)
                                            .with_package(&package)
                                            .with_language("java")
                                            .with_exported(is_public(member, bytes));
                                        contain(&mut nodes, &mut edges, &class_id, field);
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
                "interface_declaration" => {
                    let Some(name_node) = top.child_by_field_name("name") else {
                        continue;
                    };
                    let name = node_text(name_node, bytes);
                    let mut methods = Vec::new();
                    if let Some(body) = top.child_by_field_name("body") {
                        walk_tree(body, &mut |node| {
                            if node.kind() == "method_declaration" {
                                if let Some(method_name) = node.child_by_field_name("name") {
                                    methods.push(node_text(method_name, bytes).to_string());
                                }
                            }
                        });
                    }
                    let mut interface = Node::new(NodeType::Interface, name, path)
                        .with_lines(start, end)
                        .with_package(&package)
                        .with_language("java")
                        .with_exported(is_public(top, bytes));
                    if !methods.is_empty() {
                        interface = interface.with_property("methods", methods.join(";"));
                    }
                    contain(&mut nodes, &mut edges, &file_id, interface);
                }
                _ => {}
            }
        }

        Ok(ParseResult {
            language: "java".to_string(),
            nodes,
            edges,
        })
    }
}
