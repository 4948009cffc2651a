//! TypeScript language extractor using tree-sitter

use codeeagle_core::{Edge, EdgeType, GraphError, Node, NodeId, NodeType, Result};
use tree_sitter::Node as SyntaxNode;

use super::{join_calls, line_span, node_text, parse_tree, push_call, walk_tree};
use crate::heuristics;
use crate::parser::{ParseResult, Parser};

pub struct TypeScriptParser;

fn collect_calls(body: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut calls = Vec::new();
    walk_tree(body, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        if let Some(function) = node.child_by_field_name("function") {
            match function.kind() {
                "identifier" | "member_expression" => {
                    push_call(&mut calls, node_text(function, source));
                }
                _ => {}
            }
        }
    });
    calls
}

/// Interface method names for the `methods` property.
fn interface_methods(body: SyntaxNode, source: &[u8]) -> Vec<String> {
    let mut methods = Vec::new();
    walk_tree(body, &mut |node| {
        if node.kind() == "method_signature" {
            if let Some(name) = node.child_by_field_name("name") {
                methods.push(node_text(name, source).to_string());
            }
        }
    });
    methods
}

/// `implements`/`extends` names from a class heritage clause.
fn heritage_names(class_node: SyntaxNode, source: &[u8], clause_kind: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = class_node.walk();
    for child in class_node.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut clauses = child.walk();
        for clause in child.children(&mut clauses) {
            if clause.kind() != clause_kind {
                continue;
            }
            walk_tree(clause, &mut |node| {
                if matches!(node.kind(), "type_identifier" | "identifier") {
                    names.push(node_text(node, source).to_string());
                }
            });
        }
    }
    names
}

pub(crate) struct TsLike {
    pub language: &'static str,
    pub grammar: fn(&str) -> tree_sitter::Language,
}

/// Shared walker for TypeScript and JavaScript. The grammars differ, the
/// statement shapes do not.
pub(crate) fn extract(ts: &TsLike, path: &str, content: &[u8]) -> Result<ParseResult> {
    let source = std::str::from_utf8(content).map_err(|err| GraphError::parse(path, err))?;
    let tree = parse_tree(&(ts.grammar)(path), source, path)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let in_test_file = heuristics::is_test_file(ts.language, path);
    let file_type = if in_test_file {
        NodeType::TestFile
    } else {
        NodeType::File
    };

    let file = Node::new(file_type, path, path).with_language(ts.language);
    let file_id = file.id.clone();
    let mut nodes = vec![file];
    let mut edges = Vec::new();
    let contain = |nodes: &mut Vec<Node>, edges: &mut Vec<Edge>, parent: &NodeId, node: Node| {
        edges.push(Edge::new(EdgeType::Contains, parent.clone(), node.id.clone()));
        nodes.push(node);
    };

    let mut cursor = root.walk();
    for top in root.children(&mut cursor) {
        // `export function f() {}` wraps the declaration
        let (item, exported) = if top.kind() == "export_statement" {
            match top.child_by_field_name("declaration") {
                Some(decl) => (decl, true),
                None => continue,
            }
        } else {
            (top, false)
        };
        let (start, end) = line_span(item);

        match item.kind() {
            "import_statement" => {
                if let Some(source_node) = item.child_by_field_name("source") {
                    let module = node_text(source_node, bytes)
                        .trim_matches(['"', '\''])
                        .to_string();
                    if !module.is_empty() {
                        let import = Node::new(NodeType::Import, module.clone(), path)
                            .with_lines(start, end)
                            .with_language(ts.language)
                            .with_property("module", module.clone());
                        contain(&mut nodes, &mut edges, &file_id, import);
                    }
                }
            }
            "function_declaration" => {
                let Some(name_node) = item.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, bytes);
                let node_type = if heuristics::is_test_function(ts.language, in_test_file, name) {
                    NodeType::TestFunction
                } else {
                    NodeType::Function
                };
                let params = item
                    .child_by_field_name("parameters")
                    .map(|p| node_text(p, bytes).to_string())
                    .unwrap_or_else(|| "()".to_string());
                let mut function = Node::new(node_type, name, path)
                    .with_lines(start, end)
                    .with_language(ts.language)
                    .with_signature(format!("function {name}{params}"))
                    .with_exported(exported);
                if let Some(body) = item.child_by_field_name("body") {
                    let calls = collect_calls(body, bytes);
                    if !calls.is_empty() {
                        function = function.with_property("calls", join_calls(&calls));
                    }
                }
                contain(&mut nodes, &mut edges, &file_id, function);
            }
            "class_declaration" => {
                let Some(name_node) = item.child_by_field_name("name") else {
                    continue;
                };
                let class_name = node_text(name_node, bytes).to_string();
                let mut class = Node::new(NodeType::Class, class_name.clone(), path)
                    .with_lines(start, end)
                    .with_language(ts.language)
                    .with_exported(exported);
                let implements = heritage_names(item, bytes, "implements_clause");
                if !implements.is_empty() {
                    class = class.with_property("implements", implements.join(";"));
                }
                let extends = heritage_names(item, bytes, "extends_clause");
                if !extends.is_empty() {
                    class = class.with_property("extends", extends.join(";"));
                }
                let class_id = class.id.clone();
                contain(&mut nodes, &mut edges, &file_id, class);

                if let Some(body) = item.child_by_field_name("body") {
                    let mut members = body.walk();
                    for member in body.children(&mut members) {
                        if member.kind() != "method_definition" {
                            continue;
                        }
                        let Some(method_name) = member.child_by_field_name("name") else {
                            continue;
                        };
                        let method_name = node_text(method_name, bytes);
                        let (m_start, m_end) = line_span(member);
                        let mut method = Node::new(NodeType::Method, method_name, path)
                            .with_lines(m_start, m_end)
                            .with_language(ts.language)
                            .with_property("receiver", class_name.clone());
                        if let Some(body) = member.child_by_field_name("body") {
                            let calls = collect_calls(body, bytes);
                            if !calls.is_empty() {
                                method = method.with_property("calls", join_calls(&calls));
                            }
                        }
                        contain(&mut nodes, &mut edges, &class_id, method);
                    }
                }
            }
            "interface_declaration" => {
                let Some(name_node) = item.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, bytes);
                let mut interface = Node::new(NodeType::Interface, name, path)
                    .with_lines(start, end)
                    .with_language(ts.language)
                    .with_exported(exported);
                if let Some(body) = item.child_by_field_name("body") {
                    let methods = interface_methods(body, bytes);
                    if !methods.is_empty() {
                        interface = interface.with_property("methods", methods.join(";"));
                    }
                }
                contain(&mut nodes, &mut edges, &file_id, interface);
            }
            _ => {}
        }
    }

    Ok(ParseResult {
        language: ts.language.to_string(),
        nodes,
        edges,
    })
}

fn typescript_grammar(path: &str) -> tree_sitter::Language {
    if path.ends_with(".tsx") {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    } else {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }
}

impl Parser for TypeScriptParser {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx"]
    }

    fn parse_file(&self, path: &str, content: &[u8]) -> Result<ParseResult> {
        extract(
            &TsLike {
                language: "typescript",
                grammar: typescript_grammar,
            },
            path,
            content,
        )
    }
}
