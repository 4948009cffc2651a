//! Unit tests for codeeagle-core

use crate::model::*;

#[test]
fn test_node_id_determinism() {
    let a = Node::new(NodeType::Function, "foo", "a.go").with_lines(3, 5);
    let b = Node::new(NodeType::Function, "foo", "a.go").with_lines(3, 5);

    assert_eq!(a.id, b.id);

    // Different names, files, or types produce different IDs
    let c = Node::new(NodeType::Function, "bar", "a.go").with_lines(3, 5);
    assert_ne!(a.id, c.id);
    let d = Node::new(NodeType::Function, "foo", "b.go").with_lines(3, 5);
    assert_ne!(a.id, d.id);
    let e = Node::new(NodeType::Method, "foo", "a.go").with_lines(3, 5);
    assert_ne!(a.id, e.id);
}

#[test]
fn test_node_id_ignores_non_identity_fields() {
    let plain = Node::new(NodeType::Function, "foo", "a.go");
    let decorated = Node::new(NodeType::Function, "foo", "a.go")
        .with_language("go")
        .with_signature("func foo()")
        .with_exported(true)
        .with_property("calls", "bar");

    assert_eq!(plain.id, decorated.id);
}

#[test]
fn test_node_id_tracks_package_and_line() {
    let a = Node::new(NodeType::Function, "foo", "a.go").with_package("main");
    let b = Node::new(NodeType::Function, "foo", "a.go").with_package("util");
    assert_ne!(a.id, b.id);

    let c = Node::new(NodeType::Function, "foo", "a.go").with_lines(1, 2);
    let d = Node::new(NodeType::Function, "foo", "a.go").with_lines(9, 12);
    assert_ne!(c.id, d.id);
}

#[test]
fn test_edge_id_determinism() {
    let src = Node::new(NodeType::File, "a.go", "a.go");
    let dst = Node::new(NodeType::Function, "foo", "a.go");

    let e1 = Edge::new(EdgeType::Contains, src.id.clone(), dst.id.clone());
    let e2 = Edge::new(EdgeType::Contains, src.id.clone(), dst.id.clone());
    assert_eq!(e1.id, e2.id);

    // Direction matters
    let flipped = Edge::new(EdgeType::Contains, dst.id.clone(), src.id.clone());
    assert_ne!(e1.id, flipped.id);

    // Type matters
    let typed = Edge::new(EdgeType::Calls, src.id, dst.id);
    assert_ne!(e1.id, typed.id);
}

#[test]
fn test_type_tags_round_trip() {
    let node_types = [
        NodeType::File,
        NodeType::TestFile,
        NodeType::Package,
        NodeType::Module,
        NodeType::Function,
        NodeType::Method,
        NodeType::TestFunction,
        NodeType::Struct,
        NodeType::Class,
        NodeType::Interface,
        NodeType::Field,
        NodeType::Variable,
        NodeType::Constant,
        NodeType::TypeAlias,
        NodeType::Import,
        NodeType::Document,
        NodeType::Dependency,
        NodeType::ApiEndpoint,
    ];
    for nt in node_types {
        assert_eq!(NodeType::parse(nt.as_str()), Some(nt), "tag {}", nt.as_str());
        // serde uses the same snake_case tag as as_str()
        let json = serde_json::to_string(&nt).unwrap();
        assert_eq!(json, format!("\"{}\"", nt.as_str()));
    }

    let edge_types = [
        EdgeType::Calls,
        EdgeType::Implements,
        EdgeType::Imports,
        EdgeType::Contains,
        EdgeType::DependsOn,
        EdgeType::Consumes,
        EdgeType::Documents,
        EdgeType::Tests,
        EdgeType::References,
        EdgeType::Extends,
    ];
    for et in edge_types {
        assert_eq!(EdgeType::parse(et.as_str()), Some(et), "tag {}", et.as_str());
        let json = serde_json::to_string(&et).unwrap();
        assert_eq!(json, format!("\"{}\"", et.as_str()));
    }
}

#[test]
fn test_node_serialization_round_trip() {
    let node = Node::new(NodeType::Method, "Read", "impl.go")
        .with_lines(10, 14)
        .with_package("reader")
        .with_language("go")
        .with_signature("func (r *FileReader) Read() ([]byte, error)")
        .with_exported(true)
        .with_property("receiver", "FileReader");

    let json = serde_json::to_string(&node).unwrap();
    let back: Node = serde_json::from_str(&json).unwrap();
    assert_eq!(node, back);
}

#[test]
fn test_node_preserves_unknown_fields() {
    let json = r#"{
        "id": "abc123",
        "type": "function",
        "name": "foo",
        "file_path": "a.go",
        "future_field": {"nested": true}
    }"#;
    let node: Node = serde_json::from_str(json).unwrap();
    assert_eq!(node.extra.len(), 1);

    let out = serde_json::to_string(&node).unwrap();
    assert!(out.contains("future_field"), "unknown field lost: {out}");
}

#[test]
fn test_filter_helpers() {
    assert!(NodeFilter::default().is_empty());
    assert!(!NodeFilter::of_type(NodeType::File).is_empty());
    assert_eq!(
        NodeFilter::in_file("a.go").file_path.as_deref(),
        Some("a.go")
    );
}
