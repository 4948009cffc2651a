//! Unit tests for codeeagle-store

use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use codeeagle_core::{
    Direction, Edge, EdgeType, GraphError, GraphRead, GraphWrite, Node, NodeFilter, NodeId,
    NodeType,
};

use crate::export::read_export_branch;
use crate::layered::LayeredStore;
use crate::store::BranchStore;

fn open_store() -> (TempDir, Arc<BranchStore>) {
    let dir = TempDir::new().unwrap();
    let store = BranchStore::open(&dir.path().join("graph.db")).unwrap();
    (dir, store)
}

fn file_node(path: &str) -> Node {
    Node::new(NodeType::File, path, path).with_language("go")
}

fn func_node(name: &str, path: &str, line: u32) -> Node {
    Node::new(NodeType::Function, name, path)
        .with_lines(line, line + 2)
        .with_package("main")
        .with_language("go")
}

/// File node + one function + the Contains edge between them.
fn seed_file(store: &BranchStore, branch: &str, path: &str, func: &str) -> (Node, Node) {
    let file = file_node(path);
    let function = func_node(func, path, 3);
    let edge = Edge::new(EdgeType::Contains, file.id.clone(), function.id.clone());
    store
        .apply_parse(branch, path, &[file.clone(), function.clone()], &[edge])
        .unwrap();
    (file, function)
}

#[test]
fn test_add_and_get_node() {
    let (_dir, store) = open_store();
    let node = func_node("foo", "a.go", 3);

    store.add_node("main", node.clone()).unwrap();
    let loaded = store.get_node("main", &node.id).unwrap().unwrap();
    assert_eq!(loaded, node);

    // Unknown ID reads as None, not an error
    assert!(store
        .get_node("main", &NodeId::from_raw("missing"))
        .unwrap()
        .is_none());
}

#[test]
fn test_add_node_is_upsert() {
    let (_dir, store) = open_store();
    let node = func_node("foo", "a.go", 3);
    store.add_node("main", node.clone()).unwrap();

    let renamed = func_node("foo", "a.go", 3).with_signature("func foo()");
    store.add_node("main", renamed.clone()).unwrap();

    let loaded = store.get_node("main", &node.id).unwrap().unwrap();
    assert_eq!(loaded.signature.as_deref(), Some("func foo()"));
    assert_eq!(store.stats("main").unwrap().node_count, 1);
}

#[test]
fn test_update_node_requires_presence() {
    let (_dir, store) = open_store();
    let node = func_node("foo", "a.go", 3);

    let err = store.update_node("main", node.clone()).unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));

    store.add_node("main", node.clone()).unwrap();
    let updated = node.with_property("summary", "does things");
    store.update_node("main", updated.clone()).unwrap();
    assert_eq!(
        store.get_node("main", &updated.id).unwrap().unwrap(),
        updated
    );
}

#[test]
fn test_index_follows_node_moves() {
    let (_dir, store) = open_store();
    let node = func_node("foo", "a.go", 3);
    store.add_node("main", node.clone()).unwrap();

    // Same ID, changed indexed attribute: old index entries must go away.
    let mut renamed = node.clone();
    renamed.name = "bar".to_string();
    store.add_node("main", renamed).unwrap();

    let by_old_name = store
        .query_nodes(
            "main",
            &NodeFilter {
                name_pattern: Some("foo".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(by_old_name.is_empty());

    let by_new_name = store
        .query_nodes(
            "main",
            &NodeFilter {
                name_pattern: Some("bar".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(by_new_name.len(), 1);
}

#[test]
fn test_query_planner_and_filters() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "ReadFile");
    seed_file(&store, "main", "b.go", "WriteFile");

    // By file
    let in_a = store
        .query_nodes("main", &NodeFilter::in_file("a.go"))
        .unwrap();
    assert_eq!(in_a.len(), 2);

    // By type
    let files = store
        .query_nodes("main", &NodeFilter::of_type(NodeType::File))
        .unwrap();
    assert_eq!(files.len(), 2);

    // Name glob, case-insensitive
    let read = store
        .query_nodes(
            "main",
            &NodeFilter {
                name_pattern: Some("read*".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].name, "ReadFile");

    // Exact name uses the name index
    let exact = store
        .query_nodes(
            "main",
            &NodeFilter {
                name_pattern: Some("WriteFile".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(exact.len(), 1);

    // Combined predicates narrow
    let none = store
        .query_nodes(
            "main",
            &NodeFilter {
                node_type: Some(NodeType::File),
                name_pattern: Some("read*".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(none.is_empty());

    // Bad glob is a validation error
    let err = store
        .query_nodes(
            "main",
            &NodeFilter {
                name_pattern: Some("[".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[test]
fn test_edges_and_neighbors() {
    let (_dir, store) = open_store();
    let (file, function) = seed_file(&store, "main", "a.go", "foo");

    let edges = store.get_edges("main", &file.id, None).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].edge_type, EdgeType::Contains);

    // Type filter
    assert!(store
        .get_edges("main", &file.id, Some(EdgeType::Calls))
        .unwrap()
        .is_empty());

    let out = store
        .get_neighbors("main", &file.id, EdgeType::Contains, Direction::Outgoing)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, function.id);

    let inc = store
        .get_neighbors("main", &function.id, EdgeType::Contains, Direction::Incoming)
        .unwrap();
    assert_eq!(inc.len(), 1);
    assert_eq!(inc[0].id, file.id);

    assert!(store
        .get_neighbors("main", &file.id, EdgeType::Contains, Direction::Incoming)
        .unwrap()
        .is_empty());
}

#[test]
fn test_delete_node_removes_touching_edges() {
    let (_dir, store) = open_store();
    let (file, function) = seed_file(&store, "main", "a.go", "foo");

    store.delete_node("main", &function.id).unwrap();

    assert!(store.get_node("main", &function.id).unwrap().is_none());
    assert!(store.get_edges("main", &file.id, None).unwrap().is_empty());
    let stats = store.stats("main").unwrap();
    assert_eq!(stats.node_count, 1);
    assert_eq!(stats.edge_count, 0);
}

#[test]
fn test_delete_by_file_cleans_projection() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    let (other_file, _) = seed_file(&store, "main", "b.go", "bar");

    store.delete_by_file("main", "a.go").unwrap();

    let remaining = store.query_nodes("main", &NodeFilter::default()).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|node| node.file_path == "b.go"));
    assert_eq!(
        store.get_edges("main", &other_file.id, None).unwrap().len(),
        1
    );
}

#[test]
fn test_idempotent_reparse() {
    let (_dir, store) = open_store();
    let file = file_node("a.go");
    let function = func_node("foo", "a.go", 3);
    let edge = Edge::new(EdgeType::Contains, file.id.clone(), function.id.clone());

    store
        .apply_parse("main", "a.go", &[file.clone(), function.clone()], &[edge.clone()])
        .unwrap();
    let first = store.snapshot_branch("main").unwrap();

    store
        .apply_parse("main", "a.go", &[file, function], &[edge])
        .unwrap();
    let second = store.snapshot_branch("main").unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_index_base_consistency() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    seed_file(&store, "main", "b.go", "bar");
    store.delete_by_file("main", "a.go").unwrap();

    // Every index entry must resolve to a node agreeing with the indexed
    // attribute.
    for (key, _) in store.snapshot_branch("main").unwrap() {
        let text = String::from_utf8(key).unwrap();
        let mut parts = text.splitn(3, '/');
        let family = parts.next().unwrap();
        let _branch = parts.next().unwrap();
        let rest = parts.next().unwrap_or_default();
        if !matches!(family, "IF" | "IT" | "IP" | "IN") {
            continue;
        }
        let (attr, id) = rest.rsplit_once('/').unwrap();
        let node = store
            .get_node("main", &NodeId::from_raw(id))
            .unwrap()
            .unwrap_or_else(|| panic!("index entry {text} has no node"));
        match family {
            "IF" => assert_eq!(node.file_path, attr),
            "IT" => assert_eq!(node.node_type.as_str(), attr),
            "IP" => assert_eq!(node.package, attr),
            "IN" => assert_eq!(node.name.to_lowercase(), attr),
            _ => unreachable!(),
        }
    }
}

#[test]
fn test_branch_isolation() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    let main_before = store.snapshot_branch("main").unwrap();

    seed_file(&store, "feat", "a.go", "foo");
    seed_file(&store, "feat", "b.go", "bar");

    // Writes to feat never change main
    assert_eq!(store.snapshot_branch("main").unwrap(), main_before);
    assert_eq!(store.stats("main").unwrap().node_count, 2);
    assert_eq!(store.stats("feat").unwrap().node_count, 4);

    // Dropping feat removes only feat's keys
    store.drop_branch("feat").unwrap();
    assert_eq!(store.branch_key_count("feat").unwrap(), 0);
    assert_eq!(store.snapshot_branch("main").unwrap(), main_before);
    assert!(!store.branch_exists("feat").unwrap());
    assert!(store.branch_exists("main").unwrap());
}

#[test]
fn test_branch_name_validation() {
    let (_dir, store) = open_store();
    let err = store.add_node("bad/name", func_node("foo", "a.go", 1)).unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[test]
fn test_replace_branch() {
    let (_dir, store) = open_store();
    seed_file(&store, "incoming", "a.go", "foo");
    seed_file(&store, "main", "old.go", "stale");

    store.replace_branch("incoming", "main").unwrap();

    assert!(!store.branch_exists("incoming").unwrap());
    let nodes = store.query_nodes("main", &NodeFilter::default()).unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|node| node.file_path == "a.go"));

    let err = store.replace_branch("incoming", "main").unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
}

#[test]
fn test_export_round_trip() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    seed_file(&store, "main", "b.go", "bar");
    let before = store.stats("main").unwrap();
    let nodes_before = {
        let mut nodes = store.query_nodes("main", &NodeFilter::default()).unwrap();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    };

    let mut buffer = Vec::new();
    let summary = store.export_branch("main", &mut buffer).unwrap();
    assert_eq!(summary.nodes, 4);
    assert_eq!(summary.edges, 2);

    // Header alone identifies the branch
    let mut reader = BufReader::new(Cursor::new(&buffer));
    assert_eq!(read_export_branch(&mut reader).unwrap(), "main");

    store.drop_branch("main").unwrap();
    let mut reader = BufReader::new(Cursor::new(&buffer));
    store.import_into_branch(&mut reader, "main2").unwrap();

    assert_eq!(store.stats("main2").unwrap(), before);
    let mut nodes_after = store.query_nodes("main2", &NodeFilter::default()).unwrap();
    nodes_after.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(nodes_after, nodes_before);
}

#[test]
fn test_import_version_mismatch_is_fatal() {
    let (_dir, store) = open_store();
    let data = format!(
        "{}\n",
        serde_json::json!({
            "format": "codeeagle-graph",
            "version": 99,
            "branch": "main",
            "exported_at": "2026-01-01T00:00:00Z"
        })
    );
    let mut reader = BufReader::new(Cursor::new(data.into_bytes()));
    let err = store.import_into_branch(&mut reader, "main").unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[test]
fn test_import_failure_leaves_target_untouched() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    let before = store.snapshot_branch("main").unwrap();

    let data = format!(
        "{}\nnot-json\n",
        serde_json::json!({
            "format": "codeeagle-graph",
            "version": 1,
            "branch": "main",
            "exported_at": "2026-01-01T00:00:00Z"
        })
    );
    let mut reader = BufReader::new(Cursor::new(data.into_bytes()));
    let err = store.import_into_branch(&mut reader, "main").unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));

    assert_eq!(store.snapshot_branch("main").unwrap(), before);
    // The partial scratch branch is scrapped as well
    assert!(!store.branch_exists("main~import").unwrap());
}

#[test]
fn test_import_preserves_unknown_record_fields() {
    let (_dir, store) = open_store();
    let node = func_node("foo", "a.go", 3);
    let mut record = serde_json::to_value(&node).unwrap();
    record["kind"] = "node".into();
    record["novel_field"] = serde_json::json!(42);
    let data = format!(
        "{}\n{}\n",
        serde_json::json!({
            "format": "codeeagle-graph",
            "version": 1,
            "branch": "main",
            "exported_at": "2026-01-01T00:00:00Z"
        }),
        record
    );

    let mut reader = BufReader::new(Cursor::new(data.into_bytes()));
    store.import_into_branch(&mut reader, "main").unwrap();

    let loaded = store.get_node("main", &node.id).unwrap().unwrap();
    assert_eq!(
        loaded.extra.get("novel_field"),
        Some(&serde_json::json!(42))
    );

    // The preserved field survives a re-export
    let mut buffer = Vec::new();
    store.export_branch("main", &mut buffer).unwrap();
    assert!(String::from_utf8(buffer).unwrap().contains("novel_field"));
}

#[test]
fn test_path_migration() {
    let (_dir, store) = open_store();
    let file = Node::new(NodeType::File, "/repo/a.go", "/repo/a.go").with_language("go");
    let function = Node::new(NodeType::Function, "foo", "/repo/a.go")
        .with_lines(3, 5)
        .with_property("source", "/repo/a.go");
    let edge = Edge::new(EdgeType::Contains, file.id.clone(), function.id.clone());
    store.add_node("main", file.clone()).unwrap();
    store.add_node("main", function.clone()).unwrap();
    store.add_edge("main", edge).unwrap();

    // Dry run reports without writing
    let report = store
        .migrate_abs_to_rel_paths(&[Path::new("/repo")], true)
        .unwrap();
    assert_eq!(report.nodes_migrated, 2);
    assert_eq!(report.edges_remapped, 1);
    assert!(store.get_node("main", &file.id).unwrap().is_some());

    let report = store
        .migrate_abs_to_rel_paths(&[Path::new("/repo")], false)
        .unwrap();
    assert_eq!(report.nodes_migrated, 2);
    assert_eq!(report.edges_remapped, 1);

    // Old IDs are gone; new IDs derive from the relative path
    assert!(store.get_node("main", &file.id).unwrap().is_none());
    let migrated = store
        .query_nodes("main", &NodeFilter::in_file("a.go"))
        .unwrap();
    assert_eq!(migrated.len(), 2);
    let new_file = migrated
        .iter()
        .find(|node| node.node_type == NodeType::File)
        .unwrap();
    let new_function = migrated
        .iter()
        .find(|node| node.node_type == NodeType::Function)
        .unwrap();
    assert_eq!(new_function.properties["source"], "a.go");

    // Edges reference the new IDs
    let edges = store.get_edges("main", &new_file.id, None).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target, new_function.id);

    // Idempotent: nothing left to migrate
    let again = store
        .migrate_abs_to_rel_paths(&[Path::new("/repo")], false)
        .unwrap();
    assert_eq!(again.nodes_migrated, 0);
}

#[test]
fn test_layered_precedence() {
    let (_dir, store) = open_store();
    let shared = Node::new(NodeType::Function, "foo", "a.go").with_signature("main copy");
    store.add_node("shared", shared.clone()).unwrap();
    store
        .add_node("shared", func_node("only_main", "b.go", 1))
        .unwrap();

    let layered = LayeredStore::new(store.view("shared"), store.view("local"));

    // Local overlay shadows the shared node under the same ID
    let mut local_copy = shared.clone();
    local_copy.signature = Some("local copy".to_string());
    layered.add_node(local_copy).unwrap();
    layered.add_node(func_node("only_local", "c.go", 1)).unwrap();

    let got = layered.get_node(&shared.id).unwrap().unwrap();
    assert_eq!(got.signature.as_deref(), Some("local copy"));

    let all = layered.query_nodes(&NodeFilter::default()).unwrap();
    assert_eq!(all.len(), 3, "shadowed node must not appear twice");

    let stats = layered.stats().unwrap();
    assert_eq!(stats.node_count, 3);

    // Writes never reach the main layer
    assert_eq!(store.stats("shared").unwrap().node_count, 2);
}

#[test]
fn test_layered_edges_union() {
    let (_dir, store) = open_store();
    let (file, function) = seed_file(&store, "shared", "a.go", "foo");

    let layered = LayeredStore::new(store.view("shared"), store.view("local"));
    let local_edge = Edge::new(EdgeType::Calls, function.id.clone(), file.id.clone());
    layered.add_edge(local_edge).unwrap();

    let edges = layered.get_edges(&file.id, None).unwrap();
    assert_eq!(edges.len(), 2);

    let stats = layered.stats().unwrap();
    assert_eq!(stats.edge_count, 2);
}

#[test]
fn test_stats_cache_invalidation() {
    let (_dir, store) = open_store();
    seed_file(&store, "main", "a.go", "foo");
    assert_eq!(store.stats("main").unwrap().node_count, 2);

    seed_file(&store, "main", "b.go", "bar");
    assert_eq!(store.stats("main").unwrap().node_count, 4);

    store.delete_by_file("main", "b.go").unwrap();
    assert_eq!(store.stats("main").unwrap().node_count, 2);
}

#[test]
fn test_single_open_handle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.db");
    let _store = BranchStore::open(&path).unwrap();
    // sled holds an advisory lock on the data directory
    assert!(BranchStore::open(&path).is_err());
}

#[test]
fn test_cleanup_stale_branches() {
    let (_dir, store) = open_store();
    seed_file(&store, "default", "a.go", "foo");
    seed_file(&store, "main", "a.go", "foo");
    seed_file(&store, "feat", "a.go", "foo");
    seed_file(&store, "gone", "a.go", "foo");

    let dropped = store
        .cleanup_stale_branches(&["feat".to_string()], "main", "default")
        .unwrap();

    assert_eq!(dropped, vec!["gone".to_string()]);
    let mut branches = store.list_branches().unwrap();
    branches.sort();
    assert_eq!(branches, vec!["default", "feat", "main"]);
}
