//! Integration tests for CodeEagle
//!
//! End-to-end scenarios through the public crate APIs: scratch project
//! on disk → indexer → store → linker → readers.

use std::sync::Arc;

use tempfile::TempDir;

use codeeagle_core::{CancelToken, Direction, EdgeType, GraphRead, NodeFilter, NodeType};
use codeeagle_indexer::{Indexer, ParserRegistry, ProjectConfig};
use codeeagle_store::BranchStore;

fn project(files: &[(&str, &str)]) -> (TempDir, Arc<BranchStore>, Indexer) {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, content).unwrap();
    }
    let store = BranchStore::open(&dir.path().join(".codeeagle/graph.db")).unwrap();
    let config = ProjectConfig::new("integration");
    let indexer = Indexer::new(
        store.clone(),
        ParserRegistry::with_default_parsers(),
        dir.path(),
        config,
    );
    (dir, store, indexer)
}

/// Incremental delete: index one file, delete it on disk, sync again —
/// the projection is gone.
#[test]
fn incremental_delete_empties_the_graph() {
    let (dir, store, indexer) = project(&[("a.go", "package main\n\nfunc foo() {}\n")]);
    let cancel = CancelToken::new();

    indexer.full_sync(None, &cancel).unwrap();
    let stats = store.stats("default").unwrap();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.edge_count, 1);
    assert_eq!(stats.nodes_by_type.get(&NodeType::File), Some(&1));
    assert_eq!(stats.nodes_by_type.get(&NodeType::Function), Some(&1));

    std::fs::remove_file(dir.path().join("a.go")).unwrap();
    indexer.incremental_sync(None, &cancel).unwrap();

    let stats = store.stats("default").unwrap();
    assert_eq!(stats.node_count, 0);
    assert_eq!(stats.edge_count, 0);
}

/// Cross-file implements: after a full sync plus linking, the struct
/// whose method set satisfies the interface carries exactly one
/// Implements edge.
#[test]
fn cross_file_implements_edge() {
    let (_dir, store, indexer) = project(&[
        (
            "iface.go",
            "package reader\n\ntype Reader interface {\n\tRead() ([]byte, error)\n}\n",
        ),
        (
            "impl.go",
            concat!(
                "package reader\n\n",
                "type FileReader struct {\n\tpath string\n}\n\n",
                "func (r *FileReader) Read() ([]byte, error) {\n\treturn nil, nil\n}\n",
            ),
        ),
    ]);
    indexer.full_sync(None, &CancelToken::new()).unwrap();

    let view = store.view("default");
    let reader = view
        .query_nodes(&NodeFilter::of_type(NodeType::Interface))
        .unwrap()
        .pop()
        .unwrap();
    let implementers = view
        .get_neighbors(&reader.id, EdgeType::Implements, Direction::Incoming)
        .unwrap();
    assert_eq!(implementers.len(), 1);
    assert_eq!(implementers[0].name, "FileReader");
    assert_eq!(implementers[0].node_type, NodeType::Struct);
}

/// Test coverage at file level: handler.go carries exactly one Tests
/// edge with kind=file_coverage, sourced from handler_test.go.
#[test]
fn test_file_coverage_edge() {
    let (_dir, store, indexer) = project(&[
        ("handler.go", "package web\n\nfunc Handler() {}\n"),
        (
            "handler_test.go",
            "package web\n\nfunc TestHandler(t *testing.T) {\n\tHandler()\n}\n",
        ),
    ]);
    indexer.full_sync(None, &CancelToken::new()).unwrap();

    let view = store.view("default");
    let handler = view
        .query_nodes(&NodeFilter {
            node_type: Some(NodeType::File),
            file_path: Some("handler.go".to_string()),
            ..Default::default()
        })
        .unwrap()
        .pop()
        .unwrap();

    let tests = view.get_edges(&handler.id, Some(EdgeType::Tests)).unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].properties.get("kind").unwrap(), "file_coverage");

    let test_file = view
        .query_nodes(&NodeFilter::of_type(NodeType::TestFile))
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(tests[0].source, test_file.id);
    assert_eq!(test_file.file_path, "handler_test.go");
}

/// Branch switch: indexing a second branch leaves the first untouched,
/// and dropping it removes only its keys.
#[test]
fn branch_switch_isolation() {
    let (dir, store, indexer) = project(&[("a.go", "package main\n\nfunc foo() {}\n")]);
    let cancel = CancelToken::new();

    indexer.full_sync(Some("main"), &cancel).unwrap();
    let main_stats = store.stats("main").unwrap();
    let main_snapshot = store.snapshot_branch("main").unwrap();

    // More content on the feature branch
    std::fs::write(
        dir.path().join("b.go"),
        "package main\n\nfunc bar() {}\n",
    )
    .unwrap();
    indexer.full_sync(Some("feat"), &cancel).unwrap();

    assert_eq!(store.stats("main").unwrap(), main_stats);
    assert_eq!(store.snapshot_branch("main").unwrap(), main_snapshot);
    assert!(store.stats("feat").unwrap().node_count > main_stats.node_count);

    store.drop_branch("feat").unwrap();
    assert_eq!(store.branch_key_count("feat").unwrap(), 0);
    assert_eq!(store.snapshot_branch("main").unwrap(), main_snapshot);
}

/// Export → drop → import round trip preserves stats and every ID.
#[test]
fn export_import_round_trip() {
    let (_dir, store, indexer) = project(&[
        ("a.go", "package main\n\nfunc foo() {}\n"),
        ("b.go", "package main\n\nfunc bar() {\n\tfoo()\n}\n"),
    ]);
    indexer.full_sync(Some("main"), &CancelToken::new()).unwrap();

    let before = store.stats("main").unwrap();
    let mut node_ids: Vec<String> = store
        .query_nodes("main", &NodeFilter::default())
        .unwrap()
        .into_iter()
        .map(|node| node.id.to_string())
        .collect();
    node_ids.sort();

    let mut buffer = Vec::new();
    store.export_branch("main", &mut buffer).unwrap();
    store.drop_branch("main").unwrap();

    let mut reader = std::io::BufReader::new(std::io::Cursor::new(buffer));
    store.import_into_branch(&mut reader, "main2").unwrap();

    assert_eq!(store.stats("main2").unwrap(), before);
    let mut imported_ids: Vec<String> = store
        .query_nodes("main2", &NodeFilter::default())
        .unwrap()
        .into_iter()
        .map(|node| node.id.to_string())
        .collect();
    imported_ids.sort();
    assert_eq!(imported_ids, node_ids);
}
