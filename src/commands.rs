//! CLI command implementations

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use codeeagle_core::{project, CancelToken, GraphError, NodeFilter, NodeType};
use codeeagle_indexer::{Indexer, ParserRegistry, ProjectConfig, SyncStats};
use codeeagle_store::{read_export_header, BranchStore};
use codeeagle_watcher::WatchService;

fn open_store(root: &std::path::Path) -> anyhow::Result<Arc<BranchStore>> {
    BranchStore::open(&project::graph_db_path(root))
        .with_context(|| format!("opening graph store under {}", root.display()))
}

fn build_indexer(root: &PathBuf) -> anyhow::Result<(Arc<BranchStore>, Indexer)> {
    let config = ProjectConfig::load(root)?;
    let store = open_store(root)?;
    let indexer = Indexer::new(
        store.clone(),
        ParserRegistry::with_default_parsers(),
        root.clone(),
        config,
    );
    Ok((store, indexer))
}

/// Cancel on ctrl-c so a sync drains in flight and flushes cleanly.
fn cancel_on_signal() -> CancelToken {
    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, draining");
            signal_cancel.cancel();
        }
    });
    cancel
}

fn report_sync(stats: &SyncStats) {
    if stats.cancelled {
        tracing::info!(branch = stats.branch, "sync cancelled");
        return;
    }
    tracing::info!(
        branch = stats.branch,
        files = stats.files_indexed,
        deleted = stats.files_deleted,
        nodes = stats.nodes_added,
        edges = stats.edges_added,
        errors = stats.errors.len(),
        "sync complete"
    );
    for phase in &stats.link_report.phases {
        tracing::info!(phase = phase.phase, edges = phase.edges, "linker");
    }
    for error in &stats.errors {
        tracing::warn!(path = error.path, "parse error: {}", error.message);
    }
}

pub fn init(root: PathBuf, name: Option<String>) -> anyhow::Result<()> {
    let config_path = project::config_path(&root);
    if config_path.exists() {
        return Err(GraphError::AlreadyExists(format!(
            "{} already exists",
            config_path.display()
        ))
        .into());
    }
    let name = name.unwrap_or_else(|| {
        root.canonicalize()
            .ok()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string())
    });
    let config = ProjectConfig::new(name.clone());
    config.save(&root)?;
    tracing::info!(project = name, path = %config_path.display(), "initialized");

    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        let mut registry = project::Registry::load(&home)
            .with_context(|| format!("reading registry in {}", home.display()))?;
        registry.register(name, root.canonicalize().unwrap_or(root));
        registry
            .save(&home)
            .with_context(|| format!("writing registry in {}", home.display()))?;
    }
    Ok(())
}

pub async fn index(root: PathBuf, branch: Option<String>) -> anyhow::Result<()> {
    let (_store, indexer) = build_indexer(&root)?;
    let cancel = cancel_on_signal();
    let stats = tokio::task::spawn_blocking(move || {
        indexer.full_sync(branch.as_deref(), &cancel)
    })
    .await??;
    report_sync(&stats);
    Ok(())
}

pub async fn sync(root: PathBuf, branch: Option<String>) -> anyhow::Result<()> {
    let (_store, indexer) = build_indexer(&root)?;
    let cancel = cancel_on_signal();
    let stats = tokio::task::spawn_blocking(move || {
        indexer.incremental_sync(branch.as_deref(), &cancel)
    })
    .await??;
    report_sync(&stats);
    Ok(())
}

pub async fn watch(root: PathBuf, branch: Option<String>) -> anyhow::Result<()> {
    let (_store, indexer) = build_indexer(&root)?;
    let cancel = cancel_on_signal();

    // Catch up before watching
    let catchup_indexer = Arc::new(indexer);
    let sync_indexer = Arc::clone(&catchup_indexer);
    let sync_branch = branch.clone();
    let sync_cancel = cancel.clone();
    let stats = tokio::task::spawn_blocking(move || {
        sync_indexer.incremental_sync(sync_branch.as_deref(), &sync_cancel)
    })
    .await??;
    report_sync(&stats);

    let service = WatchService::new(catchup_indexer, root);
    Ok(service.run(branch.as_deref(), cancel).await?)
}

pub fn export(root: PathBuf, branch: Option<String>, out: Option<PathBuf>) -> anyhow::Result<()> {
    let (store, indexer) = build_indexer(&root)?;
    let branch = indexer.resolve_branch(branch.as_deref());
    let out = match out {
        Some(path) => path,
        None => project::read_project_conf(&root)?
            .unwrap_or_else(|| root.join("codeeagle.graph")),
    };
    let file = std::fs::File::create(&out)
        .with_context(|| format!("creating {}", out.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    let summary = store.export_branch(&branch, &mut writer)?;
    tracing::info!(
        branch,
        nodes = summary.nodes,
        edges = summary.edges,
        file = %out.display(),
        "exported"
    );
    Ok(())
}

pub fn import(root: PathBuf, file: PathBuf, branch: Option<String>) -> anyhow::Result<()> {
    let store = open_store(&root)?;
    let branch = match branch {
        Some(branch) => branch,
        None => {
            // The header alone names the source branch
            let handle = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let mut reader = BufReader::new(handle);
            read_export_header(&mut reader)?.branch
        }
    };
    let handle = std::fs::File::open(&file)
        .with_context(|| format!("opening {}", file.display()))?;
    let mut reader = BufReader::new(handle);
    let summary = store.import_into_branch(&mut reader, &branch)?;
    tracing::info!(
        branch,
        nodes = summary.nodes,
        edges = summary.edges,
        "imported"
    );
    Ok(())
}

pub fn branches(root: PathBuf, drop: Option<String>) -> anyhow::Result<()> {
    let store = open_store(&root)?;
    match drop {
        Some(branch) => {
            if !store.branch_exists(&branch)? {
                return Err(GraphError::not_found(format!("branch {branch}")).into());
            }
            store.drop_branch(&branch)?;
            tracing::info!(branch, "dropped");
        }
        None => {
            for branch in store.list_branches()? {
                let stats = store.stats(&branch)?;
                println!("{branch}\t{} nodes\t{} edges", stats.node_count, stats.edge_count);
            }
        }
    }
    Ok(())
}

pub fn stats(root: PathBuf, branch: Option<String>) -> anyhow::Result<()> {
    let (store, indexer) = build_indexer(&root)?;
    let branch = indexer.resolve_branch(branch.as_deref());
    let stats = store.stats(&branch)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn query(
    root: PathBuf,
    branch: Option<String>,
    node_type: Option<String>,
    name: Option<String>,
    package: Option<String>,
    file: Option<String>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let (store, indexer) = build_indexer(&root)?;
    let branch = indexer.resolve_branch(branch.as_deref());

    let node_type = match node_type {
        Some(tag) => Some(
            NodeType::parse(&tag)
                .ok_or_else(|| GraphError::validation(format!("unknown node type {tag:?}")))?,
        ),
        None => None,
    };
    let filter = NodeFilter {
        node_type,
        name_pattern: name,
        package,
        file_path: file,
        language,
    };
    for node in store.query_nodes(&branch, &filter)? {
        println!("{}", serde_json::to_string(&node)?);
    }
    Ok(())
}

pub fn migrate_paths(root: PathBuf, roots: Vec<PathBuf>, dry_run: bool) -> anyhow::Result<()> {
    if roots.is_empty() {
        return Err(GraphError::validation("at least one repository root is required").into());
    }
    let store = open_store(&root)?;
    let refs: Vec<&std::path::Path> = roots.iter().map(PathBuf::as_path).collect();
    let report = store.migrate_abs_to_rel_paths(&refs, dry_run)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
