//! Branch-partitioned embedded graph store on sled
//!
//! One on-disk keyspace holds N logically independent graphs, keyed by
//! branch name. Branches are created lazily on first write and destroyed
//! explicitly. All mutations of a logical operation (payload plus index
//! entries) are applied as a single atomic batch; a failed batch leaves
//! the database untouched.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use codeeagle_core::{
    Direction, Edge, EdgeId, EdgeType, GraphError, GraphRead, GraphStats, GraphWrite, Node,
    NodeFilter, NodeId, Result,
};

use crate::keys;

/// Current keyspace schema. Version 2 stores repository-relative paths;
/// version 1 databases are upgraded with `migrate_abs_to_rel_paths`.
pub const SCHEMA_VERSION: u32 = 2;

/// Small per-branch record under `M/<branch>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchMeta {
    pub created_at: String,
    pub schema_version: u32,
}

/// Durable, crash-safe, branch-partitioned graph store. One process holds
/// the database open (sled's directory lock); within the process there is
/// at most one writer per branch and any number of readers.
pub struct BranchStore {
    db: sled::Db,
    branch_locks: DashMap<String, Arc<Mutex<()>>>,
    // Cross-branch operations (drop, replace, export, import, migrate)
    // take this exclusively; branch writers take it shared.
    global: RwLock<()>,
    stats_cache: DashMap<String, GraphStats>,
}

impl BranchStore {
    /// Open (or create) the store at the given data directory.
    pub fn open(path: &Path) -> Result<Arc<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path).map_err(GraphError::storage)?;
        Ok(Arc::new(BranchStore {
            db,
            branch_locks: DashMap::new(),
            global: RwLock::new(()),
            stats_cache: DashMap::new(),
        }))
    }

    /// A view of one branch implementing the `GraphRead`/`GraphWrite`
    /// ports.
    pub fn view(self: &Arc<Self>, branch: &str) -> BranchView {
        BranchView {
            store: Arc::clone(self),
            branch: branch.to_string(),
        }
    }

    fn branch_lock(&self, branch: &str) -> Arc<Mutex<()>> {
        self.branch_locks
            .entry(branch.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn check_branch(branch: &str) -> Result<()> {
        keys::validate_branch(branch).map_err(GraphError::Validation)
    }

    fn apply(&self, batch: sled::Batch) -> Result<()> {
        self.db.apply_batch(batch).map_err(GraphError::storage)
    }

    fn invalidate_stats(&self, branch: &str) {
        self.stats_cache.remove(branch);
    }

    // ──────────────────────────────────────────────────────────────────
    // Decoding helpers
    // ──────────────────────────────────────────────────────────────────

    fn read_node(&self, branch: &str, id: &NodeId) -> Result<Option<Node>> {
        let key = keys::record_key(keys::NODE, branch, id.as_str());
        match self.db.get(key).map_err(GraphError::storage)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(GraphError::storage)?,
            )),
            None => Ok(None),
        }
    }

    fn read_edge(&self, branch: &str, id: &EdgeId) -> Result<Option<Edge>> {
        let key = keys::record_key(keys::EDGE, branch, id.as_str());
        match self.db.get(key).map_err(GraphError::storage)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(GraphError::storage)?,
            )),
            None => Ok(None),
        }
    }

    /// IDs listed under an index prefix (the trailing key segment).
    fn scan_ids(&self, prefix: Vec<u8>) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (key, _) = entry.map_err(GraphError::storage)?;
            if let Some(id) = keys::last_segment(&key) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    // ──────────────────────────────────────────────────────────────────
    // Batch builders (callers hold the appropriate locks)
    // ──────────────────────────────────────────────────────────────────

    fn ensure_branch_meta(&self, branch: &str, batch: &mut sled::Batch) -> Result<()> {
        let key = keys::meta_key(branch);
        if self.db.get(&key).map_err(GraphError::storage)?.is_none() {
            let meta = BranchMeta {
                created_at: chrono::Utc::now().to_rfc3339(),
                schema_version: SCHEMA_VERSION,
            };
            batch.insert(key, serde_json::to_vec(&meta).map_err(GraphError::storage)?);
        }
        Ok(())
    }

    fn node_index_keys(branch: &str, node: &Node) -> Vec<Vec<u8>> {
        vec![
            keys::index_key(keys::IDX_FILE, branch, &node.file_path, node.id.as_str()),
            keys::index_key(
                keys::IDX_TYPE,
                branch,
                node.node_type.as_str(),
                node.id.as_str(),
            ),
            keys::index_key(keys::IDX_PACKAGE, branch, &node.package, node.id.as_str()),
            keys::index_key(
                keys::IDX_NAME,
                branch,
                &node.name.to_lowercase(),
                node.id.as_str(),
            ),
        ]
    }

    /// Stage a node upsert: payload plus index delta against the
    /// previously stored value, if any.
    fn put_node(&self, branch: &str, node: &Node, batch: &mut sled::Batch) -> Result<()> {
        if let Some(old) = self.read_node(branch, &node.id)? {
            for key in Self::node_index_keys(branch, &old) {
                batch.remove(key);
            }
        }
        batch.insert(
            keys::record_key(keys::NODE, branch, node.id.as_str()),
            serde_json::to_vec(node).map_err(GraphError::storage)?,
        );
        for key in Self::node_index_keys(branch, node) {
            batch.insert(key, &[] as &[u8]);
        }
        Ok(())
    }

    fn put_edge(&self, branch: &str, edge: &Edge, batch: &mut sled::Batch) -> Result<()> {
        batch.insert(
            keys::record_key(keys::EDGE, branch, edge.id.as_str()),
            serde_json::to_vec(edge).map_err(GraphError::storage)?,
        );
        batch.insert(
            keys::index_key(
                keys::EDGES_OUT,
                branch,
                edge.source.as_str(),
                edge.id.as_str(),
            ),
            &[] as &[u8],
        );
        batch.insert(
            keys::index_key(
                keys::EDGES_IN,
                branch,
                edge.target.as_str(),
                edge.id.as_str(),
            ),
            &[] as &[u8],
        );
        Ok(())
    }

    fn remove_edge_keys(branch: &str, edge: &Edge, batch: &mut sled::Batch) {
        batch.remove(keys::record_key(keys::EDGE, branch, edge.id.as_str()));
        batch.remove(keys::index_key(
            keys::EDGES_OUT,
            branch,
            edge.source.as_str(),
            edge.id.as_str(),
        ));
        batch.remove(keys::index_key(
            keys::EDGES_IN,
            branch,
            edge.target.as_str(),
            edge.id.as_str(),
        ));
    }

    fn remove_node_keys(branch: &str, node: &Node, batch: &mut sled::Batch) {
        batch.remove(keys::record_key(keys::NODE, branch, node.id.as_str()));
        for key in Self::node_index_keys(branch, node) {
            batch.remove(key);
        }
    }

    /// Every edge with `id` as source or target.
    fn edges_touching(&self, branch: &str, id: &NodeId) -> Result<Vec<Edge>> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for family in [keys::EDGES_OUT, keys::EDGES_IN] {
            for edge_id in self.scan_ids(keys::index_prefix(family, branch, id.as_str()))? {
                if seen.insert(edge_id.clone()) {
                    if let Some(edge) = self.read_edge(branch, &EdgeId::from_raw(edge_id))? {
                        edges.push(edge);
                    }
                }
            }
        }
        Ok(edges)
    }

    /// Stage removal of a file's whole projection: every node with this
    /// `file_path` and every edge touching any such node.
    fn stage_delete_by_file(
        &self,
        branch: &str,
        path: &str,
        batch: &mut sled::Batch,
    ) -> Result<()> {
        for node_id in self.scan_ids(keys::index_prefix(keys::IDX_FILE, branch, path))? {
            let id = NodeId::from_raw(node_id);
            if let Some(node) = self.read_node(branch, &id)? {
                for edge in self.edges_touching(branch, &id)? {
                    Self::remove_edge_keys(branch, &edge, batch);
                }
                Self::remove_node_keys(branch, &node, batch);
            }
        }
        Ok(())
    }

    // ──────────────────────────────────────────────────────────────────
    // Node operations
    // ──────────────────────────────────────────────────────────────────

    pub fn add_node(&self, branch: &str, node: Node) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let mut batch = sled::Batch::default();
        self.ensure_branch_meta(branch, &mut batch)?;
        self.put_node(branch, &node, &mut batch)?;
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    /// Same as `add_node` but fails if the ID is absent.
    pub fn update_node(&self, branch: &str, node: Node) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        if self.read_node(branch, &node.id)?.is_none() {
            return Err(GraphError::not_found(format!("node {}", node.id)));
        }
        let mut batch = sled::Batch::default();
        self.put_node(branch, &node, &mut batch)?;
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    pub fn get_node(&self, branch: &str, id: &NodeId) -> Result<Option<Node>> {
        Self::check_branch(branch)?;
        self.read_node(branch, id)
    }

    pub fn delete_node(&self, branch: &str, id: &NodeId) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let Some(node) = self.read_node(branch, id)? else {
            return Err(GraphError::not_found(format!("node {id}")));
        };
        let mut batch = sled::Batch::default();
        for edge in self.edges_touching(branch, id)? {
            Self::remove_edge_keys(branch, &edge, &mut batch);
        }
        Self::remove_node_keys(branch, &node, &mut batch);
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    /// Planner: pick the most selective index for the filter, then check
    /// remaining predicates in memory.
    pub fn query_nodes(&self, branch: &str, filter: &NodeFilter) -> Result<Vec<Node>> {
        Self::check_branch(branch)?;
        let glob = compile_name_glob(filter)?;

        let candidates: Vec<Node> = if let Some(path) = &filter.file_path {
            self.nodes_by_index(branch, keys::IDX_FILE, path)?
        } else if let Some(package) = &filter.package {
            self.nodes_by_index(branch, keys::IDX_PACKAGE, package)?
        } else if let Some(node_type) = filter.node_type {
            self.nodes_by_index(branch, keys::IDX_TYPE, node_type.as_str())?
        } else if let Some(name) = literal_name(filter) {
            self.nodes_by_index(branch, keys::IDX_NAME, &name)?
        } else {
            self.all_nodes(branch)?
        };

        Ok(candidates
            .into_iter()
            .filter(|node| filter_matches(filter, glob.as_ref(), node))
            .collect())
    }

    fn nodes_by_index(&self, branch: &str, family: &str, attr: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for id in self.scan_ids(keys::index_prefix(family, branch, attr))? {
            if let Some(node) = self.read_node(branch, &NodeId::from_raw(id))? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    pub fn all_nodes(&self, branch: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for entry in self.db.scan_prefix(keys::record_prefix(keys::NODE, branch)) {
            let (_, value) = entry.map_err(GraphError::storage)?;
            nodes.push(serde_json::from_slice(&value).map_err(GraphError::storage)?);
        }
        Ok(nodes)
    }

    pub fn all_edges(&self, branch: &str) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        for entry in self.db.scan_prefix(keys::record_prefix(keys::EDGE, branch)) {
            let (_, value) = entry.map_err(GraphError::storage)?;
            edges.push(serde_json::from_slice(&value).map_err(GraphError::storage)?);
        }
        Ok(edges)
    }

    // ──────────────────────────────────────────────────────────────────
    // Edge operations
    // ──────────────────────────────────────────────────────────────────

    pub fn add_edge(&self, branch: &str, edge: Edge) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let mut batch = sled::Batch::default();
        self.ensure_branch_meta(branch, &mut batch)?;
        self.put_edge(branch, &edge, &mut batch)?;
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    pub fn delete_edge(&self, branch: &str, id: &EdgeId) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let Some(edge) = self.read_edge(branch, id)? else {
            return Err(GraphError::not_found(format!("edge {id}")));
        };
        let mut batch = sled::Batch::default();
        Self::remove_edge_keys(branch, &edge, &mut batch);
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    /// Union of outgoing and incoming edges of a node, optionally
    /// filtered by type.
    pub fn get_edges(
        &self,
        branch: &str,
        node: &NodeId,
        edge_type: Option<EdgeType>,
    ) -> Result<Vec<Edge>> {
        Self::check_branch(branch)?;
        let mut edges = self.edges_touching(branch, node)?;
        if let Some(wanted) = edge_type {
            edges.retain(|edge| edge.edge_type == wanted);
        }
        Ok(edges)
    }

    /// Nodes on the far side of matching edges. Dangling endpoints are
    /// skipped (they may exist during a sync window).
    pub fn get_neighbors(
        &self,
        branch: &str,
        node: &NodeId,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let edges = self.get_edges(branch, node, Some(edge_type))?;
        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for edge in edges {
            let far = match direction {
                Direction::Outgoing if edge.source == *node => &edge.target,
                Direction::Incoming if edge.target == *node => &edge.source,
                Direction::Both => {
                    if edge.source == *node {
                        &edge.target
                    } else {
                        &edge.source
                    }
                }
                _ => continue,
            };
            if seen.insert(far.clone()) {
                if let Some(far_node) = self.read_node(branch, far)? {
                    neighbors.push(far_node);
                }
            }
        }
        Ok(neighbors)
    }

    // ──────────────────────────────────────────────────────────────────
    // File-scoped operations
    // ──────────────────────────────────────────────────────────────────

    pub fn delete_by_file(&self, branch: &str, path: &str) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let mut batch = sled::Batch::default();
        self.stage_delete_by_file(branch, path, &mut batch)?;
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    /// The indexer's per-file commit: replace a file's old projection
    /// with a fresh parse in one atomic batch.
    pub fn apply_parse(
        &self,
        branch: &str,
        path: &str,
        nodes: &[Node],
        edges: &[Edge],
    ) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.read().unwrap();
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap();

        let mut batch = sled::Batch::default();
        self.ensure_branch_meta(branch, &mut batch)?;
        self.stage_delete_by_file(branch, path, &mut batch)?;
        for node in nodes {
            self.put_node(branch, node, &mut batch)?;
        }
        for edge in edges {
            self.put_edge(branch, edge, &mut batch)?;
        }
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    // ──────────────────────────────────────────────────────────────────
    // Stats
    // ──────────────────────────────────────────────────────────────────

    /// Counts by type. Cached per branch; invalidated on every write.
    pub fn stats(&self, branch: &str) -> Result<GraphStats> {
        Self::check_branch(branch)?;
        if let Some(cached) = self.stats_cache.get(branch) {
            return Ok(cached.clone());
        }
        let mut stats = GraphStats::default();
        for node in self.all_nodes(branch)? {
            stats.node_count += 1;
            *stats.nodes_by_type.entry(node.node_type).or_insert(0) += 1;
        }
        for edge in self.all_edges(branch)? {
            stats.edge_count += 1;
            *stats.edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
        }
        self.stats_cache.insert(branch.to_string(), stats.clone());
        Ok(stats)
    }

    // ──────────────────────────────────────────────────────────────────
    // Branch operations
    // ──────────────────────────────────────────────────────────────────

    pub fn list_branches(&self) -> Result<Vec<String>> {
        let mut branches = Vec::new();
        let prefix = format!("{}/", keys::META).into_bytes();
        for entry in self.db.scan_prefix(prefix) {
            let (key, _) = entry.map_err(GraphError::storage)?;
            if let Some(name) = keys::last_segment(&key) {
                branches.push(name.to_string());
            }
        }
        Ok(branches)
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        Self::check_branch(branch)?;
        self.db
            .get(keys::meta_key(branch))
            .map(|meta| meta.is_some())
            .map_err(GraphError::storage)
    }

    pub fn branch_meta(&self, branch: &str) -> Result<Option<BranchMeta>> {
        Self::check_branch(branch)?;
        match self.db.get(keys::meta_key(branch)).map_err(GraphError::storage)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(GraphError::storage)?,
            )),
            None => Ok(None),
        }
    }

    pub fn drop_branch(&self, branch: &str) -> Result<()> {
        Self::check_branch(branch)?;
        let _global = self.global.write().unwrap();
        self.drop_branch_locked(branch)
    }

    fn drop_branch_locked(&self, branch: &str) -> Result<()> {
        let mut batch = sled::Batch::default();
        for prefix in keys::branch_prefixes(branch) {
            for entry in self.db.scan_prefix(prefix) {
                let (key, _) = entry.map_err(GraphError::storage)?;
                batch.remove(key);
            }
        }
        batch.remove(keys::meta_key(branch));
        self.apply(batch)?;
        self.invalidate_stats(branch);
        Ok(())
    }

    /// Atomic rename-and-drop: every key of `from` lands under `to`,
    /// `to`'s previous content and `from` itself disappear, all in one
    /// batch. Used to roll a fresh import into place.
    pub fn replace_branch(&self, from: &str, to: &str) -> Result<()> {
        Self::check_branch(from)?;
        Self::check_branch(to)?;
        let _global = self.global.write().unwrap();
        self.replace_branch_locked(from, to)
    }

    fn replace_branch_locked(&self, from: &str, to: &str) -> Result<()> {
        if !self.branch_exists_unchecked(from)? {
            return Err(GraphError::not_found(format!("branch {from}")));
        }
        let mut batch = sled::Batch::default();
        for prefix in keys::branch_prefixes(to) {
            for entry in self.db.scan_prefix(prefix) {
                let (key, _) = entry.map_err(GraphError::storage)?;
                batch.remove(key);
            }
        }
        for prefix in keys::branch_prefixes(from) {
            for entry in self.db.scan_prefix(prefix) {
                let (key, value) = entry.map_err(GraphError::storage)?;
                if let Some(new_key) = keys::rebranch(&key, from, to) {
                    batch.insert(new_key, value);
                }
                batch.remove(key);
            }
        }
        if let Some(meta) = self.db.get(keys::meta_key(from)).map_err(GraphError::storage)? {
            batch.insert(keys::meta_key(to), meta);
        }
        batch.remove(keys::meta_key(from));
        self.apply(batch)?;
        self.invalidate_stats(from);
        self.invalidate_stats(to);
        Ok(())
    }

    fn branch_exists_unchecked(&self, branch: &str) -> Result<bool> {
        self.db
            .get(keys::meta_key(branch))
            .map(|meta| meta.is_some())
            .map_err(GraphError::storage)
    }

    /// Drop store branches that no longer correspond to a live VCS
    /// branch. The active and default branches are always kept. Returns
    /// the dropped names.
    pub fn cleanup_stale_branches(
        &self,
        live: &[String],
        active: &str,
        default: &str,
    ) -> Result<Vec<String>> {
        let live: HashSet<&str> = live.iter().map(String::as_str).collect();
        let mut dropped = Vec::new();
        for branch in self.list_branches()? {
            if branch == active || branch == default || branch.contains('~') {
                continue;
            }
            if !live.contains(branch.as_str()) {
                self.drop_branch(&branch)?;
                tracing::info!(branch, "dropped stale branch");
                dropped.push(branch);
            }
        }
        Ok(dropped)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map(|_| ()).map_err(GraphError::storage)
    }

    /// Every key under a branch, for isolation checks in tests.
    pub fn branch_key_count(&self, branch: &str) -> Result<usize> {
        let mut count = 0;
        for prefix in keys::branch_prefixes(branch) {
            count += self.db.scan_prefix(prefix).count();
        }
        if self.branch_exists_unchecked(branch)? {
            count += 1;
        }
        Ok(count)
    }

    /// Full key/value snapshot of a branch (metadata excluded, which
    /// carries a creation timestamp). Index/base consistency and
    /// idempotency are checked against this.
    pub fn snapshot_branch(&self, branch: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        for prefix in keys::branch_prefixes(branch) {
            for entry in self.db.scan_prefix(prefix) {
                let (key, value) = entry.map_err(GraphError::storage)?;
                entries.push((key.to_vec(), value.to_vec()));
            }
        }
        entries.sort();
        Ok(entries)
    }

    pub(crate) fn global_write_guard(&self) -> std::sync::RwLockWriteGuard<'_, ()> {
        self.global.write().unwrap()
    }

    pub(crate) fn put_node_locked(
        &self,
        branch: &str,
        node: &Node,
        batch: &mut sled::Batch,
    ) -> Result<()> {
        self.put_node(branch, node, batch)
    }

    pub(crate) fn put_edge_locked(
        &self,
        branch: &str,
        edge: &Edge,
        batch: &mut sled::Batch,
    ) -> Result<()> {
        self.put_edge(branch, edge, batch)
    }

    pub(crate) fn ensure_meta_locked(&self, branch: &str, batch: &mut sled::Batch) -> Result<()> {
        self.ensure_branch_meta(branch, batch)
    }

    pub(crate) fn apply_locked(&self, batch: sled::Batch) -> Result<()> {
        self.apply(batch)
    }

    pub(crate) fn drop_branch_inner(&self, branch: &str) -> Result<()> {
        self.drop_branch_locked(branch)
    }

    pub(crate) fn replace_branch_inner(&self, from: &str, to: &str) -> Result<()> {
        self.replace_branch_locked(from, to)
    }

    pub(crate) fn remove_node_keys_for(branch: &str, node: &Node, batch: &mut sled::Batch) {
        Self::remove_node_keys(branch, node, batch);
    }

    pub(crate) fn remove_edge_keys_for(branch: &str, edge: &Edge, batch: &mut sled::Batch) {
        Self::remove_edge_keys(branch, edge, batch);
    }

    pub(crate) fn invalidate_stats_for(&self, branch: &str) {
        self.invalidate_stats(branch);
    }
}

impl Drop for BranchStore {
    fn drop(&mut self) {
        if let Err(err) = self.db.flush() {
            tracing::warn!(error = %err, "flush on close failed");
        }
    }
}

fn compile_name_glob(filter: &NodeFilter) -> Result<Option<GlobMatcher>> {
    match &filter.name_pattern {
        Some(pattern) => {
            let glob = Glob::new(&pattern.to_lowercase())
                .map_err(|err| GraphError::validation(format!("bad name pattern: {err}")))?;
            Ok(Some(glob.compile_matcher()))
        }
        None => Ok(None),
    }
}

/// A name pattern with no glob metacharacters can use the name index
/// directly.
fn literal_name(filter: &NodeFilter) -> Option<String> {
    let pattern = filter.name_pattern.as_deref()?;
    if pattern.contains(['*', '?', '[', '{']) {
        None
    } else {
        Some(pattern.to_lowercase())
    }
}

fn filter_matches(filter: &NodeFilter, glob: Option<&GlobMatcher>, node: &Node) -> bool {
    if let Some(node_type) = filter.node_type {
        if node.node_type != node_type {
            return false;
        }
    }
    if let Some(package) = &filter.package {
        if node.package != *package {
            return false;
        }
    }
    if let Some(path) = &filter.file_path {
        if node.file_path != *path {
            return false;
        }
    }
    if let Some(language) = &filter.language {
        if !node.language.eq_ignore_ascii_case(language) {
            return false;
        }
    }
    if let Some(matcher) = glob {
        if !matcher.is_match(node.name.to_lowercase()) {
            return false;
        }
    }
    true
}

/// One branch of the store, implementing the read/write ports.
#[derive(Clone)]
pub struct BranchView {
    store: Arc<BranchStore>,
    branch: String,
}

impl BranchView {
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn store(&self) -> &Arc<BranchStore> {
        &self.store
    }
}

impl GraphRead for BranchView {
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        self.store.get_node(&self.branch, id)
    }

    fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        self.store.query_nodes(&self.branch, filter)
    }

    fn get_edges(&self, node: &NodeId, edge_type: Option<EdgeType>) -> Result<Vec<Edge>> {
        self.store.get_edges(&self.branch, node, edge_type)
    }

    fn get_neighbors(
        &self,
        node: &NodeId,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        self.store
            .get_neighbors(&self.branch, node, edge_type, direction)
    }

    fn stats(&self) -> Result<GraphStats> {
        self.store.stats(&self.branch)
    }
}

impl GraphWrite for BranchView {
    fn add_node(&self, node: Node) -> Result<()> {
        self.store.add_node(&self.branch, node)
    }

    fn update_node(&self, node: Node) -> Result<()> {
        self.store.update_node(&self.branch, node)
    }

    fn delete_node(&self, id: &NodeId) -> Result<()> {
        self.store.delete_node(&self.branch, id)
    }

    fn add_edge(&self, edge: Edge) -> Result<()> {
        self.store.add_edge(&self.branch, edge)
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<()> {
        self.store.delete_edge(&self.branch, id)
    }

    fn delete_by_file(&self, path: &str) -> Result<()> {
        self.store.delete_by_file(&self.branch, path)
    }
}
