//! One-shot schema migration: absolute → repository-relative paths
//!
//! Early databases stored absolute filesystem paths. Because IDs are
//! derived from paths, rewriting `file_path` recomputes every affected
//! node ID, remaps all inbound/outbound edges to the new IDs, and
//! rebuilds indexes. The whole rewrite of a branch is one atomic batch;
//! a conflict aborts with the database unchanged.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use codeeagle_core::{GraphError, NodeId, Result};

use crate::store::BranchStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub branches: u64,
    pub nodes_scanned: u64,
    pub nodes_migrated: u64,
    pub edges_scanned: u64,
    pub edges_remapped: u64,
    pub dry_run: bool,
}

/// Strip the longest matching repo root, returning the relative form.
fn relativize(path: &str, roots: &[String]) -> Option<String> {
    let mut best: Option<&str> = None;
    for root in roots {
        if let Some(rest) = path.strip_prefix(root.as_str()) {
            let rest = rest.strip_prefix('/').unwrap_or(rest);
            if !rest.is_empty() && best.is_none_or(|current| rest.len() < current.len()) {
                best = Some(rest);
            }
        }
    }
    best.map(str::to_string)
}

impl BranchStore {
    /// Rewrite every absolute `file_path` (and any property value sharing
    /// a root prefix) to the repository-relative form, across all
    /// branches. With `dry_run` nothing is written; only the report is
    /// produced.
    pub fn migrate_abs_to_rel_paths(
        &self,
        repo_roots: &[&Path],
        dry_run: bool,
    ) -> Result<MigrationReport> {
        let _global = self.global_write_guard();

        let roots: Vec<String> = repo_roots
            .iter()
            .map(|root| root.to_string_lossy().trim_end_matches('/').to_string())
            .filter(|root| !root.is_empty())
            .collect();
        if roots.is_empty() {
            return Err(GraphError::validation("no repository roots given"));
        }

        let mut report = MigrationReport {
            dry_run,
            ..Default::default()
        };
        for branch in self.list_branches()? {
            report.branches += 1;
            self.migrate_branch(&branch, &roots, dry_run, &mut report)?;
        }
        tracing::info!(
            nodes = report.nodes_migrated,
            edges = report.edges_remapped,
            dry_run,
            "path migration finished"
        );
        Ok(report)
    }

    fn migrate_branch(
        &self,
        branch: &str,
        roots: &[String],
        dry_run: bool,
        report: &mut MigrationReport,
    ) -> Result<()> {
        // Pass 1: rewrite nodes, collecting the old→new ID mapping.
        let nodes = self.all_nodes(branch)?;
        let mut id_map: HashMap<NodeId, NodeId> = HashMap::new();
        let mut migrated = Vec::new();
        let mut untouched_ids: std::collections::HashSet<NodeId> = std::collections::HashSet::new();

        for node in &nodes {
            report.nodes_scanned += 1;
            let Some(rel) = relativize(&node.file_path, roots) else {
                untouched_ids.insert(node.id.clone());
                continue;
            };
            let mut rewritten = node.clone();
            rewritten.file_path = rel;
            for value in rewritten.properties.values_mut() {
                if let Some(rel_value) = relativize(value, roots) {
                    *value = rel_value;
                }
            }
            rewritten.refresh_id();
            id_map.insert(node.id.clone(), rewritten.id.clone());
            migrated.push((node.clone(), rewritten));
            report.nodes_migrated += 1;
        }

        // A recomputed ID colliding with a node that is not being
        // migrated means two distinct entities would merge; abort with
        // the database unchanged.
        for (_, rewritten) in &migrated {
            if untouched_ids.contains(&rewritten.id) {
                return Err(GraphError::migration(format!(
                    "migrated node {} collides with existing node in branch {branch}",
                    rewritten.id
                )));
            }
        }

        // Pass 2: remap edges that reference a migrated endpoint.
        let edges = self.all_edges(branch)?;
        let mut remapped = Vec::new();
        for edge in &edges {
            report.edges_scanned += 1;
            let new_source = id_map.get(&edge.source);
            let new_target = id_map.get(&edge.target);
            if new_source.is_none() && new_target.is_none() {
                continue;
            }
            let mut rewritten = edge.clone();
            if let Some(source) = new_source {
                rewritten.source = source.clone();
            }
            if let Some(target) = new_target {
                rewritten.target = target.clone();
            }
            rewritten.refresh_id();
            remapped.push((edge.clone(), rewritten));
            report.edges_remapped += 1;
        }

        if dry_run || (migrated.is_empty() && remapped.is_empty()) {
            return Ok(());
        }

        let mut batch = sled::Batch::default();
        for (old, new) in &migrated {
            Self::remove_node_keys_for(branch, old, &mut batch);
            self.put_node_locked(branch, new, &mut batch)?;
        }
        for (old, new) in &remapped {
            Self::remove_edge_keys_for(branch, old, &mut batch);
            self.put_edge_locked(branch, new, &mut batch)?;
        }
        self.apply_locked(batch)?;
        self.invalidate_stats_for(branch);
        Ok(())
    }
}
