//! Portable export codec: line-delimited JSON for one branch's subgraph
//!
//! A header line identifies the format, version, and source branch, then
//! one record per line, all nodes before any edge. The header alone is
//! enough to determine the source branch. Import streams into a scratch
//! branch and atomically replaces the target on success, so a crash
//! mid-import never touches the target.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use codeeagle_core::{Edge, GraphError, Node, Result};

use crate::store::{BranchStore, SCHEMA_VERSION};

pub const EXPORT_FORMAT: &str = "codeeagle-graph";
pub const EXPORT_VERSION: u32 = 1;

/// Records staged per atomic batch while streaming an import.
const IMPORT_BATCH: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportHeader {
    pub format: String,
    pub version: u32,
    pub branch: String,
    pub exported_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportRecord {
    Node(Node),
    Edge(Edge),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub nodes: u64,
    pub edges: u64,
}

/// Read just the header line, e.g. to learn the source branch without
/// consuming the whole file.
pub fn read_export_header(reader: &mut impl BufRead) -> Result<ExportHeader> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let header: ExportHeader = serde_json::from_str(line.trim_end())
        .map_err(|err| GraphError::validation(format!("bad export header: {err}")))?;
    if header.format != EXPORT_FORMAT {
        return Err(GraphError::validation(format!(
            "unknown export format {:?}",
            header.format
        )));
    }
    Ok(header)
}

pub fn read_export_branch(reader: &mut impl BufRead) -> Result<String> {
    Ok(read_export_header(reader)?.branch)
}

impl BranchStore {
    /// Stream one branch's subgraph to `writer`: header, then every node,
    /// then every edge.
    pub fn export_branch(&self, branch: &str, writer: &mut impl Write) -> Result<ExportSummary> {
        let _global = self.global_write_guard();

        let header = ExportHeader {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION,
            branch: branch.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            schema_version: Some(SCHEMA_VERSION),
            extra: BTreeMap::new(),
        };
        serde_json::to_writer(&mut *writer, &header).map_err(GraphError::storage)?;
        writer.write_all(b"\n")?;

        let mut summary = ExportSummary::default();
        for node in self.all_nodes(branch)? {
            serde_json::to_writer(&mut *writer, &ExportRecord::Node(node))
                .map_err(GraphError::storage)?;
            writer.write_all(b"\n")?;
            summary.nodes += 1;
        }
        for edge in self.all_edges(branch)? {
            serde_json::to_writer(&mut *writer, &ExportRecord::Edge(edge))
                .map_err(GraphError::storage)?;
            writer.write_all(b"\n")?;
            summary.edges += 1;
        }
        writer.flush()?;
        tracing::info!(branch, nodes = summary.nodes, edges = summary.edges, "exported branch");
        Ok(summary)
    }

    /// Stream records into a scratch branch, then atomically replace
    /// `target`. The header's declared branch is informational only; a
    /// version newer than ours is fatal, unknown optional fields on
    /// records are preserved.
    pub fn import_into_branch(
        &self,
        reader: &mut impl BufRead,
        target: &str,
    ) -> Result<ExportSummary> {
        crate::keys::validate_branch(target).map_err(GraphError::Validation)?;
        let header = read_export_header(reader)?;
        if header.version > EXPORT_VERSION {
            return Err(GraphError::validation(format!(
                "export version {} is newer than supported {}",
                header.version, EXPORT_VERSION
            )));
        }
        if header.branch != target {
            tracing::info!(
                source = header.branch,
                target,
                "import source branch differs from target; writing to target"
            );
        }

        let _global = self.global_write_guard();
        let scratch = format!("{target}~import");
        self.drop_branch_inner(&scratch)?;

        match self.stream_records(reader, &scratch) {
            Ok(summary) => {
                self.replace_branch_inner(&scratch, target)?;
                self.invalidate_stats_for(target);
                tracing::info!(
                    branch = target,
                    nodes = summary.nodes,
                    edges = summary.edges,
                    "imported branch"
                );
                Ok(summary)
            }
            Err(err) => {
                // Leave the target untouched; scrap the partial import.
                self.drop_branch_inner(&scratch)?;
                Err(err)
            }
        }
    }

    fn stream_records(&self, reader: &mut impl BufRead, scratch: &str) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();
        let mut batch = sled::Batch::default();
        let mut staged = 0usize;
        self.ensure_meta_locked(scratch, &mut batch)?;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ExportRecord = serde_json::from_str(&line).map_err(|err| {
                GraphError::validation(format!("bad export record at line {}: {err}", line_no + 2))
            })?;
            match record {
                ExportRecord::Node(node) => {
                    self.put_node_locked(scratch, &node, &mut batch)?;
                    summary.nodes += 1;
                }
                ExportRecord::Edge(edge) => {
                    self.put_edge_locked(scratch, &edge, &mut batch)?;
                    summary.edges += 1;
                }
            }
            staged += 1;
            if staged >= IMPORT_BATCH {
                self.apply_locked(std::mem::take(&mut batch))?;
                staged = 0;
            }
        }
        // Always applied: the first batch carries the scratch branch
        // metadata even when the export holds no records.
        self.apply_locked(batch)?;
        Ok(summary)
    }
}
