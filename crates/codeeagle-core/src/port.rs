//! Store ports consumed by readers and the indexer

use crate::error::Result;
use crate::model::{Direction, Edge, EdgeId, EdgeType, GraphStats, Node, NodeFilter, NodeId};

/// Read surface exposed to all consumers (agents, CLIs, coverage
/// analyses). Every operation is safe under concurrent writers.
pub trait GraphRead: Send + Sync {
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>>;

    /// Structural filter query. Implementations pick the most selective
    /// index and filter remaining predicates in memory.
    fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>>;

    /// Union of outgoing and incoming edges, optionally filtered by type.
    fn get_edges(&self, node: &NodeId, edge_type: Option<EdgeType>) -> Result<Vec<Edge>>;

    /// Nodes on the far side of matching edges. Dangling edges (an
    /// endpoint missing during a sync window) are skipped.
    fn get_neighbors(
        &self,
        node: &NodeId,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>>;

    fn stats(&self) -> Result<GraphStats>;
}

/// Mutation surface. Implementations apply each logical operation as a
/// single atomic batch, indexes included.
pub trait GraphWrite: GraphRead {
    /// Upsert; inserting an existing ID overwrites (idempotent re-parse).
    fn add_node(&self, node: Node) -> Result<()>;

    /// Like `add_node` but fails with `NotFound` if the ID is absent.
    fn update_node(&self, node: Node) -> Result<()>;

    /// Removes the node, its index entries, and every edge touching it.
    fn delete_node(&self, id: &NodeId) -> Result<()>;

    fn add_edge(&self, edge: Edge) -> Result<()>;

    fn delete_edge(&self, id: &EdgeId) -> Result<()>;

    /// Removes every node with this `file_path` and every edge touching
    /// any such node. Atomic per branch.
    fn delete_by_file(&self, path: &str) -> Result<()>;
}
