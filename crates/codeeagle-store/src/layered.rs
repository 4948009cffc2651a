//! Read-through composition of a shared "main" graph and a local overlay
//!
//! Writes go only to the local layer; reads consult local first, so the
//! overlay is exactly the delta on top of a read-only shared graph (for
//! example one imported from a portable export file).

use std::collections::HashSet;

use codeeagle_core::{
    Direction, Edge, EdgeId, EdgeType, GraphRead, GraphStats, GraphWrite, Node, NodeFilter,
    NodeId, Result,
};

pub struct LayeredStore<M, L> {
    main: M,
    local: L,
}

impl<M: GraphRead, L: GraphWrite> LayeredStore<M, L> {
    pub fn new(main: M, local: L) -> Self {
        LayeredStore { main, local }
    }

    pub fn main(&self) -> &M {
        &self.main
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    /// Union of both layers' edges with local winning on ID collisions.
    fn merged_edges(&self, node: &NodeId, edge_type: Option<EdgeType>) -> Result<Vec<Edge>> {
        let mut edges = self.local.get_edges(node, edge_type)?;
        let local_ids: HashSet<EdgeId> = edges.iter().map(|edge| edge.id.clone()).collect();
        for edge in self.main.get_edges(node, edge_type)? {
            if !local_ids.contains(&edge.id) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }
}

impl<M: GraphRead, L: GraphWrite> GraphRead for LayeredStore<M, L> {
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        if let Some(node) = self.local.get_node(id)? {
            return Ok(Some(node));
        }
        self.main.get_node(id)
    }

    fn query_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let mut nodes = self.local.query_nodes(filter)?;
        let local_ids: HashSet<NodeId> = nodes.iter().map(|node| node.id.clone()).collect();
        for node in self.main.query_nodes(filter)? {
            if !local_ids.contains(&node.id) {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn get_edges(&self, node: &NodeId, edge_type: Option<EdgeType>) -> Result<Vec<Edge>> {
        self.merged_edges(node, edge_type)
    }

    fn get_neighbors(
        &self,
        node: &NodeId,
        edge_type: EdgeType,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for edge in self.merged_edges(node, Some(edge_type))? {
            let far = match direction {
                Direction::Outgoing if edge.source == *node => edge.target,
                Direction::Incoming if edge.target == *node => edge.source,
                Direction::Both => {
                    if edge.source == *node {
                        edge.target
                    } else {
                        edge.source
                    }
                }
                _ => continue,
            };
            if seen.insert(far.clone()) {
                // Local shadows main for the node payload as well.
                if let Some(far_node) = self.get_node(&far)? {
                    neighbors.push(far_node);
                }
            }
        }
        Ok(neighbors)
    }

    /// Counts over the union of both layers; a node or edge present in
    /// both (same ID) is counted once, with the local version deciding
    /// its type.
    fn stats(&self) -> Result<GraphStats> {
        let mut stats = GraphStats::default();
        let mut seen_nodes = HashSet::new();
        let everything = NodeFilter::default();
        for node in self.query_nodes(&everything)? {
            if seen_nodes.insert(node.id.clone()) {
                stats.node_count += 1;
                *stats.nodes_by_type.entry(node.node_type).or_insert(0) += 1;
            }
        }
        let mut seen_edges = HashSet::new();
        for node_id in &seen_nodes {
            for edge in self.merged_edges(node_id, None)? {
                // Outgoing side only, so each edge is visited once.
                if edge.source == *node_id && seen_edges.insert(edge.id.clone()) {
                    stats.edge_count += 1;
                    *stats.edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
                }
            }
        }
        Ok(stats)
    }
}

impl<M: GraphRead, L: GraphWrite> GraphWrite for LayeredStore<M, L> {
    fn add_node(&self, node: Node) -> Result<()> {
        self.local.add_node(node)
    }

    fn update_node(&self, node: Node) -> Result<()> {
        self.local.update_node(node)
    }

    fn delete_node(&self, id: &NodeId) -> Result<()> {
        self.local.delete_node(id)
    }

    fn add_edge(&self, edge: Edge) -> Result<()> {
        self.local.add_edge(edge)
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<()> {
        self.local.delete_edge(id)
    }

    fn delete_by_file(&self, path: &str) -> Result<()> {
        self.local.delete_by_file(path)
    }
}
