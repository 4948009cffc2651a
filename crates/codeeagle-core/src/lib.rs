//! CodeEagle Core — graph data model, store ports, and error taxonomy

pub mod cancel;
pub mod error;
pub mod model;
pub mod port;
pub mod project;

#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use error::{GraphError, Result};
pub use model::{
    Direction, Edge, EdgeId, EdgeType, GraphStats, Node, NodeFilter, NodeId, NodeType,
    DEFAULT_BRANCH,
};
pub use port::{GraphRead, GraphWrite};
