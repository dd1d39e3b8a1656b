//! Graph integrity errors
//!
//! Raised by [`super::CompiledGraph::validate`] when the node and edge sets do
//! not form a DAG rooted at source scans.

use thiserror::Error;

/// Violations of the compiled graph invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two nodes share an id
    #[error("Duplicate operation id: {0}")]
    DuplicateId(String),

    /// An edge names a node that is not in the graph
    #[error("Edge {parent} -> {child} references an unknown operation")]
    DanglingEdge { parent: String, child: String },

    /// The node is its own ancestor
    #[error("Cycle through operation: {0}")]
    Cycle(String),

    /// A non-source node has no parent
    #[error("Operation has no parent: {0}")]
    Orphan(String),

    /// A source scan has an incoming edge
    #[error("Source operation has a parent: {0}")]
    SourceWithParent(String),

    /// The node cannot be reached from any source scan
    #[error("Operation is unreachable from any source: {0}")]
    Unreachable(String),
}

/// Result type for graph assembly
pub type GraphResult<T> = Result<T, GraphError>;
