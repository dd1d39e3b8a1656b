//! Compilation error types
//!
//! Every failure is raised before a graph is returned; a compilation either
//! yields a complete validated graph or one of these.

use crate::graph::GraphError;
use crate::influxql::ParseError;
use thiserror::Error;

/// Errors that can occur while compiling statements into a graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An expression form that has no dataflow equivalent
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// A call to a function outside the aggregate/selector table
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    /// Time predicates that cannot be resolved to one `[start, stop)` range
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    /// The assembled graph failed validation
    #[error("Graph integrity error: {0}")]
    GraphIntegrity(#[from] GraphError),

    /// A clause combination not reducible to the supported operations
    #[error("Unsupported statement: {0}")]
    UnsupportedStatementShape(String),

    /// No bucket is mapped to the statement's database and retention policy
    #[error("No bucket mapped for database {database:?} (retention policy {retention_policy:?})")]
    BucketNotFound {
        database: String,
        retention_policy: Option<String>,
    },

    /// Query text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl CompileError {
    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        Self::UnsupportedStatementShape(reason.into())
    }

    pub(crate) fn time_range(reason: impl Into<String>) -> Self {
        Self::InvalidTimeRange(reason.into())
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
