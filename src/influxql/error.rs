//! Parse error types

use thiserror::Error;

/// Errors produced by the InfluxQL text front-end
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Input contained no statements
    #[error("Empty query")]
    Empty,

    /// The input did not match the grammar
    #[error("Syntax error near '{0}'")]
    Syntax(String),

    /// A statement parsed but input remained
    #[error("Unexpected input after statement: '{0}'")]
    TrailingInput(String),
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;
