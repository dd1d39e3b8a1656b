//! InfluxQL statements
//!
//! The transpiler's input contract:
//!
//! - **AST**: typed SELECT statements, expressions and literals
//! - **Parser**: a text front-end for the subset the AST models
//!
//! # Examples
//!
//! ## Using the statement builder
//!
//! ```rust
//! use influxql_transpiler::influxql::{Measurement, SelectStatement};
//!
//! let stmt = SelectStatement::from_measurement(Measurement::new("cpu").database("db0"))
//!     .call("mean", "value")
//!     .group_by_tag("host")
//!     .build();
//!
//! assert_eq!(stmt.to_string(), "SELECT mean(value) FROM db0..cpu GROUP BY host");
//! ```
//!
//! ## Using query text
//!
//! ```rust
//! use influxql_transpiler::influxql::parse_query;
//!
//! let query = parse_query("SELECT mean(value) FROM db0..cpu GROUP BY host").unwrap();
//! assert_eq!(query.statements.len(), 1);
//! ```

mod ast;
mod error;
mod parser;

pub use ast::{
    format_duration, is_time_ref, BinaryOp, Dimension, Expr, Field, Literal, Measurement, Query,
    SelectBuilder, SelectStatement, Source,
};
pub use error::{ParseError, ParseResult};
pub use parser::{parse_query, parse_statement};
