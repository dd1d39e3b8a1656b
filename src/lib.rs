//! # InfluxQL Transpiler
//!
//! Compiles InfluxQL SELECT statements into a deterministic dataflow graph of
//! typed operations (scan, range, filter, window, group, aggregate, selector,
//! map, join, limit, yield) ready for an external query engine.
//!
//! ## Modules
//!
//! - [`influxql`]: Statement AST and a text front-end
//! - [`semantic`]: Function expressions used by filter and map nodes
//! - [`graph`]: Operation nodes, graph assembly and integrity checks
//! - [`transpiler`]: Per-statement compilation pipeline
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use influxql_transpiler::{StaticBuckets, Transpiler};
//!
//! let buckets = StaticBuckets::new().with("telegraf", Some("autogen"), "0000000000000001");
//! let transpiler = Transpiler::new(buckets);
//!
//! let graph = transpiler
//!     .transpile_str(
//!         "SELECT mean(usage_idle) FROM telegraf.autogen.cpu \
//!          WHERE time > now() - 1h GROUP BY time(5m), host",
//!         Utc::now(),
//!     )
//!     .unwrap();
//!
//! println!("{}", serde_json::to_string_pretty(&graph).unwrap());
//! ```

pub mod config;
pub mod graph;
pub mod influxql;
pub mod semantic;
pub mod transpiler;

// Re-export top-level types for convenience
pub use config::{generate_default_config, Config, ConfigError, LoggingConfig};

pub use graph::{
    CompiledGraph, Edge, Function, FunctionKind, GraphError, Operation, OperationId,
    OperationKind, OperationSpec,
};

pub use influxql::{parse_query, parse_statement, ParseError, Query, SelectStatement};

pub use transpiler::{
    BucketLookup, BucketMapping, CompileError, CompileResult, StaticBuckets, Transpiler,
    TranspilerConfig,
};
