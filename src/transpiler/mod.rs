//! InfluxQL to dataflow compiler
//!
//! Compiles each statement of a query through an isolated pipeline and merges
//! the results at the graph assembler:
//!
//! - **Expression lowering**: statement expressions to row functions
//! - **Time range**: WHERE time bounds to an absolute `[start, stop)`
//! - **Filter**: measurement, field and user predicate
//! - **Grouping**: key set and optional window
//! - **Functions**: one aggregate or selector node per projected call
//! - **Output**: renaming maps, join, limit and yield
//!
//! The reference instant is an argument: every relative time in one
//! compilation resolves against it, so identical inputs give identical graphs.
//!
//! # Examples
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use influxql_transpiler::graph::OperationKind;
//! use influxql_transpiler::transpiler::{StaticBuckets, Transpiler};
//!
//! let transpiler = Transpiler::new(StaticBuckets::new().with("db0", None, "bucket-0"));
//! let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//!
//! let graph = transpiler
//!     .transpile_str("SELECT mean(value) FROM db0..cpu GROUP BY host", now)
//!     .unwrap();
//!
//! assert_eq!(graph.operations_of_kind(OperationKind::Aggregate).len(), 1);
//! assert_eq!(graph.yields()[0].0, "0");
//! ```

mod bucket;
mod error;
mod expr;
mod filter;
mod function;
mod group;
mod output;
mod statement;
mod time_range;


pub use bucket::{BucketLookup, BucketMapping, StaticBuckets};
pub use error::{CompileError, CompileResult};
pub use expr::{lower_expr, lower_predicate, ROW_PARAM};
pub use filter::compile_filter;
pub use function::{plan_fields, FieldPlan, Projection};
pub use group::{compile_grouping, Grouping};
pub use time_range::{split_condition, TimeCondition, TimeRange, MAX_TIME, MIN_TIME};

use crate::graph::{BucketId, CompiledGraph, GraphAssembler};
use crate::influxql::{parse_query, Measurement, Query};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Defaults applied to statements that leave parts of the source unqualified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspilerConfig {
    pub default_database: Option<String>,
    pub default_retention_policy: Option<String>,
}

/// Statement to graph compiler
#[derive(Debug, Clone)]
pub struct Transpiler<B = StaticBuckets> {
    buckets: B,
    config: TranspilerConfig,
}

impl<B: BucketLookup> Transpiler<B> {
    /// Create a transpiler resolving buckets through `buckets`
    pub fn new(buckets: B) -> Self {
        Self::with_config(buckets, TranspilerConfig::default())
    }

    pub fn with_config(buckets: B, config: TranspilerConfig) -> Self {
        Self { buckets, config }
    }

    pub fn config(&self) -> &TranspilerConfig {
        &self.config
    }

    /// Compile every statement of `query` into one graph
    ///
    /// Statement `i` ends in the Yield named `i`. Nothing is returned unless
    /// every statement compiles and the assembled graph validates.
    pub fn transpile(&self, query: &Query, now: DateTime<Utc>) -> CompileResult<CompiledGraph> {
        if query.statements.is_empty() {
            return Err(CompileError::shape("query contains no statements"));
        }

        let mut assembler = GraphAssembler::new(now);
        for (index, stmt) in query.statements.iter().enumerate() {
            let plan = statement::plan_statement(stmt, now)?;
            let bucket = self.resolve_bucket(plan.measurement)?;
            let subgraph = statement::build_subgraph(&plan, index, bucket)?;
            assembler.append(subgraph)?;
        }

        let graph = assembler.finish()?;
        debug!(
            statements = query.statements.len(),
            operations = graph.operations.len(),
            edges = graph.edges.len(),
            "Compiled query"
        );
        Ok(graph)
    }

    /// Parse and compile query text
    pub fn transpile_str(&self, query: &str, now: DateTime<Utc>) -> CompileResult<CompiledGraph> {
        let query = parse_query(query)?;
        self.transpile(&query, now)
    }

    fn resolve_bucket(&self, measurement: &Measurement) -> CompileResult<BucketId> {
        let database = measurement
            .database
            .as_deref()
            .or(self.config.default_database.as_deref())
            .ok_or_else(|| {
                CompileError::shape(format!("database name required for {}", measurement))
            })?;
        let retention_policy = measurement
            .retention_policy
            .as_deref()
            .or(self.config.default_retention_policy.as_deref());

        self.buckets
            .lookup(database, retention_policy)
            .ok_or_else(|| CompileError::BucketNotFound {
                database: database.to_string(),
                retention_policy: retention_policy.map(str::to_string),
            })
    }
}

impl Transpiler<StaticBuckets> {
    /// Build from loaded configuration
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::with_config(config.static_buckets(), config.transpiler_config())
    }
}
