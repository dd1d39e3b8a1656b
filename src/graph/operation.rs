//! Operation nodes
//!
//! Each node pairs a generated id with a kind-specific parameter record. The
//! parameter names and canonical column labels below are the contract with
//! the execution engine.

use crate::graph::function::{AggregateFunction, SelectorFunction};
use crate::semantic::FunctionExpression;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row time column
pub const TIME_COLUMN: &str = "_time";
/// Window/range start column
pub const START_COLUMN: &str = "_start";
/// Window/range stop column
pub const STOP_COLUMN: &str = "_stop";
/// Generic value column
pub const VALUE_COLUMN: &str = "_value";
pub const MEASUREMENT_COLUMN: &str = "_measurement";
pub const FIELD_COLUMN: &str = "_field";

/// Opaque handle of the dataset scanned by a source node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketId(String);

impl BucketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique node identifier within one compiled graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for OperationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for OperationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A node of the compiled graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    #[serde(flatten)]
    pub spec: OperationSpec,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        self.spec.kind()
    }
}

/// Supported operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    From,
    Range,
    Filter,
    Window,
    Group,
    Aggregate,
    Selector,
    Map,
    Join,
    Limit,
    Yield,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::From => "from",
            Self::Range => "range",
            Self::Filter => "filter",
            Self::Window => "window",
            Self::Group => "group",
            Self::Aggregate => "aggregate",
            Self::Selector => "selector",
            Self::Map => "map",
            Self::Join => "join",
            Self::Limit => "limit",
            Self::Yield => "yield",
        };
        write!(f, "{}", s)
    }
}

/// Kind-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationSpec {
    From(FromSpec),
    Range(RangeSpec),
    Filter(FilterSpec),
    Window(WindowSpec),
    Group(GroupSpec),
    Aggregate(AggregateSpec),
    Selector(SelectorSpec),
    Map(MapSpec),
    Join(JoinSpec),
    Limit(LimitSpec),
    Yield(YieldSpec),
}

impl OperationSpec {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::From(_) => OperationKind::From,
            Self::Range(_) => OperationKind::Range,
            Self::Filter(_) => OperationKind::Filter,
            Self::Window(_) => OperationKind::Window,
            Self::Group(_) => OperationKind::Group,
            Self::Aggregate(_) => OperationKind::Aggregate,
            Self::Selector(_) => OperationKind::Selector,
            Self::Map(_) => OperationKind::Map,
            Self::Join(_) => OperationKind::Join,
            Self::Limit(_) => OperationKind::Limit,
            Self::Yield(_) => OperationKind::Yield,
        }
    }

    /// Prefix of generated ids. Function nodes are named after the function
    /// (`mean0`, `max1`), everything else after its kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Aggregate(spec) => spec.function.name(),
            Self::Selector(spec) => spec.function.name(),
            Self::From(_) => "from",
            Self::Range(_) => "range",
            Self::Filter(_) => "filter",
            Self::Window(_) => "window",
            Self::Group(_) => "group",
            Self::Map(_) => "map",
            Self::Join(_) => "join",
            Self::Limit(_) => "limit",
            Self::Yield(_) => "yield",
        }
    }
}

/// Storage scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromSpec {
    pub bucket: BucketId,
}

/// Absolute `[start, stop)` bounds in nanoseconds since the epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub start: i64,
    pub stop: i64,
    pub time_column: String,
    pub start_column: String,
    pub stop_column: String,
}

impl RangeSpec {
    /// Range over the canonical columns
    pub fn new(start: i64, stop: i64) -> Self {
        Self {
            start,
            stop,
            time_column: TIME_COLUMN.to_string(),
            start_column: START_COLUMN.to_string(),
            stop_column: STOP_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub predicate: FunctionExpression,
}

/// Fixed windows; all durations in nanoseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub every: i64,
    pub period: i64,
    /// Shift of window boundaries, in `[0, every)`
    pub offset: i64,
    pub time_column: String,
    pub start_column: String,
    pub stop_column: String,
}

impl WindowSpec {
    /// Tumbling windows over the canonical columns
    pub fn tumbling(every: i64, offset: i64) -> Self {
        Self {
            every,
            period: every,
            offset,
            time_column: TIME_COLUMN.to_string(),
            start_column: START_COLUMN.to_string(),
            stop_column: STOP_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Grouping key columns, canonical labels first
    pub by: Vec<String>,
}

/// Aggregate over the rows of one field. The output row time is copied from
/// `time_src` into `time_dst`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub function: AggregateFunction,
    pub field: String,
    pub columns: Vec<String>,
    pub time_src: String,
    pub time_dst: String,
}

impl AggregateSpec {
    pub fn new(function: AggregateFunction, field: impl Into<String>) -> Self {
        Self {
            function,
            field: field.into(),
            columns: vec![VALUE_COLUMN.to_string()],
            time_src: START_COLUMN.to_string(),
            time_dst: TIME_COLUMN.to_string(),
        }
    }
}

/// Selects one row of one field, keeping its time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorSpec {
    pub function: SelectorFunction,
    pub field: String,
    pub column: String,
}

impl SelectorSpec {
    pub fn new(function: SelectorFunction, field: impl Into<String>) -> Self {
        Self {
            function,
            field: field.into(),
            column: VALUE_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    pub function: FunctionExpression,
    /// Keep the group key of input tables so sibling maps merge by group
    pub merge_key: bool,
}

/// Merges the tables of its parents, in edge order, on the `on` columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub tables: Vec<String>,
    pub on: Vec<String>,
}

/// Rows kept per group; `n` of `None` keeps every row after `offset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSpec {
    pub n: Option<u64>,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldSpec {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_prefixes() {
        let mean = OperationSpec::Aggregate(AggregateSpec::new(AggregateFunction::Mean, "value"));
        let max = OperationSpec::Selector(SelectorSpec::new(SelectorFunction::Max, "value"));
        let group = OperationSpec::Group(GroupSpec { by: vec![] });

        assert_eq!(mean.id_prefix(), "mean");
        assert_eq!(max.id_prefix(), "max");
        assert_eq!(group.id_prefix(), "group");
        assert_eq!(mean.kind(), OperationKind::Aggregate);
        assert_eq!(max.kind(), OperationKind::Selector);
    }

    #[test]
    fn test_aggregate_anchors_to_window_start() {
        let spec = AggregateSpec::new(AggregateFunction::Count, "value");
        assert_eq!(spec.time_src, START_COLUMN);
        assert_eq!(spec.time_dst, TIME_COLUMN);
        assert_eq!(spec.columns, vec![VALUE_COLUMN.to_string()]);
    }

    #[test]
    fn test_serialize_operation() {
        let op = Operation {
            id: OperationId::new("range0"),
            spec: OperationSpec::Range(RangeSpec::new(0, 10)),
        };
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(json["id"], "range0");
        assert_eq!(json["kind"], "range");
        assert_eq!(json["start"], 0);
        assert_eq!(json["stop"], 10);
        assert_eq!(json["time_column"], "_time");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
