//! Per-statement pipeline
//!
//! Plans a statement (validation, time range, grouping, columns) and wires its
//! operations into an isolated [`Subgraph`]:
//!
//! ```text
//! from -> range -> filter -> [window] -> group -+-> fn -> map -+-> [join] -> [limit] -> yield
//!                                               +-> fn -> map -+
//! ```
//!
//! Raw projections skip the function node; when they read several fields
//! each branch first filters its own field.

use crate::graph::{BucketId, FromSpec, GroupSpec, OperationSpec, RangeSpec, Subgraph};
use crate::influxql::{Measurement, SelectStatement, Source};
use crate::transpiler::error::{CompileError, CompileResult};
use crate::transpiler::filter::{compile_filter, field_filter};
use crate::transpiler::function::{distinct_fields, plan_fields, FieldPlan, Projection};
use crate::transpiler::group::{compile_grouping, Grouping};
use crate::transpiler::output::{join_spec, limit_spec, map_spec, yield_spec};
use crate::transpiler::time_range::{split_condition, TimeCondition};
use chrono::{DateTime, Utc};
use tracing::debug;

/// A validated statement ready to be wired
#[derive(Debug, Clone)]
pub struct StatementPlan<'a> {
    pub statement: &'a SelectStatement,
    pub measurement: &'a Measurement,
    pub fields: Vec<FieldPlan>,
    pub time: TimeCondition,
    pub grouping: Grouping,
}

/// Validate a statement and resolve everything except its bucket
pub fn plan_statement(
    stmt: &SelectStatement,
    now: DateTime<Utc>,
) -> CompileResult<StatementPlan<'_>> {
    let measurement = single_measurement(&stmt.sources)?;
    let fields = plan_fields(&stmt.fields)?;
    let grouping = compile_grouping(&stmt.dimensions, now)?;

    if grouping.window.is_some() && !stmt.has_call() {
        return Err(CompileError::shape(
            "GROUP BY requires at least one aggregate function",
        ));
    }

    let time = split_condition(stmt.condition.as_ref(), now)?;

    Ok(StatementPlan {
        statement: stmt,
        measurement,
        fields,
        time,
        grouping,
    })
}

fn single_measurement(sources: &[Source]) -> CompileResult<&Measurement> {
    match sources {
        [Source::Measurement(m)] => Ok(m),
        [Source::Regex(re)] => Err(CompileError::shape(format!(
            "regex sources are not supported: /{}/",
            re
        ))),
        [Source::Subquery(_)] => Err(CompileError::shape("subqueries are not supported")),
        [] => Err(CompileError::shape("statement has no source")),
        _ => Err(CompileError::shape(format!(
            "expected exactly one source, got {}",
            sources.len()
        ))),
    }
}

/// Wire the operations of a planned statement
pub fn build_subgraph(
    plan: &StatementPlan<'_>,
    index: usize,
    bucket: BucketId,
) -> CompileResult<Subgraph> {
    let mut graph = Subgraph::new();
    let fields = distinct_fields(&plan.fields);

    let from = graph.add_source(OperationSpec::From(FromSpec { bucket }));
    let range = graph.add(
        OperationSpec::Range(RangeSpec::new(plan.time.range.start, plan.time.range.stop)),
        from,
    );
    let filter = graph.add(
        OperationSpec::Filter(compile_filter(
            &plan.measurement.name,
            &fields,
            plan.time.predicate.as_ref(),
        )?),
        range,
    );

    let mut upstream = filter;
    if let Some(window) = &plan.grouping.window {
        upstream = graph.add(OperationSpec::Window(window.clone()), upstream);
    }
    let group = graph.add(
        OperationSpec::Group(GroupSpec {
            by: plan.grouping.keys.clone(),
        }),
        upstream,
    );

    let split_raw_fields = fields.len() > 1;
    let mut maps = Vec::with_capacity(plan.fields.len());
    for field in &plan.fields {
        let parent = match (&field.projection, field.projection.operation()) {
            (_, Some(op)) => graph.add(op, group),
            (Projection::Raw { field }, None) if split_raw_fields => {
                graph.add(OperationSpec::Filter(field_filter(field)), group)
            }
            (_, None) => group,
        };
        maps.push(graph.add(OperationSpec::Map(map_spec(field)?), parent));
    }

    let mut tail = match maps.as_slice() {
        [] => return Err(CompileError::shape("statement projects no columns")),
        [single] => *single,
        many => graph.add_with_parents(
            OperationSpec::Join(join_spec(&plan.fields, &plan.grouping.keys)),
            many,
        ),
    };

    if let Some(limit) = limit_spec(plan.statement.limit, plan.statement.offset) {
        tail = graph.add(OperationSpec::Limit(limit), tail);
    }
    graph.add(OperationSpec::Yield(yield_spec(index)), tail);

    debug!(
        statement = index,
        measurement = %plan.measurement.name,
        start = plan.time.range.start,
        stop = plan.time.range.stop,
        keys = ?plan.grouping.keys,
        columns = plan.fields.len(),
        nodes = graph.len(),
        "Compiled statement"
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OperationKind;
    use crate::influxql::parse_statement;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn kinds(query: &str) -> Vec<OperationKind> {
        let stmt = parse_statement(query).unwrap();
        let plan = plan_statement(&stmt, now()).unwrap();
        build_subgraph(&plan, 0, BucketId::new("b"))
            .unwrap()
            .nodes()
            .iter()
            .map(OperationSpec::kind)
            .collect()
    }

    #[test]
    fn test_window_sits_between_filter_and_group() {
        use OperationKind::*;
        assert_eq!(
            kinds("SELECT count(v) FROM cpu GROUP BY time(1m)"),
            vec![From, Range, Filter, Window, Group, Aggregate, Map, Yield]
        );
    }

    #[test]
    fn test_raw_fields_split_per_field() {
        use OperationKind::*;
        assert_eq!(
            kinds("SELECT a, b FROM cpu LIMIT 3"),
            vec![From, Range, Filter, Group, Filter, Map, Filter, Map, Join, Limit, Yield]
        );
        assert_eq!(
            kinds("SELECT a FROM cpu"),
            vec![From, Range, Filter, Group, Map, Yield]
        );
    }

    #[test]
    fn test_same_raw_field_twice_needs_no_split() {
        use OperationKind::*;
        assert_eq!(
            kinds("SELECT a, a * 2 FROM cpu"),
            vec![From, Range, Filter, Group, Map, Map, Join, Yield]
        );
    }

    #[test]
    fn test_statement_shape_errors() {
        for query in [
            "SELECT v FROM /cpu.*/",
            "SELECT v FROM (SELECT v FROM cpu)",
            "SELECT v FROM cpu, mem",
            "SELECT v FROM cpu GROUP BY time(1m)",
        ] {
            let stmt = parse_statement(query).unwrap();
            let err = plan_statement(&stmt, now()).unwrap_err();
            assert!(
                matches!(err, CompileError::UnsupportedStatementShape(_)),
                "{} gave {:?}",
                query,
                err
            );
        }
    }
}
