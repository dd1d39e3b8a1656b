//! Output reconciliation
//!
//! Each projected column gets a Map renaming the generic value column to the
//! column name while keeping the time column. Maps keep their group key, so
//! when a statement projects several columns a Join merges them into one row
//! per group. Statements end in a Yield named after their position.

use crate::graph::{JoinSpec, LimitSpec, MapSpec, YieldSpec, TIME_COLUMN, VALUE_COLUMN};
use crate::influxql::Expr;
use crate::semantic::{Expression, FunctionExpression, Property};
use crate::transpiler::error::CompileResult;
use crate::transpiler::expr::{lower_expr_with, ROW_PARAM};
use crate::transpiler::function::{FieldPlan, Projection};

/// `{_time: r._time, <column>: <value>}` with the projection's value read
/// from the value column
pub fn map_spec(plan: &FieldPlan) -> CompileResult<MapSpec> {
    let value_column = || Expression::member(ROW_PARAM, VALUE_COLUMN);
    let value = lower_expr_with(&plan.expr, ROW_PARAM, &|e: &Expr| match (e, &plan.projection) {
        (Expr::Call { .. }, Projection::Call { .. }) => Some(value_column()),
        (Expr::VarRef(name), Projection::Raw { field }) if name == field => Some(value_column()),
        _ => None,
    })?;

    let body = Expression::object(vec![
        Property::new(TIME_COLUMN, Expression::member(ROW_PARAM, TIME_COLUMN)),
        Property::new(plan.column.as_str(), value),
    ]);

    Ok(MapSpec {
        function: FunctionExpression::row(ROW_PARAM, body),
        merge_key: true,
    })
}

/// Merge the per-column tables of a statement on its group key. Raw rows
/// keep their own timestamps, so they also line up on time.
pub fn join_spec(plans: &[FieldPlan], keys: &[String]) -> JoinSpec {
    let mut on = keys.to_vec();
    let raw = plans
        .iter()
        .any(|p| matches!(p.projection, Projection::Raw { .. }));
    if raw && !on.iter().any(|k| k == TIME_COLUMN) {
        on.push(TIME_COLUMN.to_string());
    }

    JoinSpec {
        tables: plans.iter().map(|p| p.column.clone()).collect(),
        on,
    }
}

/// LIMIT/OFFSET; a zero limit means no limit
pub fn limit_spec(limit: Option<u64>, offset: Option<u64>) -> Option<LimitSpec> {
    let n = limit.filter(|n| *n > 0);
    let offset = offset.unwrap_or(0);
    if n.is_none() && offset == 0 {
        return None;
    }
    Some(LimitSpec { n, offset })
}

/// Result names are the statement positions: "0", "1", ...
pub fn yield_spec(statement_index: usize) -> YieldSpec {
    YieldSpec {
        name: statement_index.to_string(),
    }
}
