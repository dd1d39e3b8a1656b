//! Aggregate and selector injection
//!
//! Plans one output column per projected field. A field is either a single
//! function call over a field (`mean(value)`, possibly inside arithmetic such
//! as `mean(value) * 2`) or a raw field reference. Result columns are named
//! like the query language names them: alias, else function name, else field
//! name, with `_1`, `_2`... appended to repeats. The time column name is
//! taken from the start, so a column aliased `_time` becomes `_time_1`.

use crate::graph::{AggregateSpec, Function, OperationSpec, SelectorSpec, TIME_COLUMN};
use crate::influxql::{is_time_ref, Expr, Field};
use crate::transpiler::error::{CompileError, CompileResult};
use crate::transpiler::expr::strip_parens;
use std::collections::HashSet;

/// What a projected field reads
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `function(field)`
    Call { function: Function, field: String },
    /// A raw field value
    Raw { field: String },
}

impl Projection {
    pub fn field(&self) -> &str {
        match self {
            Self::Call { field, .. } | Self::Raw { field } => field,
        }
    }

    /// The aggregate or selector node for a call projection
    pub fn operation(&self) -> Option<OperationSpec> {
        match self {
            Self::Call {
                function: Function::Aggregate(agg),
                field,
            } => Some(OperationSpec::Aggregate(AggregateSpec::new(*agg, field.as_str()))),
            Self::Call {
                function: Function::Selector(sel),
                field,
            } => Some(OperationSpec::Selector(SelectorSpec::new(*sel, field.as_str()))),
            Self::Raw { .. } => None,
        }
    }
}

/// One output column of a statement
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    /// Result column name, unique within the statement
    pub column: String,
    pub projection: Projection,
    /// The projected expression as written
    pub expr: Expr,
}

/// Plan the projected fields of a statement, skipping `time`
pub fn plan_fields(fields: &[Field]) -> CompileResult<Vec<FieldPlan>> {
    let mut plans = Vec::with_capacity(fields.len());
    let mut names = ColumnNames::new();

    for field in fields.iter().filter(|f| !f.is_time()) {
        if field.expr.contains_wildcard() {
            return Err(CompileError::shape(format!(
                "wildcard projections are not supported: {}",
                field.expr
            )));
        }

        let projection = plan_projection(&field.expr)?;
        plans.push(FieldPlan {
            column: names.assign(field.name()),
            projection,
            expr: field.expr.clone(),
        });
    }

    if plans.is_empty() {
        return Err(CompileError::shape("at least one non-time field must be selected"));
    }

    let calls = plans
        .iter()
        .filter(|p| matches!(p.projection, Projection::Call { .. }))
        .count();
    if calls > 0 && calls < plans.len() {
        return Err(CompileError::shape(
            "mixing aggregate and non-aggregate queries is not supported",
        ));
    }

    Ok(plans)
}

/// Selected field names in first-appearance order
pub fn distinct_fields(plans: &[FieldPlan]) -> Vec<String> {
    let mut seen = HashSet::new();
    plans
        .iter()
        .map(|p| p.projection.field())
        .filter(|f| seen.insert(*f))
        .map(str::to_string)
        .collect()
}

fn plan_projection(expr: &Expr) -> CompileResult<Projection> {
    let mut calls = Vec::new();
    collect_calls(expr, &mut calls);

    match calls.as_slice() {
        [] => {
            let mut refs = Vec::new();
            collect_refs(expr, &mut refs);
            match refs.as_slice() {
                [field] => Ok(Projection::Raw {
                    field: field.to_string(),
                }),
                _ => Err(CompileError::UnsupportedExpression(expr.to_string())),
            }
        }
        [call] => plan_call(call),
        _ => Err(CompileError::UnsupportedExpression(format!(
            "{} (only one function call per field is supported)",
            expr
        ))),
    }
}

fn plan_call(call: &Expr) -> CompileResult<Projection> {
    let (name, args) = match call {
        Expr::Call { name, args } => (name, args),
        other => return Err(CompileError::UnsupportedExpression(other.to_string())),
    };

    let function =
        Function::lookup(name).ok_or_else(|| CompileError::UnsupportedFunction(name.clone()))?;

    match args.iter().map(strip_parens).collect::<Vec<_>>().as_slice() {
        [Expr::VarRef(field)] if !is_time_ref(field) => Ok(Projection::Call {
            function,
            field: field.clone(),
        }),
        _ => Err(CompileError::UnsupportedExpression(format!(
            "{} (expected a single field argument)",
            call
        ))),
    }
}

/// Outermost calls, left to right
fn collect_calls<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Call { .. } => out.push(expr),
        Expr::Binary { lhs, rhs, .. } => {
            collect_calls(lhs, out);
            collect_calls(rhs, out);
        }
        Expr::Not(inner) | Expr::Paren(inner) => collect_calls(inner, out),
        Expr::VarRef(_) | Expr::Literal(_) | Expr::Wildcard => {}
    }
}

/// Non-time field references, left to right
fn collect_refs<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::VarRef(name) if !is_time_ref(name) => out.push(name),
        Expr::Binary { lhs, rhs, .. } => {
            collect_refs(lhs, out);
            collect_refs(rhs, out);
        }
        Expr::Not(inner) | Expr::Paren(inner) => collect_refs(inner, out),
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_refs(a, out)),
        Expr::VarRef(_) | Expr::Literal(_) | Expr::Wildcard => {}
    }
}

/// Allocates unique column names
#[derive(Debug)]
struct ColumnNames {
    used: HashSet<String>,
}

impl ColumnNames {
    /// Every Map row already carries the time column
    fn new() -> Self {
        Self {
            used: HashSet::from([TIME_COLUMN.to_string()]),
        }
    }

    fn assign(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
