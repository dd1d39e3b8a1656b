//! Row filter compilation
//!
//! The statement filter keeps rows of the source measurement whose field is
//! one of the selected fields, further restricted by whatever the WHERE
//! clause leaves once time bounds are removed:
//!
//! ```text
//! (r) => ((r._measurement == "cpu" and r._field == "value") and r.host == "a")
//! ```

use crate::graph::{FilterSpec, FIELD_COLUMN, MEASUREMENT_COLUMN};
use crate::influxql::Expr;
use crate::semantic::{Expression, FunctionExpression};
use crate::transpiler::error::CompileResult;
use crate::transpiler::expr::{lower_expr, ROW_PARAM};

/// Build the statement filter
pub fn compile_filter(
    measurement: &str,
    fields: &[String],
    predicate: Option<&Expr>,
) -> CompileResult<FilterSpec> {
    let mut body = column_equals(MEASUREMENT_COLUMN, measurement);

    if let Some(selected) = field_clause(fields) {
        body = Expression::and(body, selected);
    }
    if let Some(pred) = predicate {
        body = Expression::and(body, lower_expr(pred, ROW_PARAM)?);
    }

    Ok(FilterSpec {
        predicate: FunctionExpression::row(ROW_PARAM, body),
    })
}

/// Filter keeping the rows of one field
pub fn field_filter(field: &str) -> FilterSpec {
    FilterSpec {
        predicate: FunctionExpression::row(ROW_PARAM, column_equals(FIELD_COLUMN, field)),
    }
}

/// `r._field == a or r._field == b ...`, left-associative
fn field_clause(fields: &[String]) -> Option<Expression> {
    fields
        .iter()
        .map(|field| column_equals(FIELD_COLUMN, field))
        .reduce(Expression::or)
}

fn column_equals(column: &str, value: &str) -> Expression {
    Expression::equal(Expression::member(ROW_PARAM, column), Expression::string(value))
}
