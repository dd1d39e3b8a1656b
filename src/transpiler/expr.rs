//! Expression lowering
//!
//! Converts statement expressions into function-expression bodies that read
//! columns off the row parameter. Field and tag references become member
//! accesses, literals keep their type, and AND/OR keep the tree shape the
//! parser produced.

use crate::influxql::{BinaryOp, Expr, Literal};
use crate::semantic::{BinaryOperator, Expression, FunctionExpression};
use crate::transpiler::error::{CompileError, CompileResult};

/// Name of the implicit row parameter
pub const ROW_PARAM: &str = "r";

/// Lower a boolean condition into a row predicate
pub fn lower_predicate(expr: &Expr) -> CompileResult<FunctionExpression> {
    Ok(FunctionExpression::row(ROW_PARAM, lower_expr(expr, ROW_PARAM)?))
}

/// Lower an expression over the named row parameter
pub fn lower_expr(expr: &Expr, row: &str) -> CompileResult<Expression> {
    lower_expr_with(expr, row, &|_| None)
}

/// Lower an expression, letting `substitute` replace whole subtrees first.
/// Used by projections where the function call or raw field has already been
/// evaluated into the value column.
pub fn lower_expr_with<F>(expr: &Expr, row: &str, substitute: &F) -> CompileResult<Expression>
where
    F: Fn(&Expr) -> Option<Expression>,
{
    if let Some(replacement) = substitute(expr) {
        return Ok(replacement);
    }

    match expr {
        Expr::VarRef(name) => Ok(Expression::member(row, name.as_str())),
        Expr::Literal(lit) => lower_literal(lit),
        Expr::Paren(inner) => lower_expr_with(inner, row, substitute),
        Expr::Not(inner) => Ok(Expression::not(lower_expr_with(inner, row, substitute)?)),
        Expr::Binary { op, lhs, rhs } => {
            if matches!(op, BinaryOp::RegexMatch | BinaryOp::RegexNotMatch)
                && !matches!(strip_parens(rhs), Expr::Literal(Literal::Regex(_)))
            {
                return Err(CompileError::UnsupportedExpression(expr.to_string()));
            }

            let left = lower_expr_with(lhs, row, substitute)?;
            let right = lower_expr_with(rhs, row, substitute)?;
            match op {
                BinaryOp::And => Ok(Expression::and(left, right)),
                BinaryOp::Or => Ok(Expression::or(left, right)),
                op => scalar_operator(*op)
                    .map(|operator| Expression::binary(operator, left, right))
                    .ok_or_else(|| CompileError::UnsupportedExpression(expr.to_string())),
            }
        }
        Expr::Call { .. } | Expr::Wildcard => {
            Err(CompileError::UnsupportedExpression(expr.to_string()))
        }
    }
}

fn lower_literal(lit: &Literal) -> CompileResult<Expression> {
    Ok(match lit {
        Literal::String(value) => Expression::string(value.as_str()),
        Literal::Integer(value) => Expression::IntegerLiteral { value: *value },
        Literal::Float(value) => Expression::FloatLiteral { value: *value },
        Literal::Boolean(value) => Expression::BooleanLiteral { value: *value },
        Literal::Duration(value) => Expression::DurationLiteral { value: *value },
        Literal::Regex(pattern) => {
            regex::Regex::new(pattern).map_err(|e| {
                let message = e.to_string();
                let reason = last_line(&message);
                CompileError::UnsupportedExpression(format!("{} ({})", lit, reason))
            })?;
            Expression::RegexpLiteral {
                value: pattern.clone(),
            }
        }
    })
}

fn scalar_operator(op: BinaryOp) -> Option<BinaryOperator> {
    Some(match op {
        BinaryOp::Add => BinaryOperator::Add,
        BinaryOp::Sub => BinaryOperator::Subtract,
        BinaryOp::Mul => BinaryOperator::Multiply,
        BinaryOp::Div => BinaryOperator::Divide,
        BinaryOp::Eq => BinaryOperator::Equal,
        BinaryOp::Ne => BinaryOperator::NotEqual,
        BinaryOp::Lt => BinaryOperator::LessThan,
        BinaryOp::Lte => BinaryOperator::LessThanEqual,
        BinaryOp::Gt => BinaryOperator::GreaterThan,
        BinaryOp::Gte => BinaryOperator::GreaterThanEqual,
        BinaryOp::RegexMatch => BinaryOperator::RegexpMatch,
        BinaryOp::RegexNotMatch => BinaryOperator::NotRegexpMatch,
        BinaryOp::And | BinaryOp::Or => return None,
    })
}

pub(crate) fn strip_parens(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(inner) => strip_parens(inner),
        other => other,
    }
}

/// Regex errors end with the one-line reason
fn last_line(message: &str) -> &str {
    message.lines().last().unwrap_or(message).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::parse_statement;

    fn condition(query: &str) -> Expr {
        parse_statement(query).unwrap().condition.unwrap()
    }

    #[test]
    fn test_lower_tag_comparison() {
        let func = lower_predicate(&condition("SELECT v FROM m WHERE host = 'a'")).unwrap();

        assert_eq!(func.params, vec!["r".to_string()]);
        assert_eq!(
            func.body,
            Expression::equal(Expression::member("r", "host"), Expression::string("a"))
        );
    }

    #[test]
    fn test_literal_types_preserved() {
        let cases = [
            ("x = 1", Expression::IntegerLiteral { value: 1 }),
            ("x = 1.5", Expression::FloatLiteral { value: 1.5 }),
            ("x = true", Expression::BooleanLiteral { value: true }),
            ("x = '1'", Expression::string("1")),
        ];
        for (cond, expected) in cases {
            let func =
                lower_predicate(&condition(&format!("SELECT v FROM m WHERE {}", cond))).unwrap();
            match func.body {
                Expression::Binary { right, .. } => assert_eq!(*right, expected, "{}", cond),
                other => panic!("unexpected body {:?}", other),
            }
        }
    }

    #[test]
    fn test_logical_left_associative() {
        let func = lower_predicate(&condition(
            "SELECT v FROM m WHERE a = 1 AND b = 2 OR c = 3",
        ))
        .unwrap();

        assert_eq!(
            func.to_string(),
            "(r) => ((r.a == 1 and r.b == 2) or r.c == 3)"
        );
    }

    #[test]
    fn test_lower_not_and_regex() {
        let cond = condition("SELECT v FROM m WHERE NOT host =~ /^web-[0-9]+$/");
        let func = lower_predicate(&cond).unwrap();
        assert_eq!(func.to_string(), "(r) => not r.host =~ /^web-[0-9]+$/");
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = lower_predicate(&condition("SELECT v FROM m WHERE host =~ /(unclosed/"))
            .unwrap_err();
        assert!(
            matches!(err, CompileError::UnsupportedExpression(ref s) if s.contains("(unclosed"))
        );
    }

    #[test]
    fn test_call_rejected_with_fragment() {
        let err = lower_predicate(&condition("SELECT v FROM m WHERE abs(v) > 1")).unwrap_err();
        assert_eq!(err, CompileError::UnsupportedExpression("abs(v)".into()));
    }

    #[test]
    fn test_regex_operator_needs_regex_operand() {
        let err = lower_predicate(&condition("SELECT v FROM m WHERE host =~ 'web'")).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_substitution() {
        let expr = Expr::binary(
            Expr::call("mean", vec![Expr::var("v")]),
            BinaryOp::Mul,
            Expr::Literal(Literal::Integer(2)),
        );
        let lowered = lower_expr_with(&expr, "r", &|e| match e {
            Expr::Call { .. } => Some(Expression::member("r", "_value")),
            _ => None,
        })
        .unwrap();

        assert_eq!(lowered.to_string(), "r._value * 2");
    }
}
