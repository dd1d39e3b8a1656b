//! Grouping and windowing
//!
//! GROUP BY tags become the key set of the Group node, after the canonical
//! measurement and window-start labels. A `time(interval[, offset])`
//! dimension becomes a Window node placed between the filter and the group.

use crate::graph::{WindowSpec, MEASUREMENT_COLUMN, START_COLUMN};
use crate::influxql::{is_time_ref, Dimension, Expr, Literal};
use crate::transpiler::error::{CompileError, CompileResult};
use crate::transpiler::expr::strip_parens;
use crate::transpiler::time_range::{instant_nanos, parse_time_string};
use chrono::{DateTime, Utc};

/// Grouping derived from the GROUP BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    /// Key columns, canonical labels first, each once
    pub keys: Vec<String>,
    pub window: Option<WindowSpec>,
}

impl Grouping {
    /// User dimensions only
    pub fn tags(&self) -> &[String] {
        self.keys.get(2..).unwrap_or(&[])
    }
}

/// Translate GROUP BY dimensions
pub fn compile_grouping(dimensions: &[Dimension], now: DateTime<Utc>) -> CompileResult<Grouping> {
    let mut keys = vec![MEASUREMENT_COLUMN.to_string(), START_COLUMN.to_string()];
    let mut window = None;

    for dimension in dimensions {
        match strip_parens(&dimension.expr) {
            Expr::VarRef(name) if is_time_ref(name) => {
                return Err(CompileError::shape(
                    "time() is a function and expects at least one argument",
                ))
            }
            Expr::VarRef(name) => {
                if !keys.contains(name) {
                    keys.push(name.clone());
                }
            }
            Expr::Call { name, args } if is_time_ref(name) => {
                if window.is_some() {
                    return Err(CompileError::shape("multiple time dimensions"));
                }
                window = Some(compile_window(args, now)?);
            }
            Expr::Call { name, .. } => {
                return Err(CompileError::shape(format!(
                    "only time() calls allowed in dimensions, got {}()",
                    name
                )))
            }
            Expr::Wildcard => return Err(CompileError::shape("GROUP BY * is not supported")),
            Expr::Literal(Literal::Regex(_)) => {
                return Err(CompileError::shape("regex dimensions are not supported"))
            }
            other => {
                return Err(CompileError::shape(format!("invalid dimension: {}", other)))
            }
        }
    }

    Ok(Grouping { keys, window })
}

fn compile_window(args: &[Expr], now: DateTime<Utc>) -> CompileResult<WindowSpec> {
    let (interval, offset) = match args {
        [interval] => (interval, None),
        [interval, offset] => (interval, Some(offset)),
        _ => {
            return Err(CompileError::shape(format!(
                "time dimension expects 1 or 2 arguments, got {}",
                args.len()
            )))
        }
    };

    let every = match strip_parens(interval) {
        Expr::Literal(Literal::Duration(d)) if *d > 0 => *d,
        other => {
            return Err(CompileError::shape(format!(
                "time dimension interval must be a positive duration, got {}",
                other
            )))
        }
    };

    let offset = match offset.map(strip_parens) {
        None => 0,
        Some(Expr::Literal(Literal::Duration(d))) => *d,
        Some(Expr::Literal(Literal::String(s))) => parse_time_string(s)?,
        Some(Expr::Call { name, args }) if name.eq_ignore_ascii_case("now") && args.is_empty() => {
            instant_nanos(now)?
        }
        Some(other) => {
            return Err(CompileError::shape(format!(
                "time dimension offset must be a duration, now() or a time string, got {}",
                other
            )))
        }
    };

    Ok(WindowSpec::tumbling(every, offset.rem_euclid(every)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::parse_statement;
    use chrono::TimeZone;

    const MINUTE: i64 = 60_000_000_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 7, 30).unwrap()
    }

    fn grouping(query: &str) -> CompileResult<Grouping> {
        compile_grouping(&parse_statement(query).unwrap().dimensions, now())
    }

    #[test]
    fn test_canonical_keys_first() {
        let g = grouping("SELECT mean(v) FROM cpu GROUP BY host, region").unwrap();
        assert_eq!(g.keys, vec!["_measurement", "_start", "host", "region"]);
        assert_eq!(g.tags(), ["host".to_string(), "region".to_string()]);
        assert!(g.window.is_none());
    }

    #[test]
    fn test_duplicate_dimensions_collapse() {
        let g = grouping("SELECT mean(v) FROM cpu GROUP BY host, host, _measurement").unwrap();
        assert_eq!(g.keys, vec!["_measurement", "_start", "host"]);
    }

    #[test]
    fn test_no_group_by() {
        let g = grouping("SELECT mean(v) FROM cpu").unwrap();
        assert_eq!(g.keys, vec!["_measurement", "_start"]);
    }

    #[test]
    fn test_time_window() {
        let g = grouping("SELECT mean(v) FROM cpu GROUP BY time(5m), host").unwrap();
        let window = g.window.unwrap();
        assert_eq!(window.every, 5 * MINUTE);
        assert_eq!(window.period, 5 * MINUTE);
        assert_eq!(window.offset, 0);
        assert_eq!(g.keys, vec!["_measurement", "_start", "host"]);
    }

    #[test]
    fn test_window_offsets_normalised() {
        let g = grouping("SELECT mean(v) FROM cpu GROUP BY time(5m, 7m)").unwrap();
        assert_eq!(g.window.unwrap().offset, 2 * MINUTE);

        let g = grouping("SELECT mean(v) FROM cpu GROUP BY time(5m, -1m)").unwrap();
        assert_eq!(g.window.unwrap().offset, 4 * MINUTE);

        // 00:07:30 modulo 5m
        let g = grouping("SELECT mean(v) FROM cpu GROUP BY time(5m, now())").unwrap();
        assert_eq!(g.window.unwrap().offset, 2 * MINUTE + 30_000_000_000);

        let g =
            grouping("SELECT mean(v) FROM cpu GROUP BY time(1h, '2024-01-01T00:20:00Z')").unwrap();
        assert_eq!(g.window.unwrap().offset, 20 * MINUTE);
    }

    #[test]
    fn test_invalid_dimensions() {
        for query in [
            "SELECT mean(v) FROM cpu GROUP BY *",
            "SELECT mean(v) FROM cpu GROUP BY /host/",
            "SELECT mean(v) FROM cpu GROUP BY time",
            "SELECT mean(v) FROM cpu GROUP BY time()",
            "SELECT mean(v) FROM cpu GROUP BY time(0s)",
            "SELECT mean(v) FROM cpu GROUP BY time(host)",
            "SELECT mean(v) FROM cpu GROUP BY time(1m), time(5m)",
            "SELECT mean(v) FROM cpu GROUP BY floor(host)",
            "SELECT mean(v) FROM cpu GROUP BY time(1m, host)",
        ] {
            let err = grouping(query).unwrap_err();
            assert!(
                matches!(err, CompileError::UnsupportedStatementShape(_)),
                "{} gave {:?}",
                query,
                err
            );
        }
    }
}
