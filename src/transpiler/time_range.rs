//! Time range resolution
//!
//! Splits a WHERE clause into the absolute `[start, stop)` range scanned by
//! the Range node and the remaining row predicate. Relative expressions are
//! resolved against the compilation's reference instant only.
//!
//! # Accepted forms
//!
//! ```text
//! time > now() - 1h
//! time >= '2024-01-01T00:00:00Z' AND time < '2024-01-02'
//! 1704067200000000000 <= time
//! ```

use crate::influxql::{is_time_ref, BinaryOp, Expr, Literal};
use crate::transpiler::error::{CompileError, CompileResult};
use crate::transpiler::expr::strip_parens;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Earliest representable instant, in nanoseconds since the epoch
pub const MIN_TIME: i64 = i64::MIN + 2;
/// Latest representable instant, in nanoseconds since the epoch
pub const MAX_TIME: i64 = i64::MAX - 1;

/// Half-open `[start, stop)` range in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub stop: i64,
}

impl TimeRange {
    /// The range scanned when no time predicate is given
    pub fn unbounded() -> Self {
        Self {
            start: MIN_TIME,
            stop: MAX_TIME,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::unbounded()
    }

    fn lower_to(&mut self, start: i64) {
        self.start = self.start.max(start.clamp(MIN_TIME, MAX_TIME));
    }

    fn upper_to(&mut self, stop: i64) {
        self.stop = self.stop.min(stop.clamp(MIN_TIME, MAX_TIME));
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A WHERE clause with its time predicates resolved
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCondition {
    pub range: TimeRange,
    /// What is left of the clause once time predicates are removed
    pub predicate: Option<Expr>,
}

/// Resolve the time bounds of a WHERE clause
pub fn split_condition(
    condition: Option<&Expr>,
    now: DateTime<Utc>,
) -> CompileResult<TimeCondition> {
    let mut range = TimeRange::unbounded();
    let predicate = match condition {
        Some(expr) => split(expr, &mut range, now)?,
        None => None,
    };

    if range.start > range.stop {
        return Err(CompileError::time_range(format!(
            "start {} is after stop {}",
            range.start, range.stop
        )));
    }

    Ok(TimeCondition { range, predicate })
}

/// Remove time comparisons from an AND tree, narrowing `range` with each
fn split(expr: &Expr, range: &mut TimeRange, now: DateTime<Utc>) -> CompileResult<Option<Expr>> {
    match expr {
        Expr::Paren(inner) if inner.references_time() => split(inner, range, now),
        Expr::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
        } => {
            let left = split(lhs, range, now)?;
            let right = split(rhs, range, now)?;
            Ok(match (left, right) {
                (Some(l), Some(r)) => Some(Expr::binary(l, BinaryOp::And, r)),
                (Some(e), None) | (None, Some(e)) => Some(e),
                (None, None) => None,
            })
        }
        Expr::Binary { op, lhs, rhs } if op.is_comparison() && is_time_var(lhs) => {
            apply_bound(*op, rhs, range, now, expr)?;
            Ok(None)
        }
        Expr::Binary { op, lhs, rhs } if op.is_comparison() && is_time_var(rhs) => {
            apply_bound(op.flip(), lhs, range, now, expr)?;
            Ok(None)
        }
        _ if expr.references_time() => Err(CompileError::time_range(format!(
            "unsupported time condition: {}",
            expr
        ))),
        _ => Ok(Some(expr.clone())),
    }
}

fn apply_bound(
    op: BinaryOp,
    value: &Expr,
    range: &mut TimeRange,
    now: DateTime<Utc>,
    original: &Expr,
) -> CompileResult<()> {
    let t = time_value(value, now)?;
    match op {
        BinaryOp::Gt => range.lower_to(t.saturating_add(1)),
        BinaryOp::Gte => range.lower_to(t),
        BinaryOp::Lt => range.upper_to(t),
        BinaryOp::Lte => range.upper_to(t.saturating_add(1)),
        BinaryOp::Eq => {
            range.lower_to(t);
            range.upper_to(t.saturating_add(1));
        }
        _ => {
            return Err(CompileError::time_range(format!(
                "unsupported operator on time: {}",
                original
            )))
        }
    }
    Ok(())
}

fn is_time_var(expr: &Expr) -> bool {
    matches!(strip_parens(expr), Expr::VarRef(name) if is_time_ref(name))
}

/// Evaluate a time expression to nanoseconds since the epoch. The reference
/// instant is only converted when `now()` appears.
fn time_value(expr: &Expr, now: DateTime<Utc>) -> CompileResult<i64> {
    match expr {
        Expr::Paren(inner) => time_value(inner, now),
        Expr::Call { name, args } if name.eq_ignore_ascii_case("now") && args.is_empty() => {
            instant_nanos(now)
        }
        Expr::Literal(Literal::Integer(n)) => Ok(*n),
        Expr::Literal(Literal::Duration(d)) => Ok(*d),
        Expr::Literal(Literal::String(s)) => parse_time_string(s),
        Expr::Binary {
            op: op @ (BinaryOp::Add | BinaryOp::Sub),
            lhs,
            rhs,
        } => {
            let l = time_value(lhs, now)?;
            let r = time_value(rhs, now)?;
            let result = match op {
                BinaryOp::Add => l.checked_add(r),
                _ => l.checked_sub(r),
            };
            result.ok_or_else(|| CompileError::time_range(format!("time overflow in {}", expr)))
        }
        _ => Err(CompileError::time_range(format!("invalid time value: {}", expr))),
    }
}

/// Parse an absolute time string: RFC3339, `YYYY-MM-DD HH:MM:SS[.f]` or a
/// bare date, all in UTC
pub(crate) fn parse_time_string(s: &str) -> CompileResult<i64> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })
        .map_err(|_| CompileError::time_range(format!("invalid time string: '{}'", s)))?;

    instant_nanos(parsed)
}

pub(crate) fn instant_nanos(instant: DateTime<Utc>) -> CompileResult<i64> {
    instant
        .timestamp_nanos_opt()
        .ok_or_else(|| CompileError::time_range(format!("{} is out of range", instant)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influxql::parse_statement;
    use chrono::TimeZone;

    const HOUR: i64 = 3_600_000_000_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn now_ns() -> i64 {
        now().timestamp_nanos_opt().unwrap()
    }

    fn resolve(cond: &str) -> CompileResult<TimeCondition> {
        let stmt = parse_statement(&format!("SELECT v FROM m WHERE {}", cond)).unwrap();
        split_condition(stmt.condition.as_ref(), now())
    }

    #[test]
    fn test_no_condition_is_unbounded() {
        let resolved = split_condition(None, now()).unwrap();
        assert!(resolved.range.is_unbounded());
        assert_eq!(resolved.range.start, MIN_TIME);
        assert_eq!(resolved.range.stop, MAX_TIME);
        assert!(resolved.predicate.is_none());
    }

    #[test]
    fn test_no_time_bound_ignores_reference_instant() {
        // Past the last instant representable in i64 nanoseconds
        let far = Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap();

        let resolved = split_condition(None, far).unwrap();
        assert!(resolved.range.is_unbounded());

        let stmt = parse_statement("SELECT v FROM m WHERE host = 'a' AND time > 10").unwrap();
        let resolved = split_condition(stmt.condition.as_ref(), far).unwrap();
        assert_eq!(resolved.range, TimeRange { start: 11, stop: MAX_TIME });

        let stmt = parse_statement("SELECT v FROM m WHERE time > now() - 1h").unwrap();
        let err = split_condition(stmt.condition.as_ref(), far).unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimeRange(_)));
    }

    #[test]
    fn test_condition_without_time_is_unbounded() {
        let resolved = resolve("host = 'a'").unwrap();
        assert!(resolved.range.is_unbounded());
        assert_eq!(resolved.predicate.map(|p| p.to_string()).as_deref(), Some("host = 'a'"));
    }

    #[test]
    fn test_relative_bound_uses_reference_instant() {
        let resolved = resolve("time >= now() - 1h").unwrap();
        assert_eq!(resolved.range.start, now_ns() - HOUR);
        assert_eq!(resolved.range.stop, MAX_TIME);
    }

    #[test]
    fn test_exclusive_and_inclusive_bounds() {
        let resolved = resolve("time > 100 AND time <= 200").unwrap();
        assert_eq!(resolved.range, TimeRange { start: 101, stop: 201 });

        let resolved = resolve("time >= 100 AND time < 200").unwrap();
        assert_eq!(resolved.range, TimeRange { start: 100, stop: 200 });

        let resolved = resolve("time = 100").unwrap();
        assert_eq!(resolved.range, TimeRange { start: 100, stop: 101 });
    }

    #[test]
    fn test_time_on_right_is_flipped() {
        let resolved = resolve("100 < time").unwrap();
        assert_eq!(resolved.range.start, 101);
    }

    #[test]
    fn test_time_removed_from_predicate() {
        let resolved = resolve("host = 'a' AND time > now() - 1h AND region = 'eu'").unwrap();
        assert_eq!(
            resolved.predicate.map(|p| p.to_string()).as_deref(),
            Some("host = 'a' AND region = 'eu'")
        );
        assert_eq!(resolved.range.start, now_ns() - HOUR + 1);
    }

    #[test]
    fn test_parenthesized_time_group() {
        let resolved = resolve("(time >= 10 AND time < 20) AND host = 'a'").unwrap();
        assert_eq!(resolved.range, TimeRange { start: 10, stop: 20 });
        assert!(resolved.predicate.is_some());
    }

    #[test]
    fn test_time_strings() {
        let resolved = resolve("time >= '2024-01-01T00:00:00Z' AND time < '2024-01-02'").unwrap();
        let day = 24 * HOUR;
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
            .timestamp_nanos_opt()
            .unwrap();
        assert_eq!(resolved.range, TimeRange { start, stop: start + day });

        let resolved = resolve("time >= '2024-01-01 06:00:00'").unwrap();
        assert_eq!(resolved.range.start, start + 6 * HOUR);
    }

    #[test]
    fn test_unsatisfiable_range() {
        let err = resolve("time > now() AND time < now() - 1h").unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimeRange(_)));
    }

    #[test]
    fn test_empty_range_is_allowed() {
        let resolved = resolve("time >= 10 AND time < 10").unwrap();
        assert_eq!(resolved.range, TimeRange { start: 10, stop: 10 });
    }

    #[test]
    fn test_rejected_time_forms() {
        for cond in [
            "time > 10 OR host = 'a'",
            "NOT time > 10",
            "time != 10",
            "time =~ /x/",
            "time > 'yesterday'",
            "time > 1.5",
        ] {
            let err = resolve(cond).unwrap_err();
            assert!(
                matches!(err, CompileError::InvalidTimeRange(_)),
                "{} gave {:?}",
                cond,
                err
            );
        }
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let a = resolve("time > now() - 30m").unwrap();
        let b = resolve("time > now() - 30m").unwrap();
        assert_eq!(a, b);
    }
}
