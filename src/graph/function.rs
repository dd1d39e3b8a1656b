//! Aggregate and selector function table
//!
//! Selectors pick one existing row and keep its timestamp. Aggregates combine
//! rows into a new value anchored to the window start.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Functions producing a new value per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Mean,
    Median,
    Spread,
    Stddev,
}

/// Functions selecting an existing row per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorFunction {
    First,
    Last,
    Min,
    Max,
}

/// Whether a function keeps the selected row's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Aggregate,
    Selector,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate => write!(f, "aggregate"),
            Self::Selector => write!(f, "selector"),
        }
    }
}

/// A supported projection function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Aggregate(AggregateFunction),
    Selector(SelectorFunction),
}

/// Every supported function, in display order
pub const FUNCTIONS: &[Function] = &[
    Function::Aggregate(AggregateFunction::Count),
    Function::Aggregate(AggregateFunction::Sum),
    Function::Aggregate(AggregateFunction::Mean),
    Function::Aggregate(AggregateFunction::Median),
    Function::Aggregate(AggregateFunction::Spread),
    Function::Aggregate(AggregateFunction::Stddev),
    Function::Selector(SelectorFunction::First),
    Function::Selector(SelectorFunction::Last),
    Function::Selector(SelectorFunction::Min),
    Function::Selector(SelectorFunction::Max),
];

impl Function {
    /// Look up a function by name, case-insensitively
    pub fn lookup(name: &str) -> Option<Self> {
        FUNCTIONS
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Canonical lowercase name, also the result column name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aggregate(agg) => agg.name(),
            Self::Selector(sel) => sel.name(),
        }
    }

    pub fn kind(&self) -> FunctionKind {
        match self {
            Self::Aggregate(_) => FunctionKind::Aggregate,
            Self::Selector(_) => FunctionKind::Selector,
        }
    }

    /// Selectors keep the original row timestamp
    pub fn preserves_time(&self) -> bool {
        self.kind() == FunctionKind::Selector
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Spread => "spread",
            Self::Stddev => "stddev",
        }
    }
}

impl SelectorFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(
            Function::lookup("MEAN"),
            Some(Function::Aggregate(AggregateFunction::Mean))
        );
        assert_eq!(
            Function::lookup("Max"),
            Some(Function::Selector(SelectorFunction::Max))
        );
        assert_eq!(Function::lookup("bogus"), None);
        assert_eq!(Function::lookup("time"), None);
    }

    #[test]
    fn test_classification_table() {
        let selectors: Vec<_> = FUNCTIONS
            .iter()
            .filter(|f| f.kind() == FunctionKind::Selector)
            .map(|f| f.name())
            .collect();
        let aggregates: Vec<_> = FUNCTIONS
            .iter()
            .filter(|f| f.kind() == FunctionKind::Aggregate)
            .map(|f| f.name())
            .collect();

        assert_eq!(selectors, vec!["first", "last", "min", "max"]);
        assert_eq!(
            aggregates,
            vec!["count", "sum", "mean", "median", "spread", "stddev"]
        );
    }

    #[test]
    fn test_every_name_round_trips() {
        for f in FUNCTIONS {
            assert_eq!(Function::lookup(f.name()), Some(*f));
            assert_eq!(f.preserves_time(), f.kind() == FunctionKind::Selector);
        }
    }
}
