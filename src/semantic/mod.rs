//! Function expressions
//!
//! The expression form understood by the dataflow engine. Filter predicates
//! and Map bodies are [`FunctionExpression`]s whose body reads columns off an
//! implicit row parameter (conventionally `r`).
//!
//! ```text
//! (r) => r._measurement == "cpu" and r._field == "value"
//! ```

mod expr;

pub use expr::{
    BinaryOperator, Expression, FunctionExpression, LogicalOperator, Property, UnaryOperator,
};
