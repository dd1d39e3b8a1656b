//! Dataflow operation graph
//!
//! The compiler's output model:
//!
//! - **Operations**: id plus kind-specific parameters ([`OperationSpec`])
//! - **Functions**: the aggregate/selector lookup table ([`Function`])
//! - **Subgraph**: one statement's append-only node arena
//! - **Assembler**: id allocation, edge wiring and integrity checks
//!
//! # Shape
//!
//! ```text
//! from0 -> range0 -> filter0 -> [window0] -> group0 -+-> mean0 -> map0 -+-> join0 -> yield0
//!                                                    +-> max0  -> map1 -+
//! ```

mod assembler;
mod error;
mod function;
mod operation;
mod subgraph;

pub use assembler::{CompiledGraph, Edge, GraphAssembler};
pub use error::{GraphError, GraphResult};
pub use function::{AggregateFunction, Function, FunctionKind, SelectorFunction, FUNCTIONS};
pub use operation::{
    AggregateSpec, BucketId, FilterSpec, FromSpec, GroupSpec, JoinSpec, LimitSpec, MapSpec,
    Operation, OperationId, OperationKind, OperationSpec, RangeSpec, SelectorSpec, WindowSpec,
    YieldSpec, FIELD_COLUMN, MEASUREMENT_COLUMN, START_COLUMN, STOP_COLUMN, TIME_COLUMN,
    VALUE_COLUMN,
};
pub use subgraph::{NodeIndex, Subgraph};
