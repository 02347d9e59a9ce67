//! Three-address IR consumed by the dataflow engine
//!
//! The IR is a plain data model: statements grouped into basic blocks, and
//! functions that own their blocks together with explicit predecessor and
//! successor maps. Construction goes through [`FunctionBuilder`], which
//! validates the graph once so the analyses can trust it afterwards.

mod function;
mod spec;
mod stmt;

pub use function::{BasicBlock, BlockId, Function, FunctionBuilder};
pub use spec::{BlockSpec, FunctionSpec};
pub use stmt::{BinOp, Operand, RelOp, Stmt, Var};
