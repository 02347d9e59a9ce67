//! # irflow-core
//!
//! Dataflow engine for a small three-address IR: a generic monotone
//! framework with iterative and worklist fixpoint solvers, forward constant
//! propagation, and constant folding driven by its results.
//!
//! ```rust
//! use irflow_core::dataflow::{CPValue, ConstantPropagation, DataflowAnalysis, SolverStrategy};
//! use irflow_core::ir::{BinOp, FunctionBuilder, Operand, Stmt};
//!
//! let mut b = FunctionBuilder::new("main");
//! let x = b.new_var();
//! let y = b.new_var();
//! let body = b.new_block();
//! b.push(body, Stmt::Assign { def: x, src: Operand::Const(6) })?;
//! b.push(body, Stmt::BinaryOp { def: y, op: BinOp::Mul, lhs: Operand::Var(x), rhs: Operand::Const(7) })?;
//! b.add_edge(b.entry(), body);
//! b.add_edge(body, b.exit());
//! let func = b.build()?;
//!
//! let mut cp = ConstantPropagation::new();
//! cp.solve(&func, SolverStrategy::Worklist);
//! assert_eq!(cp.out_fact(body).map(|fact| fact.get(y)), Some(CPValue::Const(42)));
//! # Ok::<(), irflow_core::IrError>(())
//! ```

pub mod config;
pub mod dataflow;
pub mod error;
pub mod ir;
pub mod transform;

pub use config::{AnalysisConfig, OutputFormat};
pub use error::{ConfigError, IrError};
