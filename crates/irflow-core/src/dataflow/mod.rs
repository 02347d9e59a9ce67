//! Monotone dataflow framework
//!
//! This module provides:
//! - A generic [`DataflowAnalysis`] trait, direction-agnostic
//! - Iterative and worklist fixpoint strategies in [`FixpointSolver`]
//! - The constant-propagation lattice and fact store
//! - Forward constant propagation built on top of them

mod constant_propagation;
mod lattice;
mod solver;

pub use constant_propagation::{BlockReport, ConstantPropagation, FunctionReport};
pub use lattice::{calculate_value, CPFact, CPValue};
pub use solver::{
    BlockFacts, DataflowAnalysis, DataflowDirection, FixpointSolver, SolveStats, SolverStrategy,
};
