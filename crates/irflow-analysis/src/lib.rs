//! # irflow-analysis
//!
//! Verification and metrics for the irflow dataflow engine.
//!
//! ## Modules
//!
//! - **[`metrics`]** - Work done by each fixpoint strategy on a function
//! - **[`verify`]** - Runtime checks of solver, lattice and folding properties
//!
//! ## Quick Start
//!
//! ```rust
//! use irflow_analysis::prelude::*;
//! use irflow_core::ir::FunctionBuilder;
//!
//! let mut b = FunctionBuilder::new("empty");
//! let (entry, exit) = (b.entry(), b.exit());
//! b.add_edge(entry, exit);
//! let func = b.build()?;
//!
//! let result = PropertyVerifier::new().verify_function(&func);
//! assert!(result.all_proven());
//!
//! let comparison = SolverMetrics::new().compare(&func);
//! assert!(comparison.same_fixpoint);
//! # Ok::<(), irflow_core::IrError>(())
//! ```

pub mod metrics;
pub mod verify;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{SolverMetrics, StrategyComparison, StrategyRun};
    pub use crate::verify::{PropertyStatus, PropertyVerifier, VerificationResult};
}

pub use metrics::{SolverMetrics, StrategyComparison};
pub use verify::{PropertyStatus, PropertyVerifier, VerificationResult};
