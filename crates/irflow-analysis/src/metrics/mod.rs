//! Solver metrics
//!
//! Runs both fixpoint strategies on the same function and records how much
//! work each one did to get there.

use irflow_core::dataflow::{ConstantPropagation, SolveStats, SolverStrategy};
use irflow_core::ir::Function;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRun {
    pub stats: SolveStats,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub function: String,
    pub blocks: usize,
    pub statements: usize,
    pub iterative: StrategyRun,
    pub worklist: StrategyRun,
    /// Whether both strategies produced identical facts
    pub same_fixpoint: bool,
}

impl StrategyComparison {
    /// Worklist transfers per iterative transfer; below 1.0 means the worklist did less work
    pub fn transfer_ratio(&self) -> f64 {
        if self.iterative.stats.transfers == 0 {
            return 1.0;
        }
        self.worklist.stats.transfers as f64 / self.iterative.stats.transfers as f64
    }
}

#[derive(Debug, Default)]
pub struct SolverMetrics;

impl SolverMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(&self, func: &Function) -> StrategyComparison {
        let (iterative_cp, iterative) = run(func, SolverStrategy::Iterative);
        let (worklist_cp, worklist) = run(func, SolverStrategy::Worklist);
        let same_fixpoint = iterative_cp.report(func) == worklist_cp.report(func);

        let comparison = StrategyComparison {
            function: func.name.clone(),
            blocks: func.blocks().len(),
            statements: func.stmt_count(),
            iterative,
            worklist,
            same_fixpoint,
        };
        debug!(
            function = %comparison.function,
            iterative_transfers = comparison.iterative.stats.transfers,
            worklist_transfers = comparison.worklist.stats.transfers,
            transfer_ratio = comparison.transfer_ratio(),
            same_fixpoint,
            "compared solver strategies"
        );
        comparison
    }
}

fn run(func: &Function, strategy: SolverStrategy) -> (ConstantPropagation, StrategyRun) {
    let mut cp = ConstantPropagation::new();
    let start = Instant::now();
    let stats = cp.solve(func, strategy);
    let elapsed = start.elapsed();
    (cp, StrategyRun { stats, elapsed })
}
