//! Constant folding driven by converged constant-propagation facts

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dataflow::{CPFact, ConstantPropagation, DataflowAnalysis};
use crate::ir::{BasicBlock, Function, Operand, Var};

/// One variable use replaced by a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    /// Index of the statement within its block
    pub stmt_index: usize,
    pub var: Var,
    pub value: i32,
}

/// Rewrite every variable use in `func` that the analysis proved constant.
///
/// `analysis` must already be solved for `func`; its stored facts are only read.
pub fn constant_folding(analysis: &ConstantPropagation, func: &mut Function) {
    let mut total = 0;
    for block in func.blocks_mut() {
        let rewrites = fold_block(analysis, block);
        if !rewrites.is_empty() {
            trace!(block = %block.id, rewrites = rewrites.len(), "folded block");
        }
        total += rewrites.len();
    }
    debug!(function = %func.name, rewrites = total, "constant folding finished");
}

/// Fold a single block, returning the rewrites in program order
pub fn fold_block(analysis: &ConstantPropagation, block: &mut BasicBlock) -> Vec<Rewrite> {
    let mut running = CPFact::new();
    if let Some(in_fact) = analysis.in_fact(block.id) {
        in_fact.meet_into(&mut running);
    }

    let mut rewrites = Vec::new();
    for (stmt_index, stmt) in block.stmts.iter_mut().enumerate() {
        for operand in stmt.uses_mut() {
            let Operand::Var(var) = *operand else {
                continue;
            };
            if let Some(value) = running.get(var).as_const() {
                *operand = Operand::Const(value);
                rewrites.push(Rewrite { stmt_index, var, value });
            }
        }
        analysis.transfer_stmt(stmt, &mut running);
    }
    rewrites
}
