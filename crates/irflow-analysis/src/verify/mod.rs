//! Runtime verification of solver and folding properties
//!
//! [`PropertyVerifier`] runs constant propagation on a concrete function with
//! both fixpoint strategies and checks that the results behave the way the
//! framework promises. A failed property is reported, never panicked on.

use anyhow::{Context, Result};
use irflow_core::dataflow::{
    CPFact, CPValue, ConstantPropagation, DataflowAnalysis, FixpointSolver, SolverStrategy,
};
use irflow_core::ir::{Function, FunctionSpec};
use irflow_core::transform::fold_block;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const CONVERGENCE_EQUIVALENCE: &str = "convergence_equivalence";
pub const IDEMPOTENCE: &str = "idempotence";
pub const BOUNDARY_CONTRACT: &str = "boundary_contract";
pub const NO_STORED_UNDEF: &str = "no_stored_undef";
pub const FOLDING_SOUNDNESS: &str = "folding_soundness";
pub const MEET_COMMUTATIVE: &str = "meet_commutative";
pub const MEET_ASSOCIATIVE: &str = "meet_associative";
pub const MEET_IDEMPOTENT: &str = "meet_idempotent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    Proven,
    Failed(String),
}

impl PropertyStatus {
    pub fn is_proven(&self) -> bool {
        matches!(self, PropertyStatus::Proven)
    }

    fn check(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok {
            PropertyStatus::Proven
        } else {
            PropertyStatus::Failed(reason())
        }
    }
}

/// Outcome of every property checked for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Function name, or `<lattice>` for lattice law checks
    pub function: String,
    pub properties: Vec<(String, PropertyStatus)>,
}

impl VerificationResult {
    fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            properties: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, status: PropertyStatus) {
        if let PropertyStatus::Failed(reason) = &status {
            warn!(function = %self.function, property = name, %reason, "property failed");
        }
        self.properties.push((name.to_string(), status));
    }

    pub fn all_proven(&self) -> bool {
        self.properties.iter().all(|(_, status)| status.is_proven())
    }

    pub fn status(&self, name: &str) -> Option<&PropertyStatus> {
        self.properties
            .iter()
            .find(|(property, _)| property == name)
            .map(|(_, status)| status)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().filter_map(|(name, status)| match status {
            PropertyStatus::Failed(reason) => Some((name.as_str(), reason.as_str())),
            PropertyStatus::Proven => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PropertyVerifier {
    check_folding: bool,
}

impl Default for PropertyVerifier {
    fn default() -> Self {
        Self { check_folding: true }
    }
}

impl PropertyVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the folding checks, which re-run the analysis on a folded copy
    pub fn without_folding(mut self) -> Self {
        self.check_folding = false;
        self
    }

    pub fn verify_function(&self, func: &Function) -> VerificationResult {
        debug!(function = %func.name, "verifying solver properties");
        let mut result = VerificationResult::new(func.name.clone());

        let mut iterative = ConstantPropagation::new();
        iterative.solve(func, SolverStrategy::Iterative);
        let mut worklist = ConstantPropagation::new();
        worklist.solve(func, SolverStrategy::Worklist);

        result.record(CONVERGENCE_EQUIVALENCE, convergence_equivalence(func, &iterative, &worklist));
        let idempotent = match idempotence(func, &mut iterative, SolverStrategy::Iterative) {
            PropertyStatus::Proven => idempotence(func, &mut worklist, SolverStrategy::Worklist),
            failed => failed,
        };
        result.record(IDEMPOTENCE, idempotent);
        result.record(BOUNDARY_CONTRACT, boundary_contract(func, &worklist));
        result.record(NO_STORED_UNDEF, no_stored_undef(func, &worklist));
        if self.check_folding {
            result.record(FOLDING_SOUNDNESS, folding_soundness(func, &worklist));
        }
        result
    }

    /// Load a JSON function description and verify it
    pub fn verify_spec_file(&self, path: &Path) -> Result<VerificationResult> {
        let spec = FunctionSpec::from_file(path)?;
        let func = spec
            .build()
            .with_context(|| format!("invalid function in {}", path.display()))?;
        Ok(self.verify_function(&func))
    }

    /// Check the algebraic laws of `meet` over every combination of `values`
    pub fn verify_lattice_laws(&self, values: &[CPValue]) -> VerificationResult {
        let mut result = VerificationResult::new("<lattice>");

        let commutative = match pairs(values).find(|(a, b)| a.meet(*b) != b.meet(*a)) {
            Some((a, b)) => PropertyStatus::Failed(format!("{a} meet {b} differs from {b} meet {a}")),
            None => PropertyStatus::Proven,
        };
        result.record(MEET_COMMUTATIVE, commutative);

        let associative = match pairs(values)
            .flat_map(move |(a, b)| values.iter().map(move |&c| (a, b, c)))
            .find(|&(a, b, c)| a.meet(b).meet(c) != a.meet(b.meet(c)))
        {
            Some((a, b, c)) => PropertyStatus::Failed(format!(
                "({a} meet {b}) meet {c} differs from {a} meet ({b} meet {c})"
            )),
            None => PropertyStatus::Proven,
        };
        result.record(MEET_ASSOCIATIVE, associative);

        let idempotent = match values.iter().find(|a| a.meet(**a) != **a) {
            Some(a) => PropertyStatus::Failed(format!("{a} meet itself is not itself")),
            None => PropertyStatus::Proven,
        };
        result.record(MEET_IDEMPOTENT, idempotent);

        result
    }
}

fn pairs(values: &[CPValue]) -> impl Iterator<Item = (CPValue, CPValue)> + '_ {
    values
        .iter()
        .flat_map(move |&a| values.iter().map(move |&b| (a, b)))
}

fn convergence_equivalence(
    func: &Function,
    iterative: &ConstantPropagation,
    worklist: &ConstantPropagation,
) -> PropertyStatus {
    for block in func.blocks() {
        let id = block.id;
        if iterative.in_fact(id) != worklist.in_fact(id) {
            return PropertyStatus::Failed(format!("In-facts of {id} differ between strategies"));
        }
        if iterative.out_fact(id) != worklist.out_fact(id) {
            return PropertyStatus::Failed(format!("Out-facts of {id} differ between strategies"));
        }
    }
    PropertyStatus::Proven
}

fn idempotence(func: &Function, analysis: &mut ConstantPropagation, strategy: SolverStrategy) -> PropertyStatus {
    let before = analysis.block_facts().clone();
    let stats = FixpointSolver::iterate(analysis, func, strategy);
    PropertyStatus::check(stats.updates == 0 && analysis.block_facts() == &before, || {
        format!("{strategy} solver changed {} block(s) after convergence", stats.updates)
    })
}

fn boundary_contract(func: &Function, analysis: &ConstantPropagation) -> PropertyStatus {
    let empty = CPFact::new();
    for &succ in func.successors(func.entry()) {
        let fact = analysis.in_fact(succ).unwrap_or(&empty);
        if let Some(&param) = func.params.iter().find(|&&param| fact.get(param) != CPValue::Nac) {
            return PropertyStatus::Failed(format!(
                "parameter {param} is {} on entry to {succ}",
                fact.get(param)
            ));
        }
    }
    PropertyStatus::Proven
}

fn no_stored_undef(func: &Function, analysis: &ConstantPropagation) -> PropertyStatus {
    for block in func.blocks() {
        for fact in [analysis.in_fact(block.id), analysis.out_fact(block.id)]
            .into_iter()
            .flatten()
        {
            if let Some((var, _)) = fact.iter().find(|(_, value)| *value == CPValue::Undef) {
                return PropertyStatus::Failed(format!("{var} stored as UNDEF in {}", block.id));
            }
        }
    }
    PropertyStatus::Proven
}

/// Every rewrite must insert the constant the running fact held for that use,
/// and the folded function must analyse to the same facts.
fn folding_soundness(func: &Function, analysis: &ConstantPropagation) -> PropertyStatus {
    let mut folded = func.clone();
    for block in folded.blocks_mut() {
        let original = block.clone();
        let rewrites = fold_block(analysis, block);

        let mut running = CPFact::new();
        if let Some(in_fact) = analysis.in_fact(original.id) {
            in_fact.meet_into(&mut running);
        }
        let mut pending = rewrites.iter().peekable();
        for (index, stmt) in original.stmts.iter().enumerate() {
            while let Some(rewrite) = pending.next_if(|rewrite| rewrite.stmt_index == index) {
                let expected = running.get(rewrite.var);
                if expected != CPValue::Const(rewrite.value) {
                    return PropertyStatus::Failed(format!(
                        "{} statement {index}: {} rewritten to #{} but running fact holds {expected}",
                        original.id, rewrite.var, rewrite.value
                    ));
                }
            }
            analysis.transfer_stmt(stmt, &mut running);
        }
    }

    let mut refolded = ConstantPropagation::new();
    refolded.solve(&folded, SolverStrategy::Worklist);
    PropertyStatus::check(refolded.block_facts() == analysis.block_facts(), || {
        "re-analysing the folded function produced different facts".to_string()
    })
}
