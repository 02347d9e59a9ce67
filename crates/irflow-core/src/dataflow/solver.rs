//! Dataflow analysis framework with iterative and worklist fixpoint solvers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::ir::{BasicBlock, BlockId, Function};

/// Direction of dataflow analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataflowDirection {
    Forward,
    Backward,
}

/// Fixpoint strategy used by [`FixpointSolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverStrategy {
    /// Full sweeps over every block until a sweep changes nothing
    Iterative,
    /// FIFO queue of blocks whose inputs may have changed
    #[default]
    Worklist,
}

impl FromStr for SolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iterative" => Ok(SolverStrategy::Iterative),
            "worklist" => Ok(SolverStrategy::Worklist),
            other => Err(format!("unknown solver strategy '{other}' (expected 'iterative' or 'worklist')")),
        }
    }
}

impl fmt::Display for SolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStrategy::Iterative => f.write_str("iterative"),
            SolverStrategy::Worklist => f.write_str("worklist"),
        }
    }
}

/// Per-block In/Out facts owned by an analysis instance
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFacts<F> {
    in_facts: IndexMap<BlockId, F>,
    out_facts: IndexMap<BlockId, F>,
}

impl<F> Default for BlockFacts<F> {
    fn default() -> Self {
        Self {
            in_facts: IndexMap::new(),
            out_facts: IndexMap::new(),
        }
    }
}

impl<F> BlockFacts<F> {
    pub fn in_fact(&self, block: BlockId) -> Option<&F> {
        self.in_facts.get(&block)
    }

    pub fn out_fact(&self, block: BlockId) -> Option<&F> {
        self.out_facts.get(&block)
    }

    pub fn set_in_fact(&mut self, block: BlockId, fact: F) {
        self.in_facts.insert(block, fact);
    }

    pub fn set_out_fact(&mut self, block: BlockId, fact: F) {
        self.out_facts.insert(block, fact);
    }

    /// In-facts in initialization (function) order
    pub fn in_facts(&self) -> impl Iterator<Item = (BlockId, &F)> {
        self.in_facts.iter().map(|(&id, fact)| (id, fact))
    }

    /// Out-facts in initialization (function) order
    pub fn out_facts(&self) -> impl Iterator<Item = (BlockId, &F)> {
        self.out_facts.iter().map(|(&id, fact)| (id, fact))
    }

    pub fn clear(&mut self) {
        self.in_facts.clear();
        self.out_facts.clear();
    }
}

/// Generic trait for dataflow analyses
///
/// Both `meet_into` and `transfer_block` must be monotone for the solvers to
/// terminate.
pub trait DataflowAnalysis {
    /// The type of facts being propagated
    type Fact: Clone + PartialEq + Default;

    /// Direction of the analysis
    fn direction(&self) -> DataflowDirection;

    fn is_forward(&self) -> bool {
        self.direction() == DataflowDirection::Forward
    }

    /// Fact installed on the outer side of the entry (forward) or exit (backward) block
    fn new_boundary_fact(&self, func: &Function) -> Self::Fact;

    /// Fact installed on every other block before the first iteration
    fn new_initial_fact(&self) -> Self::Fact;

    /// Meet `fact` into `target`, returning whether `target` changed
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) -> bool;

    /// Push `input` through `block` and meet the result into `output`,
    /// returning whether `output` changed
    fn transfer_block(&self, block: &BasicBlock, input: &Self::Fact, output: &mut Self::Fact) -> bool;

    fn block_facts(&self) -> &BlockFacts<Self::Fact>;

    fn block_facts_mut(&mut self) -> &mut BlockFacts<Self::Fact>;

    fn in_fact(&self, block: BlockId) -> Option<&Self::Fact> {
        self.block_facts().in_fact(block)
    }

    fn out_fact(&self, block: BlockId) -> Option<&Self::Fact> {
        self.block_facts().out_fact(block)
    }

    fn set_in_fact(&mut self, block: BlockId, fact: Self::Fact) {
        self.block_facts_mut().set_in_fact(block, fact);
    }

    fn set_out_fact(&mut self, block: BlockId, fact: Self::Fact) {
        self.block_facts_mut().set_out_fact(block, fact);
    }
}

/// Counters collected while iterating to a fixpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStats {
    pub strategy: SolverStrategy,
    pub direction: DataflowDirection,
    /// Sweeps (iterative) or worklist pops (worklist)
    pub passes: usize,
    /// Calls to `transfer_block`
    pub transfers: usize,
    /// `transfer_block` calls that changed their output fact
    pub updates: usize,
}

impl SolveStats {
    fn new(strategy: SolverStrategy, direction: DataflowDirection) -> Self {
        Self {
            strategy,
            direction,
            passes: 0,
            transfers: 0,
            updates: 0,
        }
    }
}

/// Fixpoint solver over the blocks of a single function
pub struct FixpointSolver;

impl FixpointSolver {
    /// Initialize the analysis' block facts and iterate to a fixpoint
    pub fn solve<A: DataflowAnalysis>(analysis: &mut A, func: &Function, strategy: SolverStrategy) -> SolveStats {
        Self::initialize(analysis, func);
        Self::iterate(analysis, func, strategy)
    }

    pub fn iterative<A: DataflowAnalysis>(analysis: &mut A, func: &Function) -> SolveStats {
        Self::solve(analysis, func, SolverStrategy::Iterative)
    }

    pub fn worklist<A: DataflowAnalysis>(analysis: &mut A, func: &Function) -> SolveStats {
        Self::solve(analysis, func, SolverStrategy::Worklist)
    }

    /// Install initial and boundary facts for every block, discarding old ones
    pub fn initialize<A: DataflowAnalysis>(analysis: &mut A, func: &Function) {
        analysis.block_facts_mut().clear();
        let forward = analysis.is_forward();

        for block in func.blocks() {
            let id = block.id;
            let inner = analysis.new_initial_fact();
            let outer = if (forward && id == func.entry()) || (!forward && id == func.exit()) {
                analysis.new_boundary_fact(func)
            } else {
                analysis.new_initial_fact()
            };

            if forward {
                analysis.set_in_fact(id, inner);
                analysis.set_out_fact(id, outer);
            } else {
                analysis.set_out_fact(id, inner);
                analysis.set_in_fact(id, outer);
            }
        }
    }

    /// Iterate from the currently stored facts without re-initializing them
    pub fn iterate<A: DataflowAnalysis>(analysis: &mut A, func: &Function, strategy: SolverStrategy) -> SolveStats {
        let direction = analysis.direction();
        debug!(function = %func.name, %strategy, ?direction, blocks = func.blocks().len(), "solving dataflow");

        // Take the store out so facts can be borrowed alongside `&A`.
        let mut facts = std::mem::take(analysis.block_facts_mut());
        let stats = match strategy {
            SolverStrategy::Iterative => Self::iterate_sweeps(analysis, func, &mut facts),
            SolverStrategy::Worklist => Self::iterate_worklist(analysis, func, &mut facts),
        };
        *analysis.block_facts_mut() = facts;

        debug!(
            function = %func.name,
            passes = stats.passes,
            transfers = stats.transfers,
            updates = stats.updates,
            "reached fixpoint"
        );
        stats
    }

    fn iterate_sweeps<A: DataflowAnalysis>(analysis: &A, func: &Function, facts: &mut BlockFacts<A::Fact>) -> SolveStats {
        let mut stats = SolveStats::new(SolverStrategy::Iterative, analysis.direction());

        loop {
            stats.passes += 1;
            let mut updated = false;
            for block in func.blocks() {
                stats.transfers += 1;
                if Self::visit(analysis, func, block, facts) {
                    stats.updates += 1;
                    updated = true;
                }
            }
            trace!(sweep = stats.passes, updated, "finished sweep");
            if !updated {
                break;
            }
        }

        stats
    }

    fn iterate_worklist<A: DataflowAnalysis>(
        analysis: &A,
        func: &Function,
        facts: &mut BlockFacts<A::Fact>,
    ) -> SolveStats {
        let mut stats = SolveStats::new(SolverStrategy::Worklist, analysis.direction());
        let mut worklist: VecDeque<BlockId> = func.blocks().iter().map(|block| block.id).collect();

        while let Some(id) = worklist.pop_front() {
            stats.passes += 1;
            let Some(block) = func.block(id) else {
                continue;
            };

            stats.transfers += 1;
            if Self::visit(analysis, func, block, facts) {
                stats.updates += 1;
                // Duplicates are allowed; a queued block may be queued again.
                let next = if analysis.is_forward() {
                    func.successors(id)
                } else {
                    func.predecessors(id)
                };
                worklist.extend(next.iter().copied());
            }
        }

        stats
    }

    /// Meet the neighbours' facts into the block's input side, then transfer
    /// through the block. Returns whether the output side changed.
    fn visit<A: DataflowAnalysis>(
        analysis: &A,
        func: &Function,
        block: &BasicBlock,
        facts: &mut BlockFacts<A::Fact>,
    ) -> bool {
        let id = block.id;
        let BlockFacts { in_facts, out_facts } = facts;
        let (input_side, output_side, sources) = match analysis.direction() {
            DataflowDirection::Forward => (in_facts, out_facts, func.predecessors(id)),
            DataflowDirection::Backward => (out_facts, in_facts, func.successors(id)),
        };

        let Some(input) = input_side.get_mut(&id) else {
            return false;
        };
        for source in sources {
            if let Some(fact) = output_side.get(source) {
                analysis.meet_into(fact, input);
            }
        }

        let Some(output) = output_side.get_mut(&id) else {
            return false;
        };
        let changed = analysis.transfer_block(block, input, output);
        if changed {
            trace!(block = %id, "block fact updated");
        }
        changed
    }
}
