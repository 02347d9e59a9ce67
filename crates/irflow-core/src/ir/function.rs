//! Blocks, functions and the control-flow adjacency of a function

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Stmt, Var};
use crate::error::IrError;

/// Unique identifier for a basic block within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A straight-line sequence of statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub stmts: Vec<Stmt>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            stmts: Vec::new(),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.stmts {
            writeln!(f, "{stmt}")?;
        }
        Ok(())
    }
}

/// A function: ordered blocks, synthetic entry and exit, parameters and CFG edges
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Var>,
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    exit: BlockId,
    /// Position of each block in `blocks`
    index: IndexMap<BlockId, usize>,
    preds: IndexMap<BlockId, Vec<BlockId>>,
    succs: IndexMap<BlockId, Vec<BlockId>>,
}

impl Function {
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    /// Blocks in function order (entry first, exit last)
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [BasicBlock] {
        &mut self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.index.get(&id).and_then(|&pos| self.blocks.get(pos))
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.index.get(&id).and_then(|&pos| self.blocks.get_mut(pos))
    }

    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        self.preds.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        self.succs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (BlockId, BlockId)> + '_ {
        self.succs
            .iter()
            .flat_map(|(&from, tos)| tos.iter().map(move |&to| (from, to)))
    }

    pub fn block_marker(&self, id: BlockId) -> &'static str {
        if id == self.entry {
            "(Entry)"
        } else if id == self.exit {
            "(Exit)"
        } else {
            ""
        }
    }

    pub fn stmt_count(&self) -> usize {
        self.blocks.iter().map(|block| block.stmts.len()).sum()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FUNCTION {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        writeln!(f, ")")?;
        for block in &self.blocks {
            let succs: Vec<String> = self.successors(block.id).iter().map(ToString::to_string).collect();
            writeln!(
                f,
                "{}{}: -> [{}]",
                block.id,
                self.block_marker(block.id),
                succs.join(", ")
            )?;
            for stmt in &block.stmts {
                writeln!(f, "    {stmt}")?;
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`Function`]
///
/// The entry and exit blocks are created up front; body blocks are appended
/// between them in creation order.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    params: Vec<Var>,
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    exit: BlockId,
    edges: Vec<(BlockId, BlockId)>,
    next_block_id: usize,
    next_var: u32,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self {
            name: name.into(),
            params: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
            exit: BlockId(0),
            edges: Vec::new(),
            next_block_id: 0,
            next_var: 1,
        };
        builder.entry = builder.new_block();
        builder.exit = builder.new_block();
        builder
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    /// Allocate a fresh variable
    pub fn new_var(&mut self) -> Var {
        let var = Var(self.next_var);
        self.next_var = self.next_var.saturating_add(1);
        var
    }

    /// Allocate a fresh variable and register it as the next parameter
    pub fn param(&mut self) -> Var {
        let var = self.new_var();
        self.params.push(var);
        var
    }

    /// Register an existing variable as a parameter
    pub fn add_param(&mut self, var: Var) -> Result<(), IrError> {
        if self.params.contains(&var) {
            return Err(IrError::DuplicateParam(var));
        }
        self.next_var = self.next_var.max(var.0.saturating_add(1));
        self.params.push(var);
        Ok(())
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Append a statement to `block`
    pub fn push(&mut self, block: BlockId, stmt: Stmt) -> Result<(), IrError> {
        if let Some(def) = stmt.def() {
            self.next_var = self.next_var.max(def.0.saturating_add(1));
        }
        let target = self
            .blocks
            .iter_mut()
            .find(|b| b.id == block)
            .ok_or(IrError::UnknownBlock(block))?;
        target.stmts.push(stmt);
        Ok(())
    }

    /// Record a control-flow edge; duplicate edges are ignored
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    pub fn build(mut self) -> Result<Function, IrError> {
        // Keep the exit block last in function order.
        if let Some(pos) = self.blocks.iter().position(|b| b.id == self.exit) {
            let exit = self.blocks.remove(pos);
            self.blocks.push(exit);
        }

        let index: IndexMap<BlockId, usize> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(pos, block)| (block.id, pos))
            .collect();
        let known = |id: BlockId| index.contains_key(&id);

        let mut preds: IndexMap<BlockId, Vec<BlockId>> = IndexMap::new();
        let mut succs: IndexMap<BlockId, Vec<BlockId>> = IndexMap::new();
        for block in &self.blocks {
            preds.insert(block.id, Vec::new());
            succs.insert(block.id, Vec::new());
        }

        for &(from, to) in &self.edges {
            for id in [from, to] {
                if !known(id) {
                    return Err(IrError::UnknownBlock(id));
                }
            }
            if to == self.entry {
                return Err(IrError::EntryHasPredecessors(from));
            }
            if from == self.exit {
                return Err(IrError::ExitHasSuccessors(to));
            }
            succs.entry(from).or_default().push(to);
            preds.entry(to).or_default().push(from);
        }

        for block in &self.blocks {
            for stmt in &block.stmts {
                if let Some(target) = stmt.target() {
                    if !known(target) {
                        return Err(IrError::UnknownBranchTarget {
                            block: block.id,
                            target,
                        });
                    }
                }
            }
        }

        Ok(Function {
            name: self.name,
            params: self.params,
            blocks: self.blocks,
            entry: self.entry,
            exit: self.exit,
            index,
            preds,
            succs,
        })
    }
}
