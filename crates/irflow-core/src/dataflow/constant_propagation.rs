//! Forward constant propagation over the [`CPValue`] lattice

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

use super::lattice::{calculate_value, CPFact, CPValue};
use super::solver::{BlockFacts, DataflowAnalysis, DataflowDirection, FixpointSolver, SolveStats, SolverStrategy};
use crate::ir::{BasicBlock, BlockId, Function, Stmt};

/// Constant propagation analysis; owns the per-block facts it computes
#[derive(Debug, Clone, Default)]
pub struct ConstantPropagation {
    facts: BlockFacts<CPFact>,
}

impl ConstantPropagation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the analysis on `func` from scratch
    pub fn solve(&mut self, func: &Function, strategy: SolverStrategy) -> SolveStats {
        FixpointSolver::solve(self, func, strategy)
    }

    /// Apply a single statement to `fact` in place
    pub fn transfer_stmt(&self, stmt: &Stmt, fact: &mut CPFact) {
        match stmt {
            Stmt::Assign { def, src } => {
                let value = fact.value_of(src);
                fact.update(*def, value);
            }
            Stmt::BinaryOp { def, op, lhs, rhs } => {
                let value = calculate_value(*op, fact.value_of(lhs), fact.value_of(rhs));
                fact.update(*def, value);
            }
            other => {
                if let Some(def) = other.def() {
                    fact.update(def, CPValue::Nac);
                }
            }
        }
    }

    /// Rendered In/Out facts of one block, if the block has been analysed
    pub fn rendered_facts(&self, block: BlockId) -> Option<BlockReport> {
        let in_fact = self.in_fact(block)?;
        let out_fact = self.out_fact(block)?;
        Some(BlockReport {
            block,
            in_fact: render_fact(in_fact),
            out_fact: render_fact(out_fact),
        })
    }

    /// Rendered facts of every block of `func`, in function order
    pub fn report(&self, func: &Function) -> FunctionReport {
        FunctionReport {
            function: func.name.clone(),
            blocks: func
                .blocks()
                .iter()
                .filter_map(|block| self.rendered_facts(block.id))
                .collect(),
        }
    }

    pub fn render_result(&self, func: &Function) -> String {
        ResultDisplay { analysis: self, func }.to_string()
    }

    pub fn print_result(&self, func: &Function, out: &mut impl io::Write) -> io::Result<()> {
        write!(out, "{}", ResultDisplay { analysis: self, func })
    }
}

impl DataflowAnalysis for ConstantPropagation {
    type Fact = CPFact;

    fn direction(&self) -> DataflowDirection {
        DataflowDirection::Forward
    }

    /// Parameters are never assumed constant
    fn new_boundary_fact(&self, func: &Function) -> CPFact {
        func.params.iter().map(|&param| (param, CPValue::Nac)).collect()
    }

    fn new_initial_fact(&self) -> CPFact {
        CPFact::new()
    }

    fn meet_into(&self, fact: &CPFact, target: &mut CPFact) -> bool {
        fact.meet_into(target)
    }

    fn transfer_block(&self, block: &BasicBlock, input: &CPFact, output: &mut CPFact) -> bool {
        let mut working = CPFact::new();
        input.meet_into(&mut working);
        for stmt in &block.stmts {
            self.transfer_stmt(stmt, &mut working);
        }
        working.meet_into(output)
    }

    fn block_facts(&self) -> &BlockFacts<CPFact> {
        &self.facts
    }

    fn block_facts_mut(&mut self) -> &mut BlockFacts<CPFact> {
        &mut self.facts
    }
}

/// `v<N>` -> `NAC` / `#<n>`, `Undef` omitted, ascending variable order
fn render_fact(fact: &CPFact) -> IndexMap<String, String> {
    fact.iter()
        .filter(|(_, value)| *value != CPValue::Undef)
        .map(|(var, value)| (var.to_string(), value.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub block: BlockId,
    #[serde(rename = "in")]
    pub in_fact: IndexMap<String, String>,
    #[serde(rename = "out")]
    pub out_fact: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub function: String,
    pub blocks: Vec<BlockReport>,
}

impl FunctionReport {
    pub fn block(&self, id: BlockId) -> Option<&BlockReport> {
        self.blocks.iter().find(|report| report.block == id)
    }
}

const SEPARATOR: &str = "=================";

struct ResultDisplay<'a> {
    analysis: &'a ConstantPropagation,
    func: &'a Function,
}

impl fmt::Display for ResultDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function {}: Constant Propagation Result", self.func.name)?;
        let empty = CPFact::new();
        for block in self.func.blocks() {
            writeln!(f, "{SEPARATOR}")?;
            writeln!(f, "{{Block{} {}}}", self.func.block_marker(block.id), block.id)?;
            write!(f, "{block}")?;
            let in_fact = self.analysis.in_fact(block.id).unwrap_or(&empty);
            let out_fact = self.analysis.out_fact(block.id).unwrap_or(&empty);
            writeln!(f, "[In]:  {in_fact}")?;
            writeln!(f, "[Out]: {out_fact}")?;
            writeln!(f, "{SEPARATOR}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, FunctionBuilder, Operand, Var};

    fn assign(def: Var, n: i32) -> Stmt {
        Stmt::Assign {
            def,
            src: Operand::Const(n),
        }
    }

    fn binop(def: Var, op: BinOp, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Stmt {
        Stmt::BinaryOp {
            def,
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    fn analyse(func: &Function) -> ConstantPropagation {
        let mut cp = ConstantPropagation::new();
        cp.solve(func, SolverStrategy::Worklist);
        cp
    }

    /// entry -> body -> exit, with `stmts` in body
    fn straight_line(params: usize, stmts: impl FnOnce(&[Var]) -> Vec<Stmt>) -> (Function, BlockId) {
        let mut b = FunctionBuilder::new("main");
        let params: Vec<Var> = (0..params).map(|_| b.param()).collect();
        let body = b.new_block();
        for stmt in stmts(&params) {
            b.push(body, stmt).unwrap();
        }
        b.add_edge(b.entry(), body);
        b.add_edge(body, b.exit());
        (b.build().unwrap(), body)
    }

    #[test]
    fn test_constants_flow_through_straight_line() {
        let (x, y, z) = (Var(1), Var(2), Var(3));
        let (func, body) = straight_line(0, |_| vec![assign(x, 1), assign(y, 2), binop(z, BinOp::Add, x, y)]);
        let cp = analyse(&func);

        let out = cp.out_fact(body).unwrap();
        assert_eq!(out.get(x), CPValue::Const(1));
        assert_eq!(out.get(y), CPValue::Const(2));
        assert_eq!(out.get(z), CPValue::Const(3));
        assert_eq!(cp.in_fact(func.exit()), Some(out));
    }

    #[test]
    fn test_conflicting_constants_merge_to_nac() {
        let mut b = FunctionBuilder::new("merge");
        let x = b.new_var();
        let head = b.new_block();
        let left = b.new_block();
        let right = b.new_block();
        let join = b.new_block();
        b.push(head, Stmt::Branch {
            op: crate::ir::RelOp::Lt,
            lhs: Operand::Const(0),
            rhs: Operand::Const(1),
            target: right,
        })
        .unwrap();
        b.push(left, assign(x, 1)).unwrap();
        b.push(right, assign(x, 2)).unwrap();
        b.push(join, Stmt::Write { value: Operand::Var(x) }).unwrap();
        b.add_edge(b.entry(), head);
        b.add_edge(head, left);
        b.add_edge(head, right);
        b.add_edge(left, join);
        b.add_edge(right, join);
        b.add_edge(join, b.exit());
        let func = b.build().unwrap();

        let cp = analyse(&func);
        assert_eq!(cp.out_fact(left).unwrap().get(x), CPValue::Const(1));
        assert_eq!(cp.out_fact(right).unwrap().get(x), CPValue::Const(2));
        assert_eq!(cp.in_fact(join).unwrap().get(x), CPValue::Nac);
    }

    #[test]
    fn test_matching_constants_merge_to_constant() {
        let mut b = FunctionBuilder::new("agree");
        let x = b.new_var();
        let left = b.new_block();
        let right = b.new_block();
        let join = b.new_block();
        b.push(left, assign(x, 7)).unwrap();
        b.push(right, assign(x, 7)).unwrap();
        b.add_edge(b.entry(), left);
        b.add_edge(b.entry(), right);
        b.add_edge(left, join);
        b.add_edge(right, join);
        b.add_edge(join, b.exit());
        let func = b.build().unwrap();

        let cp = analyse(&func);
        assert_eq!(cp.in_fact(join).unwrap().get(x), CPValue::Const(7));
    }

    #[test]
    fn test_division_by_zero_stays_undef() {
        let (x, y) = (Var(1), Var(2));
        let (func, body) = straight_line(0, |_| vec![assign(x, 5), binop(y, BinOp::Div, x, 0)]);
        let cp = analyse(&func);

        let out = cp.out_fact(body).unwrap();
        assert_eq!(out.get(x), CPValue::Const(5));
        assert_eq!(out.get(y), CPValue::Undef);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_division_by_computed_zero_stays_undef() {
        let (x, zero, y) = (Var(1), Var(2), Var(3));
        let (func, body) = straight_line(0, |_| {
            vec![assign(x, 5), binop(zero, BinOp::Sub, x, x), binop(y, BinOp::Div, x, zero)]
        });
        let cp = analyse(&func);

        let out = cp.out_fact(body).unwrap();
        assert_eq!(out.get(zero), CPValue::Const(0));
        assert_eq!(out.get(y), CPValue::Undef);
    }

    #[test]
    fn test_parameters_are_nac() {
        let y = Var(2);
        let (func, body) = straight_line(1, |params| vec![binop(y, BinOp::Add, params[0], 1)]);
        let p = func.params[0];
        let cp = analyse(&func);

        assert_eq!(cp.out_fact(func.entry()).unwrap().get(p), CPValue::Nac);
        assert_eq!(cp.in_fact(body).unwrap().get(p), CPValue::Nac);
        assert_eq!(cp.out_fact(body).unwrap().get(y), CPValue::Nac);
    }

    #[test]
    fn test_other_definitions_are_nac() {
        let (a, b, c) = (Var(1), Var(2), Var(3));
        let (func, body) = straight_line(0, |_| {
            vec![
                assign(a, 1),
                Stmt::Read { def: a },
                Stmt::Load {
                    def: b,
                    addr: Operand::Const(100),
                },
                Stmt::Call {
                    def: c,
                    callee: "f".to_string(),
                    args: vec![Operand::Const(1)],
                },
            ]
        });
        let cp = analyse(&func);

        let out = cp.out_fact(body).unwrap();
        for var in [a, b, c] {
            assert_eq!(out.get(var), CPValue::Nac, "{var} should be NAC");
        }
    }

    #[test]
    fn test_statements_without_def_leave_fact_alone() {
        let cp = ConstantPropagation::new();
        let mut fact: CPFact = [(Var(1), CPValue::Const(4))].into_iter().collect();
        let before = fact.clone();
        cp.transfer_stmt(
            &Stmt::Store {
                addr: Operand::Var(Var(1)),
                value: Operand::Const(0),
            },
            &mut fact,
        );
        cp.transfer_stmt(&Stmt::Write { value: Operand::Var(Var(1)) }, &mut fact);
        assert_eq!(fact, before);
    }

    #[test]
    fn test_unknown_operator_is_nac() {
        let x = Var(1);
        let (func, body) = straight_line(0, |_| vec![binop(x, BinOp::Other('%'), 7, 2)]);
        let cp = analyse(&func);
        assert_eq!(cp.out_fact(body).unwrap().get(x), CPValue::Nac);
    }

    #[test]
    fn test_loop_counter_becomes_nac() {
        let mut b = FunctionBuilder::new("count");
        let i = b.new_var();
        let k = b.new_var();
        let init = b.new_block();
        let head = b.new_block();
        let body = b.new_block();
        b.push(init, assign(i, 0)).unwrap();
        b.push(init, assign(k, 3)).unwrap();
        b.push(body, binop(i, BinOp::Add, i, 1)).unwrap();
        b.add_edge(b.entry(), init);
        b.add_edge(init, head);
        b.add_edge(head, body);
        b.add_edge(body, head);
        b.add_edge(head, b.exit());
        let func = b.build().unwrap();

        for strategy in [SolverStrategy::Iterative, SolverStrategy::Worklist] {
            let mut cp = ConstantPropagation::new();
            cp.solve(&func, strategy);
            let head_in = cp.in_fact(head).unwrap();
            assert_eq!(head_in.get(i), CPValue::Nac, "{strategy}");
            assert_eq!(head_in.get(k), CPValue::Const(3), "{strategy}");
        }
    }

    #[test]
    fn test_transfer_block_does_not_touch_input() {
        let cp = ConstantPropagation::new();
        let mut block = BasicBlock::new(BlockId(2));
        block.stmts.push(assign(Var(1), 9));
        let input: CPFact = [(Var(2), CPValue::Nac)].into_iter().collect();
        let mut output = CPFact::new();

        assert!(cp.transfer_block(&block, &input, &mut output));
        assert_eq!(input.len(), 1);
        assert_eq!(output.get(Var(1)), CPValue::Const(9));
        assert_eq!(output.get(Var(2)), CPValue::Nac);
        assert!(!cp.transfer_block(&block, &input, &mut output));
    }

    #[test]
    fn test_render_result_format() {
        let (v2, v3) = (Var(2), Var(3));
        let (func, _) = straight_line(1, |_| {
            vec![
                assign(v2, 3),
                binop(v3, BinOp::Mul, v2, 4),
                Stmt::Write { value: Operand::Var(v3) },
            ]
        });
        let cp = analyse(&func);

        let expected = concat!(
            "Function main: Constant Propagation Result\n",
            "=================\n",
            "{Block(Entry) b0}\n",
            "[In]:  \n",
            "[Out]: {v1: NAC} \n",
            "=================\n",
            "=================\n",
            "{Block b2}\n",
            "v2 := #3\n",
            "v3 := v2 * #4\n",
            "WRITE v3\n",
            "[In]:  {v1: NAC} \n",
            "[Out]: {v1: NAC} {v2: #3} {v3: #12} \n",
            "=================\n",
            "=================\n",
            "{Block(Exit) b1}\n",
            "[In]:  {v1: NAC} {v2: #3} {v3: #12} \n",
            "[Out]: {v1: NAC} {v2: #3} {v3: #12} \n",
            "=================\n",
        );
        assert_eq!(cp.render_result(&func), expected);

        let mut buf = Vec::new();
        cp.print_result(&func, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[test]
    fn test_report_renders_nac_and_constants() {
        let (v2, v3) = (Var(2), Var(3));
        let (func, body) = straight_line(1, |params| vec![assign(v2, 3), binop(v3, BinOp::Add, params[0], v2)]);
        let cp = analyse(&func);

        let report = cp.report(&func);
        assert_eq!(report.function, "main");
        assert_eq!(report.blocks.len(), 3);

        let block = report.block(body).unwrap();
        let out: Vec<(&str, &str)> = block
            .out_fact
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(out, vec![("v1", "NAC"), ("v2", "#3"), ("v3", "NAC")]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["blocks"][1]["in"]["v1"], "NAC");
    }

    #[test]
    fn test_rendered_facts_unknown_block() {
        let cp = ConstantPropagation::new();
        assert!(cp.rendered_facts(BlockId(3)).is_none());
    }
}
