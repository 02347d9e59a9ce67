//! Statements, operands and operators of the three-address IR

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::BlockId;

/// An IR-level storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(pub u32);

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A statement operand: either a literal or a variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Const(i32),
    Var(Var),
}

impl Operand {
    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const(_))
    }

    pub fn as_var(&self) -> Option<Var> {
        match self {
            Operand::Var(var) => Some(*var),
            Operand::Const(_) => None,
        }
    }
}

impl From<Var> for Operand {
    fn from(var: Var) -> Self {
        Operand::Var(var)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Const(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(value) => write!(f, "#{value}"),
            Operand::Var(var) => write!(f, "{var}"),
        }
    }
}

/// Arithmetic operator of a [`Stmt::BinaryOp`].
///
/// Any symbol outside `+ - * /` is kept as [`BinOp::Other`] so that
/// evaluation can fall back conservatively instead of rejecting the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "char", into = "char")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Other(char),
}

impl BinOp {
    pub fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
            BinOp::Other(symbol) => symbol,
        }
    }
}

impl From<char> for BinOp {
    fn from(symbol: char) -> Self {
        match symbol {
            '+' => BinOp::Add,
            '-' => BinOp::Sub,
            '*' => BinOp::Mul,
            '/' => BinOp::Div,
            other => BinOp::Other(other),
        }
    }
}

impl From<BinOp> for char {
    fn from(op: BinOp) -> Self {
        op.symbol()
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Relational operator of a conditional branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// A single IR statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    /// `def := src`
    Assign { def: Var, src: Operand },
    /// `def := lhs op rhs`
    BinaryOp {
        def: Var,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// `def := *addr`
    Load { def: Var, addr: Operand },
    /// `*addr := value`
    Store { addr: Operand, value: Operand },
    /// `def := call callee(args...)`
    Call {
        def: Var,
        callee: String,
        #[serde(default)]
        args: Vec<Operand>,
    },
    /// `read def`
    Read { def: Var },
    /// `write value`
    Write { value: Operand },
    /// `if lhs op rhs goto target`
    Branch {
        op: RelOp,
        lhs: Operand,
        rhs: Operand,
        target: BlockId,
    },
    /// `goto target`
    Goto { target: BlockId },
    /// `return value`
    Return { value: Operand },
}

impl Stmt {
    /// The variable this statement defines, if any
    pub fn def(&self) -> Option<Var> {
        match self {
            Stmt::Assign { def, .. }
            | Stmt::BinaryOp { def, .. }
            | Stmt::Load { def, .. }
            | Stmt::Call { def, .. }
            | Stmt::Read { def } => Some(*def),
            Stmt::Store { .. }
            | Stmt::Write { .. }
            | Stmt::Branch { .. }
            | Stmt::Goto { .. }
            | Stmt::Return { .. } => None,
        }
    }

    /// Operands read by this statement, in source order
    pub fn uses(&self) -> SmallVec<[&Operand; 2]> {
        match self {
            Stmt::Assign { src, .. } => smallvec::smallvec![src],
            Stmt::BinaryOp { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
            Stmt::Load { addr, .. } => smallvec::smallvec![addr],
            Stmt::Store { addr, value } => smallvec::smallvec![addr, value],
            Stmt::Call { args, .. } => args.iter().collect(),
            Stmt::Read { .. } | Stmt::Goto { .. } => SmallVec::new(),
            Stmt::Write { value } | Stmt::Return { value } => smallvec::smallvec![value],
            Stmt::Branch { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
        }
    }

    /// Mutable view of the operands read by this statement, for in-place rewriting
    pub fn uses_mut(&mut self) -> SmallVec<[&mut Operand; 2]> {
        match self {
            Stmt::Assign { src, .. } => smallvec::smallvec![src],
            Stmt::BinaryOp { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
            Stmt::Load { addr, .. } => smallvec::smallvec![addr],
            Stmt::Store { addr, value } => smallvec::smallvec![addr, value],
            Stmt::Call { args, .. } => args.iter_mut().collect(),
            Stmt::Read { .. } | Stmt::Goto { .. } => SmallVec::new(),
            Stmt::Write { value } | Stmt::Return { value } => smallvec::smallvec![value],
            Stmt::Branch { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
        }
    }

    /// Jump target, for branch and goto statements
    pub fn target(&self) -> Option<BlockId> {
        match self {
            Stmt::Branch { target, .. } | Stmt::Goto { target } => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { def, src } => write!(f, "{def} := {src}"),
            Stmt::BinaryOp { def, op, lhs, rhs } => write!(f, "{def} := {lhs} {op} {rhs}"),
            Stmt::Load { def, addr } => write!(f, "{def} := *{addr}"),
            Stmt::Store { addr, value } => write!(f, "*{addr} := {value}"),
            Stmt::Call { def, callee, args } => {
                write!(f, "{def} := CALL {callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Stmt::Read { def } => write!(f, "READ {def}"),
            Stmt::Write { value } => write!(f, "WRITE {value}"),
            Stmt::Branch {
                op,
                lhs,
                rhs,
                target,
            } => write!(f, "IF {lhs} {op} {rhs} GOTO {target}"),
            Stmt::Goto { target } => write!(f, "GOTO {target}"),
            Stmt::Return { value } => write!(f, "RETURN {value}"),
        }
    }
}
