//! Constant-propagation lattice for dataflow analysis
//!
//! Implements a flat lattice over 32-bit integers where:
//! - `Undef` = no information yet (identity of `meet`)
//! - `Const(n)` = exactly one known value
//! - `Nac` = not a constant (absorbs everything)
//!
//! `meet` computes the least upper bound in the order
//! `Undef ⊑ Const(n) ⊑ Nac`; distinct constants meet to `Nac`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ir::{BinOp, Operand, Var};

/// A value in the constant-propagation lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CPValue {
    /// Bottom element - no definition reaches this point yet
    #[default]
    Undef,
    /// A single known integer value
    Const(i32),
    /// Top element - proven to vary, or unknown input
    Nac,
}

impl CPValue {
    /// Least upper bound of two lattice values
    pub fn meet(self, other: CPValue) -> CPValue {
        match (self, other) {
            // Undef is identity for meet
            (CPValue::Undef, v) | (v, CPValue::Undef) => v,
            // Nac absorbs everything
            (CPValue::Nac, _) | (_, CPValue::Nac) => CPValue::Nac,
            (CPValue::Const(a), CPValue::Const(b)) if a == b => CPValue::Const(a),
            (CPValue::Const(_), CPValue::Const(_)) => CPValue::Nac,
        }
    }

    /// Check if this value is lower than or equal to `other` in the lattice
    pub fn is_below(&self, other: &CPValue) -> bool {
        match (self, other) {
            (CPValue::Undef, _) | (_, CPValue::Nac) => true,
            (CPValue::Const(a), CPValue::Const(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_const(&self) -> Option<i32> {
        match self {
            CPValue::Const(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CPValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CPValue::Undef => f.write_str("UNDEF"),
            CPValue::Const(n) => write!(f, "#{n}"),
            CPValue::Nac => f.write_str("NAC"),
        }
    }
}

/// Evaluate `lhs op rhs` over the lattice.
///
/// Arithmetic on two constants follows 32-bit two's-complement wrapping
/// semantics. Division by zero has no defined result and yields `Undef`.
pub fn calculate_value(op: BinOp, lhs: CPValue, rhs: CPValue) -> CPValue {
    // A known-zero divisor wins over everything, including Nac on the left.
    if op == BinOp::Div && rhs == CPValue::Const(0) {
        return CPValue::Undef;
    }
    let (a, b) = match (lhs, rhs) {
        (CPValue::Nac, _) | (_, CPValue::Nac) => return CPValue::Nac,
        (CPValue::Undef, _) | (_, CPValue::Undef) => return CPValue::Undef,
        (CPValue::Const(a), CPValue::Const(b)) => (a, b),
    };
    match op {
        BinOp::Add => CPValue::Const(a.wrapping_add(b)),
        BinOp::Sub => CPValue::Const(a.wrapping_sub(b)),
        BinOp::Mul => CPValue::Const(a.wrapping_mul(b)),
        // wrapping_div panics on zero
        BinOp::Div if b == 0 => CPValue::Undef,
        BinOp::Div => CPValue::Const(a.wrapping_div(b)),
        BinOp::Other(_) => CPValue::Nac,
    }
}

/// Per-program-point constant facts: a map from variable to lattice value.
///
/// A variable absent from the map is `Undef`, and `Undef` is never stored;
/// [`CPFact::update`] is the single mutation point that keeps it that way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CPFact {
    vars: BTreeMap<Var, CPValue>,
}

impl CPFact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a variable (`Undef` when absent)
    pub fn get(&self, var: Var) -> CPValue {
        self.vars.get(&var).copied().unwrap_or(CPValue::Undef)
    }

    /// Resolve an operand: literals are constants, variables are looked up
    pub fn value_of(&self, operand: &Operand) -> CPValue {
        match operand {
            Operand::Const(n) => CPValue::Const(*n),
            Operand::Var(var) => self.get(*var),
        }
    }

    /// Set the value of a variable, deleting it when the value is `Undef`
    pub fn update(&mut self, var: Var, value: CPValue) {
        if value == CPValue::Undef {
            self.vars.remove(&var);
        } else {
            self.vars.insert(var, value);
        }
    }

    /// Meet `value` into the entry for `var`, returning whether it changed
    pub fn meet_value(&mut self, var: Var, value: CPValue) -> bool {
        let old = self.get(var);
        let new = old.meet(value);
        if old == new {
            return false;
        }
        self.update(var, new);
        true
    }

    /// Meet every entry of `self` into `target`, returning whether any entry changed
    pub fn meet_into(&self, target: &mut CPFact) -> bool {
        let mut changed = false;
        for (&var, &value) in &self.vars {
            changed |= target.meet_value(var, value);
        }
        changed
    }

    /// Check if every entry of this fact is below the matching entry of `other`
    pub fn is_below(&self, other: &CPFact) -> bool {
        self.vars.iter().all(|(var, value)| value.is_below(&other.get(*var)))
    }

    /// Entries in ascending variable order
    pub fn iter(&self) -> impl Iterator<Item = (Var, CPValue)> + '_ {
        self.vars.iter().map(|(&var, &value)| (var, value))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(Var, CPValue)> for CPFact {
    fn from_iter<I: IntoIterator<Item = (Var, CPValue)>>(iter: I) -> Self {
        let mut fact = CPFact::new();
        for (var, value) in iter {
            fact.update(var, value);
        }
        fact
    }
}

impl fmt::Display for CPFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (var, value) in self.iter() {
            write!(f, "{{{var}: {value}}} ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    impl Arbitrary for CPValue {
        fn arbitrary(g: &mut Gen) -> Self {
            // Small constant range so equal constants actually show up.
            match u8::arbitrary(g) % 3 {
                0 => CPValue::Undef,
                1 => CPValue::Const(i32::from(i8::arbitrary(g) % 4)),
                _ => CPValue::Nac,
            }
        }
    }

    #[test]
    fn test_meet_undef_is_identity() {
        assert_eq!(CPValue::Undef.meet(CPValue::Const(3)), CPValue::Const(3));
        assert_eq!(CPValue::Const(3).meet(CPValue::Undef), CPValue::Const(3));
        assert_eq!(CPValue::Undef.meet(CPValue::Nac), CPValue::Nac);
        assert_eq!(CPValue::Undef.meet(CPValue::Undef), CPValue::Undef);
    }

    #[test]
    fn test_meet_nac_absorbs() {
        assert_eq!(CPValue::Nac.meet(CPValue::Const(1)), CPValue::Nac);
        assert_eq!(CPValue::Const(1).meet(CPValue::Nac), CPValue::Nac);
    }

    #[test]
    fn test_meet_constants() {
        assert_eq!(CPValue::Const(4).meet(CPValue::Const(4)), CPValue::Const(4));
        assert_eq!(CPValue::Const(4).meet(CPValue::Const(5)), CPValue::Nac);
    }

    #[quickcheck]
    fn prop_meet_commutative(a: CPValue, b: CPValue) -> bool {
        a.meet(b) == b.meet(a)
    }

    #[quickcheck]
    fn prop_meet_associative(a: CPValue, b: CPValue, c: CPValue) -> bool {
        a.meet(b).meet(c) == a.meet(b.meet(c))
    }

    #[quickcheck]
    fn prop_meet_idempotent(a: CPValue) -> bool {
        a.meet(a) == a
    }

    #[quickcheck]
    fn prop_meet_is_upper_bound(a: CPValue, b: CPValue) -> bool {
        let m = a.meet(b);
        a.is_below(&m) && b.is_below(&m)
    }

    #[test]
    fn test_calculate_arithmetic() {
        let c = CPValue::Const;
        assert_eq!(calculate_value(BinOp::Add, c(1), c(2)), c(3));
        assert_eq!(calculate_value(BinOp::Sub, c(1), c(2)), c(-1));
        assert_eq!(calculate_value(BinOp::Mul, c(3), c(4)), c(12));
        assert_eq!(calculate_value(BinOp::Div, c(7), c(2)), c(3));
        assert_eq!(calculate_value(BinOp::Div, c(-7), c(2)), c(-3));
    }

    #[test]
    fn test_calculate_wraps_like_machine_int() {
        let c = CPValue::Const;
        assert_eq!(calculate_value(BinOp::Add, c(i32::MAX), c(1)), c(i32::MIN));
        assert_eq!(calculate_value(BinOp::Div, c(i32::MIN), c(-1)), c(i32::MIN));
    }

    #[test]
    fn test_calculate_division_by_literal_zero_is_undef() {
        assert_eq!(
            calculate_value(BinOp::Div, CPValue::Const(5), CPValue::Const(0)),
            CPValue::Undef
        );
        // The zero check happens before the Nac check.
        assert_eq!(
            calculate_value(BinOp::Div, CPValue::Nac, CPValue::Const(0)),
            CPValue::Undef
        );
        // Multiplying by zero is not special.
        assert_eq!(
            calculate_value(BinOp::Mul, CPValue::Const(5), CPValue::Const(0)),
            CPValue::Const(0)
        );
    }

    #[test]
    fn test_calculate_nac_and_undef() {
        let c = CPValue::Const;
        assert_eq!(calculate_value(BinOp::Add, CPValue::Nac, c(1)), CPValue::Nac);
        assert_eq!(calculate_value(BinOp::Add, CPValue::Nac, CPValue::Undef), CPValue::Nac);
        assert_eq!(calculate_value(BinOp::Add, CPValue::Undef, c(1)), CPValue::Undef);
        assert_eq!(calculate_value(BinOp::Mul, c(1), CPValue::Undef), CPValue::Undef);
    }

    #[test]
    fn test_calculate_unknown_operator_is_nac() {
        assert_eq!(
            calculate_value(BinOp::Other('%'), CPValue::Const(7), CPValue::Const(2)),
            CPValue::Nac
        );
    }

    #[test]
    fn test_fact_absent_is_undef() {
        let fact = CPFact::new();
        assert_eq!(fact.get(Var(9)), CPValue::Undef);
        assert_eq!(fact.value_of(&Operand::Const(4)), CPValue::Const(4));
    }

    #[test]
    fn test_fact_update_never_stores_undef() {
        let mut fact = CPFact::new();
        fact.update(Var(1), CPValue::Const(1));
        assert_eq!(fact.len(), 1);
        fact.update(Var(1), CPValue::Undef);
        assert!(fact.is_empty());
        fact.update(Var(2), CPValue::Undef);
        assert!(fact.is_empty());
    }

    #[test]
    fn test_fact_meet_into_reports_change() {
        let source: CPFact = [(Var(1), CPValue::Const(1)), (Var(2), CPValue::Nac)]
            .into_iter()
            .collect();
        let mut target: CPFact = [(Var(1), CPValue::Const(1))].into_iter().collect();

        assert!(source.meet_into(&mut target));
        assert_eq!(target.get(Var(2)), CPValue::Nac);
        // Second meet is a no-op.
        assert!(!source.meet_into(&mut target));

        let conflicting: CPFact = [(Var(1), CPValue::Const(2))].into_iter().collect();
        assert!(conflicting.meet_into(&mut target));
        assert_eq!(target.get(Var(1)), CPValue::Nac);
    }

    #[test]
    fn test_fact_display_sorted() {
        let fact: CPFact = [(Var(3), CPValue::Const(12)), (Var(1), CPValue::Nac)]
            .into_iter()
            .collect();
        assert_eq!(fact.to_string(), "{v1: NAC} {v3: #12} ");
    }
}
