//! Variable identities and the registry that issues them.

use std::fmt;

/// Opaque handle to a variable known to a [`Solver`](crate::solver::Solver).
///
/// Handles are stable integer ids; they stay valid for the lifetime of the
/// solver that created them and are cheap to copy around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable(u32);

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The role a variable plays in the tableau.
///
/// This is a tagged enum rather than a runtime flag field so that the
/// restricted/pivotable/dummy/external predicates below are exhaustive
/// matches instead of ad hoc boolean bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarKind {
    /// A client-visible variable with a readable value.
    External,
    /// Auxiliary non-negative variable introduced for an inequality or a
    /// non-required constraint's error pair.
    Slack,
    /// Auxiliary always-zero placeholder subject for required equalities.
    /// Never pivots.
    Dummy,
    /// The solver's objective row variable. Exactly one exists per solver.
    Objective,
}

impl VarKind {
    /// Slack and dummy variables must stay non-negative.
    pub fn is_restricted(self) -> bool {
        matches!(self, VarKind::Slack | VarKind::Dummy)
    }

    /// Only slack variables are eligible to enter the basis during a pivot.
    pub fn is_pivotable(self) -> bool {
        matches!(self, VarKind::Slack)
    }

    pub fn is_dummy(self) -> bool {
        matches!(self, VarKind::Dummy)
    }

    pub fn is_external(self) -> bool {
        matches!(self, VarKind::External)
    }
}

#[derive(Clone)]
struct VarEntry {
    kind: VarKind,
    name: Option<String>,
    value: f64,
    released: bool,
}

/// Issues distinct [`Variable`] identities and owns the bookkeeping that is
/// not specific to any one tableau row: kind, diagnostic name, and (for
/// external variables) the last value pushed out by `resolve`.
///
/// Cloning is used by the solver to snapshot its state before an operation
/// that might fail partway through, so it can be rolled back atomically
/// (SPEC_FULL.md §5).
#[derive(Default, Clone)]
pub struct VariableRegistry {
    entries: Vec<VarEntry>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn create(&mut self, kind: VarKind, name: Option<String>, value: f64) -> Variable {
        let id = self.entries.len() as u32;
        self.entries.push(VarEntry {
            kind,
            name,
            value,
            released: false,
        });
        Variable(id)
    }

    pub fn create_external(&mut self, name: Option<String>, value: f64) -> Variable {
        self.create(VarKind::External, name, value)
    }

    pub fn create_slack(&mut self) -> Variable {
        self.create(VarKind::Slack, None, 0.0)
    }

    pub fn create_dummy(&mut self) -> Variable {
        self.create(VarKind::Dummy, None, 0.0)
    }

    pub fn create_objective(&mut self) -> Variable {
        self.create(VarKind::Objective, None, 0.0)
    }

    fn entry(&self, v: Variable) -> &VarEntry {
        &self.entries[v.0 as usize]
    }

    pub fn kind(&self, v: Variable) -> VarKind {
        self.entry(v).kind
    }

    pub fn name(&self, v: Variable) -> Option<&str> {
        self.entry(v).name.as_deref()
    }

    pub fn is_restricted(&self, v: Variable) -> bool {
        self.kind(v).is_restricted()
    }

    pub fn is_pivotable(&self, v: Variable) -> bool {
        self.kind(v).is_pivotable()
    }

    pub fn is_dummy(&self, v: Variable) -> bool {
        self.kind(v).is_dummy()
    }

    pub fn is_external(&self, v: Variable) -> bool {
        self.kind(v).is_external()
    }

    pub fn value(&self, v: Variable) -> f64 {
        self.entry(v).value
    }

    pub fn set_value(&mut self, v: Variable, value: f64) {
        self.entries[v.0 as usize].value = value;
    }

    /// Marks a variable as released. External variables otherwise persist
    /// for the lifetime of the solver (§3 lifecycle); this is bookkeeping
    /// only, ids are never reused.
    pub fn release(&mut self, v: Variable) {
        self.entries[v.0 as usize].released = true;
    }

    pub fn is_released(&self, v: Variable) -> bool {
        self.entry(v).released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_distinct_ids() {
        let mut reg = VariableRegistry::new();
        let a = reg.create_external(None, 0.0);
        let b = reg.create_external(None, 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn predicates_match_kind() {
        let mut reg = VariableRegistry::new();
        let ext = reg.create_external(Some("x".into()), 1.0);
        let slack = reg.create_slack();
        let dummy = reg.create_dummy();
        let obj = reg.create_objective();

        assert!(reg.is_external(ext) && !reg.is_restricted(ext) && !reg.is_pivotable(ext));
        assert!(reg.is_restricted(slack) && reg.is_pivotable(slack) && !reg.is_dummy(slack));
        assert!(reg.is_restricted(dummy) && reg.is_dummy(dummy) && !reg.is_pivotable(dummy));
        assert!(!reg.is_restricted(obj) && !reg.is_external(obj));
        assert_eq!(reg.name(ext), Some("x"));
        assert_eq!(reg.value(ext), 1.0);
    }

    #[test]
    fn set_value_updates_external() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        reg.set_value(x, 42.0);
        assert_eq!(reg.value(x), 42.0);
    }
}
