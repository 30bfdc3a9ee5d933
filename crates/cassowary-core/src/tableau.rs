//! The dictionary tableau: a mapping from *basic* variables to the
//! expression that currently defines them, plus the inverse column index
//! needed to keep every row in sync when one of them changes
//! (SPEC_FULL.md §4.2, grounded on `simplex_solver_add_row` /
//! `simplex_solver_remove_row` / `simplex_solver_substitute_out` /
//! `simplex_solver_pivot` in `emeus-simplex-solver.c`).
//!
//! Invariants (I1-I5, checked with `debug_assert!` at the boundaries that
//! could break them):
//! - I1: no basic variable appears on the right-hand side of any row.
//! - I2: `columns[v]` is exactly the set of basic variables whose row
//!   mentions `v`; rows and columns are always updated together.
//! - I3: every restricted basic variable is either non-negative or its id
//!   is present in `infeasible_rows`.
//! - I5: at most one marker variable is recorded per tracked constraint.

use std::collections::{HashMap, HashSet};

use crate::constraint::Constraint;
use crate::expression::{near_zero, Expression};
use crate::variable::{Variable, VariableRegistry};

#[derive(Default, Clone)]
pub(crate) struct Tableau {
    rows: HashMap<Variable, Expression>,
    columns: HashMap<Variable, HashSet<Variable>>,
    infeasible_rows: HashSet<Variable>,
    external_rows: HashSet<Variable>,
    updated_externals: HashSet<Variable>,
    marker_vars: HashMap<Constraint, Variable>,
    error_vars: HashMap<Constraint, Vec<Variable>>,
}

impl Tableau {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_basic(&self, v: Variable) -> bool {
        self.rows.contains_key(&v)
    }

    pub fn row(&self, v: Variable) -> Option<&Expression> {
        self.rows.get(&v)
    }

    pub fn basic_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.rows.keys().copied()
    }

    pub fn infeasible_rows(&self) -> impl Iterator<Item = Variable> + '_ {
        self.infeasible_rows.iter().copied()
    }

    /// True when `v` is not referenced as a parameter by any row, or only
    /// by the objective row — i.e. picking `v` as a brand new row's
    /// subject would not require rewriting any other constraint's row.
    pub fn column_is_trivial(&self, v: Variable, objective: Variable) -> bool {
        match self.columns.get(&v) {
            None => true,
            Some(set) => set.is_empty() || (set.len() == 1 && set.contains(&objective)),
        }
    }

    pub fn has_column(&self, v: Variable) -> bool {
        self.columns.contains_key(&v)
    }

    pub fn is_infeasible(&self, v: Variable) -> bool {
        self.infeasible_rows.contains(&v)
    }

    pub fn take_updated_externals(&mut self) -> HashSet<Variable> {
        std::mem::take(&mut self.updated_externals)
    }

    pub fn note_external_updated(&mut self, v: Variable) {
        self.updated_externals.insert(v);
    }

    pub fn set_marker(&mut self, c: Constraint, marker: Variable) {
        self.marker_vars.insert(c, marker);
    }

    pub fn marker(&self, c: Constraint) -> Option<Variable> {
        self.marker_vars.get(&c).copied()
    }

    pub fn take_marker(&mut self, c: Constraint) -> Option<Variable> {
        self.marker_vars.remove(&c)
    }

    pub fn push_error_var(&mut self, c: Constraint, v: Variable) {
        self.error_vars.entry(c).or_default().push(v);
    }

    pub fn error_vars(&self, c: Constraint) -> &[Variable] {
        self.error_vars.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn take_error_vars(&mut self, c: Constraint) -> Vec<Variable> {
        self.error_vars.remove(&c).unwrap_or_default()
    }

    fn note_added(&mut self, term: Variable, subject: Variable) {
        self.columns.entry(term).or_default().insert(subject);
    }

    fn note_removed(&mut self, term: Variable, subject: Variable) {
        if let Some(set) = self.columns.get_mut(&term) {
            set.remove(&subject);
            if set.is_empty() {
                self.columns.remove(&term);
            }
        }
    }

    /// Inserts `subject`'s defining row, updating the column index and the
    /// infeasible/external bookkeeping that depends on it. `subject` must
    /// not already be basic.
    pub fn add_row(&mut self, registry: &VariableRegistry, subject: Variable, expr: Expression) {
        debug_assert!(!self.is_basic(subject), "add_row on an already-basic variable");
        for (term, _) in expr.terms() {
            self.note_added(term, subject);
        }
        if registry.is_restricted(subject) && expr.constant < 0.0 && !near_zero(expr.constant) {
            self.infeasible_rows.insert(subject);
        } else {
            self.infeasible_rows.remove(&subject);
        }
        if registry.is_external(subject) {
            self.external_rows.insert(subject);
            self.updated_externals.insert(subject);
        }
        self.rows.insert(subject, expr);
    }

    /// Removes and returns `subject`'s row, if it is currently basic.
    pub fn remove_row(&mut self, subject: Variable) -> Option<Expression> {
        let expr = self.rows.remove(&subject)?;
        for (term, _) in expr.terms() {
            self.note_removed(term, subject);
        }
        self.infeasible_rows.remove(&subject);
        if self.external_rows.remove(&subject) {
            self.updated_externals.insert(subject);
        }
        Some(expr)
    }

    /// Substitutes `old_var = expr` into every row that currently mentions
    /// `old_var` (I1: `old_var` must not itself be basic, i.e. this is
    /// called right after it left the basis or was found to be a pure
    /// parameter with a known value).
    pub fn substitute_out(&mut self, registry: &VariableRegistry, old_var: Variable, expr: &Expression) {
        let dependents = self.columns.remove(&old_var).unwrap_or_default();
        for basic in dependents {
            {
                let row = self.rows.get_mut(&basic).expect("column index points at a live row");
                row.substitute_out(old_var, expr);
            }
            for (term, _) in expr.terms() {
                self.note_added(term, basic);
            }

            let row = self.rows.get(&basic).unwrap();
            if registry.is_restricted(basic) && row.constant < 0.0 && !near_zero(row.constant) {
                self.infeasible_rows.insert(basic);
            }
            if registry.is_external(basic) {
                self.updated_externals.insert(basic);
            }
        }
    }

    /// Adds `delta` straight to a basic variable's row constant (used when
    /// the perturbed variable is itself currently basic), re-checking
    /// whether the row became infeasible.
    pub fn adjust_basic_row_constant(&mut self, registry: &VariableRegistry, basic: Variable, delta: f64) {
        let row = self.rows.get_mut(&basic).expect("adjust_basic_row_constant on a non-basic variable");
        row.constant += delta;
        if registry.is_restricted(basic) && row.constant < 0.0 && !near_zero(row.constant) {
            self.infeasible_rows.insert(basic);
        } else {
            self.infeasible_rows.remove(&basic);
        }
        if registry.is_external(basic) {
            self.updated_externals.insert(basic);
        }
    }

    /// Propagates a perturbation of a non-basic parameter `v` to every row
    /// that mentions it: `row.constant += coefficient_of(v) * delta`.
    pub fn apply_parameter_delta(&mut self, registry: &VariableRegistry, v: Variable, delta: f64) {
        if near_zero(delta) {
            return;
        }
        let dependents: Vec<Variable> = self.columns.get(&v).map(|s| s.iter().copied().collect()).unwrap_or_default();
        for basic in dependents {
            let coeff = self.rows.get(&basic).unwrap().coefficient_of(v);
            self.adjust_basic_row_constant(registry, basic, coeff * delta);
        }
    }

    /// Rebaselines a basic row's constant to zero, used when closing an
    /// edit batch to reset stay-constraint error variables so future
    /// edits measure their violation from the newly resolved position.
    pub fn reset_basic_constant(&mut self, registry: &VariableRegistry, v: Variable) {
        if let Some(row) = self.rows.get_mut(&v) {
            row.constant = 0.0;
        } else {
            return;
        }
        self.infeasible_rows.remove(&v);
        if registry.is_external(v) {
            self.updated_externals.insert(v);
        }
    }

    /// Adds a brand new term to an existing basic row without disturbing
    /// any other row (used to fold an error variable's strength-weighted
    /// contribution into the objective row after normalization, and to
    /// reverse it on `remove_constraint`).
    pub fn add_term_to_row(&mut self, subject: Variable, v: Variable, coeff: f64) {
        let had = {
            let row = self.rows.get(&subject).expect("add_term_to_row on non-basic subject");
            row.has_term(v)
        };
        let row = self.rows.get_mut(&subject).unwrap();
        row.add_variable(v, coeff);
        if !had && row.has_term(v) {
            self.note_added(v, subject);
        } else if had && !row.has_term(v) {
            self.note_removed(v, subject);
        }
    }

    /// Pivots `exit` out of the basis and `entry` in, rewriting `exit`'s
    /// former row in terms of `entry` and substituting that rewritten row
    /// into every other row that mentioned `entry` as a parameter.
    pub fn pivot(&mut self, registry: &VariableRegistry, entry: Variable, exit: Variable) {
        let mut expr = self.remove_row(exit).expect("pivot exit variable must be basic");
        expr.change_subject(exit, entry);
        self.substitute_out(registry, entry, &expr);
        self.add_row(registry, entry, expr);
    }
}
