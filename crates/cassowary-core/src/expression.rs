//! Sparse linear expression algebra: `constant + sum(coefficient * variable)`.

use std::collections::HashMap;

use crate::variable::{VarKind, Variable, VariableRegistry};

/// Tolerance used for all "is this zero" / "are these equal" comparisons
/// against floating point quantities in the solver (§4.1).
pub const APPROX_EPS: f64 = 1e-8;

/// Returns true when `value` is within [`APPROX_EPS`] of zero.
pub fn near_zero(value: f64) -> bool {
    value.abs() < APPROX_EPS
}

/// Returns true when `a` and `b` are within [`APPROX_EPS`] of each other.
pub fn approx_eq(a: f64, b: f64) -> bool {
    near_zero(a - b)
}

/// `constant + sum(coefficient * variable)`.
///
/// Terms with a coefficient whose absolute value drops below
/// [`APPROX_EPS`] are pruned on write, so the map never holds an
/// exact-zero (or near-zero) entry.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expression {
    pub constant: f64,
    terms: HashMap<Variable, f64>,
}

impl Expression {
    pub fn new(constant: f64) -> Self {
        Self {
            constant,
            terms: HashMap::new(),
        }
    }

    pub fn from_variable(v: Variable) -> Self {
        let mut terms = HashMap::new();
        terms.insert(v, 1.0);
        Self { constant: 0.0, terms }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn coefficient_of(&self, v: Variable) -> f64 {
        self.terms.get(&v).copied().unwrap_or(0.0)
    }

    pub fn has_term(&self, v: Variable) -> bool {
        self.terms.contains_key(&v)
    }

    pub fn terms(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.terms.iter().map(|(&v, &c)| (v, c))
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Inserts or overwrites the coefficient of `v`; removes the term if
    /// the new coefficient is near zero.
    pub fn set_coefficient(&mut self, v: Variable, c: f64) {
        if near_zero(c) {
            self.terms.remove(&v);
        } else {
            self.terms.insert(v, c);
        }
    }

    pub fn remove_variable(&mut self, v: Variable) {
        self.terms.remove(&v);
    }

    /// Fused add-then-prune: if `v` is already present with coefficient
    /// `c0`, the new coefficient is `c0 + c`, pruned on near-zero.
    pub fn add_variable(&mut self, v: Variable, c: f64) {
        if near_zero(c) {
            return;
        }
        let entry = self.terms.entry(v).or_insert(0.0);
        *entry += c;
        if near_zero(*entry) {
            self.terms.remove(&v);
        }
    }

    /// `self += other * multiplier` (both constant and every term).
    pub fn add_expression(&mut self, other: &Expression, multiplier: f64) {
        self.constant += other.constant * multiplier;
        for (&v, &c) in &other.terms {
            self.add_variable(v, c * multiplier);
        }
    }

    /// Multiplies constant and every coefficient by `f`. A zero factor
    /// collapses the expression to the zero expression.
    pub fn scale(&mut self, f: f64) {
        if f == 0.0 {
            self.constant = 0.0;
            self.terms.clear();
            return;
        }
        self.constant *= f;
        for c in self.terms.values_mut() {
            *c *= f;
        }
    }

    /// Removes `v` and adds `replacement` scaled by `v`'s former
    /// coefficient in its place.
    pub fn substitute_out(&mut self, v: Variable, replacement: &Expression) {
        if let Some(c) = self.terms.remove(&v) {
            self.add_expression(replacement, c);
        }
    }

    /// Solves the expression for `new_subject`, which must currently
    /// appear with non-zero coefficient, given that the expression used to
    /// be subject-less (i.e. defines a brand new row): divide by
    /// `-coefficient_of(new_subject)` and drop `new_subject`.
    pub fn new_subject(&mut self, new_subject: Variable) {
        let c = self.terms.remove(&new_subject).unwrap_or(0.0);
        debug_assert!(!near_zero(c), "new_subject on a variable with ~0 coefficient");
        self.scale(-1.0 / c);
    }

    /// Solves the expression for `new_subject` given that `old_subject` was
    /// its previous subject (i.e. rewrites a row being re-pivoted): divide
    /// by `-coefficient_of(new_subject)`, then set `old_subject`'s
    /// coefficient to `1 / (-c_new)` so the row stays consistent, and drop
    /// `new_subject` from the terms.
    pub fn change_subject(&mut self, old_subject: Variable, new_subject: Variable) {
        let c_new = self.coefficient_of(new_subject);
        debug_assert!(!near_zero(c_new), "change_subject on a variable with ~0 coefficient");
        let reciprocal = 1.0 / (-c_new);
        self.terms.remove(&new_subject);
        self.scale(reciprocal);
        self.set_coefficient(old_subject, reciprocal);
    }

    /// Returns any pivotable (slack-kind) term, or `None`.
    pub fn pick_pivotable(&self, registry: &VariableRegistry) -> Option<Variable> {
        self.terms
            .keys()
            .find(|&&v| registry.kind(v) == VarKind::Slack)
            .copied()
    }
}
