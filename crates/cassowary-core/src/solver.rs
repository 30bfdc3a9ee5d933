//! The public facade wiring the variable registry, expression algebra,
//! tableau, normalizer, simplex core, and edit/stay controller together
//! (SPEC_FULL.md §2, §6). This is the crate's sole entry point; it carries
//! no layout-, DSL-, or presentation-specific logic of its own.

use tracing::{instrument, trace, warn};

use crate::constraint::{Constraint, ConstraintData, ConstraintTable, Relation};
use crate::edit::{delta_edit_constant, EditInfo, EditStack, StayInfo, StayTable};
use crate::error::SolverError;
use crate::expression::Expression;
use crate::normalize::{self, Subject};
use crate::simplex;
use crate::strength::Weight;
use crate::tableau::Tableau;
use crate::variable::{Variable, VariableRegistry};

/// An incremental Cassowary constraint solver.
///
/// `Solver` is a single-threaded, non-reentrant state machine: callers
/// must serialize access to one instance themselves (SPEC_FULL.md §5).
pub struct Solver {
    registry: VariableRegistry,
    constraints: ConstraintTable,
    tableau: Tableau,
    objective: Variable,
    edits: EditStack,
    stays: StayTable,
    needs_solving: bool,
    auto_solve: bool,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// A new solver with `auto_solve` enabled: every successful
    /// `add_constraint`/`add_stay`/`add_edit` immediately calls
    /// [`Solver::resolve`] before returning.
    pub fn new() -> Self {
        Self::with_auto_solve(true)
    }

    /// Like [`Solver::new`], but leaves re-solving up to explicit
    /// [`Solver::resolve`] calls, mirroring the teacher crate's
    /// builder-style knobs (`with_max_iterations`, `with_tolerance`)
    /// rather than a global configuration flag.
    pub fn with_auto_solve(auto_solve: bool) -> Self {
        let mut registry = VariableRegistry::new();
        let objective = registry.create_objective();
        let mut tableau = Tableau::new();
        tableau.add_row(&registry, objective, Expression::new(0.0));
        Self {
            registry,
            constraints: ConstraintTable::new(),
            tableau,
            objective,
            edits: EditStack::new(),
            stays: StayTable::new(),
            needs_solving: false,
            auto_solve,
        }
    }

    /// Creates a new client-visible variable with an initial value.
    pub fn create_variable(&mut self, name: Option<&str>, initial_value: f64) -> Variable {
        self.registry.create_external(name.map(str::to_owned), initial_value)
    }

    /// Builder seed for constructing expressions programmatically.
    pub fn create_expression(&self, constant: f64) -> Expression {
        Expression::new(constant)
    }

    /// Reads an external variable's last-resolved value.
    pub fn value(&self, var: Variable) -> f64 {
        self.registry.value(var)
    }

    pub fn has_edit_variable(&self, var: Variable) -> bool {
        self.edits.is_editing(var)
    }

    pub fn has_stay_variable(&self, var: Variable) -> bool {
        self.stays.has_variable(var)
    }

    /// Adds `var OP expr` at the given strength.
    #[instrument(skip(self, expr, strength))]
    pub fn add_constraint(
        &mut self,
        var: Variable,
        relation: Relation,
        expr: Expression,
        strength: impl Into<Weight>,
    ) -> Result<Constraint, SolverError> {
        let residual = residual_for(var, relation, &expr);
        self.add_constraint_internal(residual, relation, strength.into())
            .map(|(c, _)| c)
    }

    /// Adds a weak preference that `var` keeps its current value.
    pub fn add_stay(&mut self, var: Variable, strength: impl Into<Weight>) -> Result<Constraint, SolverError> {
        let strength = strength.into();
        if strength.is_required() {
            return Err(SolverError::InvalidEdit(format!(
                "{var} cannot be given a Required stay (it would pin the variable forever)"
            )));
        }
        let residual = stay_residual(&self.registry, var);
        let (c, error_vars) = self.add_constraint_internal(residual, Relation::Equal, strength)?;
        let eplus = error_vars[0];
        let eminus = error_vars[1];
        self.stays.insert(StayInfo {
            variable: var,
            constraint: c,
            eplus,
            eminus,
        });
        Ok(c)
    }

    /// Marks `var` as an edit target. Must be called while an edit batch
    /// is open ([`Solver::begin_edit`]); the edit constraint is released
    /// along with the rest of that batch's edits when the matching
    /// [`Solver::end_edit`] closes it.
    pub fn add_edit(&mut self, var: Variable, strength: impl Into<Weight>) -> Result<Constraint, SolverError> {
        if !self.edits.is_open() {
            return Err(SolverError::InvalidEdit(format!(
                "{var} has no open edit batch (call begin_edit first)"
            )));
        }
        let strength = strength.into();
        if strength.is_required() {
            // A required edit would normalize to a dummy-marker equality
            // with no eplus/eminus pair, leaving suggest_value nothing to
            // perturb; edit constraints always need a finite weight.
            return Err(SolverError::InvalidEdit(format!(
                "{var} cannot be edited at Required strength"
            )));
        }
        let value = self.registry.value(var);
        let residual = stay_residual(&self.registry, var);
        let (c, error_vars) = self.add_constraint_internal(residual, Relation::Equal, strength)?;
        let eplus = error_vars[0];
        let eminus = error_vars[1];
        self.edits.push(EditInfo {
            variable: var,
            constraint: c,
            eplus,
            eminus,
            prev_constant: value,
        });
        Ok(c)
    }

    /// Opens a new, possibly nested, edit batch.
    pub fn begin_edit(&mut self) {
        self.edits.begin_frame();
    }

    /// Within an open edit batch, proposes a new value for an edited
    /// variable, perturbing the tableau's constant column without
    /// rebuilding any row.
    pub fn suggest_value(&mut self, var: Variable, value: f64) -> Result<(), SolverError> {
        let (eplus, eminus, delta) = {
            let info = self
                .edits
                .find(var)
                .ok_or_else(|| SolverError::InvalidEdit(format!("{var} has no active edit constraint")))?;
            (info.eplus, info.eminus, value - info.prev_constant)
        };
        delta_edit_constant(&mut self.tableau, &self.registry, delta, eplus, eminus);
        self.edits.set_prev_constant(var, value);
        self.needs_solving = true;
        Ok(())
    }

    /// Runs dual optimization to restore feasibility, primal optimization
    /// to keep the objective optimal, and pushes refreshed values out to
    /// every external variable whose row changed.
    #[instrument(skip(self))]
    pub fn resolve(&mut self) -> Result<(), SolverError> {
        simplex::optimize(&mut self.tableau, &self.registry, self.objective).inspect_err(|err| {
            warn!(?err, "primal optimize failed during resolve");
        })?;
        simplex::dual_optimize(&mut self.tableau, &self.registry, self.objective).inspect_err(|err| {
            warn!(?err, "dual optimize failed during resolve");
        })?;
        self.set_external_variables();
        Ok(())
    }

    fn set_external_variables(&mut self) {
        for v in self.tableau.take_updated_externals() {
            let value = self.tableau.row(v).map(|r| r.constant).unwrap_or(0.0);
            self.registry.set_value(v, value);
            trace!(?v, value, "external variable refreshed");
        }
        self.needs_solving = false;
    }

    /// Closes the most recently opened edit batch: removes the edit
    /// constraints it introduced, restores feasibility, pushes updated
    /// values, and rebaselines every stay constraint's error variables to
    /// zero so later edits measure their violation from the new position.
    #[instrument(skip(self))]
    pub fn end_edit(&mut self) -> Result<(), SolverError> {
        if !self.edits.is_open() {
            return Err(SolverError::InvalidEdit("end_edit with no matching begin_edit".into()));
        }
        let closed = self.edits.end_frame();
        for info in closed {
            self.remove_constraint(info.constraint)?;
        }

        simplex::dual_optimize(&mut self.tableau, &self.registry, self.objective)?;
        self.set_external_variables();

        let stay_rows: Vec<Variable> = self.stays.iter().flat_map(|s| [s.eplus, s.eminus]).collect();
        for v in stay_rows {
            self.tableau.reset_basic_constant(&self.registry, v);
        }
        Ok(())
    }

    /// Removes a tracked constraint: drops the row owned by its dummy
    /// marker if required, or folds its error variables' contribution
    /// back out of the objective and pivots the marker out of the basis
    /// if non-required, before dropping the row and releasing its
    /// synthetic variables.
    #[instrument(skip(self))]
    pub fn remove_constraint(&mut self, c: Constraint) -> Result<(), SolverError> {
        let data = self.constraints.get(c).ok_or(SolverError::UnknownConstraint(c))?.clone();
        let marker = self.tableau.marker(c).ok_or(SolverError::UnknownConstraint(c))?;

        if !data.is_required() {
            let weight = data.strength.value();
            let error_vars: Vec<Variable> = self.tableau.error_vars(c).to_vec();
            for ev in error_vars {
                self.fold_error_var_out_of_objective(ev, weight);
            }
        }

        if !self.tableau.is_basic(marker) {
            // The marker is a parameter in some other row; pivot it into
            // the basis first so its own row can be dropped cleanly,
            // preferring the row with the largest |coefficient| on the
            // marker column to keep the pivot numerically well behaved.
            if let Some(exit) = self.largest_coefficient_row(marker) {
                self.tableau.pivot(&self.registry, marker, exit);
            }
        }

        if self.tableau.is_basic(marker) {
            self.tableau.remove_row(marker);
        } else {
            let zero = Expression::new(0.0);
            self.tableau.substitute_out(&self.registry, marker, &zero);
        }

        for ev in self.tableau.take_error_vars(c) {
            self.registry.release(ev);
        }
        self.tableau.take_marker(c);
        self.registry.release(marker);
        self.stays.remove(c);
        self.constraints.remove(c);
        self.needs_solving = true;
        Ok(())
    }

    /// Removes `weight * ev`'s contribution from the objective row. If `ev`
    /// became basic at some point in its life (it was chosen as some row's
    /// subject), it no longer appears as a raw term in the objective —
    /// tableau invariant I1 forbids that — so its defining row is folded in
    /// wholesale instead of just dropping a term.
    fn fold_error_var_out_of_objective(&mut self, ev: Variable, weight: f64) {
        if let Some(row) = self.tableau.row(ev).cloned() {
            let mut merged = self.tableau.row(self.objective).cloned().unwrap();
            merged.add_expression(&row, -weight);
            self.tableau.remove_row(self.objective);
            self.tableau.add_row(&self.registry, self.objective, merged);
        } else {
            self.tableau.add_term_to_row(self.objective, ev, -weight);
        }
    }

    fn largest_coefficient_row(&self, marker: Variable) -> Option<Variable> {
        self.tableau
            .basic_variables()
            .filter_map(|b| {
                let c = self.tableau.row(b)?.coefficient_of(marker);
                (c != 0.0).then_some((b, c.abs()))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(b, _)| b)
    }

    fn add_constraint_internal(
        &mut self,
        residual: Expression,
        relation: Relation,
        strength: Weight,
    ) -> Result<(Constraint, Vec<Variable>), SolverError> {
        // Stage every mutation on local clones; nothing is committed to
        // `self` until normalization and subject selection both succeed,
        // so a failed attempt never mutates the live tableau (SPEC_FULL.md §5).
        let mut registry = self.registry.clone();
        let mut tableau = self.tableau.clone();

        let normalized = normalize::normalize(&mut registry, &tableau, &residual, relation, strength);
        let mut expr = normalized.expr;

        // Error variables are brand new (never basic yet), so folding their
        // weighted contribution into the objective now, before a subject is
        // chosen, is always a plain term insertion. Doing this first matters:
        // if `choose_subject` goes on to pick one of these error variables as
        // the new row's subject, `insert_row_for_subject`'s `substitute_out`
        // will correctly rewrite the objective's now-stale term into the
        // error variable's defining row.
        if !strength.is_required() {
            for &ev in &normalized.error_vars {
                tableau.add_term_to_row(self.objective, ev, strength.value());
            }
        }

        let subject = normalize::choose_subject(
            &registry,
            &tableau,
            self.objective,
            &expr,
            strength.is_required(),
        )?;

        match subject {
            Subject::Direct(s) => insert_row_for_subject(&mut tableau, &registry, s, expr),
            Subject::DummyNeedsFlip(s) => {
                expr.scale(-1.0);
                insert_row_for_subject(&mut tableau, &registry, s, expr);
            }
            Subject::Artificial => {
                simplex::add_with_artificial_variable(&mut tableau, &mut registry, &expr)?;
            }
        }

        let mut constraints = self.constraints.clone();
        let c = constraints.insert(ConstraintData {
            residual,
            relation,
            strength,
        });
        tableau.set_marker(c, normalized.marker);
        for &ev in &normalized.error_vars {
            tableau.push_error_var(c, ev);
        }

        self.registry = registry;
        self.tableau = tableau;
        self.constraints = constraints;
        self.needs_solving = true;

        if self.auto_solve {
            self.resolve()?;
        }

        Ok((c, normalized.error_vars))
    }
}

fn insert_row_for_subject(tableau: &mut Tableau, registry: &VariableRegistry, subject: Variable, mut expr: Expression) {
    expr.new_subject(subject);
    if tableau.has_column(subject) {
        tableau.substitute_out(registry, subject, &expr);
    }
    tableau.add_row(registry, subject, expr);
}

/// `lhs - rhs` for `>=`/`=`, `rhs - lhs` for `<=`, matching the convention
/// that the injected slack always subtracts (SPEC_FULL.md §4.3).
fn residual_for(var: Variable, relation: Relation, expr: &Expression) -> Expression {
    let lhs = Expression::from_variable(var);
    match relation {
        Relation::GreaterOrEqual | Relation::Equal => {
            let mut residual = lhs;
            residual.add_expression(expr, -1.0);
            residual
        }
        Relation::LessOrEqual => {
            let mut residual = expr.clone();
            residual.add_expression(&lhs, -1.0);
            residual
        }
    }
}

fn stay_residual(registry: &VariableRegistry, var: Variable) -> Expression {
    let mut residual = Expression::new(-registry.value(var));
    residual.add_variable(var, 1.0);
    residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strength::Strength;

    #[test]
    fn required_equality_pulls_both_variables_together() {
        let mut solver = Solver::new();
        let x = solver.create_variable(Some("x"), 10.0);
        let y = solver.create_variable(Some("y"), 0.0);

        let expr = solver.create_expression(0.0);
        let mut rhs = expr;
        rhs.add_variable(y, 1.0);
        solver.add_constraint(x, Relation::Equal, rhs, Strength::Required).unwrap();

        assert!((solver.value(x) - solver.value(y)).abs() < 1e-6);
    }

    #[test]
    fn stay_holds_variables_at_their_initial_value() {
        let mut solver = Solver::new();
        let x = solver.create_variable(None, 5.0);
        let y = solver.create_variable(None, 10.0);

        solver.add_stay(x, Strength::Weak).unwrap();
        solver.add_stay(y, Strength::Weak).unwrap();

        assert!((solver.value(x) - 5.0).abs() < 1e-6);
        assert!((solver.value(y) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn inequality_clamps_to_the_constant_bound() {
        let mut solver = Solver::new();
        let x = solver.create_variable(None, 10.0);
        let bound = solver.create_expression(100.0);
        solver.add_constraint(x, Relation::GreaterOrEqual, bound, Strength::Required).unwrap();

        assert!((solver.value(x) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn edit_suggest_moves_both_required_equal_variables() {
        let mut solver = Solver::new();
        let a = solver.create_variable(Some("a"), 0.0);
        let b = solver.create_variable(Some("b"), 0.0);

        solver.add_stay(a, Strength::Strong).unwrap();
        let rhs = {
            let mut e = solver.create_expression(0.0);
            e.add_variable(b, 1.0);
            e
        };
        solver.add_constraint(a, Relation::Equal, rhs, Strength::Required).unwrap();

        solver.begin_edit();
        solver.add_edit(a, Strength::Strong).unwrap();
        solver.suggest_value(a, 2.0).unwrap();
        solver.resolve().unwrap();
        assert!((solver.value(a) - 2.0).abs() < 1e-6);
        assert!((solver.value(b) - 2.0).abs() < 1e-6);

        solver.suggest_value(a, 10.0).unwrap();
        solver.resolve().unwrap();
        assert!((solver.value(a) - 10.0).abs() < 1e-6);
        assert!((solver.value(b) - 10.0).abs() < 1e-6);

        solver.end_edit().unwrap();
    }

    #[test]
    fn remove_constraint_rejects_unknown_handle() {
        let mut solver = Solver::new();
        let x = solver.create_variable(None, 0.0);
        let c = solver.add_stay(x, Strength::Weak).unwrap();
        solver.remove_constraint(c).unwrap();
        assert_eq!(solver.remove_constraint(c), Err(SolverError::UnknownConstraint(c)));
    }
}
