//! Edit-variable and stay-variable bookkeeping: nested `begin_edit` /
//! `end_edit` batches and the delta propagation `suggest_value` needs
//! (SPEC_FULL.md §4.7; grounded on the `EditInfo` struct and
//! `simplex_solver_delta_edit_constant` /
//! `simplex_solver_reset_stay_constraints` in `emeus-simplex-solver.c`).

use crate::constraint::Constraint;
use crate::tableau::Tableau;
use crate::variable::{Variable, VariableRegistry};

/// One edited external variable's bookkeeping: the synthetic edit
/// constraint tying it to a movable target, the plus/minus error variables
/// that constraint introduced, and the constant the edit constraint had
/// before the batch that is currently suggesting values for it opened.
pub(crate) struct EditInfo {
    pub variable: Variable,
    pub constraint: Constraint,
    pub eplus: Variable,
    pub eminus: Variable,
    pub prev_constant: f64,
}

/// A stack of edit batches. `begin_edit` opens a new frame; `suggest_value`
/// only ever affects variables added since the most recently opened frame
/// still open; `end_edit` closes and drains exactly that frame. Nesting is
/// supported because a frame is just a slice boundary into `infos`, so an
/// inner `begin_edit`/`end_edit` pair can come and go without disturbing an
/// outer one.
#[derive(Default)]
pub(crate) struct EditStack {
    frames: Vec<usize>,
    infos: Vec<EditInfo>,
}

impl EditStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.frames.push(self.infos.len());
    }

    pub fn is_open(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn push(&mut self, info: EditInfo) {
        self.infos.push(info);
    }

    /// Closes the most recently opened frame and drains its edits in the
    /// order they were added, for the caller to remove their constraints.
    pub fn end_frame(&mut self) -> Vec<EditInfo> {
        let start = self.frames.pop().unwrap_or(0);
        self.infos.split_off(start)
    }

    /// Finds the open edit bookkeeping for `variable`, most recent first
    /// (a variable edited again in a nested frame shadows the outer one).
    pub fn find(&self, variable: Variable) -> Option<&EditInfo> {
        self.infos.iter().rev().find(|info| info.variable == variable)
    }

    pub fn is_editing(&self, variable: Variable) -> bool {
        self.find(variable).is_some()
    }

    /// Updates the baseline constant recorded against `variable`'s
    /// innermost open edit bookkeeping, called after `suggest_value`
    /// applies a delta against the previous baseline.
    pub fn set_prev_constant(&mut self, variable: Variable, value: f64) {
        if let Some(info) = self.infos.iter_mut().rev().find(|info| info.variable == variable) {
            info.prev_constant = value;
        }
    }
}

pub(crate) struct StayInfo {
    pub variable: Variable,
    pub constraint: Constraint,
    pub eplus: Variable,
    pub eminus: Variable,
}

/// Table of variables currently held at their last resolved value by a
/// (possibly weak) stay constraint, for `has_stay_variable` and for
/// rebaselining their error variables to zero once an edit batch closes.
#[derive(Default)]
pub(crate) struct StayTable {
    entries: Vec<StayInfo>,
}

impl StayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: StayInfo) {
        self.entries.push(info);
    }

    pub fn remove(&mut self, constraint: Constraint) {
        self.entries.retain(|info| info.constraint != constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StayInfo> {
        self.entries.iter()
    }

    pub fn has_variable(&self, variable: Variable) -> bool {
        self.entries.iter().any(|info| info.variable == variable)
    }
}

/// Propagates a perturbation of `delta` applied as `eplus -= delta` /
/// `eminus += delta` (the edit constraint reads `variable - eplus + eminus
/// = target`, so increasing the suggested target by `delta` increases
/// `eplus` by that much) to the tableau's constant column, leaving rows
/// that become infeasible for the caller's subsequent dual optimize pass
/// to resolve.
pub(crate) fn delta_edit_constant(tableau: &mut Tableau, registry: &VariableRegistry, delta: f64, eplus: Variable, eminus: Variable) {
    if tableau.is_basic(eplus) {
        tableau.adjust_basic_row_constant(registry, eplus, delta);
        return;
    }
    if tableau.is_basic(eminus) {
        tableau.adjust_basic_row_constant(registry, eminus, -delta);
        return;
    }
    tableau.apply_parameter_delta(registry, eplus, delta);
    tableau.apply_parameter_delta(registry, eminus, -delta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::variable::VariableRegistry;

    fn fake_constraint(id: u32) -> Constraint {
        // Constraint has no public constructor outside constraint.rs; tests
        // in this module only need distinct, comparable tokens, which the
        // crate-visible ConstraintTable provides.
        let mut table = crate::constraint::ConstraintTable::new();
        for _ in 0..id {
            table.insert(crate::constraint::ConstraintData {
                residual: Expression::new(0.0),
                relation: crate::constraint::Relation::Equal,
                strength: crate::strength::Weight::Required,
            });
        }
        table.insert(crate::constraint::ConstraintData {
            residual: Expression::new(0.0),
            relation: crate::constraint::Relation::Equal,
            strength: crate::strength::Weight::Required,
        })
    }

    #[test]
    fn nested_frames_only_drain_their_own_edits() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let y = reg.create_external(None, 0.0);
        let mut stack = EditStack::new();

        stack.begin_frame();
        stack.push(EditInfo {
            variable: x,
            constraint: fake_constraint(0),
            eplus: reg.create_slack(),
            eminus: reg.create_slack(),
            prev_constant: 0.0,
        });

        stack.begin_frame();
        stack.push(EditInfo {
            variable: y,
            constraint: fake_constraint(1),
            eplus: reg.create_slack(),
            eminus: reg.create_slack(),
            prev_constant: 0.0,
        });

        let inner = stack.end_frame();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].variable, y);
        assert!(stack.is_editing(x));
        assert!(!stack.is_editing(y));

        let outer = stack.end_frame();
        assert_eq!(outer.len(), 1);
        assert!(!stack.is_open());
    }

    #[test]
    fn stay_table_tracks_membership() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let mut stays = StayTable::new();
        let c = fake_constraint(0);
        stays.insert(StayInfo {
            variable: x,
            constraint: c,
            eplus: reg.create_slack(),
            eminus: reg.create_slack(),
        });
        assert!(stays.has_variable(x));
        stays.remove(c);
        assert!(!stays.has_variable(x));
    }

    #[test]
    fn delta_edit_constant_updates_basic_eplus_row() {
        let mut reg = VariableRegistry::new();
        let eplus = reg.create_slack();
        let eminus = reg.create_slack();
        let mut tableau = Tableau::new();
        tableau.add_row(&reg, eplus, Expression::new(5.0));

        delta_edit_constant(&mut tableau, &reg, 2.0, eplus, eminus);
        assert_eq!(tableau.row(eplus).unwrap().constant, 7.0);
    }
}
