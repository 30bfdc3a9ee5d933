//! Turns a constraint's residual expression into a tableau row: injects
//! slack/dummy/error variables per the relation and strength, then picks a
//! subject to solve the row for — falling back to a dummy marker, and
//! ultimately to the artificial-variable phase, when no natural subject
//! exists (SPEC_FULL.md §4.3, §4.6; grounded on
//! `simplex_solver_normalize_expression` and
//! `simplex_solver_choose_subject` in `emeus-simplex-solver.c`).

use crate::constraint::Relation;
use crate::error::SolverError;
use crate::expression::{near_zero, Expression};
use crate::strength::Weight;
use crate::tableau::Tableau;
use crate::variable::{VarKind, Variable, VariableRegistry};

/// The row-ready expression produced by normalization, plus the synthetic
/// variables it introduced so the caller can record them against the
/// constraint's bookkeeping.
pub(crate) struct Normalized {
    pub expr: Expression,
    pub marker: Variable,
    pub error_vars: Vec<Variable>,
}

/// Replaces every term of `expr` that names a currently-basic variable with
/// that variable's defining row (scaled by the term's coefficient). A
/// residual built from a caller-supplied expression may reference a
/// variable that has since become basic through some other constraint;
/// inserting it as a fresh row's term would violate invariant I1 (no basic
/// variable ever appears on a row's right-hand side). One pass suffices:
/// by I1, a basic variable's own row never itself names another basic
/// variable, so substituting cannot uncover a further basic term.
fn substitute_basic_terms(tableau: &Tableau, expr: &mut Expression) {
    let basic_terms: Vec<Variable> = expr.terms().filter(|&(v, _)| tableau.is_basic(v)).map(|(v, _)| v).collect();
    for v in basic_terms {
        if let Some(row) = tableau.row(v).cloned() {
            expr.substitute_out(v, &row);
        }
    }
}

/// Rewrites `residual <relation> 0` into an expression with slack/error
/// terms added so it can be read as `subject = expr` for some subject
/// chosen later. Does not yet choose or solve for a subject.
pub(crate) fn normalize(
    registry: &mut VariableRegistry,
    tableau: &Tableau,
    residual: &Expression,
    relation: Relation,
    strength: Weight,
) -> Normalized {
    let mut expr = residual.clone();
    substitute_basic_terms(tableau, &mut expr);
    let mut error_vars = Vec::new();

    match relation {
        Relation::LessOrEqual | Relation::GreaterOrEqual => {
            // The sign is the same for both directions because callers
            // construct the residual as `lhs - rhs` for >= and `rhs - lhs`
            // for <=, so the slack always subtracts.
            let slack = registry.create_slack();
            expr.set_coefficient(slack, -1.0);

            if !strength.is_required() {
                let eminus = registry.create_slack();
                expr.set_coefficient(eminus, 1.0);
                error_vars.push(eminus);
            }
            Normalized {
                expr,
                marker: slack,
                error_vars,
            }
        }
        Relation::Equal => {
            if strength.is_required() {
                let dummy = registry.create_dummy();
                expr.set_coefficient(dummy, 1.0);
                Normalized {
                    expr,
                    marker: dummy,
                    error_vars,
                }
            } else {
                let eplus = registry.create_slack();
                let eminus = registry.create_slack();
                expr.set_coefficient(eplus, -1.0);
                expr.set_coefficient(eminus, 1.0);
                error_vars.push(eplus);
                error_vars.push(eminus);
                Normalized {
                    expr,
                    marker: eplus,
                    error_vars,
                }
            }
        }
    }
}

/// What `choose_subject` decided.
pub(crate) enum Subject {
    /// Solve the row for this variable directly.
    Direct(Variable),
    /// Solve the row for this dummy marker, but flip the expression's sign
    /// first so the dummy ends up with coefficient +1.
    DummyNeedsFlip(Variable),
    /// No natural subject; enter the artificial-variable phase (§4.6 step 4).
    Artificial,
}

/// Picks a variable to solve the normalized expression for.
///
/// First pass: an unrestricted (external) variable not yet basic is
/// preferred outright; failing that, a restricted non-dummy (slack)
/// variable with a negative coefficient whose column is empty or touches
/// only the objective row. Second pass, only reached if every remaining
/// term is a dummy: the first dummy not yet basic, flipping the
/// expression's sign first if its coefficient came out positive. A
/// required constraint whose constant is non-zero with no non-dummy
/// candidate is unsatisfiable outright, without ever reaching the
/// artificial-variable phase.
pub(crate) fn choose_subject(
    registry: &VariableRegistry,
    tableau: &Tableau,
    objective: Variable,
    expr: &Expression,
    is_required: bool,
) -> Result<Subject, SolverError> {
    for (v, _) in expr.terms() {
        if registry.is_external(v) && !tableau.is_basic(v) {
            return Ok(Subject::Direct(v));
        }
    }

    let mut candidates: Vec<(Variable, f64)> = expr.terms().collect();
    candidates.sort_by_key(|(v, _)| *v);

    for &(v, c) in &candidates {
        if registry.kind(v) == VarKind::Slack
            && c < 0.0
            && !tableau.is_basic(v)
            && tableau.column_is_trivial(v, objective)
        {
            return Ok(Subject::Direct(v));
        }
    }

    for &(v, c) in &candidates {
        if registry.kind(v) == VarKind::Dummy && !tableau.is_basic(v) {
            if near_zero(expr.constant) {
                return Ok(Subject::Direct(v));
            }
            return if is_required {
                if c > 0.0 {
                    Ok(Subject::DummyNeedsFlip(v))
                } else {
                    Ok(Subject::Direct(v))
                }
            } else {
                Ok(Subject::Artificial)
            };
        }
    }

    if is_required && !near_zero(expr.constant) {
        return Err(SolverError::Unsatisfiable);
    }

    Ok(Subject::Artificial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_inequality_adds_only_a_slack() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let mut residual = Expression::new(-5.0);
        residual.add_variable(x, 1.0);

        let tableau = Tableau::new();
        let normalized = normalize(&mut reg, &tableau, &residual, Relation::GreaterOrEqual, Weight::Required);
        assert!(normalized.error_vars.is_empty());
        assert_eq!(normalized.expr.coefficient_of(normalized.marker), -1.0);
    }

    #[test]
    fn weak_inequality_adds_an_error_variable() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let mut residual = Expression::new(-5.0);
        residual.add_variable(x, 1.0);

        let tableau = Tableau::new();
        let normalized = normalize(&mut reg, &tableau, &residual, Relation::LessOrEqual, Weight::Custom(1.0));
        assert_eq!(normalized.error_vars.len(), 1);
    }

    #[test]
    fn normalize_substitutes_an_already_basic_term() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let y = reg.create_external(None, 0.0);
        let mut tableau = Tableau::new();
        // y is basic: y = 3 (x does not appear in y's own row).
        tableau.add_row(&reg, y, Expression::new(3.0));

        let mut residual = Expression::new(0.0);
        residual.add_variable(x, 1.0);
        residual.add_variable(y, -1.0);

        let normalized = normalize(&mut reg, &tableau, &residual, Relation::Equal, Weight::Required);
        assert!(!normalized.expr.has_term(y));
        assert_eq!(normalized.expr.constant, -3.0);
    }

    #[test]
    fn required_equality_adds_a_dummy_marker() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let mut residual = Expression::new(0.0);
        residual.add_variable(x, 1.0);

        let tableau = Tableau::new();
        let normalized = normalize(&mut reg, &tableau, &residual, Relation::Equal, Weight::Required);
        assert!(reg.is_dummy(normalized.marker));
        assert!(normalized.error_vars.is_empty());
    }

    #[test]
    fn choose_subject_prefers_non_basic_external() {
        let mut reg = VariableRegistry::new();
        let x = reg.create_external(None, 0.0);
        let slack = reg.create_slack();
        let obj = reg.create_objective();
        let tableau = Tableau::new();

        let mut expr = Expression::new(0.0);
        expr.add_variable(x, 1.0);
        expr.add_variable(slack, 1.0);

        match choose_subject(&reg, &tableau, obj, &expr, true) {
            Ok(Subject::Direct(v)) => assert_eq!(v, x),
            _ => panic!("expected a direct external subject"),
        }
    }

    #[test]
    fn choose_subject_falls_back_to_dummy_with_zero_constant() {
        let mut reg = VariableRegistry::new();
        let dummy = reg.create_dummy();
        let obj = reg.create_objective();
        let tableau = Tableau::new();

        let mut expr = Expression::new(0.0);
        expr.add_variable(dummy, 1.0);

        match choose_subject(&reg, &tableau, obj, &expr, true) {
            Ok(Subject::Direct(v)) => assert_eq!(v, dummy),
            _ => panic!("expected the dummy to be picked directly"),
        }
    }

    #[test]
    fn choose_subject_is_unsatisfiable_with_no_candidate_and_nonzero_constant() {
        let mut reg = VariableRegistry::new();
        let obj = reg.create_objective();
        let tableau = Tableau::new();

        let expr = Expression::new(3.0);
        match choose_subject(&reg, &tableau, obj, &expr, true) {
            Err(SolverError::Unsatisfiable) => {}
            _ => panic!("expected Unsatisfiable"),
        }
    }
}
