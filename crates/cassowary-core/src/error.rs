//! Error taxonomy for the solver's public operations (SPEC_FULL.md §7).

use thiserror::Error;

use crate::constraint::Constraint;

/// Failure modes a [`Solver`](crate::solver::Solver) can report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// Adding a required constraint would make the system infeasible.
    /// The solver's bookkeeping is left exactly as it was before the
    /// attempt (§5 transactional staging).
    #[error("adding the constraint would make the system unsatisfiable")]
    Unsatisfiable,

    /// The objective row has a pivotable entering column but no row can
    /// ever leave it: the feasible region is unbounded in that direction.
    #[error("the optimization is unbounded")]
    Unbounded,

    /// `suggest_value` or `end_edit` was called for a variable with no
    /// open edit batch (or while none is open at all).
    #[error("variable {0} has no open edit")]
    InvalidEdit(String),

    /// A constraint handle was presented to an operation after it had
    /// already been removed, or was never produced by this solver.
    #[error("constraint {0} is not tracked by this solver")]
    UnknownConstraint(Constraint),

    /// A tableau invariant (I1-I5, SPEC_FULL.md §4.2) was violated. This
    /// indicates a bug in the solver itself rather than a caller mistake;
    /// debug builds additionally `debug_assert!` on these invariants so
    /// this variant should only ever surface in release builds.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
