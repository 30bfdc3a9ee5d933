//! Constraint handles and the bookkeeping record they refer to.

use std::fmt;

use crate::expression::Expression;
use crate::strength::Weight;

/// Comparison operator a constraint enforces between its residual
/// expression and zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relation {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

/// Opaque handle to a constraint tracked by a
/// [`Solver`](crate::solver::Solver).
///
/// The reference implementation reference-counts constraints so that a
/// client can retain a handle past the point the solver itself has dropped
/// it; this port instead makes the solver the sole owner of the
/// bookkeeping record and hands clients a `Copy` integer token (§3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint(u32);

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// The solver-owned record behind a [`Constraint`] handle.
#[derive(Debug, Clone)]
pub(crate) struct ConstraintData {
    /// `lhs - rhs`, before slack/error/dummy variables are added.
    pub residual: Expression,
    pub relation: Relation,
    pub strength: Weight,
}

impl ConstraintData {
    pub fn is_required(&self) -> bool {
        self.strength.is_required()
    }
}

/// Issues [`Constraint`] handles and stores their records.
#[derive(Default, Clone)]
pub(crate) struct ConstraintTable {
    entries: Vec<Option<ConstraintData>>,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, data: ConstraintData) -> Constraint {
        let id = self.entries.len() as u32;
        self.entries.push(Some(data));
        Constraint(id)
    }

    pub fn get(&self, c: Constraint) -> Option<&ConstraintData> {
        self.entries.get(c.0 as usize).and_then(|e| e.as_ref())
    }

    /// Removes and returns the record, freeing the slot for bookkeeping
    /// purposes (the id itself is never reused).
    pub fn remove(&mut self, c: Constraint) -> Option<ConstraintData> {
        self.entries.get_mut(c.0 as usize).and_then(|e| e.take())
    }

    pub fn contains(&self, c: Constraint) -> bool {
        self.get(c).is_some()
    }
}
