//! An incremental implementation of the Cassowary linear-arithmetic
//! constraint solving algorithm (Badros & Borning, 2001).
//!
//! The public surface is deliberately small: create variables with
//! [`Solver::create_variable`], build [`Expression`]s out of them, attach
//! constraints and stays at a [`Strength`], and read back resolved values.
//! Everything else — the tableau, the simplex core, the normalizer — is
//! internal machinery.
//!
//! ```
//! use cassowary_core::{Relation, Solver, Strength};
//!
//! let mut solver = Solver::new();
//! let width = solver.create_variable(Some("width"), 0.0);
//! let right_edge = solver.create_variable(Some("right_edge"), 0.0);
//!
//! solver.add_stay(width, Strength::Weak).unwrap();
//! let bound = solver.create_expression(100.0);
//! solver.add_constraint(right_edge, Relation::LessOrEqual, bound, Strength::Required).unwrap();
//!
//! assert!(solver.value(right_edge) <= 100.0);
//! ```

mod constraint;
mod edit;
mod error;
mod expression;
mod normalize;
mod simplex;
mod solver;
mod strength;
mod tableau;
mod variable;

pub use constraint::{Constraint, Relation};
pub use error::SolverError;
pub use expression::{Expression, APPROX_EPS};
pub use solver::Solver;
pub use strength::{Strength, Weight};
pub use variable::Variable;
