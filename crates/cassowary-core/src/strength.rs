//! Constraint strength levels and their projection onto a single `f64`
//! weight used in the objective row (§4.3).

/// How strongly a non-required constraint should be honored.
///
/// `Required` is not a weight at all: its error variables do not exist, it
/// is enforced as a hard constraint (§4.3). The three soft levels are
/// projected onto widely separated `f64` weights so that no realistic
/// accumulation of a weaker level's error can be mistaken for a stronger
/// one in working precision (SPEC_FULL.md §4.3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strength {
    Required,
    Strong,
    Medium,
    Weak,
}

/// Weak and Medium are separated by 10^3 here but Medium/Strong and
/// Strong/Required are separated by 10^6, matching the classic Cassowary
/// weighting and giving ample headroom given the variable counts this
/// solver is expected to carry.
const WEAK_WEIGHT: f64 = 1.0;
const MEDIUM_WEIGHT: f64 = 1_000.0;
const STRONG_WEIGHT: f64 = 1_000_000.0;
const REQUIRED_WEIGHT: f64 = 1_001_001_000.0;

impl Strength {
    pub fn weight(self) -> f64 {
        match self {
            Strength::Required => REQUIRED_WEIGHT,
            Strength::Strong => STRONG_WEIGHT,
            Strength::Medium => MEDIUM_WEIGHT,
            Strength::Weak => WEAK_WEIGHT,
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, Strength::Required)
    }

    /// Builds a strength from a raw weight, clamping to [`Strength::Required`]
    /// if the weight meets or exceeds it. Used when a caller wants a custom
    /// weight between the named levels; represented internally as `Medium`
    /// or `Strong` scaled by the caller (see [`Weight`]).
    pub fn from_weight(weight: f64) -> Weight {
        if weight >= REQUIRED_WEIGHT {
            Weight::Required
        } else {
            Weight::Custom(weight)
        }
    }
}

/// The resolved objective-row weight for a constraint: either the hard
/// `Required` sentinel or a finite custom weight (which may come from one
/// of the four named [`Strength`] levels or an arbitrary in-between value).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Required,
    Custom(f64),
}

impl From<Strength> for Weight {
    fn from(s: Strength) -> Self {
        match s {
            Strength::Required => Weight::Required,
            other => Weight::Custom(other.weight()),
        }
    }
}

impl Weight {
    pub fn is_required(self) -> bool {
        matches!(self, Weight::Required)
    }

    pub fn value(self) -> f64 {
        match self {
            Weight::Required => REQUIRED_WEIGHT,
            Weight::Custom(w) => w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_separated_by_at_least_1e6() {
        assert!(Strength::Strong.weight() / Strength::Medium.weight() >= 1e3);
        assert!(Strength::Required.weight() / Strength::Strong.weight() >= 1e3);
        assert!(Strength::Medium.weight() / Strength::Weak.weight() >= 1e3);
    }

    #[test]
    fn required_is_not_a_finite_weight_competitor() {
        // No finite sum of weak errors should be able to look like a
        // required constraint's sentinel weight.
        let huge_weak_sum = Strength::Weak.weight() * 1_000_000.0;
        assert!(huge_weak_sum < Strength::Strong.weight());
    }

    #[test]
    fn from_weight_clamps_at_required() {
        assert_eq!(Strength::from_weight(REQUIRED_WEIGHT * 2.0), Weight::Required);
        assert_eq!(Strength::from_weight(5.0), Weight::Custom(5.0));
    }
}
