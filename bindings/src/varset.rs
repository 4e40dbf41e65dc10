//! Equivalence classes over co-designating terms.

use im::HashSet;
use pocl_domain::{ObjectId, StepVar};

/// A term bound to a particular step: either a ground object, or a lifted
/// variable of a specific step instance.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BoundTerm {
    Constant(ObjectId),
    Var(StepVar),
}

impl From<StepVar> for BoundTerm {
    fn from(sv: StepVar) -> Self {
        BoundTerm::Var(sv)
    }
}

/// A connected component in the variable-codesignation graph.
///
/// Invariants, enforced by [`crate::Bindings::add`] rather than by this type
/// alone:
/// - `codesignating` and `non_codesignating` are disjoint,
/// - at most one constant,
/// - every codesignating variable's step-domain projection contains `constant`
///   when it is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Varset {
    pub constant: Option<ObjectId>,
    pub codesignating: HashSet<StepVar>,
    pub non_codesignating: HashSet<BoundTerm>,
}

impl Varset {
    pub fn singleton(v: StepVar) -> Self {
        Varset {
            constant: None,
            codesignating: HashSet::unit(v),
            non_codesignating: HashSet::new(),
        }
    }

    pub fn contains(&self, t: BoundTerm) -> bool {
        match t {
            BoundTerm::Constant(c) => self.constant == Some(c),
            BoundTerm::Var(v) => self.codesignating.contains(&v),
        }
    }
}
