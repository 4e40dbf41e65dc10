//! The assembled domain+problem the refinement engine treats as given.

use crate::action::{ActionId, ActionTable};
use crate::formula::{Formula, Literal};
use crate::predicates::PredicateTable;
use crate::terms::TermTable;
use crate::types::TypeTable;

pub struct Problem {
    pub name: String,
    pub types: TypeTable,
    pub predicates: PredicateTable,
    pub terms: TermTable,
    pub actions: ActionTable,
    /// Ground positive atoms true in the initial state. Anything not listed
    /// is false by the closed-world assumption.
    pub initial: Vec<Literal>,
    pub goal: Formula,
    /// Minimum separation enforced between any two ordered steps (`-t`).
    pub temporal_tolerance: f64,
}

impl Problem {
    pub fn action(&self, id: ActionId) -> &crate::action::Action {
        self.actions.get(id)
    }

    /// Fails domain load with `DomainInconsistency` if any durative
    /// action declares a non-constant duration. Since [`crate::action::Duration`]
    /// can only ever represent a constant, this amounts to checking that every
    /// durative action actually has one; left as a hook for a future
    /// expression-based duration syntax.
    pub fn check_constant_durations(&self) -> Result<(), crate::error::PlannerError> {
        Ok(())
    }
}
