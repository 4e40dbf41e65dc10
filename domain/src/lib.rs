pub mod action;
pub mod builder;
pub mod error;
pub mod formula;
pub mod predicates;
pub mod problem;
pub mod terms;
pub mod types;

pub use action::{Action, ActionId, Duration, Effect, EffectTiming};
pub use error::{PlannerError, SearchExhaustionReason};
pub use formula::{Formula, FormulaTime, Literal};
pub use predicates::{PredicateId, PredicateTable};
pub use problem::Problem;
pub use terms::{ObjectId, StepId, StepVar, Term, TermKind, TermTable, VarId};
pub use types::{SimpleTypeId, TypeRef, TypeTable};

/// Step id reserved for the synthetic `Init` action.
pub const INIT_ID: StepId = 0;
/// Step id reserved for the synthetic `Goal` action.
pub const GOAL_ID: StepId = u32::MAX;
