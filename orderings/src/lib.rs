//! The ordering constraint store, in two variants sharing one informal
//! interface: `possibly_before`, `refine`, `schedule`.
//!
//! [`binary::BinaryOrderings`] is a transitive-closure precedence matrix used
//! for non-durative (classical) problems; [`temporal::TemporalOrderings`] is
//! a simple temporal network used once any action in the domain is durative.
//! `plan` picks one variant per search and never mixes them within a run.

pub mod binary;
pub mod step_index;
pub mod temporal;

pub use binary::BinaryOrderings;
pub use step_index::StepIndex;
pub use temporal::{StepTime, TemporalOrderings};
