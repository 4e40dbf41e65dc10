//! The error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("domain inconsistency: {0}")]
    DomainInconsistency(String),

    #[error("search exhausted: {0}")]
    SearchExhaustion(#[from] SearchExhaustionReason),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Not really an error from the user's perspective: reported as `no plan`
/// with a categorising comment, not an exception — carried as data through
/// `search`/`planner` rather than unwound, but still kept in the taxonomy
/// enum so both categories share one vocabulary.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum SearchExhaustionReason {
    #[error("Problem has no solution.")]
    NoPlan,
    #[error("Search limit reached.")]
    SearchLimitReached,
}
