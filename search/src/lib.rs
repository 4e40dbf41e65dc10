//! The search driver (§4.7): turns a problem and its planning graph into a
//! plan (or a reason there isn't one) by round-robining a priority queue per
//! flaw-selection order.

pub mod driver;
pub mod queue;
pub mod rank;

pub use driver::{search, Algorithm, SearchConfig, SearchOutcome};
pub use queue::FlawOrderQueue;
pub use rank::{compute_rank, parse_heuristic_spec, RankComponent};
