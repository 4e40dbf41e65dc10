//! Steps, causal links and threats (§3): the entities the refinement engine
//! links together. All three are plain, structurally-comparable data so that
//! [`pocl_collections::chain::Chain`] equality-based `contains`/`remove`
//! stays semantically correct for arena-free sharing.

use pocl_domain::action::EffectTiming;
use pocl_domain::formula::FormulaTime;
use pocl_domain::{ActionId, Literal, StepId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Step {
    pub id: StepId,
    pub action: ActionId,
}

/// `(from-id, effect-time, to-id, condition, condition-time)`: producer
/// step's effect (at `from_time`) supplies `condition` (at `condition_time`)
/// to consumer step `to`.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub from: StepId,
    pub from_time: EffectTiming,
    pub to: StepId,
    pub condition: Literal,
    pub condition_time: FormulaTime,
}

/// `(link, step-id, effect, effect-add-literal)`: `step_id`'s `effect_index`
/// effect can interfere with `link` by asserting `literal` (the negation of
/// `link.condition`, up to unification).
///
/// `seq` is the LIFO/FIFO insertion order the flaw-selection strategy
/// (§4.6) uses for tie-breaking. It is part of the struct (rather than a
/// side table) so that the persistent `Chain` the plan keeps these in needs
/// no separate metadata map. The refinement count §4.6's cap and `LR`/`MR`
/// tactics need — the number of candidate refinements this flaw would
/// currently yield — depends on the plan's current bindings and planning
/// graph, so it is computed fresh by `pocl_plan::flaw::collect_flaws` rather
/// than stored here.
#[derive(Clone, Debug, PartialEq)]
pub struct Unsafe {
    pub link: Link,
    pub step: StepId,
    pub effect_index: usize,
    pub literal: Literal,
    pub seq: u64,
}

/// `(step-id, formula, when)`.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenCondition {
    pub step: StepId,
    pub formula: pocl_domain::Formula,
    pub when: FormulaTime,
    pub seq: u64,
}
