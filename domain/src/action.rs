//! Action schemas and effects.

use crate::formula::{Formula, FormulaTime, Literal};
use crate::terms::VarId;
use crate::types::TypeRef;
use pocl_collections::create_ref_type;
use pocl_collections::ref_store::RefVec;

create_ref_type!(ActionId);

/// At which instant of a durative action's execution an effect takes place.
/// Non-durative actions only ever use `AtEnd` (the classical "the action's
/// effect holds once it's done").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EffectTiming {
    AtStart,
    AtEnd,
}

/// A single conditional, possibly universally-quantified effect.
///
/// `condition` gates whether the effect fires at all; `link_condition` is an
/// *additional* constraint that must hold along any causal link
/// whose producer is this effect — it does not gate firing, it constrains
/// what open conditions this effect may be used to resolve.
#[derive(Clone, Debug)]
pub struct Effect {
    pub forall: Vec<VarId>,
    pub condition: Formula,
    pub link_condition: Formula,
    pub literal: Literal,
    pub timing: EffectTiming,
}

impl Effect {
    pub fn is_conditional(&self) -> bool {
        !self.condition.is_true()
    }
}

/// A constant min/max duration, in the units the planner's temporal
/// tolerance (`threshold`) is expressed in. The core only supports constant
/// durations; an action whose declared
/// duration is not reducible to a constant at domain-load time is rejected
/// before search starts rather than causing a panic mid-search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Duration {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub name: String,
    pub params: Vec<(VarId, TypeRef)>,
    /// Precondition, in {at-start, over-all, at-end} parts merged into one formula
    /// tagged by `FormulaTime`; for non-durative actions this is a single at-start
    /// (really: "the" precondition) conjunct carried at `FormulaTime::AtStart`.
    pub condition: Formula,
    pub effects: Vec<Effect>,
    /// `None` for non-durative (classical) actions.
    pub duration: Option<Duration>,
}

impl Action {
    pub fn is_durative(&self) -> bool {
        self.duration.is_some()
    }

    pub fn condition_parts(&self) -> Vec<(&Formula, FormulaTime)> {
        fn time_of(f: &Formula) -> FormulaTime {
            match f {
                Formula::Literal(l) => l.when,
                _ => FormulaTime::AtStart,
            }
        }
        match &self.condition {
            Formula::Conjunction(parts) => parts.iter().map(|f| (f, time_of(f))).collect(),
            other => vec![(other, time_of(other))],
        }
    }
}

#[derive(Default)]
pub struct ActionTable {
    actions: RefVec<ActionId, Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, a: Action) -> ActionId {
        self.actions.push(a)
    }

    pub fn get(&self, id: ActionId) -> &Action {
        &self.actions[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionId, &Action)> {
        self.actions.entries()
    }

    pub fn by_name(&self, name: &str) -> Option<ActionId> {
        self.actions.entries().find(|(_, a)| a.name == name).map(|(id, _)| id)
    }
}
