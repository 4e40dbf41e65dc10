//! A thin sum type over the two ordering-store variants (§4.3), so the
//! refinement engine can stay agnostic to which one a given search is using.
//! `plan` picks one variant when the initial plan is built (durative action
//! anywhere in the domain selects the temporal variant) and never mixes them.

use pocl_domain::StepId;
use pocl_orderings::{BinaryOrderings, StepTime, TemporalOrderings};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepPoint {
    Start,
    End,
}

fn as_step_time(p: StepPoint) -> StepTime {
    match p {
        StepPoint::Start => StepTime::Start,
        StepPoint::End => StepTime::End,
    }
}

#[derive(Clone)]
pub enum Orderings {
    Binary(BinaryOrderings),
    Temporal(TemporalOrderings),
}

impl Orderings {
    pub fn new_binary() -> Orderings {
        Orderings::Binary(BinaryOrderings::new())
    }

    pub fn new_temporal(threshold: f64) -> Orderings {
        Orderings::Temporal(TemporalOrderings::new(threshold))
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Orderings::Temporal(_))
    }

    /// Registers a new step's time-point(s), installing its duration bounds
    /// for the temporal variant (ignored, beyond bookkeeping, for the binary
    /// variant: every step contributes one unit to the topological schedule).
    pub fn add_step(&self, step: StepId, duration: Option<(f64, f64)>, start_lower_bound: Option<f64>) -> Option<Orderings> {
        match self {
            Orderings::Binary(o) => Some(Orderings::Binary(o.add_step(step))),
            Orderings::Temporal(o) => o.add_step(step, duration, start_lower_bound).map(Orderings::Temporal),
        }
    }

    pub fn fix_init_at_origin(&self, init: StepId) -> Option<Orderings> {
        match self {
            Orderings::Binary(o) => Some(Orderings::Binary(o.clone())),
            Orderings::Temporal(o) => o.fix_at_origin(init, StepTime::Start).map(Orderings::Temporal),
        }
    }

    pub fn mark_goal_achiever(&self, step: StepId) -> Orderings {
        match self {
            Orderings::Binary(o) => Orderings::Binary(o.clone()),
            Orderings::Temporal(o) => Orderings::Temporal(o.mark_goal_achiever(step)),
        }
    }

    pub fn possibly_before(&self, i: StepId, ti: StepPoint, j: StepId, tj: StepPoint) -> bool {
        match self {
            Orderings::Binary(o) => o.possibly_before(i, j),
            Orderings::Temporal(o) => o.possibly_before(i, as_step_time(ti), j, as_step_time(tj)),
        }
    }

    pub fn possibly_concurrent(&self, i: StepId, ti: StepPoint, j: StepId, tj: StepPoint) -> bool {
        match self {
            Orderings::Binary(o) => o.possibly_concurrent(i, j),
            Orderings::Temporal(o) => o.possibly_concurrent(i, as_step_time(ti), j, as_step_time(tj)),
        }
    }

    /// Posts `(before, before_pt) + min_sep <= (after, after_pt)`. For the
    /// binary variant `min_sep`/points are irrelevant: the only thing it can
    /// express is plain precedence.
    pub fn refine(&self, before: StepId, before_pt: StepPoint, after: StepId, after_pt: StepPoint, min_sep: f64) -> Option<Orderings> {
        match self {
            Orderings::Binary(o) => o.refine(before, after).map(Orderings::Binary),
            Orderings::Temporal(o) => o
                .refine(before, as_step_time(before_pt), after, as_step_time(after_pt), min_sep)
                .map(Orderings::Temporal),
        }
    }

    pub fn schedule(&self, steps: &[StepId]) -> (Vec<(StepId, f64, f64)>, f64) {
        match self {
            Orderings::Binary(o) => o.schedule(steps),
            Orderings::Temporal(o) => o.schedule(steps),
        }
    }

    /// Per-step `(start, end)` bounds read off the minimized/consistency-
    /// closed network, for the verbose printer (§6, `-v2`) — the same rows
    /// `schedule` returns, named separately so callers that only want a
    /// human-legible dump don't need to care about the makespan it also
    /// computes.
    pub fn minimal_network(&self, steps: &[StepId]) -> Vec<(StepId, f64, f64)> {
        self.schedule(steps).0
    }

    pub fn makespan(&self, steps: &[StepId]) -> f64 {
        match self {
            Orderings::Binary(o) => o.schedule(steps).1,
            Orderings::Temporal(o) => o.makespan(),
        }
    }
}
