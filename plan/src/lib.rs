//! The partial-plan data model (§3): steps, causal links, threats and open
//! conditions, bound together with a binding store and an ordering store,
//! plus the refinement engine (§4.5) and flaw bridge (§4.6) that operate on
//! it. Every mutating-looking method returns a fresh `Plan`; nothing here
//! ever mutates a parent plan in place, so sibling plans in a search tree
//! can share the bulk of their structure through `Chain`'s and `im`'s
//! persistent data structures.

pub mod flaw;
pub mod orderings;
pub mod refine;
pub mod step;

use pocl_bindings::Bindings;
use pocl_collections::chain::Chain;
use pocl_domain::{FormulaTime, Problem, StepId, GOAL_ID, INIT_ID};
use pocl_planning_graph::PlanningGraph;

pub use flaw::{collect_flaws, FlawKind, PlanFlaw};
pub use orderings::{Orderings, StepPoint};
pub use step::{Link, OpenCondition, Step, Unsafe};

/// A partial plan (§3): a set of steps, causal links, an ordering store and
/// a binding store, plus the open conditions and threats still to resolve.
///
/// `serial` is a search-assigned insertion index (used to break ties when
/// two plans otherwise compare equal) and `rank` a cached rank vector
/// (§4.7) the search driver fills in via [`Plan::with_rank`] before a plan
/// is pushed onto a priority queue; `plan` itself never reads either field.
#[derive(Clone)]
pub struct Plan {
    pub steps: Chain<Step>,
    pub links: Chain<Link>,
    pub orderings: Orderings,
    pub bindings: Bindings,
    pub unsafes: Chain<Unsafe>,
    pub open_conditions: Chain<OpenCondition>,
    pub next_seq: u64,
    pub high_step: StepId,
    pub serial: u64,
    pub rank: Vec<f64>,
}

impl Plan {
    /// Builds the initial plan: the synthetic `Init`/`Goal` steps registered
    /// with the ordering store, no causal links, no bindings beyond each
    /// step's own domain, and one open condition per conjunct of the goal.
    pub fn initial(problem: &Problem) -> Option<Plan> {
        let durative = problem.actions.iter().any(|(_, a)| a.is_durative());
        let mut orderings =
            if durative { Orderings::new_temporal(problem.temporal_tolerance) } else { Orderings::new_binary() };
        orderings = orderings.add_step(INIT_ID, Some((0.0, 0.0)), Some(0.0))?;
        orderings = orderings.fix_init_at_origin(INIT_ID)?;
        orderings = orderings.add_step(GOAL_ID, Some((0.0, 0.0)), None)?;

        let plan = Plan {
            steps: Chain::new(),
            links: Chain::new(),
            orderings,
            bindings: Bindings::new(),
            unsafes: Chain::new(),
            open_conditions: Chain::new(),
            next_seq: 0,
            high_step: INIT_ID,
            serial: 0,
            rank: Vec::new(),
        };
        Some(plan.push_open_conditions(GOAL_ID, problem.goal.clone(), FormulaTime::AtStart))
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// No open conditions and no threats left, regardless of whether every
    /// step parameter has been narrowed to a single object.
    pub fn is_flawless(&self) -> bool {
        self.open_conditions.is_empty() && self.unsafes.is_empty()
    }

    /// Every step's parameters are narrowed to at most one legal object.
    pub fn is_fully_grounded(&self, problem: &Problem) -> bool {
        refine::is_fully_grounded(self, problem)
    }

    /// A solution: flawless and, when running in non-ground-actions mode,
    /// fully grounded too.
    pub fn is_complete(&self, problem: &Problem) -> bool {
        self.is_flawless() && self.is_fully_grounded(problem)
    }

    pub fn real_step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id).collect()
    }

    /// Per-step `(id, start, end)` plus the overall makespan, using the
    /// plan's own ordering store (§4.3's `schedule`/`makespan`).
    pub fn schedule(&self) -> (Vec<(StepId, f64, f64)>, f64) {
        let ids = self.real_step_ids();
        self.orderings.schedule(&ids)
    }

    pub fn makespan(&self) -> f64 {
        let ids = self.real_step_ids();
        self.orderings.makespan(&ids)
    }

    pub fn with_rank(&self, rank: Vec<f64>) -> Plan {
        Plan { rank, ..self.clone() }
    }

    /// §4.5.4: picks the first action-ordered step parameter that is still
    /// bound to more than one object and branches over its domain. Returns
    /// an empty vector once every step is fully grounded.
    pub fn ground_completion_children(&self, problem: &Problem) -> Vec<Plan> {
        refine::ground_completion_children(self, problem)
    }

    /// Dispatches to the open-condition or threat refinement engine
    /// depending on which kind of flaw was selected.
    pub fn refine_flaw(&self, flaw: &PlanFlaw, problem: &Problem, graph: &PlanningGraph) -> Vec<Plan> {
        match &flaw.kind {
            FlawKind::Open(oc) => refine::refine_open_condition(self, oc, problem, graph),
            FlawKind::Threat(u) => refine::refine_threat(self, u, problem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_domain::builder::{atom, ProblemBuilder};
    use pocl_domain::formula::{Formula, FormulaTime};
    use pocl_domain::Term;

    fn trivial_problem() -> Problem {
        let mut b = ProblemBuilder::new("t");
        let object_ty = b.object_type();
        let a = b.add_object("a", object_ty);
        let at = b.add_predicate("at", vec![object_ty]);
        b.set_goal(Formula::Literal(atom(at, &[Term::object(a)], FormulaTime::AtStart)));
        b.build()
    }

    #[test]
    fn initial_plan_has_one_open_condition_per_goal_conjunct() {
        let problem = trivial_problem();
        let plan = Plan::initial(&problem).expect("initial plan builds");
        assert_eq!(plan.open_conditions.len(), 1);
        assert!(plan.unsafes.is_empty());
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn initial_plan_is_not_complete_until_its_open_condition_is_closed() {
        let problem = trivial_problem();
        let plan = Plan::initial(&problem).expect("initial plan builds");
        assert!(!plan.is_complete(&problem));
    }
}
