//! Bridges the plan's own open-condition/threat chains to the
//! [`pocl_flaws`] selection DSL: for every flaw currently in a plan, computes
//! the kind mask, heuristic costs and insertion-order bookkeeping
//! `FlawInfo` needs, without `pocl_flaws` ever having to know what a step,
//! link or binding actually is.

use pocl_domain::{Formula, Problem};
use pocl_flaws::FlawKindMask;
use pocl_planning_graph::{HeuristicValue, PlanningGraph};

use crate::refine::{refine_open_condition, refine_threat};
use crate::step::{OpenCondition, Unsafe};
use crate::Plan;

#[derive(Clone, Debug)]
pub enum FlawKind {
    Open(OpenCondition),
    Threat(Unsafe),
}

/// One flaw plus everything [`pocl_flaws::FlawInfo`] needs to rank it,
/// computed once per selection round against the plan's current bindings
/// and the shared planning graph.
#[derive(Clone, Debug)]
pub struct PlanFlaw {
    pub kind: FlawKind,
    mask: FlawKindMask,
    add_cost: f64,
    makespan: f64,
    work: u32,
    has_reuse_achiever: bool,
    refinement_count: usize,
}

impl PlanFlaw {
    pub fn seq(&self) -> u64 {
        match &self.kind {
            FlawKind::Open(oc) => oc.seq,
            FlawKind::Threat(u) => u.seq,
        }
    }

    pub fn refinement_count(&self) -> usize {
        self.refinement_count
    }
}

impl pocl_flaws::FlawInfo for PlanFlaw {
    fn kind(&self) -> FlawKindMask {
        self.mask
    }
    fn refinement_count(&self) -> usize {
        PlanFlaw::refinement_count(self)
    }
    fn add_cost(&self) -> f64 {
        self.add_cost
    }
    fn makespan(&self) -> f64 {
        self.makespan
    }
    fn work(&self) -> u32 {
        self.work
    }
    fn has_reuse_achiever(&self) -> bool {
        self.has_reuse_achiever
    }
    fn insertion_order(&self) -> u64 {
        self.seq()
    }
}

/// True iff `affects(add, link.condition)` has at least one substitution
/// pair whose variable is *not* one of the threatening effect's own
/// universally quantified parameters: such a pair can become an inequality,
/// so the threat can be separated by binding alone rather than only by
/// reordering. `u.literal` and `u.link.condition` are opposite-polarity by
/// construction (that is what made `u` a threat in the first place), so
/// this must go through `affects`, not `unify`, which would reject them on
/// polarity alone.
fn threat_is_separable(plan: &Plan, problem: &Problem, u: &Unsafe) -> bool {
    let Step { action, .. } = *plan.step(u.step).expect("threatening step exists");
    let effect = &problem.action(action).effects[u.effect_index];
    match plan.bindings.affects(&u.literal, u.step, &u.link.condition, u.link.to) {
        None => false,
        Some(mgu) => mgu.iter().any(|c| !crate::refine::constraint_var_is_quantified(c, u.step, &effect.forall)),
    }
}

use crate::step::Step;

pub fn collect_flaws(plan: &Plan, problem: &Problem, graph: &PlanningGraph) -> Vec<PlanFlaw> {
    let mut out = Vec::new();
    for u in plan.unsafes.iter() {
        let separable = threat_is_separable(plan, problem, u);
        let mask = if separable { FlawKindMask::SEP_THREAT } else { FlawKindMask::NONSEP_THREAT };
        let refinement_count = refine_threat(plan, u, problem).len();
        out.push(PlanFlaw {
            kind: FlawKind::Threat(u.clone()),
            mask,
            add_cost: 0.0,
            makespan: 0.0,
            work: 0,
            has_reuse_achiever: false,
            refinement_count,
        });
    }
    for oc in plan.open_conditions.iter() {
        let mut mask = FlawKindMask::OPEN;
        if is_static_literal(problem, &oc.formula) {
            mask = mask.union(FlawKindMask::STATIC);
        }
        if plan.unsafes.iter().any(|u| u.link.to == oc.step && formula_mentions(&oc.formula, &u.link.condition)) {
            mask = mask.union(FlawKindMask::THREATENED_OPEN);
        }
        let (add_cost, makespan, work) = formula_heuristic(problem, graph, &oc.formula);
        let has_reuse_achiever = literal_has_reuse_achiever(plan, problem, graph, &oc.formula);
        let refinement_count = refine_open_condition(plan, oc, problem, graph).len();
        out.push(PlanFlaw {
            kind: FlawKind::Open(oc.clone()),
            mask,
            add_cost,
            makespan,
            work,
            has_reuse_achiever,
            refinement_count,
        });
    }
    out
}

fn formula_mentions(formula: &Formula, lit: &pocl_domain::Literal) -> bool {
    matches!(formula, Formula::Literal(l) if l.predicate == lit.predicate && l.positive == lit.positive)
}

fn is_static_literal(problem: &Problem, formula: &Formula) -> bool {
    matches!(formula, Formula::Literal(l) if problem.predicates.is_static(l.predicate))
}

/// Evaluates a (possibly compound) open-condition formula against the
/// planning graph's public per-literal accessors. Mirrors
/// `PlanningGraph::value`'s recursive structure (§4.4) but is re-derived
/// here rather than calling it directly: the graph's internal reachability
/// table is private, so only ground-literal lookups cross the crate
/// boundary.
fn formula_heuristic(problem: &Problem, graph: &PlanningGraph, formula: &Formula) -> (f64, f64, u32) {
    let v = eval(problem, graph, formula, &std::collections::HashMap::new());
    (v.add_cost, v.makespan, v.add_work)
}

fn ground(t: pocl_domain::Term, subst: &std::collections::HashMap<pocl_domain::VarId, pocl_domain::ObjectId>) -> Option<pocl_domain::ObjectId> {
    match t.split() {
        pocl_domain::terms::TermKind::Object(o) => Some(o),
        pocl_domain::terms::TermKind::Variable(v) => subst.get(&v).copied(),
    }
}

fn candidate_tuples(problem: &Problem, vars: &[pocl_domain::VarId]) -> Vec<Vec<pocl_domain::ObjectId>> {
    use itertools::Itertools;
    if vars.is_empty() {
        return vec![vec![]];
    }
    vars.iter()
        .map(|&v| problem.terms.objects_of_type(&problem.types, problem.terms.variable_type(v)).collect::<Vec<_>>())
        .multi_cartesian_product()
        .collect()
}

fn eval(
    problem: &Problem,
    graph: &PlanningGraph,
    f: &Formula,
    subst: &std::collections::HashMap<pocl_domain::VarId, pocl_domain::ObjectId>,
) -> HeuristicValue {
    match f {
        Formula::True => HeuristicValue::ZERO,
        Formula::False => HeuristicValue::INFINITE,
        Formula::Literal(lit) => {
            let Some(args): Option<Vec<_>> = lit.args.iter().map(|&t| ground(t, subst)).collect() else {
                return HeuristicValue::INFINITE;
            };
            if lit.positive {
                graph.literal_value(lit.predicate, &args)
            } else if graph.is_in_initial_state(lit.predicate, &args) {
                HeuristicValue::INFINITE
            } else {
                HeuristicValue::ZERO
            }
        }
        Formula::Equality(a, b) => match (ground(*a, subst), ground(*b, subst)) {
            (Some(x), Some(y)) if x == y => HeuristicValue::ZERO,
            _ => HeuristicValue::INFINITE,
        },
        Formula::Inequality(a, b) => match (ground(*a, subst), ground(*b, subst)) {
            (Some(x), Some(y)) if x != y => HeuristicValue::ZERO,
            _ => HeuristicValue::INFINITE,
        },
        Formula::Conjunction(parts) => parts.iter().fold(HeuristicValue::ZERO, |acc, p| acc.plus(eval(problem, graph, p, subst))),
        Formula::Disjunction(parts) => parts.iter().fold(HeuristicValue::INFINITE, |acc, p| acc.min(eval(problem, graph, p, subst))),
        Formula::Exists(vars, body) => candidate_tuples(problem, vars)
            .into_iter()
            .map(|objs| {
                let mut s = subst.clone();
                for (&v, &o) in vars.iter().zip(objs.iter()) {
                    s.insert(v, o);
                }
                eval(problem, graph, body, &s)
            })
            .fold(HeuristicValue::INFINITE, HeuristicValue::min),
        Formula::Forall(vars, body) => candidate_tuples(problem, vars)
            .into_iter()
            .map(|objs| {
                let mut s = subst.clone();
                for (&v, &o) in vars.iter().zip(objs.iter()) {
                    s.insert(v, o);
                }
                eval(problem, graph, body, &s)
            })
            .fold(HeuristicValue::ZERO, HeuristicValue::plus),
    }
}

fn literal_has_reuse_achiever(plan: &Plan, problem: &Problem, graph: &PlanningGraph, formula: &Formula) -> bool {
    let Formula::Literal(lit) = formula else { return false };
    if !lit.positive {
        return false;
    }
    let achievers = graph.literal_achievers(lit.predicate, &lit.args);
    let existing: Vec<(pocl_domain::ActionId, Vec<Option<pocl_domain::ObjectId>>)> = plan
        .steps
        .iter()
        .map(|s| {
            let action = problem.action(s.action);
            let bound: Vec<Option<pocl_domain::ObjectId>> = action.params.iter().map(|(v, _)| plan.bindings.domain(*v, s.id).and_then(|d| if d.len() == 1 { d.into_iter().next() } else { None })).collect();
            (s.action, bound)
        })
        .collect();
    achievers.iter().any(|a| {
        let refs: Vec<(pocl_domain::ActionId, &[Option<pocl_domain::ObjectId>])> = existing.iter().map(|(id, v)| (*id, v.as_slice())).collect();
        matches!(a.classify(refs), pocl_planning_graph::AchieverKind::Reuse)
    })
}
