//! Property tests for the universal invariants over plan refinement: parent
//! plans are never mutated by a child's construction, bindings only ever
//! narrow, and installing a link finds every step/effect that threatens it.

use pocl_bindings::BindingConstraint;
use pocl_domain::builder::{atom, ground_action, lifted_action, simple_effect, ProblemBuilder};
use pocl_domain::{EffectTiming, Formula, FormulaTime, Problem, Term};
use pocl_plan::refine::{refine_open_condition, refine_threat};
use pocl_plan::Plan;
use pocl_planning_graph::PlanningGraph;

/// `on-table(?x)`-style one-predicate blocksworld fragment: `clear(a)`,
/// `on-table(a)` true initially; `pick-up(?x)` deletes both and adds
/// `holding(?x)`.
fn pickup_problem() -> Problem {
    let mut b = ProblemBuilder::new("pickup");
    let object_ty = b.object_type();
    let a = b.add_object("a", object_ty.clone());

    let clear = b.add_predicate("clear", vec![object_ty.clone()]);
    let on_table = b.add_predicate("on-table", vec![object_ty.clone()]);
    let holding = b.add_predicate("holding", vec![object_ty.clone()]);

    let x = b.add_variable("x", object_ty.clone());
    let pick_up = lifted_action(
        "pick-up",
        vec![(x, object_ty.clone())],
        Formula::and(vec![
            Formula::Literal(atom(clear, &[Term::variable(x)], FormulaTime::AtStart)),
            Formula::Literal(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart)),
        ]),
        vec![
            simple_effect(atom(clear, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(holding, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
        None,
    );
    b.add_action(pick_up);

    b.add_initial(atom(clear, &[Term::object(a)], FormulaTime::AtStart));
    b.add_initial(atom(on_table, &[Term::object(a)], FormulaTime::AtStart));
    b.set_goal(Formula::Literal(atom(holding, &[Term::object(a)], FormulaTime::AtStart)));
    b.finalize_statics();
    b.build()
}

#[test]
fn persistent_non_mutation_parent_plan_unchanged_after_refinement() {
    let problem = pickup_problem();
    let graph = PlanningGraph::build(&problem);
    let parent = Plan::initial(&problem).expect("initial plan builds");

    let before_ocs: Vec<_> = parent.open_conditions.iter().cloned().collect();
    let before_steps = parent.steps.len();
    let before_links = parent.links.len();

    let oc = parent.open_conditions.iter().next().expect("one open condition for the goal").clone();
    let children = refine_open_condition(&parent, &oc, &problem, &graph);
    assert!(!children.is_empty(), "pick-up should be able to achieve `holding(a)`");

    let after_ocs: Vec<_> = parent.open_conditions.iter().cloned().collect();
    assert_eq!(before_ocs.len(), after_ocs.len(), "parent's open-condition chain must be unchanged");
    assert_eq!(before_steps, parent.steps.len());
    assert_eq!(before_links, parent.links.len());

    for child in &children {
        assert!(child.open_conditions.len() <= before_ocs.len() + 3, "child only ever adds the achiever's own preconditions");
    }
}

#[test]
fn binding_monotonicity_add_never_widens_a_singleton_domain() {
    let problem = pickup_problem();
    let graph = PlanningGraph::build(&problem);
    let parent = Plan::initial(&problem).expect("initial plan builds");
    let oc = parent.open_conditions.iter().next().unwrap().clone();
    let children = refine_open_condition(&parent, &oc, &problem, &graph);
    let child = children.into_iter().next().expect("at least one child resolves the open condition");

    // `pick-up`'s parameter x is unified against the ground object `a`;
    // after the child's bindings, x's step-domain must be exactly {a}, never
    // re-widened to anything else by a further `add`.
    let step = child.steps.iter().next().expect("a step was added").id;
    let action = problem.action(child.steps.iter().next().unwrap().action);
    let (x, _) = action.params[0];
    let domain_before = child.bindings.domain(x, step).expect("x has a domain");
    assert_eq!(domain_before.len(), 1);

    // Adding a redundant equality to the same value must not change the domain.
    let v = *domain_before.iter().next().unwrap();
    let c = BindingConstraint::eq_terms(Term::variable(x), step, Term::object(v), step);
    let narrowed = child.bindings.add(vec![c], false).expect("binding the already-bound var to its own value succeeds");
    let domain_after = narrowed.domain(x, step).expect("x still has a domain");
    assert_eq!(domain_before, domain_after, "re-asserting the current binding must not widen the domain");
}

/// The textbook UCPOP demotion example: `a1` has no precondition and deletes
/// `p` while adding `q`; `a2` needs `p` and adds `r`. `p` true initially,
/// goal `q ∧ r`: achieving `r` needs a link from `Init`'s `p` to `a2`, and
/// `a1`'s deletion of `p` then threatens that link.
fn demotion_problem() -> (Problem, pocl_domain::PredicateId, pocl_domain::PredicateId, pocl_domain::PredicateId) {
    let mut b = ProblemBuilder::new("threat");
    let p = b.add_predicate("p", vec![]);
    let q = b.add_predicate("q", vec![]);
    let r = b.add_predicate("r", vec![]);

    let a1 = ground_action(
        "a1",
        Formula::True,
        vec![
            simple_effect(atom(p, &[], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(q, &[], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
    );
    let a2 = ground_action(
        "a2",
        Formula::Literal(atom(p, &[], FormulaTime::AtStart)),
        vec![simple_effect(atom(r, &[], FormulaTime::AtStart), EffectTiming::AtEnd)],
    );
    b.add_action(a1);
    b.add_action(a2);
    b.add_initial(atom(p, &[], FormulaTime::AtStart));
    b.set_goal(Formula::and(vec![Formula::Literal(atom(q, &[], FormulaTime::AtStart)), Formula::Literal(atom(r, &[], FormulaTime::AtStart))]));
    b.finalize_statics();
    (b.build(), p, q, r)
}

fn find_literal_oc(plan: &Plan, predicate: pocl_domain::PredicateId) -> pocl_plan::OpenCondition {
    plan.open_conditions
        .iter()
        .find(|oc| matches!(&oc.formula, Formula::Literal(l) if l.predicate == predicate))
        .expect("an open condition for this predicate exists")
        .clone()
}

/// Drives the demotion scenario up to (but not including) resolving `a2`'s
/// own `p` precondition, the point at which `a1`'s already-installed
/// p-deleting effect becomes a threat against the about-to-be-installed
/// `Init.p -> a2` link.
fn demotion_plan_with_steps_installed() -> (Problem, PlanningGraph, Plan, pocl_domain::PredicateId) {
    let (problem, p, q, r) = demotion_problem();
    let graph = PlanningGraph::build(&problem);

    let plan = Plan::initial(&problem).expect("initial plan builds");
    let r_oc = find_literal_oc(&plan, r);
    let after_r = refine_open_condition(&plan, &r_oc, &problem, &graph).into_iter().next().expect("a2 achieves r");
    assert_eq!(after_r.links.len(), 1, "only the r-achieving link exists so far; a2's own precondition is still open");

    let q_oc = find_literal_oc(&after_r, q);
    let after_q = refine_open_condition(&after_r, &q_oc, &problem, &graph).into_iter().next().expect("a1 achieves q");
    assert_eq!(after_q.links.len(), 2, "a1's q-achieving link joins the r-achieving one");
    assert!(after_q.unsafes.is_empty(), "a1 and a2 don't threaten each other before a2's own precondition is linked");

    (problem, graph, after_q, p)
}

#[test]
fn threat_completeness_new_step_threatening_an_existing_link_is_recorded() {
    let (problem, graph, after_q, p) = demotion_plan_with_steps_installed();
    let p_oc = find_literal_oc(&after_q, p);
    let after_p = refine_open_condition(&after_q, &p_oc, &problem, &graph).into_iter().next().expect("Init's p reuses to close a2's precondition");
    assert!(!after_p.unsafes.is_empty(), "a1's deletion of p must be recorded as a threat against the new Init.p -> a2 link");
}

#[test]
fn threat_refinement_covers_promotion_and_excludes_demotion_past_init() {
    let (problem, graph, after_q, p) = demotion_plan_with_steps_installed();
    let p_oc = find_literal_oc(&after_q, p);
    let after_p = refine_open_condition(&after_q, &p_oc, &problem, &graph).into_iter().next().unwrap();

    let u = after_p.unsafes.iter().next().expect("a threat was recorded").clone();
    // Init is implicitly ordered before every other step, so demoting `a1`
    // before it is impossible; only promotion (`a2 < a1`) survives here,
    // since `p` is nullary and so admits no inequality-based separation.
    let resolutions = refine_threat(&after_p, &u, &problem);
    assert!(!resolutions.is_empty(), "a ground ordering threat always admits at least promotion");
    for child in &resolutions {
        assert!(child.unsafes.iter().all(|c| c.seq != u.seq), "the resolved threat must not survive into any child");
    }
}

#[test]
fn unification_soundness_unify_then_add_equates_the_literals() {
    let problem = pickup_problem();
    let plan = Plan::initial(&problem).expect("initial plan builds");

    // Build two literals over the same predicate with a variable vs. a
    // constant argument, confirm unify + add equates them.
    let action_id = problem.actions.iter().next().unwrap().0;
    let action = problem.action(action_id);
    let (x, _) = action.params[0];
    let goal_lit = match &problem.goal {
        Formula::Literal(l) => l.clone(),
        _ => panic!("goal is a single literal"),
    };
    let effect_lit = action.effects.last().unwrap().literal.clone();

    let mgu = plan.bindings.unify(&effect_lit, 1, &goal_lit, pocl_domain::GOAL_ID).expect("holding(x) unifies with holding(a)");
    let bindings = plan.bindings.add(mgu, false).expect("mgu is consistent");

    let resolved_var = bindings.binding(Term::variable(x), 1);
    let resolved_const = bindings.binding(goal_lit.args[0], pocl_domain::GOAL_ID);
    assert_eq!(resolved_var, resolved_const, "after applying the mgu both literals' arguments resolve to the same term");
}
