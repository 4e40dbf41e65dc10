//! The six seeded end-to-end scenarios, each a tiny hand-built domain driven
//! all the way through [`pocl_search::search`] to a literal expected
//! schedule (or exhaustion reason).

use pocl_domain::builder::{atom, ground_action, lifted_action, simple_effect, ProblemBuilder};
use pocl_domain::{Duration, EffectTiming, Formula, FormulaTime, Problem, Term};
use pocl_flaws::FlawOrder;
use pocl_planning_graph::PlanningGraph;
use pocl_search::{search, Algorithm, SearchConfig, SearchOutcome};

/// Renders a complete plan's schedule as `(action-name, bound-arg-names)`
/// tuples in start-time order, the same shape `planner`'s own output walks.
fn rendered_schedule(plan: &pocl_plan::Plan, problem: &Problem) -> Vec<(String, Vec<String>)> {
    let (schedule, _makespan) = plan.schedule();
    let mut rows: Vec<(f64, String, Vec<String>)> = schedule
        .iter()
        .map(|&(step_id, start, _end)| {
            let step = plan.step(step_id).expect("scheduled step exists in the plan");
            let action = problem.action(step.action);
            let args: Vec<String> = action
                .params
                .iter()
                .map(|(v, _)| {
                    plan.bindings
                        .domain(*v, step.id)
                        .and_then(|d| d.into_iter().next())
                        .map(|o| problem.terms.object_name(o).to_string())
                        .unwrap_or_else(|| "?".to_string())
                })
                .collect();
            (start, action.name.clone(), args)
        })
        .collect();
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    rows.into_iter().map(|(_, name, args)| (name, args)).collect()
}

fn default_config() -> SearchConfig {
    SearchConfig::default()
}

/// S1: two-block swap.
#[test]
fn s1_two_block_swap() {
    let mut b = ProblemBuilder::new("blocksworld");
    let block = b.add_type("block", vec![]);
    let block_ty = pocl_domain::TypeRef::Simple(block);
    let a = b.add_object("A", block_ty.clone());
    let bb = b.add_object("B", block_ty.clone());

    let on = b.add_predicate("on", vec![block_ty.clone(), block_ty.clone()]);
    let on_table = b.add_predicate("on-table", vec![block_ty.clone()]);
    let clear = b.add_predicate("clear", vec![block_ty.clone()]);
    let holding = b.add_predicate("holding", vec![block_ty.clone()]);
    let handempty = b.add_predicate("handempty", vec![]);

    let x = b.add_variable("x", block_ty.clone());
    let y = b.add_variable("y", block_ty.clone());

    let pick_up = lifted_action(
        "pick-up",
        vec![(x, block_ty.clone())],
        Formula::and(vec![
            Formula::Literal(atom(clear, &[Term::variable(x)], FormulaTime::AtStart)),
            Formula::Literal(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart)),
            Formula::Literal(atom(handempty, &[], FormulaTime::AtStart)),
        ]),
        vec![
            simple_effect(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(handempty, &[], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(holding, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
        None,
    );
    let put_down = lifted_action(
        "put-down",
        vec![(x, block_ty.clone())],
        Formula::Literal(atom(holding, &[Term::variable(x)], FormulaTime::AtStart)),
        vec![
            simple_effect(atom(holding, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(handempty, &[], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
        None,
    );
    let stack = lifted_action(
        "stack",
        vec![(x, block_ty.clone()), (y, block_ty.clone())],
        Formula::and(vec![
            Formula::Literal(atom(holding, &[Term::variable(x)], FormulaTime::AtStart)),
            Formula::Literal(atom(clear, &[Term::variable(y)], FormulaTime::AtStart)),
        ]),
        vec![
            simple_effect(atom(holding, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(y)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(handempty, &[], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(on, &[Term::variable(x), Term::variable(y)], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
        None,
    );
    let unstack = lifted_action(
        "unstack",
        vec![(x, block_ty.clone()), (y, block_ty.clone())],
        Formula::and(vec![
            Formula::Literal(atom(on, &[Term::variable(x), Term::variable(y)], FormulaTime::AtStart)),
            Formula::Literal(atom(clear, &[Term::variable(x)], FormulaTime::AtStart)),
            Formula::Literal(atom(handempty, &[], FormulaTime::AtStart)),
        ]),
        vec![
            simple_effect(atom(holding, &[Term::variable(x)], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(y)], FormulaTime::AtStart), EffectTiming::AtEnd),
            simple_effect(atom(on, &[Term::variable(x), Term::variable(y)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(clear, &[Term::variable(x)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(handempty, &[], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
        ],
        None,
    );
    b.add_action(pick_up);
    b.add_action(put_down);
    b.add_action(stack);
    b.add_action(unstack);

    b.add_initial(atom(on_table, &[Term::object(a)], FormulaTime::AtStart));
    b.add_initial(atom(on_table, &[Term::object(bb)], FormulaTime::AtStart));
    b.add_initial(atom(clear, &[Term::object(a)], FormulaTime::AtStart));
    b.add_initial(atom(clear, &[Term::object(bb)], FormulaTime::AtStart));
    b.add_initial(atom(handempty, &[], FormulaTime::AtStart));
    b.set_goal(Formula::Literal(atom(on, &[Term::object(a), Term::object(bb)], FormulaTime::AtStart)));
    b.finalize_statics();
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let outcome = search(&problem, &graph, &default_config()).expect("search runs to completion");
    let plan = match outcome {
        SearchOutcome::Complete(p) => p,
        SearchOutcome::Exhausted(r) => panic!("expected a plan, got {r:?}"),
    };

    assert_eq!(plan.makespan(), 2.0);
    let rows = rendered_schedule(&plan, &problem);
    assert_eq!(rows, vec![("pick-up".to_string(), vec!["A".to_string()]), ("stack".to_string(), vec!["A".to_string(), "B".to_string()])]);
}

/// S2: textbook UCPOP threat-resolution-by-demotion example.
#[test]
fn s2_threat_resolution_by_demotion() {
    let mut b = ProblemBuilder::new("demotion");
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
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let outcome = search(&problem, &graph, &default_config()).expect("search runs to completion");
    let plan = match outcome {
        SearchOutcome::Complete(p) => p,
        SearchOutcome::Exhausted(r) => panic!("expected a plan, got {r:?}"),
    };

    let rows = rendered_schedule(&plan, &problem);
    assert_eq!(rows.len(), 2);
    let a2_pos = rows.iter().position(|(n, _)| n == "a2").expect("a2 is in the plan");
    let a1_pos = rows.iter().position(|(n, _)| n == "a1").expect("a1 is in the plan");
    assert!(a2_pos < a1_pos, "a2 must be ordered before a1 (the demoted p-deletion threat)");
}

/// S3: disjunctive goal closed immediately from the initial state.
#[test]
fn s3_disjunctive_goal_closes_with_no_steps() {
    let mut b = ProblemBuilder::new("disjunctive");
    let p = b.add_predicate("p", vec![]);
    let q = b.add_predicate("q", vec![]);
    b.add_initial(atom(p, &[], FormulaTime::AtStart));
    b.set_goal(Formula::or(vec![Formula::Literal(atom(q, &[], FormulaTime::AtStart)), Formula::Literal(atom(p, &[], FormulaTime::AtStart))]));
    b.finalize_statics();
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let outcome = search(&problem, &graph, &default_config()).expect("search runs to completion");
    let plan = match outcome {
        SearchOutcome::Complete(p) => p,
        SearchOutcome::Exhausted(r) => panic!("expected a plan, got {r:?}"),
    };
    assert!(plan.steps.is_empty(), "the goal closes directly from p, no action needed");
}

/// S4: inequality branching narrows `move`'s two parameters apart.
#[test]
fn s4_inequality_branching_binds_distinct_objects() {
    let mut b = ProblemBuilder::new("inequality");
    let object_ty = b.object_type();
    let x_obj = b.add_object("x", object_ty.clone());
    let y_obj = b.add_object("y", object_ty.clone());
    let at = b.add_predicate("at", vec![object_ty.clone()]);

    let a = b.add_variable("a", object_ty.clone());
    let bvar = b.add_variable("b", object_ty.clone());
    let mv = lifted_action(
        "move",
        vec![(a, object_ty.clone()), (bvar, object_ty.clone())],
        Formula::and(vec![
            Formula::Literal(atom(at, &[Term::variable(a)], FormulaTime::AtStart)),
            Formula::Inequality(Term::variable(a), Term::variable(bvar)),
        ]),
        vec![
            simple_effect(atom(at, &[Term::variable(a)], FormulaTime::AtStart).negate(), EffectTiming::AtEnd),
            simple_effect(atom(at, &[Term::variable(bvar)], FormulaTime::AtStart), EffectTiming::AtEnd),
        ],
        None,
    );
    b.add_action(mv);
    b.add_initial(atom(at, &[Term::object(x_obj)], FormulaTime::AtStart));
    b.set_goal(Formula::Literal(atom(at, &[Term::object(y_obj)], FormulaTime::AtStart)));
    b.finalize_statics();
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let outcome = search(&problem, &graph, &default_config()).expect("search runs to completion");
    let plan = match outcome {
        SearchOutcome::Complete(p) => p,
        SearchOutcome::Exhausted(r) => panic!("expected a plan, got {r:?}"),
    };
    let rows = rendered_schedule(&plan, &problem);
    assert_eq!(rows, vec![("move".to_string(), vec!["x".to_string(), "y".to_string()])]);
}

/// S5: two non-conflicting durative actions schedule concurrently.
#[test]
fn s5_durative_actions_run_in_parallel() {
    let mut b = ProblemBuilder::new("durative");
    let hot = b.add_predicate("hot", vec![]);
    let cold = b.add_predicate("cold", vec![]);

    let heat = lifted_action(
        "heat",
        vec![],
        Formula::True,
        vec![simple_effect(atom(hot, &[], FormulaTime::AtStart), EffectTiming::AtEnd)],
        Some(Duration { min: 5.0, max: 5.0 }),
    );
    let cool = lifted_action(
        "cool",
        vec![],
        Formula::True,
        vec![simple_effect(atom(cold, &[], FormulaTime::AtStart), EffectTiming::AtEnd)],
        Some(Duration { min: 5.0, max: 5.0 }),
    );
    b.add_action(heat);
    b.add_action(cool);
    b.set_goal(Formula::and(vec![Formula::Literal(atom(hot, &[], FormulaTime::AtStart)), Formula::Literal(atom(cold, &[], FormulaTime::AtStart))]));
    b.finalize_statics();
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let outcome = search(&problem, &graph, &default_config()).expect("search runs to completion");
    let plan = match outcome {
        SearchOutcome::Complete(p) => p,
        SearchOutcome::Exhausted(r) => panic!("expected a plan, got {r:?}"),
    };
    assert_eq!(plan.makespan(), 5.0, "heat and cool have no interaction and should schedule concurrently");
}

/// S6: an explicit per-order quota of 1, exhausted with no automatic
/// doubling, reports a search-limit exhaustion rather than "no plan".
#[test]
fn s6_search_limit_reached_with_quota_of_one() {
    // The pick-up problem from the invariant tests needs at least two plan
    // expansions (install the step, then close its own preconditions) before
    // a complete plan is popped, so a quota of one plan per order starves it.
    let mut b = ProblemBuilder::new("limited");
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
    let problem = b.build();
    let graph = PlanningGraph::build(&problem);

    let config = SearchConfig {
        algorithm: Algorithm::AStar,
        flaw_orders: vec![FlawOrder::parse("UCPOP").unwrap()],
        quotas: vec![Some(1)],
        max_doublings: Some(0),
        ..SearchConfig::default()
    };
    let outcome = search(&problem, &graph, &config).expect("search runs to completion");
    match outcome {
        SearchOutcome::Complete(_) => panic!("a quota of one plan-generation call should starve this problem"),
        SearchOutcome::Exhausted(reason) => {
            assert_eq!(reason, pocl_domain::SearchExhaustionReason::SearchLimitReached);
        }
    }
}
