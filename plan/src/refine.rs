//! The refinement engine (§4.5): rewrites one plan with a selected flaw into
//! the set of child plans that resolve it. Nothing here mutates a parent
//! plan — every helper returns fresh `Plan` values built from the parent's
//! persistent chains, per the "persistent update" discipline (§9).

use pocl_bindings::varset::BoundTerm;
use pocl_bindings::BindingConstraint;
use pocl_domain::action::{Action, Effect, EffectTiming};
use pocl_domain::formula::FormulaTime;
use pocl_domain::terms::TermKind;
use pocl_domain::{ActionId, Formula, Literal, ObjectId, Problem, StepId, StepVar, Term, VarId, GOAL_ID, INIT_ID};
use pocl_planning_graph::PlanningGraph;

use crate::orderings::StepPoint;
use crate::step::{Link, OpenCondition, Step, Unsafe};
use crate::Plan;

fn producer_point(t: EffectTiming) -> StepPoint {
    match t {
        EffectTiming::AtStart => StepPoint::Start,
        EffectTiming::AtEnd => StepPoint::End,
    }
}

fn consumer_point(t: FormulaTime) -> StepPoint {
    match t {
        FormulaTime::AtEnd => StepPoint::End,
        FormulaTime::AtStart | FormulaTime::OverAll => StepPoint::Start,
    }
}

/// True iff `constraint` binds `sv`'s variable at exactly `step`, and that
/// variable is one of `forall`'s own universally quantified parameters
/// (i.e. it is not a "real" substitution the search is free to separate).
pub fn constraint_var_is_quantified(constraint: &BindingConstraint, step: StepId, forall: &[VarId]) -> bool {
    let term = match constraint {
        BindingConstraint::Eq(a, b) | BindingConstraint::Neq(a, b) => {
            if let BoundTerm::Var(sv) = a {
                if sv.step == step {
                    Some(sv.var)
                } else {
                    None
                }
            } else if let BoundTerm::Var(sv) = b {
                if sv.step == step {
                    Some(sv.var)
                } else {
                    None
                }
            } else {
                None
            }
        }
    };
    match term {
        Some(v) => forall.contains(&v),
        None => false,
    }
}

/// A producer of a literal: either a real action effect, or one of the
/// synthetic `Init` step's initial atoms (treated as a ground, unconditional,
/// non-quantified effect that fires at the step's end, i.e. at absolute
/// time zero).
enum ProducerEffect<'a> {
    Real(&'a Effect),
    Init(&'a Literal),
}

impl<'a> ProducerEffect<'a> {
    fn forall(&self) -> &'a [VarId] {
        match self {
            ProducerEffect::Real(e) => &e.forall,
            ProducerEffect::Init(_) => &[],
        }
    }
    fn condition(&self) -> &'a Formula {
        match self {
            ProducerEffect::Real(e) => &e.condition,
            ProducerEffect::Init(_) => &Formula::True,
        }
    }
    fn link_condition(&self) -> &'a Formula {
        match self {
            ProducerEffect::Real(e) => &e.link_condition,
            ProducerEffect::Init(_) => &Formula::True,
        }
    }
    fn literal(&self) -> &'a Literal {
        match self {
            ProducerEffect::Real(e) => &e.literal,
            ProducerEffect::Init(l) => l,
        }
    }
    fn timing(&self) -> EffectTiming {
        match self {
            ProducerEffect::Real(e) => e.timing,
            ProducerEffect::Init(_) => EffectTiming::AtEnd,
        }
    }
}

fn producer_effects<'a>(problem: &'a Problem, step: &Step) -> Vec<(usize, ProducerEffect<'a>)> {
    problem.action(step.action).effects.iter().enumerate().map(|(i, e)| (i, ProducerEffect::Real(e))).collect()
}

fn init_effects(problem: &Problem) -> Vec<(usize, ProducerEffect<'_>)> {
    problem.initial.iter().enumerate().map(|(i, l)| (i, ProducerEffect::Init(l))).collect()
}

/// Splits a conjunction into the individual conjuncts a fresh open condition
/// is pushed for; every other formula shape becomes a single open condition.
fn flatten_conjunction(f: Formula) -> Vec<Formula> {
    match f {
        Formula::True => Vec::new(),
        Formula::Conjunction(parts) => parts.into_iter().flat_map(flatten_conjunction).collect(),
        other => vec![other],
    }
}

impl Plan {
    pub(crate) fn push_open_conditions(&self, step: StepId, formula: Formula, when: FormulaTime) -> Plan {
        let mut next = self.clone();
        for f in flatten_conjunction(formula) {
            let seq = next.next_seq;
            next.next_seq += 1;
            next.open_conditions = next.open_conditions.cons(OpenCondition { step, formula: f, when, seq });
        }
        next
    }

    /// Installs the initial open conditions (and step-domain) for a
    /// just-added action step; used both by `Plan::initial`'s implicit
    /// step-0/goal bookkeeping and by the add-step refinement (§4.5.1a).
    fn push_action_preconditions(&self, step: StepId, action: &Action, graph: &PlanningGraph, action_id: ActionId) -> Option<Plan> {
        let tuples = graph.action_domain(action_id).to_vec();
        let params: Vec<VarId> = action.params.iter().map(|(v, _)| *v).collect();
        let bindings = self.bindings.add_step_domain(step, params, tuples)?;
        let mut next = Plan { bindings, ..self.clone() };
        for (cond, when) in action.condition_parts() {
            next = next.push_open_conditions(step, cond.clone(), when);
        }
        Some(next)
    }
}

/// §4.5.3: installs a causal link from `(producer, producer_timing)` to
/// `(consumer, consumer_when)` under the given mgu, posting the ordering,
/// the link, and scanning for newly-created threats.
#[allow(clippy::too_many_arguments)]
fn install_link(
    plan: &Plan,
    producer: StepId,
    producer_timing: EffectTiming,
    effect_condition: &Formula,
    effect_link_condition: &Formula,
    consumer: StepId,
    consumer_literal: Literal,
    consumer_when: FormulaTime,
    mgu: Vec<BindingConstraint>,
    problem: &Problem,
    newly_added_step: bool,
) -> Option<Plan> {
    let bindings = plan.bindings.add(mgu, false)?;
    let mut next = Plan { bindings, ..plan.clone() };

    if !effect_condition.is_true() {
        let when = match producer_timing {
            EffectTiming::AtStart => FormulaTime::AtStart,
            EffectTiming::AtEnd => FormulaTime::AtEnd,
        };
        next = next.push_open_conditions(producer, effect_condition.clone(), when);
    }
    if !effect_link_condition.is_true() {
        let when = match producer_timing {
            EffectTiming::AtStart => FormulaTime::AtStart,
            EffectTiming::AtEnd => FormulaTime::AtEnd,
        };
        next = next.push_open_conditions(producer, effect_link_condition.clone(), when);
    }

    let orderings = next.orderings.refine(
        producer,
        producer_point(producer_timing),
        consumer,
        consumer_point(consumer_when),
        problem.temporal_tolerance,
    )?;
    next.orderings = orderings;

    let link = Link {
        from: producer,
        from_time: producer_timing,
        to: consumer,
        condition: consumer_literal,
        condition_time: consumer_when,
    };

    // scan all existing steps for threats against the new link
    for step in next.steps.iter() {
        for (effect_index, effect) in producer_effects(problem, step) {
            if step.id == producer && effect.timing() == producer_timing {
                // same producer instant that established the link: never a
                // threat to its own link.
                continue;
            }
            if next.bindings.affects(effect.literal(), step.id, &link.condition, link.to).is_some() {
                if next
                    .orderings
                    .possibly_before(link.from, producer_point(link.from_time), step.id, producer_point(effect.timing()))
                    && next
                        .orderings
                        .possibly_before(step.id, producer_point(effect.timing()), link.to, consumer_point(link.condition_time))
                {
                    let seq = next.next_seq;
                    next.next_seq += 1;
                    next.unsafes = next.unsafes.cons(Unsafe {
                        link: link.clone(),
                        step: step.id,
                        effect_index,
                        literal: effect.literal().clone(),
                        seq,
                    });
                }
            }
        }
    }
    next.links = next.links.cons(link.clone());

    if newly_added_step {
        // the new step's own effects might threaten links already in the plan.
        if let Some(new_step) = next.steps.iter().find(|s| s.id == producer).cloned() {
            for existing_link in plan.links.iter() {
                for (effect_index, effect) in producer_effects(problem, &new_step) {
                    if next.bindings.affects(effect.literal(), producer, &existing_link.condition, existing_link.to).is_some()
                        && next
                            .orderings
                            .possibly_before(existing_link.from, producer_point(existing_link.from_time), producer, producer_point(effect.timing()))
                        && next
                            .orderings
                            .possibly_before(producer, producer_point(effect.timing()), existing_link.to, consumer_point(existing_link.condition_time))
                    {
                        let seq = next.next_seq;
                        next.next_seq += 1;
                        next.unsafes = next.unsafes.cons(Unsafe {
                            link: existing_link.clone(),
                            step: producer,
                            effect_index,
                            literal: effect.literal().clone(),
                            seq,
                        });
                    }
                }
            }
        }
    }

    if consumer == GOAL_ID {
        next.orderings = next.orderings.mark_goal_achiever(producer);
    }

    Some(next)
}

fn duration_bounds(action: &Action) -> Option<(f64, f64)> {
    action.duration.map(|d| (d.min, d.max))
}

/// §4.5.1a: allocates a fresh step for each (action, effect) achiever of a
/// positive literal open condition.
fn add_step_children(plan: &Plan, oc: &OpenCondition, lit: &Literal, problem: &Problem, graph: &PlanningGraph) -> Vec<Plan> {
    let mut out = Vec::new();
    for achiever in graph.literal_achievers(lit.predicate, &lit.args) {
        let action_id = achiever.action;
        let action = problem.action(action_id);
        let effect = &action.effects[achiever.effect_index];
        if !effect.literal.positive {
            continue;
        }
        let new_step = plan.high_step + 1;
        let Some(mgu) = plan.bindings.unify(&effect.literal, new_step, lit, oc.step) else {
            continue;
        };

        let mut next = plan.clone();
        next.steps = next.steps.cons(Step { id: new_step, action: action_id });
        next.high_step = new_step;
        let Some(orderings) = next.orderings.add_step(new_step, duration_bounds(action), None) else {
            continue;
        };
        next.orderings = orderings;
        let Some(mut next) = next.push_action_preconditions(new_step, action, graph, action_id) else {
            continue;
        };
        next.open_conditions = next.open_conditions.remove(oc);

        if let Some(child) = install_link(
            &next,
            new_step,
            effect.timing,
            &effect.condition,
            &effect.link_condition,
            oc.step,
            lit.clone(),
            oc.when,
            mgu,
            problem,
            true,
        ) {
            out.push(child);
        }
    }
    out
}

/// §4.5.1a: reuses an already-present step's effect to close the condition.
/// `Init`'s initial atoms are a producer too, even though it has no entry in
/// `plan.steps`.
fn reuse_step_children(plan: &Plan, oc: &OpenCondition, lit: &Literal, problem: &Problem) -> Vec<Plan> {
    let mut out = Vec::new();
    let mut try_producer = |producer: StepId, effect_index: usize, effect: ProducerEffect, out: &mut Vec<Plan>| {
        if !plan.orderings.possibly_before(producer, producer_point(effect.timing()), oc.step, consumer_point(oc.when)) {
            return;
        }
        let Some(mgu) = plan.bindings.unify(effect.literal(), producer, lit, oc.step) else {
            return;
        };
        let base = Plan {
            open_conditions: plan.open_conditions.remove(oc),
            ..plan.clone()
        };
        if let Some(child) = install_link(
            &base,
            producer,
            effect.timing(),
            effect.condition(),
            effect.link_condition(),
            oc.step,
            lit.clone(),
            oc.when,
            mgu,
            problem,
            false,
        ) {
            out.push(child);
        }
    };
    for (effect_index, effect) in init_effects(problem) {
        try_producer(INIT_ID, effect_index, effect, &mut out);
    }
    for step in plan.steps.iter() {
        for (effect_index, effect) in producer_effects(problem, step) {
            try_producer(step.id, effect_index, effect, &mut out);
        }
    }
    out
}

/// §11: a negative open condition over a static predicate that never
/// appears as the positive atom of any initial literal is trivially true by
/// closed-world assumption and closes with zero children beyond its own
/// removal.
fn closed_world_children(plan: &Plan, oc: &OpenCondition, lit: &Literal, problem: &Problem) -> Vec<Plan> {
    let positive = lit.negate();
    let mut inequalities = Vec::new();
    for atom in &problem.initial {
        if atom.predicate != positive.predicate || atom.args.len() != positive.args.len() {
            continue;
        }
        let Some(mgu) = plan.bindings.unify(&positive, oc.step, atom, INIT_ID) else {
            continue;
        };
        for c in mgu {
            if !constraint_var_is_quantified(&c, oc.step, &[]) {
                if let BindingConstraint::Eq(BoundTerm::Var(sv), BoundTerm::Constant(obj)) = c {
                    inequalities.push(Formula::Inequality(Term::variable(sv.var), Term::object(obj)));
                }
            }
        }
    }
    let removed = Plan {
        open_conditions: plan.open_conditions.remove(oc),
        ..plan.clone()
    };
    if inequalities.is_empty() {
        return vec![removed];
    }
    vec![removed.push_open_conditions(oc.step, Formula::or(inequalities), oc.when)]
}

fn literal_children(plan: &Plan, oc: &OpenCondition, lit: &Literal, problem: &Problem, graph: &PlanningGraph) -> Vec<Plan> {
    let mut out = Vec::new();
    if lit.positive {
        out.extend(add_step_children(plan, oc, lit, problem, graph));
        out.extend(reuse_step_children(plan, oc, lit, problem));
    } else {
        out.extend(reuse_step_children(plan, oc, lit, problem));
        out.extend(closed_world_children(plan, oc, lit, problem));
    }
    out
}

fn disjunction_children(plan: &Plan, oc: &OpenCondition, parts: &[Formula]) -> Vec<Plan> {
    parts
        .iter()
        .map(|d| {
            let base = Plan {
                open_conditions: plan.open_conditions.remove(oc),
                ..plan.clone()
            };
            base.push_open_conditions(oc.step, d.clone(), oc.when)
        })
        .collect()
}

fn ground_tuples(problem: &Problem, vars: &[VarId]) -> Vec<Vec<ObjectId>> {
    use itertools::Itertools;
    if vars.is_empty() {
        return vec![vec![]];
    }
    vars.iter()
        .map(|&v| problem.terms.objects_of_type(&problem.types, problem.terms.variable_type(v)).collect::<Vec<_>>())
        .multi_cartesian_product()
        .collect()
}

fn substitute(f: &Formula, subst: &[(VarId, ObjectId)]) -> Formula {
    fn sub_term(t: Term, subst: &[(VarId, ObjectId)]) -> Term {
        match t.split() {
            TermKind::Variable(v) => subst.iter().find(|(sv, _)| *sv == v).map(|(_, o)| Term::object(*o)).unwrap_or(t),
            TermKind::Object(_) => t,
        }
    }
    match f {
        Formula::True => Formula::True,
        Formula::False => Formula::False,
        Formula::Literal(l) => Formula::Literal(Literal {
            args: l.args.iter().map(|&t| sub_term(t, subst)).collect(),
            ..l.clone()
        }),
        Formula::Equality(a, b) => Formula::Equality(sub_term(*a, subst), sub_term(*b, subst)),
        Formula::Inequality(a, b) => Formula::Inequality(sub_term(*a, subst), sub_term(*b, subst)),
        Formula::Conjunction(parts) => Formula::Conjunction(parts.iter().map(|p| substitute(p, subst)).collect()),
        Formula::Disjunction(parts) => Formula::Disjunction(parts.iter().map(|p| substitute(p, subst)).collect()),
        Formula::Exists(vars, body) => Formula::Exists(vars.clone(), Box::new(substitute(body, subst))),
        Formula::Forall(vars, body) => Formula::Forall(vars.clone(), Box::new(substitute(body, subst))),
    }
}

fn quantifier_children(plan: &Plan, oc: &OpenCondition, vars: &[VarId], body: &Formula, existential: bool, problem: &Problem) -> Vec<Plan> {
    let grounded: Vec<Formula> = ground_tuples(problem, vars)
        .into_iter()
        .map(|objs| substitute(body, &vars.iter().copied().zip(objs).collect::<Vec<_>>()))
        .collect();
    let base = Plan {
        open_conditions: plan.open_conditions.remove(oc),
        ..plan.clone()
    };
    if existential {
        grounded.into_iter().map(|g| base.push_open_conditions(oc.step, g, oc.when)).collect()
    } else {
        vec![base.push_open_conditions(oc.step, Formula::and(grounded), oc.when)]
    }
}

fn equality_children(plan: &Plan, oc: &OpenCondition, a: Term, b: Term, eq: bool) -> Vec<Plan> {
    let c = if eq {
        BindingConstraint::eq_terms(a, oc.step, b, oc.step)
    } else {
        BindingConstraint::neq_terms(a, oc.step, b, oc.step)
    };
    let Some(bindings) = plan.bindings.add(vec![c], false) else {
        return Vec::new();
    };
    vec![Plan {
        bindings,
        open_conditions: plan.open_conditions.remove(oc),
        ..plan.clone()
    }]
}

/// §4.5.1 "Inequality": branches on the variable with the smaller current
/// domain; each candidate value either forces the other term away from it
/// (succeeds) or is pruned because the other term would be forced equal
/// (binding add fails).
fn inequality_branch_children(plan: &Plan, oc: &OpenCondition, a: Term, b: Term) -> Vec<Plan> {
    let domain_of = |t: Term| -> Option<Vec<ObjectId>> {
        match t.split() {
            TermKind::Object(o) => Some(vec![o]),
            TermKind::Variable(v) => plan.bindings.domain(v, oc.step).map(|d| d.into_iter().collect()),
        }
    };
    let (da, db) = (domain_of(a), domain_of(b));
    let (smaller, value_term, other_term) = match (da, db) {
        (Some(da), Some(db)) if da.len() <= db.len() => (da, a, b),
        (Some(_), Some(db)) => (db, b, a),
        (Some(da), None) => (da, a, b),
        (None, Some(db)) => (db, b, a),
        (None, None) => return Vec::new(),
    };
    let _ = smaller.clone();
    let base = Plan {
        open_conditions: plan.open_conditions.remove(oc),
        ..plan.clone()
    };
    smaller
        .into_iter()
        .filter_map(|v| {
            let constraints = vec![
                BindingConstraint::eq_terms(value_term, oc.step, Term::object(v), oc.step),
                BindingConstraint::neq_terms(other_term, oc.step, Term::object(v), oc.step),
            ];
            base.bindings.add(constraints, false).map(|bindings| Plan { bindings, ..base.clone() })
        })
        .collect()
}

/// §4.5.1: resolves one open condition, producing its child plans.
pub fn refine_open_condition(plan: &Plan, oc: &OpenCondition, problem: &Problem, graph: &PlanningGraph) -> Vec<Plan> {
    match &oc.formula {
        Formula::True => vec![Plan {
            open_conditions: plan.open_conditions.remove(oc),
            ..plan.clone()
        }],
        Formula::False => Vec::new(),
        Formula::Literal(lit) => literal_children(plan, oc, lit, problem, graph),
        Formula::Disjunction(parts) => disjunction_children(plan, oc, parts),
        Formula::Inequality(a, b) => inequality_branch_children(plan, oc, *a, *b),
        Formula::Equality(a, b) => equality_children(plan, oc, *a, *b, true),
        Formula::Exists(vars, body) => quantifier_children(plan, oc, vars, body, true, problem),
        Formula::Forall(vars, body) => quantifier_children(plan, oc, vars, body, false, problem),
    }
}

/// §4.5.2: resolves one unsafe link, producing its (promotion, demotion,
/// separation) child plans.
pub fn refine_threat(plan: &Plan, u: &Unsafe, problem: &Problem) -> Vec<Plan> {
    let mut out = Vec::new();
    let removed = Plan {
        unsafes: plan.unsafes.remove(u),
        ..plan.clone()
    };

    // Promotion: link.to < threatening_step.end
    if let Some(orderings) = removed
        .orderings
        .refine(u.link.to, consumer_point(u.link.condition_time), u.step, StepPoint::End, problem.temporal_tolerance)
    {
        out.push(Plan { orderings, ..removed.clone() });
    }

    // Demotion: threatening_step.end < link.from
    if let Some(orderings) = removed
        .orderings
        .refine(u.step, StepPoint::End, u.link.from, producer_point(u.link.from_time), problem.temporal_tolerance)
    {
        out.push(Plan { orderings, ..removed.clone() });
    }

    // Separation. `u.literal` and `u.link.condition` are opposite-polarity
    // (that is what made this a threat), so the separating mgu comes from
    // `affects`, not `unify` — `unify` rejects opposite polarity outright.
    let threatening_action = plan.step(u.step).expect("threatening step exists").action;
    let effect = problem.action(threatening_action).effects[u.effect_index].clone();
    if let Some(mgu) = plan.bindings.affects(&u.literal, u.step, &u.link.condition, u.link.to) {
        for c in &mgu {
            if constraint_var_is_quantified(c, u.step, &effect.forall) {
                continue;
            }
            let neq = match c {
                BindingConstraint::Eq(a, b) => BindingConstraint::Neq(*a, *b),
                BindingConstraint::Neq(a, b) => BindingConstraint::Neq(*a, *b),
            };
            if let Some(bindings) = removed.bindings.add(vec![neq], false) {
                out.push(Plan { bindings, ..removed.clone() });
            }
        }
        if effect.is_conditional() {
            let guarded = Formula::Forall(effect.forall.clone(), Box::new(effect.condition.negation()));
            let when = match u.link.from_time {
                EffectTiming::AtStart => FormulaTime::AtStart,
                EffectTiming::AtEnd => FormulaTime::AtEnd,
            };
            out.push(removed.push_open_conditions(u.step, guarded, when));
        }
    }
    out
}

/// True once every step's parameters are narrowed to at most one legal
/// object; a plan with no steps is trivially fully grounded.
pub fn is_fully_grounded(plan: &Plan, problem: &Problem) -> bool {
    plan.steps.iter().all(|s| {
        let action = problem.action(s.action);
        action
            .params
            .iter()
            .all(|(v, _)| plan.bindings.domain(*v, s.id).map(|d| d.len() <= 1).unwrap_or(true))
    })
}

/// §4.5.4: once a plan is flawless, grounds any step parameter still bound
/// to more than one object. Scans steps and their parameters in order and
/// branches on the first one found with a non-singleton domain; a
/// completely grounded plan yields no children (the caller should treat
/// that as the actual solution).
pub fn ground_completion_children(plan: &Plan, problem: &Problem) -> Vec<Plan> {
    for step in plan.steps.iter() {
        let action = problem.action(step.action);
        for (v, _) in &action.params {
            let Some(dom) = plan.bindings.domain(*v, step.id) else { continue };
            if dom.len() > 1 {
                return dom
                    .into_iter()
                    .filter_map(|val| {
                        let c = BindingConstraint::Eq(BoundTerm::Var(StepVar::new(*v, step.id)), BoundTerm::Constant(val));
                        plan.bindings.add(vec![c], false).map(|bindings| Plan { bindings, ..plan.clone() })
                    })
                    .collect();
            }
        }
    }
    Vec::new()
}
