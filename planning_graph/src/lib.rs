//! The planning-graph heuristic oracle: relaxed (delete-ignoring) forward
//! reachability over ground atoms, producing per-literal heuristic values,
//! achiever sets, and per-action parameter domains.
//!
//! Built once per search from the [`Problem`] and never mutated afterwards —
//! unlike [`pocl_bindings::Bindings`] and the ordering stores, the graph is
//! not part of a plan's persistent chain of refinements; every plan in a
//! search shares the same immutable graph by reference.

use itertools::Itertools;
use pocl_domain::{Action, ActionId, Formula, Literal, ObjectId, PredicateId, Problem, Term, TermKind, VarId};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// The additive-cost / achiever-count / critical-path-makespan triple
/// attached to every reachable literal and ground action.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HeuristicValue {
    pub add_cost: f64,
    pub add_work: u32,
    pub makespan: f64,
}

impl HeuristicValue {
    pub const ZERO: HeuristicValue = HeuristicValue {
        add_cost: 0.0,
        add_work: 0,
        makespan: 0.0,
    };
    pub const INFINITE: HeuristicValue = HeuristicValue {
        add_cost: f64::INFINITY,
        add_work: u32::MAX,
        makespan: f64::INFINITY,
    };
    /// The cost of a single additional action application on top of an
    /// already-achieved condition.
    pub const UNIT: HeuristicValue = HeuristicValue {
        add_cost: 1.0,
        add_work: 1,
        makespan: 1.0,
    };

    pub fn is_infinite(&self) -> bool {
        self.add_cost.is_infinite()
    }

    /// Conjunction: costs add, makespans take the critical path.
    pub fn plus(self, other: HeuristicValue) -> HeuristicValue {
        HeuristicValue {
            add_cost: self.add_cost + other.add_cost,
            add_work: self.add_work.saturating_add(other.add_work),
            makespan: self.makespan.max(other.makespan),
        }
    }

    /// Disjunction: componentwise minimum, ties on `add_cost` broken by `add_work`.
    pub fn min(self, other: HeuristicValue) -> HeuristicValue {
        if other.add_cost < self.add_cost || (other.add_cost == self.add_cost && other.add_work < self.add_work) {
            other
        } else {
            self
        }
    }
}

impl std::ops::Add for HeuristicValue {
    type Output = HeuristicValue;
    fn add(self, rhs: HeuristicValue) -> HeuristicValue {
        self.plus(rhs)
    }
}

/// A fully ground atom: a predicate applied to concrete objects. Used both as
/// a reachability-table key and as an achiever's produced literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroundAtom {
    pub predicate: PredicateId,
    pub args: SmallVec<[ObjectId; 4]>,
}

/// Whether obtaining a literal through this achiever would require a fresh
/// step or can be satisfied by a step already present in a given partial
/// plan. The planning graph itself is plan-agnostic (it is built once and
/// shared read-only across the whole search), so this is a classification
/// function rather than a stored property: the caller supplies the set of
/// steps already in its plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AchieverKind {
    New,
    Reuse,
}

/// An `(action-schema, effect)` pair, fully grounded, that was recorded as
/// producing some positive literal during the graph's fixed-point computation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Achiever {
    pub action: ActionId,
    pub effect_index: usize,
    pub args: SmallVec<[ObjectId; 4]>,
}

impl Achiever {
    /// Classifies this achiever against a partial plan's existing steps
    /// (each given as its action id and its currently bound argument tuple,
    /// with `None` for parameters still unbound — an unbound parameter can
    /// always be narrowed to match, so it is treated as compatible).
    pub fn classify<'a>(&self, existing_steps: impl IntoIterator<Item = (ActionId, &'a [Option<ObjectId>])>) -> AchieverKind {
        for (action, args) in existing_steps {
            if action != self.action || args.len() != self.args.len() {
                continue;
            }
            let compatible = args.iter().zip(self.args.iter()).all(|(bound, &needed)| match bound {
                None => true,
                Some(b) => *b == needed,
            });
            if compatible {
                return AchieverKind::Reuse;
            }
        }
        AchieverKind::New
    }
}

pub struct PlanningGraph {
    reachable: HashMap<GroundAtom, HeuristicValue>,
    achievers: HashMap<GroundAtom, Vec<Achiever>>,
    action_domains: HashMap<ActionId, Vec<Vec<ObjectId>>>,
    initial: HashSet<GroundAtom>,
}

fn ground_term(t: Term, subst: &HashMap<VarId, ObjectId>) -> Option<ObjectId> {
    match t.split() {
        TermKind::Object(o) => Some(o),
        TermKind::Variable(v) => subst.get(&v).copied(),
    }
}

fn ground_literal(lit: &Literal, subst: &HashMap<VarId, ObjectId>) -> Option<GroundAtom> {
    let mut args = SmallVec::with_capacity(lit.args.len());
    for &t in &lit.args {
        args.push(ground_term(t, subst)?);
    }
    Some(GroundAtom {
        predicate: lit.predicate,
        args,
    })
}

/// All type-compatible object tuples for a parameter list, as the cartesian
/// product of each parameter's individual type-filtered object list.
fn candidate_tuples(problem: &Problem, params: &[(VarId, pocl_domain::TypeRef)]) -> Vec<Vec<ObjectId>> {
    if params.is_empty() {
        return vec![vec![]];
    }
    let per_param: Vec<Vec<ObjectId>> = params
        .iter()
        .map(|(_, ty)| problem.terms.objects_of_type(&problem.types, ty).collect())
        .collect();
    per_param.into_iter().multi_cartesian_product().collect()
}

fn extend(base: &HashMap<VarId, ObjectId>, vars: &[VarId], objs: &[ObjectId]) -> HashMap<VarId, ObjectId> {
    let mut s = base.clone();
    for (&v, &o) in vars.iter().zip(objs.iter()) {
        s.insert(v, o);
    }
    s
}

impl PlanningGraph {
    /// Runs the fixed-point reachability computation described in the
    /// design's planning-graph section: ground every action schema over its
    /// type-compatible argument tuples, and repeatedly fire those whose
    /// condition has finite heuristic value, recording achievers and
    /// improving literal costs, until no literal's value improves further.
    pub fn build(problem: &Problem) -> PlanningGraph {
        let initial: HashSet<GroundAtom> = problem.initial.iter().filter_map(|l| ground_literal(l, &HashMap::new())).collect();
        let mut reachable: HashMap<GroundAtom, HeuristicValue> = initial.iter().cloned().map(|a| (a, HeuristicValue::ZERO)).collect();
        let mut achievers: HashMap<GroundAtom, Vec<Achiever>> = HashMap::new();
        let mut seen_achievers: HashSet<(GroundAtom, Achiever)> = HashSet::new();
        let mut action_domains: HashMap<ActionId, HashSet<Vec<ObjectId>>> = HashMap::new();

        let grounded: Vec<(ActionId, &Action, Vec<ObjectId>)> = problem
            .actions
            .iter()
            .flat_map(|(id, a)| candidate_tuples(problem, &a.params).into_iter().map(move |args| (id, a, args)))
            .collect();

        let mut changed = true;
        let mut iterations = 0usize;
        while changed {
            changed = false;
            iterations += 1;
            for (action_id, action, args) in &grounded {
                let subst = extend(&HashMap::new(), &action.params.iter().map(|(v, _)| *v).collect::<Vec<_>>(), args);
                let cond_value = Self::value(problem, &reachable, &action.condition, &subst);
                if cond_value.is_infinite() {
                    continue;
                }
                action_domains.entry(*action_id).or_default().insert(args.clone());
                for (effect_index, effect) in action.effects.iter().enumerate() {
                    if !effect.literal.positive {
                        continue; // delete-relaxation: deletes are ignored
                    }
                    for e_args in candidate_tuples_for_vars(problem, &effect.forall) {
                        let full_subst = extend(&subst, &effect.forall, &e_args);
                        let econd = Self::value(problem, &reachable, &effect.condition, &full_subst);
                        if econd.is_infinite() {
                            continue;
                        }
                        let Some(atom) = ground_literal(&effect.literal, &full_subst) else {
                            continue;
                        };
                        let new_cost = cond_value.plus(econd).plus(HeuristicValue::UNIT);
                        let improved = match reachable.get(&atom) {
                            None => true,
                            Some(&old) => new_cost.add_cost < old.add_cost,
                        };
                        if improved {
                            reachable.insert(atom.clone(), new_cost);
                            changed = true;
                        }
                        let achiever = Achiever {
                            action: *action_id,
                            effect_index,
                            args: args.iter().copied().collect(),
                        };
                        if seen_achievers.insert((atom.clone(), achiever.clone())) {
                            achievers.entry(atom).or_default().push(achiever);
                        }
                    }
                }
            }
            if iterations > 10_000 {
                tracing::warn!("planning graph fixed point did not converge after 10000 passes; stopping");
                break;
            }
        }

        PlanningGraph {
            reachable,
            achievers,
            action_domains: action_domains.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect(),
            initial,
        }
    }

    /// The heuristic value of a (possibly open, under `subst`) formula.
    pub fn value(problem: &Problem, reachable: &HashMap<GroundAtom, HeuristicValue>, f: &Formula, subst: &HashMap<VarId, ObjectId>) -> HeuristicValue {
        match f {
            Formula::True => HeuristicValue::ZERO,
            Formula::False => HeuristicValue::INFINITE,
            Formula::Literal(lit) => {
                let Some(atom) = ground_literal(lit, subst) else {
                    return HeuristicValue::INFINITE;
                };
                if lit.positive {
                    reachable.get(&atom).copied().unwrap_or(HeuristicValue::INFINITE)
                } else if problem.initial.iter().any(|l| ground_literal(l, &HashMap::new()).as_ref() == Some(&atom)) {
                    HeuristicValue::INFINITE
                } else {
                    HeuristicValue::ZERO
                }
            }
            Formula::Equality(a, b) => match (ground_term(*a, subst), ground_term(*b, subst)) {
                (Some(x), Some(y)) if x == y => HeuristicValue::ZERO,
                (Some(_), Some(_)) => HeuristicValue::INFINITE,
                _ => HeuristicValue::INFINITE,
            },
            Formula::Inequality(a, b) => match (ground_term(*a, subst), ground_term(*b, subst)) {
                (Some(x), Some(y)) if x != y => HeuristicValue::ZERO,
                (Some(_), Some(_)) => HeuristicValue::INFINITE,
                _ => HeuristicValue::INFINITE,
            },
            Formula::Conjunction(parts) => parts.iter().fold(HeuristicValue::ZERO, |acc, p| acc.plus(Self::value(problem, reachable, p, subst))),
            Formula::Disjunction(parts) => parts
                .iter()
                .fold(HeuristicValue::INFINITE, |acc, p| acc.min(Self::value(problem, reachable, p, subst))),
            Formula::Exists(vars, body) => candidate_tuples_for_vars(problem, vars)
                .into_iter()
                .map(|objs| Self::value(problem, reachable, body, &extend(subst, vars, &objs)))
                .fold(HeuristicValue::INFINITE, HeuristicValue::min),
            Formula::Forall(vars, body) => candidate_tuples_for_vars(problem, vars)
                .into_iter()
                .map(|objs| Self::value(problem, reachable, body, &extend(subst, vars, &objs)))
                .fold(HeuristicValue::ZERO, HeuristicValue::plus),
        }
    }

    /// The union of argument tuples for which `name`'s precondition was
    /// reachable at some point in the fixed point — the initial step-domain
    /// the binding store installs for a freshly added step of this action.
    pub fn action_domain(&self, id: ActionId) -> &[Vec<ObjectId>] {
        self.action_domains.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Achievers whose ground atom structurally matches `args` (object
    /// positions must match exactly; variable positions match anything).
    /// Lifted callers still run the precise binding-store unification before
    /// committing to one of these.
    pub fn literal_achievers(&self, predicate: PredicateId, args: &[Term]) -> Vec<&Achiever> {
        self.achievers
            .iter()
            .filter(|(atom, _)| atom.predicate == predicate && atom.args.len() == args.len())
            .filter(|(atom, _)| {
                args.iter().zip(atom.args.iter()).all(|(t, &o)| match t.split() {
                    TermKind::Object(to) => to == o,
                    TermKind::Variable(_) => true,
                })
            })
            .flat_map(|(_, achs)| achs.iter())
            .collect()
    }

    pub fn literal_value(&self, predicate: PredicateId, args: &[ObjectId]) -> HeuristicValue {
        let atom = GroundAtom {
            predicate,
            args: args.iter().copied().collect(),
        };
        self.reachable.get(&atom).copied().unwrap_or(HeuristicValue::INFINITE)
    }

    pub fn is_in_initial_state(&self, predicate: PredicateId, args: &[ObjectId]) -> bool {
        let atom = GroundAtom {
            predicate,
            args: args.iter().copied().collect(),
        };
        self.initial.contains(&atom)
    }
}

fn candidate_tuples_for_vars(problem: &Problem, vars: &[VarId]) -> Vec<Vec<ObjectId>> {
    if vars.is_empty() {
        return vec![vec![]];
    }
    let per_var: Vec<Vec<ObjectId>> = vars
        .iter()
        .map(|&v| problem.terms.objects_of_type(&problem.types, problem.terms.variable_type(v)).collect())
        .collect();
    per_var.into_iter().multi_cartesian_product().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_domain::builder::{atom, lifted_action, simple_effect, ProblemBuilder};
    use pocl_domain::{EffectTiming, FormulaTime};

    fn blocksworld() -> Problem {
        let mut b = ProblemBuilder::new("blocksworld");
        let obj = b.object_type();
        let on = b.add_predicate("on", vec![obj.clone(), obj.clone()]);
        let on_table = b.add_predicate("on-table", vec![obj.clone()]);
        let clear = b.add_predicate("clear", vec![obj.clone()]);
        let a = b.add_object("a", obj.clone());
        let bb = b.add_object("b", obj.clone());
        let x = b.add_variable("x", obj.clone());
        let y = b.add_variable("y", obj.clone());
        let stack = lifted_action(
            "stack",
            vec![(x, obj.clone()), (y, obj.clone())],
            Formula::and(vec![
                Formula::Literal(atom(clear, &[Term::variable(y)], FormulaTime::AtStart)),
                Formula::Literal(atom(on_table, &[Term::variable(x)], FormulaTime::AtStart)),
            ]),
            vec![simple_effect(atom(on, &[Term::variable(x), Term::variable(y)], FormulaTime::AtEnd), EffectTiming::AtEnd)],
            None,
        );
        b.add_action(stack);
        b.add_initial(atom(on_table, &[Term::object(a)], FormulaTime::AtStart));
        b.add_initial(atom(on_table, &[Term::object(bb)], FormulaTime::AtStart));
        b.add_initial(atom(clear, &[Term::object(a)], FormulaTime::AtStart));
        b.add_initial(atom(clear, &[Term::object(bb)], FormulaTime::AtStart));
        b.set_goal(Formula::Literal(atom(on, &[Term::object(a), Term::object(bb)], FormulaTime::AtStart)));
        b.finalize_statics();
        b.build()
    }

    #[test]
    fn reachability_finds_goal_literal() {
        let p = blocksworld();
        let g = PlanningGraph::build(&p);
        let a = p.terms.objects().next().unwrap();
        let b = p.terms.objects().nth(1).unwrap();
        let on = p.predicates.predicates().find(|&pr| p.predicates.name(pr) == "on").unwrap();
        let v = g.literal_value(on, &[a, b]);
        assert!(!v.is_infinite());
    }

    #[test]
    fn achievers_recorded_for_stack_effect() {
        let p = blocksworld();
        let g = PlanningGraph::build(&p);
        let on = p.predicates.predicates().find(|&pr| p.predicates.name(pr) == "on").unwrap();
        let achievers = g.literal_achievers(on, &[Term::variable(pocl_domain::VarId::from_u32(0)), Term::variable(pocl_domain::VarId::from_u32(1))]);
        assert!(!achievers.is_empty());
    }

    #[test]
    fn negative_literal_present_in_init_is_unreachable() {
        let p = blocksworld();
        let g = PlanningGraph::build(&p);
        let a = p.terms.objects().next().unwrap();
        let clear = p.predicates.predicates().find(|&pr| p.predicates.name(pr) == "clear").unwrap();
        let v = PlanningGraph::value(&p, &g.reachable, &Formula::Literal(atom(clear, &[Term::object(a)], FormulaTime::AtStart).negate()), &HashMap::new());
        assert!(v.is_infinite());
    }
}
