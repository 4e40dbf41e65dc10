//! The binding constraint store.
//!
//! A [`Bindings`] value is immutable: every mutating-looking operation
//! (`add`) returns a *new* value (or `None` on a dead end) built by cloning
//! the handful of persistent maps that actually changed, so sibling plans in
//! the search tree can share the rest. This mirrors the "persistent update"
//! discipline: callers never observe a partially updated store.

pub mod step_domain;
pub mod varset;

use im::HashMap;
use pocl_domain::{Literal, ObjectId, StepId, StepVar, Term, TermKind, VarId};
use std::collections::{BTreeSet, VecDeque};
use step_domain::ActionDomain;
use varset::{BoundTerm, Varset};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingConstraint {
    Eq(BoundTerm, BoundTerm),
    Neq(BoundTerm, BoundTerm),
}

impl BindingConstraint {
    pub fn eq_terms(t1: Term, step1: StepId, t2: Term, step2: StepId) -> Self {
        BindingConstraint::Eq(resolve(t1, step1), resolve(t2, step2))
    }
    pub fn neq_terms(t1: Term, step1: StepId, t2: Term, step2: StepId) -> Self {
        BindingConstraint::Neq(resolve(t1, step1), resolve(t2, step2))
    }
}

fn resolve(t: Term, step: StepId) -> BoundTerm {
    match t.split() {
        TermKind::Object(o) => BoundTerm::Constant(o),
        TermKind::Variable(v) => BoundTerm::Var(StepVar::new(v, step)),
    }
}

#[derive(Clone, Default)]
pub struct Bindings {
    varsets: HashMap<StepVar, Varset>,
    step_domains: HashMap<StepId, ActionDomain>,
    high_step: StepId,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a term at a given step to its current binding: the constant
    /// it codesignates with, if any, or itself otherwise.
    pub fn binding(&self, t: Term, step: StepId) -> Term {
        match t.split() {
            TermKind::Object(_) => t,
            TermKind::Variable(v) => {
                let sv = StepVar::new(v, step);
                match self.varsets.get(&sv).and_then(|vs| vs.constant) {
                    Some(c) => Term::object(c),
                    None => t,
                }
            }
        }
    }

    /// The current legal parameter domain for a step variable, or `None` if
    /// no domain has been installed for that step.
    pub fn domain(&self, var: VarId, step: StepId) -> Option<BTreeSet<ObjectId>> {
        self.step_domains.get(&step).and_then(|d| d.column_domain(var))
    }

    pub fn step_domain(&self, step: StepId) -> Option<&ActionDomain> {
        self.step_domains.get(&step)
    }

    /// Every distinct equivalence class currently on record, for the verbose
    /// printer (§6, `-v2`) to dump. `Varset` has no `Hash` impl (it holds
    /// `HashSet`s internally), so dedup is by linear scan rather than through
    /// a set.
    pub fn varsets(&self) -> Vec<Varset> {
        let mut out: Vec<Varset> = Vec::new();
        for vs in self.varsets.values() {
            if !out.contains(vs) {
                out.push(vs.clone());
            }
        }
        out
    }

    /// Non-mutating feasibility check: would `add([constraint], true)` succeed?
    pub fn consistent_with(&self, c: BindingConstraint) -> bool {
        self.add(vec![c], true).is_some()
    }

    /// Installs the initial parameter domain for a freshly added step,
    /// narrowing immediately if any column of the supplied tuples is already
    /// a singleton.
    pub fn add_step_domain(&self, step: StepId, params: Vec<VarId>, tuples: Vec<Vec<ObjectId>>) -> Option<Bindings> {
        if tuples.is_empty() && !params.is_empty() {
            return None;
        }
        let domain = ActionDomain::new(params.clone(), tuples);
        let mut next = self.clone();
        next.high_step = next.high_step.max(step);
        next.step_domains.insert(step, domain.clone());
        let mut induced = Vec::new();
        for &p in &params {
            if let Some(col) = domain.column_domain(p) {
                if col.len() == 1 {
                    let v = *col.iter().next().unwrap();
                    induced.push(BindingConstraint::Eq(BoundTerm::Var(StepVar::new(p, step)), BoundTerm::Constant(v)));
                }
            }
        }
        if induced.is_empty() {
            Some(next)
        } else {
            next.add(induced, false)
        }
    }

    /// Extends the store with the given equalities/inequalities, returning
    /// `None` if the result would be inconsistent. When `test_only` is set,
    /// the check is performed but the (possibly narrowed) result is
    /// discarded — callers should use [`Bindings::consistent_with`] for that
    /// case instead of relying on the return value.
    pub fn add(&self, constraints: Vec<BindingConstraint>, test_only: bool) -> Option<Bindings> {
        let mut w = Working {
            varsets: self.varsets.clone(),
            step_domains: self.step_domains.clone(),
        };
        let mut queue: VecDeque<BindingConstraint> = constraints.into_iter().collect();
        while let Some(c) = queue.pop_front() {
            let ok = match c {
                BindingConstraint::Eq(a, b) => w.add_eq(a, b, &mut queue),
                BindingConstraint::Neq(a, b) => w.add_neq(a, b, &mut queue),
            };
            if !ok {
                tracing::trace!(?c, "binding constraint rejected");
                return None;
            }
        }
        if test_only {
            return Some(self.clone());
        }
        Some(Bindings {
            varsets: w.varsets,
            step_domains: w.step_domains,
            high_step: self.high_step,
        })
    }

    /// Computes the most general unifier of two literals at their respective
    /// steps, or `None` if they cannot unify (different polarity, predicate,
    /// or arity, or an incompatible binding). Does not mutate `self`.
    pub fn unify(&self, l1: &Literal, step1: StepId, l2: &Literal, step2: StepId) -> Option<Vec<BindingConstraint>> {
        if l1.positive != l2.positive || l1.predicate != l2.predicate || l1.args.len() != l2.args.len() {
            return None;
        }
        let mut constraints = Vec::with_capacity(l1.args.len());
        for (&t1, &t2) in l1.args.iter().zip(l2.args.iter()) {
            constraints.push(BindingConstraint::eq_terms(t1, step1, t2, step2));
        }
        self.add(constraints.clone(), true)?;
        Some(constraints)
    }

    /// True (with the unifying mgu) iff `l1` is the negation of `l2` and
    /// their atoms unify: a precondition for `l1`'s
    /// step threatening a causal link requiring `l2`, or vice versa.
    pub fn affects(&self, l1: &Literal, step1: StepId, l2: &Literal, step2: StepId) -> Option<Vec<BindingConstraint>> {
        if l1.positive == l2.positive || l1.predicate != l2.predicate || l1.args.len() != l2.args.len() {
            return None;
        }
        let mut constraints = Vec::with_capacity(l1.args.len());
        for (&t1, &t2) in l1.args.iter().zip(l2.args.iter()) {
            constraints.push(BindingConstraint::eq_terms(t1, step1, t2, step2));
        }
        self.add(constraints.clone(), true)?;
        Some(constraints)
    }
}

struct Working {
    varsets: HashMap<StepVar, Varset>,
    step_domains: HashMap<StepId, ActionDomain>,
}

impl Working {
    fn varset_or_singleton(&self, sv: StepVar) -> Varset {
        self.varsets.get(&sv).cloned().unwrap_or_else(|| Varset::singleton(sv))
    }

    /// Narrows every codesignating member's step-domain column to `allowed`
    /// (or to `{constant}` when one is present), enqueueing any equality
    /// induced by a column collapsing to a singleton. Returns `false` if a
    /// column would be emptied.
    fn narrow_members(&mut self, vs: &Varset, queue: &mut VecDeque<BindingConstraint>) -> bool {
        let allowed: Option<BTreeSet<ObjectId>> = if let Some(c) = vs.constant {
            Some(std::iter::once(c).collect())
        } else {
            let mut acc: Option<BTreeSet<ObjectId>> = None;
            for sv in vs.codesignating.iter() {
                if let Some(col) = self.step_domains.get(&sv.step).and_then(|d| d.column_domain(sv.var)) {
                    acc = Some(match acc {
                        None => col,
                        Some(a) => a.intersection(&col).cloned().collect(),
                    });
                }
            }
            acc
        };
        let Some(allowed) = allowed else { return true };
        if allowed.is_empty() {
            return false;
        }
        for sv in vs.codesignating.iter() {
            let Some(dom) = self.step_domains.get(&sv.step) else { continue };
            if !dom.params().contains(&sv.var) {
                continue;
            }
            match dom.narrow_column(sv.var, &allowed) {
                None => return false,
                Some(new_dom) => {
                    if let Some(col) = new_dom.column_domain(sv.var) {
                        if col.len() == 1 {
                            let v = *col.iter().next().unwrap();
                            if vs.constant.is_none() {
                                queue.push_back(BindingConstraint::Eq(BoundTerm::Var(*sv), BoundTerm::Constant(v)));
                            }
                        }
                    }
                    self.step_domains.insert(sv.step, new_dom);
                }
            }
        }
        true
    }

    fn install(&mut self, vs: Varset) {
        for sv in vs.codesignating.iter() {
            self.varsets.insert(*sv, vs.clone());
        }
    }

    fn add_eq(&mut self, a: BoundTerm, b: BoundTerm, queue: &mut VecDeque<BindingConstraint>) -> bool {
        if a == b {
            return true;
        }
        match (a, b) {
            (BoundTerm::Constant(c1), BoundTerm::Constant(c2)) => c1 == c2,
            (BoundTerm::Constant(c), BoundTerm::Var(sv)) | (BoundTerm::Var(sv), BoundTerm::Constant(c)) => {
                let vs = self.varset_or_singleton(sv);
                if let Some(existing) = vs.constant {
                    return existing == c;
                }
                if vs.non_codesignating.contains(&BoundTerm::Constant(c)) {
                    return false;
                }
                let merged = Varset {
                    constant: Some(c),
                    codesignating: vs.codesignating,
                    non_codesignating: vs.non_codesignating,
                };
                if !self.narrow_members(&merged, queue) {
                    return false;
                }
                self.install(merged);
                true
            }
            (BoundTerm::Var(sv1), BoundTerm::Var(sv2)) => {
                let vs1 = self.varset_or_singleton(sv1);
                let vs2 = self.varset_or_singleton(sv2);
                if vs1.codesignating.contains(&sv2) {
                    return true; // already merged
                }
                let constant = match (vs1.constant, vs2.constant) {
                    (Some(c1), Some(c2)) if c1 != c2 => return false,
                    (Some(c), _) | (_, Some(c)) => Some(c),
                    (None, None) => None,
                };
                let codesignating = vs1.codesignating.clone().union(vs2.codesignating.clone());
                let non_codesignating = vs1.non_codesignating.clone().union(vs2.non_codesignating.clone());
                // a variable cannot both codesignate and non-codesignate with the merged class
                if codesignating.iter().any(|v| non_codesignating.contains(&BoundTerm::Var(*v))) {
                    return false;
                }
                if let Some(c) = constant {
                    if non_codesignating.contains(&BoundTerm::Constant(c)) {
                        return false;
                    }
                }
                let merged = Varset {
                    constant,
                    codesignating,
                    non_codesignating,
                };
                if !self.narrow_members(&merged, queue) {
                    return false;
                }
                self.install(merged);
                true
            }
        }
    }

    fn add_neq(&mut self, a: BoundTerm, b: BoundTerm, queue: &mut VecDeque<BindingConstraint>) -> bool {
        if a == b {
            return false;
        }
        match (a, b) {
            (BoundTerm::Constant(c1), BoundTerm::Constant(c2)) => c1 != c2,
            (BoundTerm::Constant(c), BoundTerm::Var(sv)) | (BoundTerm::Var(sv), BoundTerm::Constant(c)) => {
                let vs = self.varset_or_singleton(sv);
                if vs.constant == Some(c) {
                    return false;
                }
                let merged = Varset {
                    non_codesignating: vs.non_codesignating.update(BoundTerm::Constant(c)),
                    ..vs
                };
                for sv in merged.codesignating.iter() {
                    if let Some(dom) = self.step_domains.get(&sv.step) {
                        if !dom.params().contains(&sv.var) {
                            continue;
                        }
                        match dom.exclude_from_column(sv.var, c) {
                            None => return false,
                            Some(new_dom) => {
                                if let Some(col) = new_dom.column_domain(sv.var) {
                                    if col.len() == 1 {
                                        let v = *col.iter().next().unwrap();
                                        queue.push_back(BindingConstraint::Eq(BoundTerm::Var(*sv), BoundTerm::Constant(v)));
                                    }
                                }
                                self.step_domains.insert(sv.step, new_dom);
                            }
                        }
                    }
                }
                self.install(merged);
                true
            }
            (BoundTerm::Var(sv1), BoundTerm::Var(sv2)) => {
                let vs1 = self.varset_or_singleton(sv1);
                let vs2 = self.varset_or_singleton(sv2);
                if vs1.codesignating.contains(&sv2) {
                    return false; // already codesignate: inequality violated
                }
                let vs1_non = vs2
                    .codesignating
                    .iter()
                    .fold(vs1.non_codesignating.clone(), |acc, v| acc.update(BoundTerm::Var(*v)));
                let vs1_non = match vs2.constant {
                    Some(c) => vs1_non.update(BoundTerm::Constant(c)),
                    None => vs1_non,
                };
                let vs2_non = vs1
                    .codesignating
                    .iter()
                    .fold(vs2.non_codesignating.clone(), |acc, v| acc.update(BoundTerm::Var(*v)));
                let vs2_non = match vs1.constant {
                    Some(c) => vs2_non.update(BoundTerm::Constant(c)),
                    None => vs2_non,
                };
                let new_vs1 = Varset {
                    constant: vs1.constant,
                    codesignating: vs1.codesignating.clone(),
                    non_codesignating: vs1_non,
                };
                let new_vs2 = Varset {
                    constant: vs2.constant,
                    codesignating: vs2.codesignating.clone(),
                    non_codesignating: vs2_non,
                };
                // exclude each side's constant from the other's columns
                if let Some(c2) = vs2.constant {
                    for sv in new_vs1.codesignating.iter() {
                        if let Some(dom) = self.step_domains.get(&sv.step) {
                            if !dom.params().contains(&sv.var) {
                                continue;
                            }
                            match dom.exclude_from_column(sv.var, c2) {
                                None => return false,
                                Some(d) => {
                                    self.step_domains.insert(sv.step, d);
                                }
                            }
                        }
                    }
                }
                if let Some(c1) = vs1.constant {
                    for sv in new_vs2.codesignating.iter() {
                        if let Some(dom) = self.step_domains.get(&sv.step) {
                            if !dom.params().contains(&sv.var) {
                                continue;
                            }
                            match dom.exclude_from_column(sv.var, c1) {
                                None => return false,
                                Some(d) => {
                                    self.step_domains.insert(sv.step, d);
                                }
                            }
                        }
                    }
                }
                self.install(new_vs1);
                self.install(new_vs2);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_domain::terms::{ObjectId, VarId};

    fn oid(i: u32) -> ObjectId {
        ObjectId::from_u32(i)
    }
    fn vid(i: u32) -> VarId {
        VarId::from_u32(i)
    }

    #[test]
    fn equality_binds_variable_to_constant() {
        let b = Bindings::new();
        let sv = StepVar::new(vid(0), 1);
        let b2 = b
            .add(vec![BindingConstraint::Eq(BoundTerm::Var(sv), BoundTerm::Constant(oid(7)))], false)
            .unwrap();
        assert_eq!(b2.binding(Term::variable(vid(0)), 1), Term::object(oid(7)));
        // original untouched: binding monotonicity / persistent non-mutation.
        assert_eq!(b.binding(Term::variable(vid(0)), 1), Term::variable(vid(0)));
    }

    #[test]
    fn conflicting_equalities_fail() {
        let b = Bindings::new();
        let sv = StepVar::new(vid(0), 1);
        let b = b.add(vec![BindingConstraint::Eq(BoundTerm::Var(sv), BoundTerm::Constant(oid(1)))], false).unwrap();
        let b2 = b.add(vec![BindingConstraint::Eq(BoundTerm::Var(sv), BoundTerm::Constant(oid(2)))], false);
        assert!(b2.is_none());
    }

    #[test]
    fn inequality_excludes_constant_from_domain() {
        let b = Bindings::new();
        let sv = StepVar::new(vid(0), 1);
        let b = b.add_step_domain(1, vec![vid(0)], vec![vec![oid(1)], vec![oid(2)]]).unwrap();
        let b = b.add(vec![BindingConstraint::Neq(BoundTerm::Var(sv), BoundTerm::Constant(oid(1)))], false).unwrap();
        // only oid(2) remains -> singleton propagation binds the variable
        assert_eq!(b.binding(Term::variable(vid(0)), 1), Term::object(oid(2)));
    }

    #[test]
    fn inequality_between_codesignating_vars_fails() {
        let b = Bindings::new();
        let sv1 = StepVar::new(vid(0), 1);
        let sv2 = StepVar::new(vid(1), 1);
        let b = b
            .add(vec![BindingConstraint::Eq(BoundTerm::Var(sv1), BoundTerm::Var(sv2))], false)
            .unwrap();
        let b2 = b.add(vec![BindingConstraint::Neq(BoundTerm::Var(sv1), BoundTerm::Var(sv2))], false);
        assert!(b2.is_none());
    }

    #[test]
    fn unify_requires_same_polarity_predicate_arity() {
        use pocl_domain::{FormulaTime, Literal};
        let b = Bindings::new();
        let p = pocl_domain::PredicateId::from_u32(0);
        let l1 = Literal::atom(p, vec![Term::variable(vid(0))], FormulaTime::AtStart);
        let mut l2 = l1.clone();
        l2.positive = false;
        assert!(b.unify(&l1, 1, &l2, 2).is_none());
        assert!(b.affects(&l1, 1, &l2, 2).is_some());
    }
}
