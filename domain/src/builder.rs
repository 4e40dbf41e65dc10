//! A small fluent builder for assembling a [`Problem`] by hand.
//!
//! This stands in for the PDDL lexer/parser (an external collaborator, out of
//! scope for this crate) so that tests and end-to-end scenarios can construct
//! tiny domains without a parser.

use crate::action::{Action, ActionId, Duration, Effect, EffectTiming};
use crate::formula::{Formula, FormulaTime, Literal};
use crate::predicates::PredicateId;
use crate::problem::Problem;
use crate::terms::{ObjectId, Term, TermTable, VarId};
use crate::types::{SimpleTypeId, TypeRef, TypeTable};

pub struct ProblemBuilder {
    name: String,
    types: TypeTable,
    predicates: crate::predicates::PredicateTable,
    terms: TermTable,
    actions: crate::action::ActionTable,
    initial: Vec<Literal>,
    goal: Formula,
    temporal_tolerance: f64,
    object_ty: SimpleTypeId,
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut types = TypeTable::new();
        let object_ty = types.add_type("object", vec![]);
        ProblemBuilder {
            name: name.into(),
            types,
            predicates: Default::default(),
            terms: TermTable::new(),
            actions: Default::default(),
            initial: Vec::new(),
            goal: Formula::True,
            temporal_tolerance: 0.01,
            object_ty,
        }
    }

    pub fn object_type(&self) -> TypeRef {
        TypeRef::Simple(self.object_ty)
    }

    pub fn object_type_id(&self) -> SimpleTypeId {
        self.object_ty
    }

    pub fn variable_type(&self, v: VarId) -> TypeRef {
        self.terms.variable_type(v).clone()
    }

    pub fn add_type(&mut self, name: &str, parents: Vec<SimpleTypeId>) -> SimpleTypeId {
        self.types.add_type(name, parents)
    }

    pub fn add_object(&mut self, name: &str, ty: TypeRef) -> ObjectId {
        self.terms.add_object(name, ty)
    }

    pub fn add_variable(&mut self, name: &str, ty: TypeRef) -> VarId {
        self.terms.add_variable(name, ty)
    }

    pub fn add_predicate(&mut self, name: &str, arg_types: Vec<TypeRef>) -> PredicateId {
        self.predicates.add_predicate(name, arg_types)
    }

    pub fn add_action(&mut self, a: Action) -> ActionId {
        self.actions.add_action(a)
    }

    pub fn set_temporal_tolerance(&mut self, t: f64) {
        self.temporal_tolerance = t;
    }

    pub fn add_initial(&mut self, lit: Literal) {
        self.initial.push(lit);
    }

    pub fn set_goal(&mut self, goal: Formula) {
        self.goal = goal;
    }

    /// Marks predicates that appear in no action effect as static.
    /// Must be called after all actions have been added.
    pub fn finalize_statics(&mut self) {
        let mut dynamic = std::collections::HashSet::new();
        for (_, a) in self.actions.iter() {
            for e in &a.effects {
                dynamic.insert(e.literal.predicate);
            }
        }
        for p in self.predicates.predicates().collect::<Vec<_>>() {
            if !dynamic.contains(&p) {
                self.predicates.mark_static(p);
            }
        }
    }

    pub fn build(self) -> Problem {
        Problem {
            name: self.name,
            types: self.types,
            predicates: self.predicates,
            terms: self.terms,
            actions: self.actions,
            initial: self.initial,
            goal: self.goal,
            temporal_tolerance: self.temporal_tolerance,
        }
    }
}

/// Convenience constructor for a positive at-start/at-end literal over ground
/// or lifted terms.
pub fn atom(predicate: PredicateId, args: &[Term], when: FormulaTime) -> Literal {
    Literal {
        predicate,
        args: args.iter().copied().collect(),
        positive: true,
        when,
    }
}

pub fn ground_action(name: &str, condition: Formula, effects: Vec<Effect>) -> Action {
    Action {
        name: name.to_string(),
        params: vec![],
        condition,
        effects,
        duration: None,
    }
}

pub fn lifted_action(
    name: &str,
    params: Vec<(VarId, TypeRef)>,
    condition: Formula,
    effects: Vec<Effect>,
    duration: Option<Duration>,
) -> Action {
    Action {
        name: name.to_string(),
        params,
        condition,
        effects,
        duration,
    }
}

pub fn simple_effect(literal: Literal, timing: EffectTiming) -> Effect {
    Effect {
        forall: vec![],
        condition: Formula::True,
        link_condition: Formula::True,
        literal,
        timing,
    }
}
