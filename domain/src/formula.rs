//! Literals and the formula ADT, a tagged sum type standing in for runtime
//! downcasting.

use crate::predicates::PredicateId;
use crate::terms::Term;
use smallvec::SmallVec;

/// When within a durative action's condition a literal must hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FormulaTime {
    AtStart,
    OverAll,
    AtEnd,
}

/// `Atom(predicate, [term...])` or its negation, annotated with the time at
/// which it is required to hold. Equality/inequality are *not* represented
/// here: they are binding-literals (see [`Formula::Equality`] /
/// [`Formula::Inequality`]) over two step-indexed terms, not ordinary atoms.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    pub predicate: PredicateId,
    pub args: SmallVec<[Term; 4]>,
    pub positive: bool,
    pub when: FormulaTime,
}

impl Literal {
    pub fn atom(predicate: PredicateId, args: impl Into<SmallVec<[Term; 4]>>, when: FormulaTime) -> Self {
        Literal {
            predicate,
            args: args.into(),
            positive: true,
            when,
        }
    }

    pub fn negate(&self) -> Literal {
        Literal {
            positive: !self.positive,
            ..self.clone()
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// A single existential/universal quantifier's bound variable together with
/// its declared type, as used by `Formula::Exists`/`Formula::Forall`.
pub type QuantifiedVar = crate::terms::VarId;

/// Tagged sum type standing in for the original `Formula`/downcast hierarchy
/// (`Literal`, `Conjunction`, `Disjunction`, `Exists`, `Forall`, `Equality`,
/// `Inequality`). A `match` on this enum is exhaustive, so the "unknown kind
/// of goal/flaw" dead branch the original language needed is statically
/// unreachable here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Formula {
    True,
    False,
    Literal(Literal),
    /// `t1 = t2`, a binding-literal over two step-indexed terms.
    Equality(Term, Term),
    /// `t1 != t2`, a binding-literal over two step-indexed terms.
    Inequality(Term, Term),
    Conjunction(Vec<Formula>),
    Disjunction(Vec<Formula>),
    Exists(Vec<QuantifiedVar>, Box<Formula>),
    Forall(Vec<QuantifiedVar>, Box<Formula>),
}

impl Formula {
    pub fn is_true(&self) -> bool {
        matches!(self, Formula::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Formula::False)
    }

    pub fn and(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| !f.is_true()).collect();
        if parts.iter().any(Formula::is_false) {
            Formula::False
        } else if parts.is_empty() {
            Formula::True
        } else if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Formula::Conjunction(parts)
        }
    }

    pub fn or(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| !f.is_false()).collect();
        if parts.iter().any(Formula::is_true) {
            Formula::True
        } else if parts.is_empty() {
            Formula::False
        } else if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Formula::Disjunction(parts)
        }
    }

    pub fn negation(&self) -> Formula {
        match self {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Literal(l) => Formula::Literal(l.negate()),
            Formula::Equality(a, b) => Formula::Inequality(*a, *b),
            Formula::Inequality(a, b) => Formula::Equality(*a, *b),
            Formula::Conjunction(parts) => Formula::Disjunction(parts.iter().map(Formula::negation).collect()),
            Formula::Disjunction(parts) => Formula::Conjunction(parts.iter().map(Formula::negation).collect()),
            Formula::Exists(vars, body) => Formula::Forall(vars.clone(), Box::new(body.negation())),
            Formula::Forall(vars, body) => Formula::Exists(vars.clone(), Box::new(body.negation())),
        }
    }
}
