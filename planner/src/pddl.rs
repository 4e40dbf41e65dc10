//! A minimal PDDL-ish domain/problem reader.
//!
//! This is deliberately not a full PDDL 2.1 parser (no `:functions`,
//! numeric fluents, axioms, or `either`-typed params): it covers typed
//! objects, `:predicates`, `:action`/`:durative-action` with
//! `and`/`or`/`not`/`forall`/`exists`/`=` conditions and
//! `and`/`forall`/`when` effects, enough to drive the refinement engine
//! from text files instead of hand-building a [`Problem`] in code.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};

use pocl_domain::action::{Duration, Effect, EffectTiming};
use pocl_domain::builder::{atom, lifted_action, simple_effect, ProblemBuilder};
use pocl_domain::formula::{Formula, FormulaTime};
use pocl_domain::terms::{ObjectId, Term, VarId};
use pocl_domain::types::{SimpleTypeId, TypeRef};
use pocl_domain::predicates::PredicateId;
use pocl_domain::Problem;

use crate::sexpr::{self, Sexpr};

pub struct Reader {
    builder: ProblemBuilder,
    types_by_name: HashMap<String, SimpleTypeId>,
    predicates_by_name: HashMap<String, PredicateId>,
    objects_by_name: HashMap<String, ObjectId>,
}

impl Reader {
    fn new(name: &str) -> Self {
        let builder = ProblemBuilder::new(name);
        let mut types_by_name = HashMap::new();
        types_by_name.insert("object".to_string(), builder.object_type_id());
        Reader {
            builder,
            types_by_name,
            predicates_by_name: HashMap::new(),
            objects_by_name: HashMap::new(),
        }
    }

    fn type_ref(&self, name: &str) -> Result<TypeRef> {
        self.types_by_name
            .get(name)
            .map(|&id| TypeRef::Simple(id))
            .ok_or_else(|| anyhow!("undeclared type `{name}`"))
    }

    /// Splits a flat `?a ?b - t1 ?c - t2 ?d` parameter/object/type list into
    /// `(name, type)` pairs; a trailing group with no `- type` defaults to
    /// `object`.
    fn typed_groups(items: &[Sexpr]) -> Result<Vec<(String, String)>> {
        let atoms: Vec<&str> = items
            .iter()
            .map(|s| s.atom().ok_or_else(|| anyhow!("expected a flat name list, found a nested list")))
            .collect::<Result<_>>()?;
        let mut out = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut i = 0;
        while i < atoms.len() {
            if atoms[i] == "-" {
                let ty = atoms.get(i + 1).ok_or_else(|| anyhow!("`-` with no following type name"))?;
                for name in pending.drain(..) {
                    out.push((name, ty.to_string()));
                }
                i += 2;
            } else {
                pending.push(atoms[i].to_string());
                i += 1;
            }
        }
        for name in pending.drain(..) {
            out.push((name, "object".to_string()));
        }
        Ok(out)
    }

    fn add_types(&mut self, items: &[Sexpr]) -> Result<()> {
        for (name, parent) in Self::typed_groups(items)? {
            let parent_id = self.types_by_name.get(&parent).copied().ok_or_else(|| anyhow!("type `{parent}` used as a parent before it was declared"))?;
            let id = self.builder.add_type(&name, vec![parent_id]);
            self.types_by_name.insert(name, id);
        }
        Ok(())
    }

    fn add_objects(&mut self, items: &[Sexpr]) -> Result<()> {
        for (name, ty) in Self::typed_groups(items)? {
            let ty = self.type_ref(&ty)?;
            let id = self.builder.add_object(&name, ty);
            self.objects_by_name.insert(name, id);
        }
        Ok(())
    }

    fn add_predicates(&mut self, items: &[Sexpr]) -> Result<()> {
        for decl in items {
            let decl = decl.list().ok_or_else(|| anyhow!("expected a predicate declaration list"))?;
            let (name, rest) = decl.split_first().ok_or_else(|| anyhow!("empty predicate declaration"))?;
            let name = name.atom().ok_or_else(|| anyhow!("predicate name must be an atom"))?;
            let arg_types = Self::typed_groups(rest)?
                .into_iter()
                .map(|(_, ty)| self.type_ref(&ty))
                .collect::<Result<Vec<_>>>()?;
            let id = self.builder.add_predicate(name, arg_types);
            self.predicates_by_name.insert(name.to_string(), id);
        }
        Ok(())
    }

    fn predicate_id(&self, name: &str) -> Result<PredicateId> {
        self.predicates_by_name.get(name).copied().ok_or_else(|| anyhow!("undeclared predicate `{name}`"))
    }

    fn term_of(&self, s: &Sexpr, vars: &HashMap<String, VarId>) -> Result<Term> {
        let name = s.atom().ok_or_else(|| anyhow!("expected a term, found a list"))?;
        if let Some(&v) = vars.get(name) {
            return Ok(Term::variable(v));
        }
        if let Some(&o) = self.objects_by_name.get(name) {
            return Ok(Term::object(o));
        }
        bail!("unbound term `{name}`")
    }

    fn quantified_vars(&mut self, items: &[Sexpr], vars: &mut HashMap<String, VarId>) -> Result<Vec<VarId>> {
        let mut bound = Vec::new();
        for (name, ty) in Self::typed_groups(items)? {
            let ty = self.type_ref(&ty)?;
            let v = self.builder.add_variable(name.trim_start_matches('?'), ty);
            vars.insert(name, v);
            bound.push(v);
        }
        Ok(bound)
    }

    fn parse_condition(&mut self, s: &Sexpr, default_time: FormulaTime, vars: &mut HashMap<String, VarId>) -> Result<Formula> {
        let items = s.list().ok_or_else(|| anyhow!("expected a condition form, found an atom"))?;
        let (head, rest) = items.split_first().ok_or_else(|| anyhow!("empty condition form"))?;
        let head = head.atom().ok_or_else(|| anyhow!("condition head must be an atom"))?.to_ascii_lowercase();
        match head.as_str() {
            "and" => Ok(Formula::and(rest.iter().map(|f| self.parse_condition(f, default_time, vars)).collect::<Result<_>>()?)),
            "or" => Ok(Formula::or(rest.iter().map(|f| self.parse_condition(f, default_time, vars)).collect::<Result<_>>()?)),
            "not" => Ok(self.parse_condition(rest.first().ok_or_else(|| anyhow!("`not` with no argument"))?, default_time, vars)?.negation()),
            "forall" | "exists" => {
                let bindings = rest.first().and_then(Sexpr::list).ok_or_else(|| anyhow!("quantifier missing a binding list"))?;
                let mut inner_vars = vars.clone();
                let bound = self.quantified_vars(bindings, &mut inner_vars)?;
                let body = self.parse_condition(rest.get(1).ok_or_else(|| anyhow!("quantifier missing a body"))?, default_time, &mut inner_vars)?;
                if head == "forall" {
                    Ok(Formula::Forall(bound, Box::new(body)))
                } else {
                    Ok(Formula::Exists(bound, Box::new(body)))
                }
            }
            "=" => {
                let a = self.term_of(rest.first().ok_or_else(|| anyhow!("`=` missing first argument"))?, vars)?;
                let b = self.term_of(rest.get(1).ok_or_else(|| anyhow!("`=` missing second argument"))?, vars)?;
                Ok(Formula::Equality(a, b))
            }
            "at" => {
                let tag = rest.first().and_then(Sexpr::atom).ok_or_else(|| anyhow!("`at` missing start/end tag"))?;
                let time = match tag {
                    "start" => FormulaTime::AtStart,
                    "end" => FormulaTime::AtEnd,
                    other => bail!("unknown timed-condition tag `{other}`"),
                };
                self.parse_condition(rest.get(1).ok_or_else(|| anyhow!("`at` missing its condition"))?, time, vars)
            }
            "over" => {
                let tag = rest.first().and_then(Sexpr::atom);
                if tag != Some("all") {
                    bail!("expected `(over all ...)`");
                }
                self.parse_condition(rest.get(1).ok_or_else(|| anyhow!("`over all` missing its condition"))?, FormulaTime::OverAll, vars)
            }
            predicate => {
                let id = self.predicate_id(predicate)?;
                let args: Vec<Term> = rest.iter().map(|t| self.term_of(t, vars)).collect::<Result<_>>()?;
                Ok(Formula::Literal(atom(id, &args, default_time)))
            }
        }
    }

    fn parse_effects(&mut self, s: &Sexpr, default_timing: EffectTiming, vars: &mut HashMap<String, VarId>) -> Result<Vec<Effect>> {
        let items = s.list().ok_or_else(|| anyhow!("expected an effect form, found an atom"))?;
        let (head, rest) = items.split_first().ok_or_else(|| anyhow!("empty effect form"))?;
        let head = head.atom().ok_or_else(|| anyhow!("effect head must be an atom"))?.to_ascii_lowercase();
        match head.as_str() {
            "and" => Ok(rest.iter().map(|e| self.parse_effects(e, default_timing, vars)).collect::<Result<Vec<_>>>()?.into_iter().flatten().collect()),
            "at" => {
                let tag = rest.first().and_then(Sexpr::atom).ok_or_else(|| anyhow!("`at` missing start/end tag"))?;
                let timing = match tag {
                    "start" => EffectTiming::AtStart,
                    "end" => EffectTiming::AtEnd,
                    other => bail!("unknown timed-effect tag `{other}`"),
                };
                self.parse_effects(rest.get(1).ok_or_else(|| anyhow!("`at` missing its effect"))?, timing, vars)
            }
            "forall" => {
                let bindings = rest.first().and_then(Sexpr::list).ok_or_else(|| anyhow!("`forall` effect missing a binding list"))?;
                let mut inner_vars = vars.clone();
                let bound = self.quantified_vars(bindings, &mut inner_vars)?;
                let mut effects = self.parse_effects(rest.get(1).ok_or_else(|| anyhow!("`forall` effect missing a body"))?, default_timing, &mut inner_vars)?;
                for e in &mut effects {
                    let mut forall = bound.clone();
                    forall.extend(e.forall.drain(..));
                    e.forall = forall;
                }
                Ok(effects)
            }
            "when" => {
                let cond_time = match default_timing {
                    EffectTiming::AtStart => FormulaTime::AtStart,
                    EffectTiming::AtEnd => FormulaTime::AtEnd,
                };
                let cond = self.parse_condition(rest.first().ok_or_else(|| anyhow!("`when` missing its condition"))?, cond_time, vars)?;
                let mut effects = self.parse_effects(rest.get(1).ok_or_else(|| anyhow!("`when` missing its effect"))?, default_timing, vars)?;
                for e in &mut effects {
                    e.condition = cond.clone();
                }
                Ok(effects)
            }
            "not" => {
                let lit = self.literal_effect(rest.first().ok_or_else(|| anyhow!("`not` missing its literal"))?, default_timing, vars, false)?;
                Ok(vec![simple_effect(lit, default_timing)])
            }
            _ => {
                let lit = self.literal_effect(s, default_timing, vars, true)?;
                Ok(vec![simple_effect(lit, default_timing)])
            }
        }
    }

    fn literal_effect(&mut self, s: &Sexpr, timing: EffectTiming, vars: &HashMap<String, VarId>, positive: bool) -> Result<pocl_domain::formula::Literal> {
        let items = s.list().ok_or_else(|| anyhow!("expected a predicate application"))?;
        let (name, rest) = items.split_first().ok_or_else(|| anyhow!("empty predicate application"))?;
        let name = name.atom().ok_or_else(|| anyhow!("predicate name must be an atom"))?;
        let id = self.predicate_id(name)?;
        let args: Vec<Term> = rest.iter().map(|t| self.term_of(t, vars)).collect::<Result<_>>()?;
        let when = match timing {
            EffectTiming::AtStart => FormulaTime::AtStart,
            EffectTiming::AtEnd => FormulaTime::AtEnd,
        };
        let mut lit = atom(id, &args, when);
        lit.positive = positive;
        Ok(lit)
    }

    fn add_action(&mut self, items: &[Sexpr]) -> Result<()> {
        let (name, rest) = items.split_first().ok_or_else(|| anyhow!("`:action` missing a name"))?;
        let name = name.atom().ok_or_else(|| anyhow!("action name must be an atom"))?.to_string();
        let kv = keyed_sections(rest)?;
        let mut vars = HashMap::new();
        let params = match kv.get(":parameters") {
            Some(p) => self.quantified_vars(p.list().ok_or_else(|| anyhow!(":parameters must be a list"))?, &mut vars)?,
            None => Vec::new(),
        };
        let params: Vec<(VarId, TypeRef)> = params.into_iter().map(|v| (v, self.builder.variable_type(v))).collect();
        let condition = match kv.get(":precondition") {
            Some(p) => self.parse_condition(p, FormulaTime::AtStart, &mut vars)?,
            None => Formula::True,
        };
        let effects = match kv.get(":effect") {
            Some(e) => self.parse_effects(e, EffectTiming::AtEnd, &mut vars)?,
            None => Vec::new(),
        };
        self.builder.add_action(lifted_action(&name, params, condition, effects, None));
        Ok(())
    }

    fn add_durative_action(&mut self, items: &[Sexpr]) -> Result<()> {
        let (name, rest) = items.split_first().ok_or_else(|| anyhow!("`:durative-action` missing a name"))?;
        let name = name.atom().ok_or_else(|| anyhow!("action name must be an atom"))?.to_string();
        let kv = keyed_sections(rest)?;
        let mut vars = HashMap::new();
        let params = match kv.get(":parameters") {
            Some(p) => self.quantified_vars(p.list().ok_or_else(|| anyhow!(":parameters must be a list"))?, &mut vars)?,
            None => Vec::new(),
        };
        let params: Vec<(VarId, TypeRef)> = params.into_iter().map(|v| (v, self.builder.variable_type(v))).collect();
        let duration = kv
            .get(":duration")
            .map(|d| self.parse_duration(d))
            .transpose()?
            .ok_or_else(|| anyhow!("`:durative-action {name}` missing `:duration`"))?;
        let condition = match kv.get(":condition") {
            Some(c) => self.parse_condition(c, FormulaTime::AtStart, &mut vars)?,
            None => Formula::True,
        };
        let effects = match kv.get(":effect") {
            Some(e) => self.parse_effects(e, EffectTiming::AtEnd, &mut vars)?,
            None => Vec::new(),
        };
        self.builder.add_action(lifted_action(&name, params, condition, effects, Some(duration)));
        Ok(())
    }

    fn parse_duration(&self, s: &Sexpr) -> Result<Duration> {
        let items = s.list().ok_or_else(|| anyhow!("`:duration` must be a list"))?;
        if items.first().and_then(Sexpr::atom) != Some("=") {
            bail!("only constant durations of the form `(= ?duration N)` are supported");
        }
        let value: f64 = items
            .get(2)
            .and_then(Sexpr::atom)
            .ok_or_else(|| anyhow!("`:duration` missing its value"))?
            .parse()
            .context("duration value is not a number")?;
        Ok(Duration { min: value, max: value })
    }

    fn add_init(&mut self, items: &[Sexpr]) -> Result<()> {
        let vars = HashMap::new();
        for lit in items {
            let l = self.literal_effect(lit, EffectTiming::AtStart, &vars, true)?;
            self.builder.add_initial(l);
        }
        Ok(())
    }

    fn set_goal(&mut self, s: &Sexpr) -> Result<()> {
        let mut vars = HashMap::new();
        let g = self.parse_condition(s, FormulaTime::AtStart, &mut vars)?;
        self.builder.set_goal(g);
        Ok(())
    }
}

/// Groups a body list of alternating `:keyword value` pairs into a map,
/// keeping the first occurrence of each keyword.
fn keyed_sections(body: &[Sexpr]) -> Result<HashMap<String, Sexpr>> {
    let mut map = HashMap::new();
    let mut i = 0;
    while i < body.len() {
        let key = body[i].atom().ok_or_else(|| anyhow!("expected a `:keyword`, found a list"))?;
        if !key.starts_with(':') {
            bail!("expected a `:keyword`, found `{key}`");
        }
        let value = body.get(i + 1).ok_or_else(|| anyhow!("`{key}` has no value"))?.clone();
        map.entry(key.to_string()).or_insert(value);
        i += 2;
    }
    Ok(map)
}

/// Parses a domain file and a problem file into one assembled [`Problem`].
pub fn read(domain_src: &str, problem_src: &str) -> Result<Problem> {
    let domain = sexpr::parse(domain_src).context("parsing domain file")?;
    let domain_items = domain.list().ok_or_else(|| anyhow!("domain file is not an s-expression"))?;
    if domain_items.first().and_then(Sexpr::atom) != Some("define") {
        bail!("domain file does not start with `(define ...)`");
    }
    let header = domain_items.get(1).and_then(Sexpr::list).ok_or_else(|| anyhow!("missing `(domain NAME)` header"))?;
    let domain_name = header.get(1).and_then(Sexpr::atom).unwrap_or("domain").to_string();

    let mut reader = Reader::new(&domain_name);
    for section in &domain_items[2..] {
        let items = section.list().ok_or_else(|| anyhow!("expected a `(:section ...)` form"))?;
        let Some(head) = items.first().and_then(Sexpr::atom) else { continue };
        match head {
            ":requirements" => {} // accepted and ignored: every feature this reader parses is always on
            ":types" => reader.add_types(&items[1..])?,
            ":constants" => reader.add_objects(&items[1..])?,
            ":predicates" => reader.add_predicates(&items[1..])?,
            ":action" => reader.add_action(&items[1..])?,
            ":durative-action" => reader.add_durative_action(&items[1..])?,
            other => bail!("unsupported domain section `{other}`"),
        }
    }

    let problem = sexpr::parse(problem_src).context("parsing problem file")?;
    let problem_items = problem.list().ok_or_else(|| anyhow!("problem file is not an s-expression"))?;
    if problem_items.first().and_then(Sexpr::atom) != Some("define") {
        bail!("problem file does not start with `(define ...)`");
    }
    for section in &problem_items[2..] {
        let items = section.list().ok_or_else(|| anyhow!("expected a `(:section ...)` form"))?;
        let Some(head) = items.first().and_then(Sexpr::atom) else { continue };
        match head {
            ":domain" => {}
            ":objects" => reader.add_objects(&items[1..])?,
            ":init" => reader.add_init(&items[1..])?,
            ":goal" => reader.set_goal(items.get(1).ok_or_else(|| anyhow!(":goal missing its formula"))?)?,
            other => bail!("unsupported problem section `{other}`"),
        }
    }

    reader.builder.finalize_statics();
    Ok(reader.builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "
        (define (domain blocksworld)
          (:types block)
          (:predicates (on ?x - block ?y - block) (on-table ?x - block) (clear ?x - block) (handempty) (holding ?x - block))
          (:action pick-up
            :parameters (?x - block)
            :precondition (and (clear ?x) (on-table ?x) (handempty))
            :effect (and (not (on-table ?x)) (not (clear ?x)) (not (handempty)) (holding ?x)))
          (:action put-down
            :parameters (?x - block)
            :precondition (holding ?x)
            :effect (and (not (holding ?x)) (clear ?x) (handempty) (on-table ?x))))";

    const PROBLEM: &str = "
        (define (problem swap)
          (:domain blocksworld)
          (:objects a b - block)
          (:init (on-table a) (on-table b) (clear a) (clear b) (handempty))
          (:goal (on-table a)))";

    #[test]
    fn reads_a_tiny_blocksworld_domain() {
        let problem = read(DOMAIN, PROBLEM).expect("domain and problem parse");
        assert_eq!(problem.actions.iter().count(), 2);
        assert_eq!(problem.initial.len(), 5);
    }
}
