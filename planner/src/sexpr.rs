//! A tiny s-expression tokenizer/parser. PDDL is s-expression-shaped enough
//! that lexing it this way, then walking the tree with ad-hoc recursive
//! descent in [`crate::pddl`], covers the subset this reader supports
//! without pulling in a grammar crate for a format this minimal.

use anyhow::{bail, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Sexpr {
    Atom(String),
    List(Vec<Sexpr>),
}

impl Sexpr {
    pub fn atom(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(s) => Some(s),
            Sexpr::List(_) => None,
        }
    }

    pub fn list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(v) => Some(v),
            Sexpr::Atom(_) => None,
        }
    }

    /// True if this list's head atom case-insensitively matches `head`.
    pub fn starts_with(&self, head: &str) -> bool {
        self.list().and_then(|l| l.first()).and_then(Sexpr::atom).is_some_and(|a| a.eq_ignore_ascii_case(head))
    }
}

fn tokenize(src: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parses the entire input as one top-level s-expression (PDDL files
/// contain exactly one `(define ...)` form).
pub fn parse(src: &str) -> Result<Sexpr> {
    let tokens = tokenize(src);
    let mut pos = 0;
    let expr = parse_one(&tokens, &mut pos)?;
    if pos != tokens.len() {
        bail!("trailing input after top-level form");
    }
    Ok(expr)
}

fn parse_one(tokens: &[String], pos: &mut usize) -> Result<Sexpr> {
    let Some(tok) = tokens.get(*pos) else {
        bail!("unexpected end of input");
    };
    *pos += 1;
    match tok.as_str() {
        "(" => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    Some(t) if t == ")" => {
                        *pos += 1;
                        break;
                    }
                    Some(_) => items.push(parse_one(tokens, pos)?),
                    None => bail!("unterminated list"),
                }
            }
            Ok(Sexpr::List(items))
        }
        ")" => bail!("unexpected `)`"),
        other => Ok(Sexpr::Atom(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_lists() {
        let e = parse("(define (domain d) (:predicates (p ?x)))").unwrap();
        let l = e.list().unwrap();
        assert_eq!(l[0].atom(), Some("define"));
        assert!(l[1].starts_with("domain"));
    }

    #[test]
    fn strips_line_comments() {
        let e = parse("(foo ; a comment\n bar)").unwrap();
        assert_eq!(e.list().unwrap().len(), 2);
    }
}
