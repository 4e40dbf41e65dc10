//! Parses a textual flaw-selection order such as `{n,s}LIFO/{o}0LIFO/{o}LR`
//! into a sequence of [`Criterion`]s.
//!
//! Grammar (see `DESIGN.md` for the small set of decisions made where the
//! original tool's exact token set was unclear):
//!
//! ```text
//! order      := criterion ('/' criterion)*
//! criterion  := '{' letter (',' letter)* '}' cap? tactic
//! cap        := digits              -- refinement-count ceiling; absent = unlimited
//! tactic     := "LIFO" | "FIFO" | "R" | "LR" | "MR" | "NEW" | "REUSE"
//!             | "MS"? ("LC"|"MC"|"LW"|"MW") "R"?
//! letter     := 'n' | 's' | 'o' | 'l' | 't' | 'u'
//! ```
//!
//! A handful of shorthand names expand to a canonical order before parsing:
//! `UCPOP`, `LCFR`, `MC`, `ZLIFO`.

use crate::mask::FlawKindMask;
use crate::tactic::{CostMode, Direction, HeuristicDimension, Tactic};
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Criterion {
    pub mask: FlawKindMask,
    pub cap: usize,
    pub tactic: Tactic,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("empty flaw order")]
    Empty,
    #[error("criterion {0:?} is missing its opening '{{'")]
    MissingOpenBrace(String),
    #[error("criterion {0:?} is missing its closing '}}'")]
    MissingCloseBrace(String),
    #[error("criterion {0:?} names an unknown flaw-kind letter {1:?}")]
    UnknownFlawKind(String, char),
    #[error("criterion {0:?} names an unknown tactic {1:?}")]
    UnknownTactic(String, String),
    #[error("criterion {0:?} restricts itself to threats (n/s) but uses the non-threat tactic {1:?} (only LIFO/FIFO/R/LR/MR are allowed there)")]
    TacticNotAllowedForThreats(String, String),
}

fn expand_shorthand(s: &str) -> &str {
    match s {
        "UCPOP" => "{n,s}LIFO/{o}LIFO",
        "LCFR" => "{n,s}LIFO/{o}LC",
        "MC" => "{n,s}LIFO/{o}MC",
        "ZLIFO" => "{n,s}LIFO/{o}0LIFO/{o}LR",
        other => other,
    }
}

fn parse_tactic(text: &str) -> Option<Tactic> {
    match text {
        "LIFO" => return Some(Tactic::Lifo),
        "FIFO" => return Some(Tactic::Fifo),
        "R" => return Some(Tactic::Reservoir),
        "LR" => return Some(Tactic::LeastRefinements),
        "MR" => return Some(Tactic::MostRefinements),
        "NEW" => return Some(Tactic::PreferNew),
        "REUSE" => return Some(Tactic::PreferReuse),
        _ => {}
    }
    let (mode, rest) = if let Some(rest) = text.strip_prefix("MS") {
        (CostMode::Makespan, rest)
    } else {
        (CostMode::Add, text)
    };
    let (reuse, rest) = if let Some(rest) = rest.strip_suffix('R') { (true, rest) } else { (false, rest) };
    let (dimension, direction) = match rest {
        "LC" => (HeuristicDimension::Cost, Direction::Least),
        "MC" => (HeuristicDimension::Cost, Direction::Most),
        "LW" => (HeuristicDimension::Work, Direction::Least),
        "MW" => (HeuristicDimension::Work, Direction::Most),
        _ => return None,
    };
    Some(Tactic::HeuristicRanked {
        dimension,
        direction,
        mode,
        reuse,
    })
}

fn tactic_name(t: Tactic) -> String {
    match t {
        Tactic::Lifo => "LIFO".to_string(),
        Tactic::Fifo => "FIFO".to_string(),
        Tactic::Reservoir => "R".to_string(),
        Tactic::LeastRefinements => "LR".to_string(),
        Tactic::MostRefinements => "MR".to_string(),
        Tactic::PreferNew => "NEW".to_string(),
        Tactic::PreferReuse => "REUSE".to_string(),
        Tactic::HeuristicRanked { dimension, direction, mode, reuse } => {
            let base = match (direction, dimension) {
                (Direction::Least, HeuristicDimension::Cost) => "LC",
                (Direction::Most, HeuristicDimension::Cost) => "MC",
                (Direction::Least, HeuristicDimension::Work) => "LW",
                (Direction::Most, HeuristicDimension::Work) => "MW",
            };
            format!("{}{}{}", if mode == CostMode::Makespan { "MS" } else { "" }, base, if reuse { "R" } else { "" })
        }
    }
}

fn parse_criterion(text: &str) -> Result<Criterion, GrammarError> {
    let open = text.find('{').ok_or_else(|| GrammarError::MissingOpenBrace(text.to_string()))?;
    let close = text.find('}').ok_or_else(|| GrammarError::MissingCloseBrace(text.to_string()))?;
    let letters = &text[open + 1..close];
    let mut mask = FlawKindMask::NONE;
    for letter in letters.split(',') {
        let letter = letter.trim();
        if letter.is_empty() {
            continue;
        }
        let c = letter.chars().next().unwrap();
        let m = FlawKindMask::from_letter(c).ok_or_else(|| GrammarError::UnknownFlawKind(text.to_string(), c))?;
        mask = mask.union(m);
    }
    let rest = &text[close + 1..];
    let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (cap_str, tactic_str) = rest.split_at(digit_end);
    let cap = if cap_str.is_empty() { usize::MAX } else { cap_str.parse().unwrap_or(usize::MAX) };
    let tactic = parse_tactic(tactic_str).ok_or_else(|| GrammarError::UnknownTactic(text.to_string(), tactic_str.to_string()))?;
    if mask.is_threat_only() && !tactic.allowed_for_threat_only_mask() {
        return Err(GrammarError::TacticNotAllowedForThreats(text.to_string(), tactic_name(tactic)));
    }
    Ok(Criterion { mask, cap, tactic })
}

pub fn parse(spec: &str) -> Result<Vec<Criterion>, GrammarError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(GrammarError::Empty);
    }
    let expanded = expand_shorthand(spec);
    expanded.split('/').map(parse_criterion).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_order() {
        let criteria = parse("{n,s}LIFO/{o}0LIFO/{o}LR").unwrap();
        assert_eq!(criteria.len(), 3);
        assert_eq!(criteria[0].mask, FlawKindMask::NONSEP_THREAT.union(FlawKindMask::SEP_THREAT));
        assert_eq!(criteria[0].tactic, Tactic::Lifo);
        assert_eq!(criteria[1].cap, 0);
        assert_eq!(criteria[2].tactic, Tactic::LeastRefinements);
    }

    #[test]
    fn expands_shorthand() {
        let criteria = parse("ZLIFO").unwrap();
        assert_eq!(criteria.len(), 3);
    }

    #[test]
    fn heuristic_tactic_with_makespan_mode_and_reuse() {
        let criteria = parse("{o}MSLCR").unwrap();
        match criteria[0].tactic {
            Tactic::HeuristicRanked { dimension, direction, mode, reuse } => {
                assert_eq!(dimension, HeuristicDimension::Cost);
                assert_eq!(direction, Direction::Least);
                assert_eq!(mode, CostMode::Makespan);
                assert!(reuse);
            }
            other => panic!("expected HeuristicRanked, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_lifo_tactic_for_threat_only_mask() {
        let err = parse("{n,s}LC").unwrap_err();
        assert!(matches!(err, GrammarError::TacticNotAllowedForThreats(_, _)));
    }
}
