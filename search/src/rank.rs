//! Plan rank vectors (§4.7): the components a `-h` heuristic spec can
//! combine, in the order they're listed, to drive queue comparison. The
//! first component orders; later components only break ties.

use pocl_domain::{PlannerError, Problem};
use pocl_flaws::FlawInfo;
use pocl_plan::{FlawKind, Plan};
use pocl_planning_graph::PlanningGraph;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RankComponent {
    /// Most recently created plan first (depth-first-ish traversal).
    Lifo,
    /// Earliest created plan first (breadth-first-ish traversal).
    Fifo,
    OpenCondCount,
    UnsafeCount,
    HasUnsafe,
    /// `num-steps + w * open-conds`.
    WeightedOpenConds,
    /// `num-steps + w * (open-conds + unsafes)`.
    WeightedOpenAndUnsafe,
    /// `add_cost summed over open conditions + num-steps`.
    AddBased,
    Work,
    Makespan,
}

/// Parses a `/`-separated heuristic spec like `ADD/MAKESPAN` into the
/// ordered list of components a plan's rank vector is built from.
pub fn parse_heuristic_spec(spec: &str) -> Result<Vec<RankComponent>, PlannerError> {
    spec.split('/')
        .map(|tok| match tok.trim() {
            "LIFO" => Ok(RankComponent::Lifo),
            "FIFO" => Ok(RankComponent::Fifo),
            "UCPOP" | "OC" => Ok(RankComponent::OpenCondCount),
            "UNSAFE" => Ok(RankComponent::UnsafeCount),
            "HASUNSAFE" => Ok(RankComponent::HasUnsafe),
            "NSW" => Ok(RankComponent::WeightedOpenConds),
            "NSWU" => Ok(RankComponent::WeightedOpenAndUnsafe),
            // `ADDR` (reuse-discounted ADD) folds into plain `ADD` at the
            // plan-rank level: the reuse discount already lives in the
            // flaw-selection `R` tactic modifier (pocl_flaws::Tactic), not
            // in how whole plans are compared against each other.
            "ADD" | "ADDR" => Ok(RankComponent::AddBased),
            "WORK" => Ok(RankComponent::Work),
            "MAKESPAN" => Ok(RankComponent::Makespan),
            other => Err(PlannerError::Config(format!("unknown heuristic component `{other}`"))),
        })
        .collect()
}

fn aggregate_open_heuristic(plan: &Plan, problem: &Problem, graph: &PlanningGraph) -> (f64, u32) {
    pocl_plan::collect_flaws(plan, problem, graph)
        .iter()
        .filter(|f| matches!(f.kind, FlawKind::Open(_)))
        .fold((0.0, 0u32), |(cost, work), f| (cost + f.add_cost(), work + f.work()))
}

fn component_value(plan: &Plan, problem: &Problem, graph: &PlanningGraph, component: RankComponent, weight: f64) -> f64 {
    match component {
        RankComponent::Lifo => -(plan.serial as f64),
        RankComponent::Fifo => plan.serial as f64,
        RankComponent::OpenCondCount => plan.open_conditions.len() as f64,
        RankComponent::UnsafeCount => plan.unsafes.len() as f64,
        RankComponent::HasUnsafe => {
            if plan.unsafes.is_empty() {
                0.0
            } else {
                1.0
            }
        }
        RankComponent::WeightedOpenConds => plan.steps.len() as f64 + weight * plan.open_conditions.len() as f64,
        RankComponent::WeightedOpenAndUnsafe => {
            plan.steps.len() as f64 + weight * (plan.open_conditions.len() + plan.unsafes.len()) as f64
        }
        RankComponent::AddBased => {
            let (cost, _) = aggregate_open_heuristic(plan, problem, graph);
            cost + plan.steps.len() as f64
        }
        RankComponent::Work => aggregate_open_heuristic(plan, problem, graph).1 as f64,
        RankComponent::Makespan => plan.makespan(),
    }
}

pub fn compute_rank(plan: &Plan, problem: &Problem, graph: &PlanningGraph, components: &[RankComponent], weight: f64) -> Vec<f64> {
    components.iter().map(|&c| component_value(plan, problem, graph, c, weight)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_composed_heuristic_spec() {
        let spec = parse_heuristic_spec("ADD/MAKESPAN").unwrap();
        assert_eq!(spec, vec![RankComponent::AddBased, RankComponent::Makespan]);
    }

    #[test]
    fn rejects_unknown_heuristic_token() {
        assert!(parse_heuristic_spec("NOT_A_HEURISTIC").is_err());
    }
}
