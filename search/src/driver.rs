//! The search loop (§4.7): round-robins over one priority queue per
//! flaw-selection order, popping the next plan from whichever order's turn
//! it is, expanding it by its own selection strategy, and returning the
//! first complete plan popped.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use pocl_domain::{PlannerError, Problem, SearchExhaustionReason};
use pocl_flaws::FlawOrder;
use pocl_plan::Plan;
use pocl_planning_graph::PlanningGraph;

use crate::queue::FlawOrderQueue;
use crate::rank::{compute_rank, RankComponent};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Algorithm {
    AStar,
    IdaStar,
    HillClimbing,
}

pub struct SearchConfig {
    pub algorithm: Algorithm,
    /// One entry per `-f` flag; `quotas[i]` (`None` = unlimited) pairs with
    /// `flaw_orders[i]` positionally. Missing quotas default to unlimited.
    pub flaw_orders: Vec<FlawOrder>,
    pub quotas: Vec<Option<usize>>,
    /// Bounds how many times an exhausted round may double every order's
    /// quota and retry from the initial plan. `None` means unbounded
    /// (bounded only by the wall-clock limit, if any); `Some(0)` disables
    /// doubling outright, so the very first exhaustion is final.
    pub max_doublings: Option<u32>,
    pub rank_components: Vec<RankComponent>,
    pub weight: f64,
    pub wall_clock: Option<Duration>,
    pub seed: u64,
    pub randomize_open_conditions: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            algorithm: Algorithm::AStar,
            flaw_orders: vec![FlawOrder::parse("UCPOP").expect("built-in UCPOP order parses")],
            quotas: vec![None],
            max_doublings: None,
            rank_components: vec![RankComponent::OpenCondCount, RankComponent::UnsafeCount],
            weight: 1.0,
            wall_clock: None,
            seed: 0,
            randomize_open_conditions: false,
        }
    }
}

pub enum SearchOutcome {
    Complete(Plan),
    Exhausted(SearchExhaustionReason),
}

pub fn search(problem: &Problem, graph: &PlanningGraph, config: &SearchConfig) -> Result<SearchOutcome, PlannerError> {
    if config.flaw_orders.is_empty() {
        return Err(PlannerError::Config("at least one flaw-selection order (-f) is required".into()));
    }
    let root = Plan::initial(problem)
        .ok_or_else(|| PlannerError::DomainInconsistency("goal is unsatisfiable under the initial ordering/duration constraints".into()))?;

    let mut queues: Vec<FlawOrderQueue> = config
        .flaw_orders
        .iter()
        .enumerate()
        .map(|(i, order)| FlawOrderQueue::new(order.clone(), config.quotas.get(i).copied().flatten()))
        .collect();

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut serial: u64 = 0;
    let started = Instant::now();
    let mut doublings_done: u32 = 0;

    let seed_queue = |q: &mut FlawOrderQueue, serial: &mut u64| {
        let ranked = with_serial_and_rank(root.clone(), serial, problem, graph, config);
        q.push(ranked);
    };
    for q in &mut queues {
        seed_queue(q, &mut serial);
    }

    loop {
        if let Some(limit) = config.wall_clock {
            if started.elapsed() > limit {
                tracing::info!("wall-clock limit reached, stopping search");
                return Ok(SearchOutcome::Exhausted(SearchExhaustionReason::SearchLimitReached));
            }
        }

        let mut any_active = false;
        let mut any_quota_blocked = false;
        for queue in &mut queues {
            if queue.quota_reached() {
                any_quota_blocked = true;
                continue;
            }
            if config.algorithm == Algorithm::IdaStar && queue.is_empty() {
                queue.ida_raise_limit();
            }
            if queue.is_empty() {
                continue;
            }
            any_active = true;

            let Some(plan) = queue.pop() else { continue };
            if plan.is_complete(problem) {
                return Ok(SearchOutcome::Complete(plan));
            }

            queue.record_expansion();
            if plan.is_flawless() {
                let children = plan.ground_completion_children(problem);
                push_children(queue, children, problem, graph, config, &mut serial);
                continue;
            }

            let mut flaws = pocl_plan::collect_flaws(&plan, problem, graph);
            if flaws.is_empty() {
                continue;
            }
            if config.randomize_open_conditions {
                use rand::seq::SliceRandom;
                flaws.shuffle(&mut rng);
            }
            let Some(idx) = queue.order.select(&flaws, &mut rng) else { continue };
            let chosen = flaws[idx].clone();
            let children = plan.refine_flaw(&chosen, problem, graph);
            if children.is_empty() {
                // chosen's refinement_count (computed fresh in collect_flaws as
                // the number of candidate children it would produce) is always
                // 0 here: a flaw with no candidate refinements makes this whole
                // plan a dead end, so it is dropped rather than requeued.
                continue;
            }
            push_children(queue, children, problem, graph, config, &mut serial);
        }

        if !any_active {
            if !any_quota_blocked {
                return Ok(SearchOutcome::Exhausted(SearchExhaustionReason::NoPlan));
            }
            let can_double = match config.max_doublings {
                Some(max) => doublings_done < max,
                None => true,
            };
            if !can_double {
                return Ok(SearchOutcome::Exhausted(SearchExhaustionReason::SearchLimitReached));
            }
            doublings_done += 1;
            for queue in &mut queues {
                queue.double_quota_and_reset();
                seed_queue(queue, &mut serial);
            }
        }
    }
}

fn with_serial_and_rank(mut plan: Plan, serial: &mut u64, problem: &Problem, graph: &PlanningGraph, config: &SearchConfig) -> Plan {
    plan.serial = *serial;
    *serial += 1;
    let rank = compute_rank(&plan, problem, graph, &config.rank_components, config.weight);
    plan.with_rank(rank)
}

fn push_children(queue: &mut FlawOrderQueue, children: Vec<Plan>, problem: &Problem, graph: &PlanningGraph, config: &SearchConfig, serial: &mut u64) {
    let mut ranked: Vec<Plan> = children
        .into_iter()
        .map(|p| with_serial_and_rank(p, serial, problem, graph, config))
        .collect();
    if config.algorithm == Algorithm::HillClimbing {
        // "pop best child only; discard siblings": only the single
        // lowest-rank child survives this expansion.
        ranked.sort_by(|a, b| a.rank.partial_cmp(&b.rank).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(1);
    }
    for p in ranked {
        queue.push(p);
    }
}
