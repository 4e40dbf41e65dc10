//! CLI flags (§6) and their translation into a [`pocl_search::SearchConfig`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use structopt::StructOpt;

use pocl_flaws::FlawOrder;
use pocl_search::{parse_heuristic_spec, Algorithm, RankComponent, SearchConfig};

/// An automated planner for a PDDL-ish typed classical/durative subset.
#[derive(Debug, StructOpt)]
#[structopt(name = "planner", rename_all = "kebab-case")]
pub struct Opt {
    /// Domain definition file.
    pub domain: PathBuf,
    /// Problem definition file.
    pub problem: PathBuf,

    /// Enable action-parameter domain constraints derived from the planning
    /// graph; `-d0` additionally strips static preconditions from them.
    #[structopt(short = "d")]
    pub domain_constraints: Option<Option<u32>>,

    /// Append a flaw-selection order (repeatable).
    #[structopt(short = "f")]
    pub flaw_orders: Vec<String>,

    /// Fully ground all actions before search.
    #[structopt(short = "g")]
    pub ground: bool,

    /// Plan ranking heuristic, composable with `/` (e.g. `ADD/MAKESPAN`).
    #[structopt(short = "h", long = "heuristic")]
    pub heuristic: Option<String>,

    /// Plan-generation quota per flaw order (repeatable; `unlimited` sentinel).
    #[structopt(short = "l")]
    pub quotas: Vec<String>,

    /// Randomise open-condition insertion order.
    #[structopt(short = "r")]
    pub randomize: bool,

    /// Search algorithm: `A`, `IDA`, or `HC`.
    #[structopt(short = "s", long = "strategy")]
    pub algorithm: Option<String>,

    /// Seed the PRNG.
    #[structopt(short = "S")]
    pub seed: Option<u64>,

    /// Minimum ordered-step separation (temporal tolerance).
    #[structopt(short = "t")]
    pub temporal_tolerance: Option<f64>,

    /// Wall-clock time limit, in minutes.
    #[structopt(short = "T")]
    pub time_limit_minutes: Option<f64>,

    /// Verbosity; `-v2` also dumps full link/threat/open-condition/binding/
    /// ordering structure for the returned plan.
    #[structopt(short = "v")]
    pub verbose: Option<Option<u8>>,

    /// Warning level passed to the tracing subscriber.
    #[structopt(short = "W")]
    pub warn_level: Option<Option<u8>>,

    /// Heuristic weight.
    #[structopt(short = "w")]
    pub weight: Option<f64>,
}

fn parse_quota(s: &str) -> Result<Option<usize>> {
    if s.eq_ignore_ascii_case("unlimited") {
        Ok(None)
    } else {
        Ok(Some(s.parse().with_context(|| format!("invalid plan-generation quota `{s}`"))?))
    }
}

fn parse_algorithm(s: &str) -> Result<Algorithm> {
    match s.to_ascii_uppercase().as_str() {
        "A" => Ok(Algorithm::AStar),
        "IDA" => Ok(Algorithm::IdaStar),
        "HC" => Ok(Algorithm::HillClimbing),
        other => Err(anyhow!("unknown search algorithm `{other}` (expected A, IDA or HC)")),
    }
}

impl Opt {
    /// Verbosity level the `-v` flag requested: absent, bare `-v` (1), or
    /// `-vN`.
    pub fn verbosity(&self) -> u8 {
        match &self.verbose {
            None => 0,
            Some(None) => 1,
            Some(Some(n)) => *n,
        }
    }

    pub fn warn_verbosity(&self) -> u8 {
        match &self.warn_level {
            None => 0,
            Some(None) => 1,
            Some(Some(n)) => *n,
        }
    }

    pub fn search_config(&self) -> Result<SearchConfig> {
        let flaw_orders: Vec<FlawOrder> = if self.flaw_orders.is_empty() {
            vec![FlawOrder::parse("UCPOP").expect("built-in UCPOP order parses")]
        } else {
            self.flaw_orders
                .iter()
                .map(|s| FlawOrder::parse(s).map_err(|e| anyhow!("invalid flaw-selection order `{s}`: {e}")))
                .collect::<Result<_>>()?
        };
        let quotas: Vec<Option<usize>> = self.quotas.iter().map(|s| parse_quota(s)).collect::<Result<_>>()?;
        // An explicit `-l` pins the user's intent: exhausting it is final,
        // not a cue to double and retry (§4.7's automatic doubling only
        // applies to the built-in unlimited default).
        let max_doublings = if self.quotas.is_empty() { None } else { Some(0) };

        let algorithm = self.algorithm.as_deref().map(parse_algorithm).transpose()?.unwrap_or(Algorithm::AStar);
        let rank_components: Vec<RankComponent> = match &self.heuristic {
            Some(h) => parse_heuristic_spec(h).map_err(|e| anyhow!("{e}"))?,
            None => vec![RankComponent::OpenCondCount, RankComponent::UnsafeCount],
        };

        Ok(SearchConfig {
            algorithm,
            flaw_orders,
            quotas,
            max_doublings,
            rank_components,
            weight: self.weight.unwrap_or(1.0),
            wall_clock: self.time_limit_minutes.map(|m| Duration::from_secs_f64((m * 60.0).max(0.0))),
            seed: self.seed.unwrap_or(0),
            randomize_open_conditions: self.randomize,
        })
    }
}
