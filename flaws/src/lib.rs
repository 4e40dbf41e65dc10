//! Flaw selection: deciding which open condition or threat a search node
//! should resolve next.
//!
//! A [`FlawOrder`] is a sequence of [`Criterion`]s, each restricting the set
//! of flaws it considers (by kind) and a tie-breaking [`Tactic`] used when
//! more than one flaw in a partial plan matches. Selection walks the
//! criteria in order and commits to the first one that matches at least one
//! flaw; later criteria are never consulted once an earlier one has picked.

pub mod grammar;
pub mod mask;
pub mod tactic;

pub use grammar::{parse, Criterion, GrammarError};
pub use mask::FlawKindMask;
pub use tactic::{CostMode, Direction, HeuristicDimension, Tactic};

use rand::Rng;

/// What a flaw-selection criterion needs to know about a single flaw.
///
/// `plan`'s concrete flaw representation implements this so that `flaws`
/// never has to know what a step, link, or binding actually is.
pub trait FlawInfo {
    fn kind(&self) -> FlawKindMask;
    fn refinement_count(&self) -> usize;
    fn add_cost(&self) -> f64;
    fn makespan(&self) -> f64;
    fn work(&self) -> u32;
    /// True if resolving this flaw by reusing an existing step is possible
    /// at all (used by the `R` reuse modifier on heuristic-ranked tactics).
    fn has_reuse_achiever(&self) -> bool;
    /// Order in which the flaw was introduced into the plan, used by
    /// `LIFO`/`FIFO`.
    fn insertion_order(&self) -> u64;
}

#[derive(Clone, Debug)]
pub struct FlawOrder {
    criteria: Vec<Criterion>,
}

impl FlawOrder {
    pub fn new(criteria: Vec<Criterion>) -> FlawOrder {
        FlawOrder { criteria }
    }

    pub fn parse(spec: &str) -> Result<FlawOrder, GrammarError> {
        Ok(FlawOrder::new(grammar::parse(spec)?))
    }

    /// Selects the index (into `flaws`) of the flaw to resolve next, or
    /// `None` if `flaws` is empty.
    ///
    /// Walks criteria in order. A criterion matches a flaw if the flaw's
    /// kind intersects the criterion's mask and the flaw's refinement count
    /// is at or below the criterion's cap. The first criterion with at
    /// least one match settles the choice; ties within that criterion are
    /// broken by its tactic.
    pub fn select<F: FlawInfo>(&self, flaws: &[F], rng: &mut impl Rng) -> Option<usize> {
        if flaws.is_empty() {
            return None;
        }
        for criterion in &self.criteria {
            let candidates: Vec<usize> = flaws
                .iter()
                .enumerate()
                .filter(|(_, f)| f.kind().intersects(criterion.mask) && f.refinement_count() <= criterion.cap)
                .map(|(i, _)| i)
                .collect();
            if !candidates.is_empty() {
                return Some(Self::break_tie(flaws, &candidates, criterion.tactic, rng));
            }
        }
        // No criterion matched anything: fall back to the first flaw so search
        // always makes progress rather than stalling on a malformed order.
        Some(0)
    }

    fn break_tie<F: FlawInfo>(flaws: &[F], candidates: &[usize], tactic: Tactic, rng: &mut impl Rng) -> usize {
        match tactic {
            Tactic::Lifo => *candidates.iter().max_by_key(|&&i| flaws[i].insertion_order()).unwrap(),
            Tactic::Fifo => *candidates.iter().min_by_key(|&&i| flaws[i].insertion_order()).unwrap(),
            Tactic::Reservoir => candidates[rng.random_range(0..candidates.len())],
            Tactic::LeastRefinements => *candidates.iter().min_by_key(|&&i| flaws[i].refinement_count()).unwrap(),
            Tactic::MostRefinements => *candidates.iter().max_by_key(|&&i| flaws[i].refinement_count()).unwrap(),
            Tactic::PreferNew => *candidates
                .iter()
                .max_by_key(|&&i| !flaws[i].has_reuse_achiever())
                .unwrap(),
            Tactic::PreferReuse => *candidates
                .iter()
                .max_by_key(|&&i| flaws[i].has_reuse_achiever())
                .unwrap(),
            Tactic::HeuristicRanked { dimension, direction, mode, reuse } => {
                Self::break_tie_heuristic(flaws, candidates, dimension, direction, mode, reuse)
            }
        }
    }

    fn break_tie_heuristic<F: FlawInfo>(
        flaws: &[F],
        candidates: &[usize],
        dimension: HeuristicDimension,
        direction: Direction,
        mode: CostMode,
        reuse: bool,
    ) -> usize {
        let score = |i: usize| -> f64 {
            let f = &flaws[i];
            let base = match dimension {
                HeuristicDimension::Cost => f.add_cost(),
                HeuristicDimension::Work => f.work() as f64,
            };
            let base = if mode == CostMode::Makespan { base.max(f.makespan()) } else { base };
            if reuse && f.has_reuse_achiever() {
                base - 1.0
            } else {
                base
            }
        };
        let mut best = candidates[0];
        let mut best_score = score(best);
        for &i in &candidates[1..] {
            let s = score(i);
            let better = match direction {
                Direction::Least => s < best_score,
                Direction::Most => s > best_score,
            };
            if better {
                best = i;
                best_score = s;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    struct Flaw {
        kind: FlawKindMask,
        refinements: usize,
        cost: f64,
        makespan: f64,
        work: u32,
        reuse: bool,
        order: u64,
    }

    impl FlawInfo for Flaw {
        fn kind(&self) -> FlawKindMask {
            self.kind
        }
        fn refinement_count(&self) -> usize {
            self.refinements
        }
        fn add_cost(&self) -> f64 {
            self.cost
        }
        fn makespan(&self) -> f64 {
            self.makespan
        }
        fn work(&self) -> u32 {
            self.work
        }
        fn has_reuse_achiever(&self) -> bool {
            self.reuse
        }
        fn insertion_order(&self) -> u64 {
            self.order
        }
    }

    fn flaw(kind: FlawKindMask, order: u64) -> Flaw {
        Flaw { kind, refinements: 0, cost: 0.0, makespan: 0.0, work: 0, reuse: false, order }
    }

    #[test]
    fn threats_are_preferred_over_open_conditions_under_ucpop() {
        let order = FlawOrder::parse("UCPOP").unwrap();
        let flaws = vec![flaw(FlawKindMask::OPEN, 0), flaw(FlawKindMask::NONSEP_THREAT, 1)];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(order.select(&flaws, &mut rng), Some(1));
    }

    #[test]
    fn lifo_picks_most_recently_inserted() {
        let order = FlawOrder::parse("{o}LIFO").unwrap();
        let flaws = vec![flaw(FlawKindMask::OPEN, 0), flaw(FlawKindMask::OPEN, 5), flaw(FlawKindMask::OPEN, 2)];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(order.select(&flaws, &mut rng), Some(1));
    }

    #[test]
    fn cap_excludes_criterion_once_refinement_count_reaches_it() {
        let order = FlawOrder::parse("{o}0LIFO/{o}LIFO").unwrap();
        let mut f = flaw(FlawKindMask::OPEN, 0);
        f.refinements = 1;
        let flaws = vec![f];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(order.select(&flaws, &mut rng), Some(0));
    }

    #[test]
    fn least_cost_heuristic_ranking() {
        let order = FlawOrder::parse("{o}LC").unwrap();
        let mut cheap = flaw(FlawKindMask::OPEN, 0);
        cheap.cost = 1.0;
        let mut pricey = flaw(FlawKindMask::OPEN, 1);
        pricey.cost = 5.0;
        let flaws = vec![pricey, cheap];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(order.select(&flaws, &mut rng), Some(1));
    }

    #[test]
    fn empty_flaw_list_yields_none() {
        let order = FlawOrder::parse("UCPOP").unwrap();
        let flaws: Vec<Flaw> = vec![];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(order.select(&flaws, &mut rng), None);
    }
}
