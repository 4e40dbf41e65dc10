//! Tie-breaking tactics within a single criterion.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CostMode {
    Add,
    Makespan,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeuristicDimension {
    Cost,
    Work,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Least,
    Most,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tactic {
    Lifo,
    Fifo,
    /// `R`: reservoir-sample one flaw uniformly among those tied at this criterion.
    Reservoir,
    LeastRefinements,
    MostRefinements,
    PreferNew,
    PreferReuse,
    /// `LC`/`MC`/`LW`/`MW`, under `ADD` or `MAKESPAN`, with an optional `R`
    /// (reuse) modifier that evaluates the heuristic as if an existing step
    /// could achieve the flaw rather than a fresh one.
    HeuristicRanked {
        dimension: HeuristicDimension,
        direction: Direction,
        mode: CostMode,
        reuse: bool,
    },
}

impl Tactic {
    /// The restricted vocabulary usable by a criterion whose mask matches
    /// only threats (`n`/`s`) — see [`crate::mask::FlawKindMask::is_threat_only`].
    pub fn allowed_for_threat_only_mask(self) -> bool {
        matches!(self, Tactic::Lifo | Tactic::Fifo | Tactic::Reservoir | Tactic::LeastRefinements | Tactic::MostRefinements)
    }
}
