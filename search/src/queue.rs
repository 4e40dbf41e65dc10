//! One priority queue per flaw-selection order (§4.7).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use pocl_flaws::FlawOrder;
use pocl_plan::Plan;

struct RankedPlan(Plan);

impl PartialEq for RankedPlan {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank == other.0.rank && self.0.serial == other.0.serial
    }
}

impl Eq for RankedPlan {}

impl PartialOrd for RankedPlan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `BinaryHeap` is a max-heap and a *lower* rank should pop first, so every
/// comparison is reversed: the plan with the lexicographically smaller rank
/// vector compares as greater. `serial` (descending, oldest wins) is the
/// final tiebreaker so the ordering is total and deterministic given a
/// fixed random seed.
impl Ord for RankedPlan {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.rank.iter().zip(other.0.rank.iter()) {
            match b.partial_cmp(a).unwrap_or(Ordering::Equal) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        other.0.serial.cmp(&self.0.serial)
    }
}

/// A flaw order's own open list plus its plan-generation quota bookkeeping
/// (§4.7's "round-robin"/"retirement"/"doubling") and, for `IDA*`, its own
/// f-limit and the plans deferred past it.
pub struct FlawOrderQueue {
    pub order: FlawOrder,
    heap: BinaryHeap<RankedPlan>,
    quota: Option<usize>,
    /// Number of *expansion events* (refine/ground-completion calls) this
    /// order has performed since the last doubling — not the number of
    /// children those calls produced. "-l N" bounds how many times an
    /// order is allowed to generate the next plan(s) from a popped one.
    expansions: usize,
    ida_limit: Option<f64>,
    ida_deferred: Vec<Plan>,
}

impl FlawOrderQueue {
    pub fn new(order: FlawOrder, quota: Option<usize>) -> Self {
        FlawOrderQueue { order, heap: BinaryHeap::new(), quota, expansions: 0, ida_limit: None, ida_deferred: Vec::new() }
    }

    /// Pushes a plan, deferring it instead when running under an `IDA*`
    /// f-limit it exceeds.
    pub fn push(&mut self, plan: Plan) {
        if let Some(limit) = self.ida_limit {
            let f = plan.rank.first().copied().unwrap_or(0.0);
            if f > limit {
                self.ida_deferred.push(plan);
                return;
            }
        }
        self.heap.push(RankedPlan(plan));
    }

    pub fn pop(&mut self) -> Option<Plan> {
        self.heap.pop().map(|r| r.0)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// `IDA*` only: true once both the current f-limit's heap and the
    /// deferred set are drained — this order has no more plans at any
    /// limit.
    pub fn ida_exhausted(&self) -> bool {
        self.heap.is_empty() && self.ida_deferred.is_empty()
    }

    /// `IDA*` only: when the current limit's heap runs dry but plans were
    /// deferred past it, raise the limit to the minimum deferred f-value
    /// and move them back in.
    pub fn ida_raise_limit(&mut self) -> bool {
        if !self.heap.is_empty() || self.ida_deferred.is_empty() {
            return false;
        }
        let next_limit = self
            .ida_deferred
            .iter()
            .map(|p| p.rank.first().copied().unwrap_or(0.0))
            .fold(f64::INFINITY, f64::min);
        self.ida_limit = Some(next_limit);
        for plan in std::mem::take(&mut self.ida_deferred) {
            self.heap.push(RankedPlan(plan));
        }
        true
    }

    pub fn record_expansion(&mut self) {
        self.expansions += 1;
    }

    pub fn quota_reached(&self) -> bool {
        self.quota.is_some_and(|q| self.expansions >= q)
    }

    /// §5 "a retired queue drops its plans" — doubling the quota also
    /// starts a fresh expansion count, and clears the heap and any
    /// deferred `IDA*` plans: the round that just ended is over, and the
    /// doubled round restarts from whatever plan is re-seeded into it by
    /// the caller.
    pub fn double_quota_and_reset(&mut self) {
        self.quota = self.quota.map(|q| q * 2);
        self.expansions = 0;
        self.heap.clear();
        self.ida_deferred.clear();
        self.ida_limit = None;
    }
}
