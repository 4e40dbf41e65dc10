//! Simple Temporal Network: an all-pairs distance matrix over step
//! time-points, kept consistency-closed by an incremental shortest-paths
//! pass after every edge addition.
//!
//! `dist[a][b]` is the tightest known upper bound on `t_b - t_a`, measured in
//! integer multiples of `threshold` (so that arithmetic stays exact instead
//! of accumulating floating-point error across many refinements). Node 0 is
//! a distinguished origin fixed at absolute time zero; every step occupies
//! two further nodes, its start and end time-points.

use im::{HashMap, Vector};
use pocl_domain::StepId;
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StepTime {
    Start,
    End,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct Node(StepId, StepTime);

const ORIGIN: usize = 0;
/// Saturating "unconstrained" distance. Kept well under `i64::MAX / 2` so
/// that summing two of them during closure cannot overflow.
const INF: i64 = i64::MAX / 4;

#[derive(Clone)]
pub struct TemporalOrderings {
    threshold: f64,
    index: HashMap<Node, usize>,
    dist: Vector<Rc<Vec<i64>>>,
    goal_achievers: Vector<StepId>,
}

impl TemporalOrderings {
    pub fn new(threshold: f64) -> Self {
        TemporalOrderings {
            threshold,
            index: HashMap::unit(Node(0, StepTime::Start), ORIGIN),
            dist: Vector::unit(Rc::new(vec![0])),
            goal_achievers: Vector::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn scale(&self, amount: f64) -> i64 {
        (amount / self.threshold).round() as i64
    }

    fn node(&self, step: StepId, time: StepTime) -> Option<usize> {
        self.index.get(&Node(step, time)).copied()
    }

    fn n(&self) -> usize {
        self.dist.len()
    }

    /// Registers two fresh time-points for `step` and installs its duration
    /// bounds, then closes the network. `duration` defaults to an exact
    /// `threshold`-wide instant for non-durative actions, matching the
    /// one-unit-per-step convention [`crate::binary::BinaryOrderings`] uses
    /// for its topological schedule.
    pub fn add_step(&self, step: StepId, duration: Option<(f64, f64)>, start_lower_bound: Option<f64>) -> Option<TemporalOrderings> {
        let (min_dur, max_dur) = duration.unwrap_or((self.threshold, self.threshold));
        if min_dur > max_dur {
            return None;
        }
        let old_n = self.n();
        let start_idx = old_n;
        let end_idx = old_n + 1;
        let mut index = self.index.clone();
        index.insert(Node(step, StepTime::Start), start_idx);
        index.insert(Node(step, StepTime::End), end_idx);

        let mut dist: Vec<Vec<i64>> = self.dist.iter().map(|row| row.as_ref().clone()).collect();
        for row in dist.iter_mut() {
            row.push(INF);
            row.push(INF);
        }
        let mut start_row = vec![INF; old_n + 2];
        start_row[start_idx] = 0;
        start_row[end_idx] = self.scale(max_dur);
        // every step's time-points are bounded below by the origin: nothing
        // is scheduled before absolute time zero.
        start_row[ORIGIN] = 0;
        let mut end_row = vec![INF; old_n + 2];
        end_row[end_idx] = 0;
        end_row[start_idx] = self.scale(-min_dur);
        end_row[ORIGIN] = 0;
        dist.push(start_row);
        dist.push(end_row);

        let mut next = TemporalOrderings {
            threshold: self.threshold,
            index,
            dist: dist.into_iter().map(Rc::new).collect(),
            goal_achievers: self.goal_achievers.clone(),
        };
        if let Some(lb) = start_lower_bound {
            let w = -next.scale(lb);
            next.close_edge(start_idx, ORIGIN, w)?;
        }
        Some(next)
    }

    /// Pins `step`'s given time-point to exactly absolute time zero, used by
    /// the refinement engine for the synthetic `Init` step's start.
    pub fn fix_at_origin(&self, step: StepId, time: StepTime) -> Option<TemporalOrderings> {
        let node = self.node(step, time)?;
        let mut next = self.clone();
        next.close_edge(ORIGIN, node, 0)?;
        Some(next)
    }

    pub fn mark_goal_achiever(&self, step: StepId) -> TemporalOrderings {
        let mut next = self.clone();
        if !next.goal_achievers.iter().any(|&s| s == step) {
            next.goal_achievers.push_back(step);
        }
        next
    }

    pub fn goal_achievers(&self) -> impl Iterator<Item = StepId> + '_ {
        self.goal_achievers.iter().copied()
    }

    /// Posts `t(after, after_time) - t(before, before_time) >= amount`,
    /// i.e. tightens the upper bound on the reverse difference, then
    /// re-closes the network. Returns `None` on a negative cycle
    /// (temporal infeasibility).
    pub fn refine(&self, before: StepId, before_time: StepTime, after: StepId, after_time: StepTime, amount: f64) -> Option<TemporalOrderings> {
        let i = self.node(before, before_time)?;
        let j = self.node(after, after_time)?;
        let w = -self.scale(amount);
        let mut next = self.clone();
        next.close_edge(j, i, w)?;
        Some(next)
    }

    /// Tightens `dist[x][y]` to `weight` and performs the rank-one all-pairs
    /// update induced by that single edge. Fails (returns `None`) if doing
    /// so creates a negative cycle (`dist[k][k] < 0` for some `k`).
    fn close_edge(&mut self, x: usize, y: usize, w: i64) -> Option<()> {
        if w >= self.dist[x][y] {
            return Some(());
        }
        let n = self.n();
        let mut dist: Vec<Vec<i64>> = self.dist.iter().map(|row| row.as_ref().clone()).collect();
        dist[x][y] = w;
        for a in 0..n {
            let via_x = dist[a][x];
            if via_x >= INF {
                continue;
            }
            for b in 0..n {
                let via_y = dist[y][b];
                if via_y >= INF {
                    continue;
                }
                let candidate = via_x.saturating_add(w).saturating_add(via_y);
                if candidate < dist[a][b] {
                    dist[a][b] = candidate;
                }
            }
        }
        for k in 0..n {
            if dist[k][k] < 0 {
                return None;
            }
        }
        self.dist = dist.into_iter().map(Rc::new).collect();
        Some(())
    }

    /// `possibly_before(i, ti, j, tj)`: true iff it remains consistent for
    /// `(i, ti)` to occur strictly before `(j, tj)` by at least `threshold`.
    pub fn possibly_before(&self, i: StepId, ti: StepTime, j: StepId, tj: StepTime) -> bool {
        match (self.node(i, ti), self.node(j, tj)) {
            (Some(ni), Some(nj)) => self.dist[nj][ni] > 0,
            _ => false,
        }
    }

    pub fn possibly_concurrent(&self, i: StepId, ti: StepTime, j: StepId, tj: StepTime) -> bool {
        !self.possibly_before(i, ti, j, tj) && !self.possibly_before(j, tj, i, ti)
    }

    /// Earliest-time schedule: each time-point's value is the tightest lower
    /// bound the network admits, `-dist[node][origin] * threshold`.
    pub fn schedule(&self, steps: &[StepId]) -> (Vec<(StepId, f64, f64)>, f64) {
        let mut rows = Vec::with_capacity(steps.len());
        for &s in steps {
            let (Some(si), Some(ei)) = (self.node(s, StepTime::Start), self.node(s, StepTime::End)) else {
                continue;
            };
            let start = -(self.dist[si][ORIGIN] as f64) * self.threshold;
            let end = -(self.dist[ei][ORIGIN] as f64) * self.threshold;
            rows.push((s, start, end));
        }
        (rows, self.makespan())
    }

    /// The latest end-time across the registered goal achievers.
    pub fn makespan(&self) -> f64 {
        self.goal_achievers
            .iter()
            .filter_map(|&s| self.node(s, StepTime::End))
            .map(|ei| -(self.dist[ei][ORIGIN] as f64) * self.threshold)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_bounds_are_enforced() {
        let stn = TemporalOrderings::new(0.01);
        let stn = stn.add_step(1, Some((5.0, 5.0)), None).unwrap();
        let (rows, _) = stn.schedule(&[1]);
        let (_, start, end) = rows[0];
        assert!((end - start - 5.0).abs() < 1e-6);
    }

    #[test]
    fn refine_enforces_minimum_separation() {
        let stn = TemporalOrderings::new(0.01);
        let stn = stn.add_step(1, Some((5.0, 5.0)), None).unwrap();
        let stn = stn.add_step(2, Some((5.0, 5.0)), None).unwrap();
        let stn = stn.refine(1, StepTime::End, 2, StepTime::Start, 0.01).unwrap();
        assert!(!stn.possibly_before(2, StepTime::Start, 1, StepTime::End));
        assert!(stn.possibly_before(1, StepTime::End, 2, StepTime::Start));
    }

    #[test]
    fn concurrent_independent_actions_overlap() {
        let stn = TemporalOrderings::new(0.01);
        let stn = stn.add_step(1, Some((5.0, 5.0)), None).unwrap();
        let stn = stn.add_step(2, Some((5.0, 5.0)), None).unwrap();
        assert!(stn.possibly_concurrent(1, StepTime::Start, 2, StepTime::Start));
    }

    #[test]
    fn negative_cycle_is_rejected() {
        let stn = TemporalOrderings::new(0.01);
        let stn = stn.add_step(1, Some((5.0, 5.0)), None).unwrap();
        // can't require step 1 to end at least 1 unit before it starts.
        assert!(stn.refine(1, StepTime::End, 1, StepTime::Start, 0.01).is_none());
    }

    #[test]
    fn makespan_tracks_goal_achievers() {
        let stn = TemporalOrderings::new(0.01);
        let stn = stn.add_step(1, Some((5.0, 5.0)), None).unwrap();
        let stn = stn.add_step(2, Some((3.0, 3.0)), None).unwrap();
        let stn = stn.mark_goal_achiever(1).mark_goal_achiever(2);
        assert!((stn.makespan() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn sibling_plans_do_not_see_each_others_refinement() {
        let base = TemporalOrderings::new(0.01).add_step(1, Some((5.0, 5.0)), None).unwrap();
        let base = base.add_step(2, Some((5.0, 5.0)), None).unwrap();
        let left = base.refine(1, StepTime::End, 2, StepTime::Start, 0.01).unwrap();
        assert!(left.possibly_before(1, StepTime::End, 2, StepTime::Start));
        assert!(base.possibly_before(2, StepTime::Start, 1, StepTime::End));
    }
}
