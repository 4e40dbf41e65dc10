//! Transitive-closure ordering store: an n×n boolean `before` matrix, stored
//! row-by-row so that refining one pair only clones the affected rows.

use crate::step_index::StepIndex;
use fixedbitset::FixedBitSet;
use im::Vector;
use pocl_domain::{StepId, GOAL_ID, INIT_ID};
use std::rc::Rc;

fn ensure_capacity(bs: &mut FixedBitSet, n: usize) {
    if bs.len() < n {
        bs.grow(n);
    }
}

#[derive(Clone, Default)]
pub struct BinaryOrderings {
    index: StepIndex,
    before: Vector<Rc<FixedBitSet>>,
}

impl BinaryOrderings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&self, id: StepId) -> BinaryOrderings {
        let (index, _) = self.index.add(id);
        let mut before = self.before.clone();
        before.push_back(Rc::new(FixedBitSet::new()));
        BinaryOrderings { index, before }
    }

    fn row_before(&self, row: usize, col: usize) -> bool {
        self.before.get(row).map(|bs| col < bs.len() && bs.contains(col)).unwrap_or(false)
    }

    /// `before(i, j)` in the transitive closure.
    pub fn before(&self, i: StepId, j: StepId) -> bool {
        if i == j {
            return false;
        }
        if i == INIT_ID {
            return j != INIT_ID;
        }
        if j == GOAL_ID {
            return i != GOAL_ID;
        }
        if j == INIT_ID || i == GOAL_ID {
            return false;
        }
        match (self.index.get(i), self.index.get(j)) {
            (Some(ri), Some(cj)) => self.row_before(ri, cj),
            _ => false,
        }
    }

    /// `possibly_before(i, j)`: `i ≠ j ∧ ¬before(j, i)`. Step-times play no
    /// role in the binary store (unlike [`crate::temporal::TemporalOrderings`]),
    /// so this takes plain step ids.
    pub fn possibly_before(&self, i: StepId, j: StepId) -> bool {
        i != j && !self.before(j, i)
    }

    pub fn possibly_concurrent(&self, i: StepId, j: StepId) -> bool {
        !self.before(i, j) && !self.before(j, i)
    }

    /// Adds `i < j` to the transitive closure. Returns `None` if this would
    /// create a cycle (`j` is already before `i`).
    pub fn refine(&self, i: StepId, j: StepId) -> Option<BinaryOrderings> {
        if i == j {
            return Some(self.clone());
        }
        if self.before(j, i) {
            return None;
        }
        let ri = match self.index.get(i) {
            Some(r) => r,
            None => return None,
        };
        let cj = match self.index.get(j) {
            Some(c) => c,
            None => return None,
        };
        let mut preds = vec![ri];
        for k in 0..self.before.len() {
            if k != ri && self.row_before(k, ri) {
                preds.push(k);
            }
        }
        let mut succs = vec![cj];
        for l in 0..self.before.len() {
            if l != cj && self.row_before(cj, l) {
                succs.push(l);
            }
        }
        let mut before = self.before.clone();
        for &k in &preds {
            let mut row = (*before[k]).clone();
            for &l in &succs {
                ensure_capacity(&mut row, l + 1);
                row.insert(l);
            }
            before.set(k, Rc::new(row));
        }
        Some(BinaryOrderings {
            index: self.index.clone(),
            before,
        })
    }

    /// Topological depth schedule: each step contributes one unit of duration.
    /// Returns `(start, end)` times keyed by dense index, plus the makespan.
    pub fn schedule(&self, steps: &[StepId]) -> (Vec<(StepId, f64, f64)>, f64) {
        let mut depth = vec![0i64; self.before.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for &s in steps {
                let Some(si) = self.index.get(s) else { continue };
                for &p in steps {
                    if p == s {
                        continue;
                    }
                    let Some(pi) = self.index.get(p) else { continue };
                    if self.row_before(pi, si) && depth[pi] + 1 > depth[si] {
                        depth[si] = depth[pi] + 1;
                        changed = true;
                    }
                }
            }
        }
        let mut rows = Vec::with_capacity(steps.len());
        let mut makespan = 0.0f64;
        for &s in steps {
            let Some(si) = self.index.get(s) else { continue };
            let start = depth[si] as f64;
            let end = start + 1.0;
            makespan = makespan.max(end);
            rows.push((s, start, end));
        }
        (rows, makespan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitive_closure_is_maintained() {
        let o = BinaryOrderings::new().add_step(1).add_step(2).add_step(3);
        let o = o.refine(1, 2).unwrap();
        let o = o.refine(2, 3).unwrap();
        assert!(o.before(1, 3));
    }

    #[test]
    fn cycle_is_rejected() {
        let o = BinaryOrderings::new().add_step(1).add_step(2);
        let o = o.refine(1, 2).unwrap();
        assert!(o.refine(2, 1).is_none());
    }

    #[test]
    fn sibling_plans_do_not_see_each_others_refinement() {
        let base = BinaryOrderings::new().add_step(1).add_step(2).add_step(3);
        let left = base.refine(1, 2).unwrap();
        let right = base.refine(1, 3).unwrap();
        assert!(left.before(1, 2));
        assert!(!left.before(1, 3));
        assert!(right.before(1, 3));
        assert!(!right.before(1, 2));
    }
}
