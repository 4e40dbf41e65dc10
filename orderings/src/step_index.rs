//! Assigns each step a dense matrix row/column, shared by the binary and
//! temporal ordering stores.

use im::HashMap;
use pocl_domain::StepId;

#[derive(Clone, Default)]
pub struct StepIndex {
    by_id: HashMap<StepId, usize>,
    count: usize,
}

impl StepIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: StepId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Assigns `id` the next free dense index, unless it already has one.
    pub fn add(&self, id: StepId) -> (StepIndex, usize) {
        if let Some(i) = self.get(id) {
            return (self.clone(), i);
        }
        let idx = self.count;
        let mut next = self.clone();
        next.by_id.insert(id, idx);
        next.count += 1;
        (next, idx)
    }
}
