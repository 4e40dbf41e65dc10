//! Per-step parameter domains: the legal object tuples remaining for a
//! lifted step's parameters.

use pocl_domain::{ObjectId, VarId};
use std::collections::BTreeSet;

/// The set of concrete object tuples still legal for a lifted step's
/// parameters. Narrowing removes rows; it never adds one, so every
/// `ActionDomain` reachable from a plan's bindings is a subset of the one the
/// planning graph originally supplied for that step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionDomain {
    params: Vec<VarId>,
    tuples: Vec<Vec<ObjectId>>,
}

impl ActionDomain {
    pub fn new(params: Vec<VarId>, tuples: Vec<Vec<ObjectId>>) -> Self {
        debug_assert!(tuples.iter().all(|t| t.len() == params.len()));
        ActionDomain { params, tuples }
    }

    pub fn params(&self) -> &[VarId] {
        &self.params
    }

    pub fn tuples(&self) -> &[Vec<ObjectId>] {
        &self.tuples
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    fn column_index(&self, var: VarId) -> Option<usize> {
        self.params.iter().position(|&v| v == var)
    }

    /// The current legal domain for a single parameter: the distinct values
    /// that still appear in that column of some remaining tuple.
    pub fn column_domain(&self, var: VarId) -> Option<BTreeSet<ObjectId>> {
        let idx = self.column_index(var)?;
        Some(self.tuples.iter().map(|t| t[idx]).collect())
    }

    /// Returns a new domain keeping only tuples whose `var` column is in
    /// `allowed`. Returns `None` (signalling a dead end) if that would empty
    /// the domain.
    pub fn narrow_column(&self, var: VarId, allowed: &BTreeSet<ObjectId>) -> Option<ActionDomain> {
        let idx = self.column_index(var)?;
        let tuples: Vec<Vec<ObjectId>> = self.tuples.iter().filter(|t| allowed.contains(&t[idx])).cloned().collect();
        if tuples.is_empty() {
            None
        } else {
            Some(ActionDomain {
                params: self.params.clone(),
                tuples,
            })
        }
    }

    /// Returns a new domain excluding `excluded` from `var`'s column.
    pub fn exclude_from_column(&self, var: VarId, excluded: ObjectId) -> Option<ActionDomain> {
        let idx = self.column_index(var)?;
        let tuples: Vec<Vec<ObjectId>> = self.tuples.iter().filter(|t| t[idx] != excluded).cloned().collect();
        if tuples.is_empty() {
            None
        } else {
            Some(ActionDomain {
                params: self.params.clone(),
                tuples,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocl_domain::terms::{ObjectId, VarId};

    fn oid(i: u32) -> ObjectId {
        ObjectId::from_u32(i)
    }
    fn vid(i: u32) -> VarId {
        VarId::from_u32(i)
    }

    #[test]
    fn narrowing_only_removes_tuples() {
        let v0 = vid(0);
        let v1 = vid(1);
        let d = ActionDomain::new(vec![v0, v1], vec![vec![oid(0), oid(1)], vec![oid(0), oid(2)], vec![oid(3), oid(1)]]);
        let allowed: BTreeSet<_> = [oid(0)].into_iter().collect();
        let narrowed = d.narrow_column(v0, &allowed).unwrap();
        assert_eq!(narrowed.tuples().len(), 2);
        assert!(narrowed.tuples().iter().all(|t| t[0] == oid(0)));
    }

    #[test]
    fn narrowing_to_empty_fails() {
        let v0 = vid(0);
        let d = ActionDomain::new(vec![v0], vec![vec![oid(0)]]);
        let allowed: BTreeSet<_> = [oid(1)].into_iter().collect();
        assert!(d.narrow_column(v0, &allowed).is_none());
    }
}
