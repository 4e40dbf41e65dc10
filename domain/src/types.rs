//! The simple-type DAG plus either-of (union) types.

use pocl_collections::create_ref_type;
use pocl_collections::ref_store::RefVec;

create_ref_type!(SimpleTypeId);

/// A type as it appears on a parameter or object declaration: either a single
/// simple type or a union ("either-of") of several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Simple(SimpleTypeId),
    Either(Vec<SimpleTypeId>),
}

impl From<SimpleTypeId> for TypeRef {
    fn from(id: SimpleTypeId) -> Self {
        TypeRef::Simple(id)
    }
}

/// The DAG of declared simple types (a type may have several parents) plus a
/// cache of the `subtype`/`compatible` queries used throughout binding and
/// unification.
#[derive(Default)]
pub struct TypeTable {
    names: RefVec<SimpleTypeId, String>,
    parents: RefVec<SimpleTypeId, Vec<SimpleTypeId>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, name: impl Into<String>, parents: Vec<SimpleTypeId>) -> SimpleTypeId {
        let id = self.names.push(name.into());
        self.parents.set_next(id, parents);
        id
    }

    pub fn name(&self, id: SimpleTypeId) -> &str {
        &self.names[id]
    }

    /// True iff `sub` is `sup` or a (transitive) descendant of `sup` in the type DAG.
    pub fn simple_subtype(&self, sub: SimpleTypeId, sup: SimpleTypeId) -> bool {
        if sub == sup {
            return true;
        }
        self.parents[sub].iter().any(|&p| self.simple_subtype(p, sup))
    }

    /// `subtype(a,b)`: every simple type in `a` is a subtype of some simple type in `b`.
    pub fn subtype(&self, a: &TypeRef, b: &TypeRef) -> bool {
        let a_simples = self.flatten(a);
        let b_simples = self.flatten(b);
        a_simples
            .iter()
            .all(|&sa| b_simples.iter().any(|&sb| self.simple_subtype(sa, sb)))
    }

    /// `compatible(a,b)`: either is a subtype of the other.
    pub fn compatible(&self, a: &TypeRef, b: &TypeRef) -> bool {
        self.subtype(a, b) || self.subtype(b, a)
    }

    fn flatten(&self, t: &TypeRef) -> Vec<SimpleTypeId> {
        match t {
            TypeRef::Simple(s) => vec![*s],
            TypeRef::Either(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_transitive_through_dag() {
        let mut t = TypeTable::new();
        let object = t.add_type("object", vec![]);
        let block = t.add_type("block", vec![object]);
        let small_block = t.add_type("small-block", vec![block]);
        assert!(t.simple_subtype(small_block, object));
        assert!(t.simple_subtype(block, object));
        assert!(!t.simple_subtype(object, small_block));
    }

    #[test]
    fn either_type_compatible() {
        let mut t = TypeTable::new();
        let object = t.add_type("object", vec![]);
        let block = t.add_type("block", vec![object]);
        let table = t.add_type("table", vec![object]);
        let either = TypeRef::Either(vec![block, table]);
        assert!(t.compatible(&TypeRef::Simple(block), &either));
        assert!(t.subtype(&either, &TypeRef::Simple(object)));
    }
}
