use crate::types::TypeRef;
use pocl_collections::create_ref_type;
use pocl_collections::ref_store::RefVec;

create_ref_type!(PredicateId);

#[derive(Default)]
pub struct PredicateTable {
    names: RefVec<PredicateId, String>,
    signatures: RefVec<PredicateId, Vec<TypeRef>>,
    /// Predicates that never appear as the literal of any action effect.
    /// Populated once the full action set is known.
    static_predicates: fixedbitset::FixedBitSet,
}

impl PredicateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_predicate(&mut self, name: impl Into<String>, arg_types: Vec<TypeRef>) -> PredicateId {
        let id = self.names.push(name.into());
        self.signatures.set_next(id, arg_types);
        id
    }

    pub fn name(&self, id: PredicateId) -> &str {
        &self.names[id]
    }

    pub fn arity(&self, id: PredicateId) -> usize {
        self.signatures[id].len()
    }

    pub fn arg_type(&self, id: PredicateId, arg: usize) -> &TypeRef {
        &self.signatures[id][arg]
    }

    pub fn mark_static(&mut self, id: PredicateId) {
        let bit = u32::from(id) as usize;
        if bit >= self.static_predicates.len() {
            self.static_predicates.grow(bit + 1);
        }
        self.static_predicates.insert(bit);
    }

    pub fn is_static(&self, id: PredicateId) -> bool {
        let bit = u32::from(id) as usize;
        bit < self.static_predicates.len() && self.static_predicates.contains(bit)
    }

    pub fn predicates(&self) -> impl Iterator<Item = PredicateId> + '_ {
        self.names.keys()
    }
}
