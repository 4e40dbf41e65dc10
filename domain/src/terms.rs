//! Integer-indexed term handles.
//!
//! A [`Term`] packs a sign-discriminated index: non-negative values name
//! objects (ground constants), negative values name variables. This keeps
//! `Term` a `Copy` 32-bit value instead of an enum with a discriminant, since
//! terms flow through the hot paths of unification and binding by the
//! million during search.

use crate::types::TypeRef;
use pocl_collections::ref_store::RefVec;
use pocl_collections::create_ref_type;

create_ref_type!(ObjectId);
create_ref_type!(VarId);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Term(i32);

impl std::fmt::Debug for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.split() {
            TermKind::Object(o) => write!(f, "obj#{}", u32::from(o)),
            TermKind::Variable(v) => write!(f, "?var#{}", u32::from(v)),
        }
    }
}

pub enum TermKind {
    Object(ObjectId),
    Variable(VarId),
}

impl Term {
    pub fn object(id: ObjectId) -> Term {
        Term(u32::from(id) as i32)
    }

    pub fn variable(id: VarId) -> Term {
        Term(-(u32::from(id) as i32) - 1)
    }

    pub fn is_object(self) -> bool {
        self.0 >= 0
    }

    pub fn is_variable(self) -> bool {
        self.0 < 0
    }

    pub fn as_object(self) -> Option<ObjectId> {
        self.is_object().then(|| ObjectId::from_u32(self.0 as u32))
    }

    pub fn as_variable(self) -> Option<VarId> {
        self.is_variable().then(|| VarId::from_u32((-self.0 - 1) as u32))
    }

    pub fn split(self) -> TermKind {
        match self.as_object() {
            Some(o) => TermKind::Object(o),
            None => TermKind::Variable(self.as_variable().expect("term is neither object nor variable")),
        }
    }
}

/// Keys into a plan's binding store alongside a [`VarId`]: the same lifted
/// variable of an action schema is instantiated independently for every step
/// that uses that schema.
pub type StepId = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepVar {
    pub var: VarId,
    pub step: StepId,
}

impl StepVar {
    pub fn new(var: VarId, step: StepId) -> Self {
        StepVar { var, step }
    }
}

/// The table of all objects and (lifted) variables declared in a domain/problem,
/// together with their types.
#[derive(Default)]
pub struct TermTable {
    object_names: RefVec<ObjectId, String>,
    object_types: RefVec<ObjectId, TypeRef>,
    variable_names: RefVec<VarId, String>,
    variable_types: RefVec<VarId, TypeRef>,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, name: impl Into<String>, ty: TypeRef) -> ObjectId {
        let id = self.object_names.push(name.into());
        self.object_types.set_next(id, ty);
        id
    }

    pub fn add_variable(&mut self, name: impl Into<String>, ty: TypeRef) -> VarId {
        let id = self.variable_names.push(name.into());
        self.variable_types.set_next(id, ty);
        id
    }

    pub fn object_name(&self, id: ObjectId) -> &str {
        &self.object_names[id]
    }

    pub fn object_type(&self, id: ObjectId) -> &TypeRef {
        &self.object_types[id]
    }

    pub fn variable_name(&self, id: VarId) -> &str {
        &self.variable_names[id]
    }

    pub fn variable_type(&self, id: VarId) -> &TypeRef {
        &self.variable_types[id]
    }

    pub fn term_name(&self, t: Term) -> String {
        match t.split() {
            TermKind::Object(o) => self.object_name(o).to_string(),
            TermKind::Variable(v) => format!("?{}", self.variable_name(v)),
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.object_names.keys()
    }

    pub fn objects_of_type<'a>(&'a self, types: &'a crate::types::TypeTable, ty: &'a TypeRef) -> impl Iterator<Item = ObjectId> + 'a {
        self.objects().filter(move |&o| types.compatible(self.object_type(o), ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_roundtrips_sign_encoding() {
        let t = TermTable::new();
        let _ = t;
        let o = ObjectId::from_u32(3);
        let v = VarId::from_u32(5);
        let to = Term::object(o);
        let tv = Term::variable(v);
        assert!(to.is_object() && !to.is_variable());
        assert!(tv.is_variable() && !tv.is_object());
        assert_eq!(to.as_object(), Some(o));
        assert_eq!(tv.as_variable(), Some(v));
    }
}
