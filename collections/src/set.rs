use std::marker::PhantomData;

/// A set of values that can be converted into small unsigned integers.
/// The underlying implementation uses a growable bitset to keep track of the values present in the set.
#[derive(Clone)]
pub struct RefSet<K> {
    set: fixedbitset::FixedBitSet,
    _phantom: PhantomData<K>,
}

impl<K: Into<usize>> RefSet<K> {
    pub fn new() -> RefSet<K> {
        RefSet {
            set: fixedbitset::FixedBitSet::new(),
            _phantom: Default::default(),
        }
    }

    fn ensure_capacity(&mut self, bit: usize) {
        if bit >= self.set.len() {
            self.set.grow(bit + 1);
        }
    }

    pub fn insert(&mut self, k: K) {
        let bit = k.into();
        self.ensure_capacity(bit);
        self.set.insert(bit);
    }

    pub fn remove(&mut self, k: K) {
        let bit = k.into();
        if bit < self.set.len() {
            self.set.set(bit, false);
        }
    }

    pub fn clear(&mut self) {
        self.set.clear()
    }

    pub fn contains(&self, k: K) -> bool {
        let bit = k.into();
        bit < self.set.len() && self.set.contains(bit)
    }
}

impl<K: Into<usize>> Default for RefSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_contains_remove() {
        let mut s: RefSet<usize> = RefSet::new();
        assert!(!s.contains(3));
        s.insert(3);
        assert!(s.contains(3));
        s.remove(3);
        assert!(!s.contains(3));
    }
}
