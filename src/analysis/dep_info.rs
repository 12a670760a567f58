//! The dependency lattice.
//!
//! A [`DepInfo`] is one of
//! - `Unknown`: placeholder while a fact is still being computed,
//! - `Independent`: not influenced by program input,
//! - `Dependent(S)`: influenced by the input sources in `S`.
//!
//! Ordered `Unknown < Independent < Dependent(S1) < Dependent(S1 ∪ S2)`.
//! [`DepInfo::merge`] is the join of that order.

use std::collections::BTreeSet;
use std::fmt;

/// Classification tag of a [`DepInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    Unknown,
    Independent,
    Dependent,
}

/// A dependency classification, with its input sources when dependent.
///
/// `sources` is empty unless the tag is [`Dependency::Dependent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DepInfo<V: Ord> {
    dependency: Dependency,
    sources: BTreeSet<V>,
}

impl<V: Ord + Clone> Default for DepInfo<V> {
    fn default() -> Self {
        Self::unknown()
    }
}

impl<V: Ord + Clone> DepInfo<V> {
    pub fn unknown() -> Self {
        Self { dependency: Dependency::Unknown, sources: BTreeSet::new() }
    }

    pub fn independent() -> Self {
        Self { dependency: Dependency::Independent, sources: BTreeSet::new() }
    }

    /// Dependent on a single input source.
    pub fn dependent(source: V) -> Self {
        Self { dependency: Dependency::Dependent, sources: BTreeSet::from([source]) }
    }

    /// Dependent on every source yielded by `sources`.
    ///
    /// An empty iterator still yields a dependent fact; the source set is
    /// only informational.
    pub fn dependent_on(sources: impl IntoIterator<Item = V>) -> Self {
        Self { dependency: Dependency::Dependent, sources: sources.into_iter().collect() }
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn is_unknown(&self) -> bool {
        self.dependency == Dependency::Unknown
    }

    pub fn is_independent(&self) -> bool {
        self.dependency == Dependency::Independent
    }

    pub fn is_dependent(&self) -> bool {
        self.dependency == Dependency::Dependent
    }

    pub fn sources(&self) -> &BTreeSet<V> {
        &self.sources
    }

    /// Join of two facts. Commutative and associative, `Unknown` is the
    /// identity.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    /// Join `other` into `self`, returning whether `self` changed.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        match (self.dependency, other.dependency) {
            (_, Dependency::Unknown) => false,
            (Dependency::Dependent, Dependency::Dependent) => {
                let before = self.sources.len();
                self.sources.extend(other.sources.iter().cloned());
                self.sources.len() != before
            }
            (Dependency::Dependent, Dependency::Independent) => false,
            (Dependency::Independent, Dependency::Independent) => false,
            (Dependency::Unknown | Dependency::Independent, _) => {
                self.dependency = other.dependency;
                self.sources = other.sources.clone();
                true
            }
        }
    }

    /// Merge an arbitrary number of facts; `Unknown` for none.
    pub fn merge_all<'a>(infos: impl IntoIterator<Item = &'a Self>) -> Self
    where
        V: 'a,
    {
        let mut merged = Self::unknown();
        for info in infos {
            merged.merge_from(info);
        }
        merged
    }

    /// Replace a leftover `Unknown` with `Independent`.
    pub fn finalize(&mut self) {
        if self.is_unknown() {
            self.dependency = Dependency::Independent;
        }
    }

    /// Lattice order: `self` is no more dependent than `other`.
    pub fn is_subsumed_by(&self, other: &Self) -> bool {
        match (self.dependency, other.dependency) {
            (Dependency::Unknown, _) => true,
            (Dependency::Independent, Dependency::Unknown) => false,
            (Dependency::Independent, _) => true,
            (Dependency::Dependent, Dependency::Dependent) => self.sources.is_subset(&other.sources),
            (Dependency::Dependent, _) => false,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Unknown => write!(f, "unknown"),
            Dependency::Independent => write!(f, "independent"),
            Dependency::Dependent => write!(f, "dependent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dep_info() -> impl Strategy<Value = DepInfo<u8>> {
        prop_oneof![
            Just(DepInfo::unknown()),
            Just(DepInfo::independent()),
            proptest::collection::btree_set(0u8..8, 0..4).prop_map(|s| DepInfo::dependent_on(s)),
        ]
    }

    #[test]
    fn test_unknown_is_identity() {
        let dep = DepInfo::dependent(3u8);
        assert_eq!(DepInfo::unknown().merge(&dep), dep);
        assert_eq!(dep.merge(&DepInfo::unknown()), dep);
        assert_eq!(
            DepInfo::<u8>::unknown().merge(&DepInfo::independent()),
            DepInfo::independent()
        );
    }

    #[test]
    fn test_dependent_absorbs() {
        let dep = DepInfo::dependent(1u8);
        assert_eq!(dep.merge(&DepInfo::independent()), dep);
        let both = dep.merge(&DepInfo::dependent(2));
        assert!(both.is_dependent());
        assert_eq!(both.sources().iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_merge_from_reports_change() {
        let mut info = DepInfo::<u8>::independent();
        assert!(!info.merge_from(&DepInfo::independent()));
        assert!(info.merge_from(&DepInfo::dependent(4)));
        assert!(!info.merge_from(&DepInfo::dependent(4)));
        assert!(info.merge_from(&DepInfo::dependent(5)));
        assert!(!info.merge_from(&DepInfo::independent()));
    }

    #[test]
    fn test_finalize_only_touches_unknown() {
        let mut info = DepInfo::<u8>::unknown();
        info.finalize();
        assert!(info.is_independent());
        let mut dep = DepInfo::dependent(1u8);
        dep.finalize();
        assert!(dep.is_dependent());
    }

    #[test]
    fn test_merge_all_empty_is_unknown() {
        let none: Vec<DepInfo<u8>> = Vec::new();
        assert!(DepInfo::merge_all(&none).is_unknown());
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in dep_info(), b in dep_info()) {
            prop_assert_eq!(a.merge(&b), b.merge(&a));
        }

        #[test]
        fn merge_is_associative(a in dep_info(), b in dep_info(), c in dep_info()) {
            prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        }

        #[test]
        fn merge_is_idempotent(a in dep_info()) {
            prop_assert_eq!(a.merge(&a), a);
        }

        #[test]
        fn merge_never_moves_down(a in dep_info(), b in dep_info()) {
            let joined = a.merge(&b);
            prop_assert!(a.is_subsumed_by(&joined));
            prop_assert!(b.is_subsumed_by(&joined));
        }
    }
}
