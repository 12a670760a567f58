//! Alias oracle interface.
//!
//! The analysis asks the oracle only when a pointer's storage cannot be
//! resolved syntactically. The oracle is an external collaborator; what
//! lives here is the trait, two trivial oracles, and the rule that a failed
//! query counts as "may alias".

use crate::core::AliasError;
use core::fmt::Debug;

/// Answers "may `a` and `b` refer to the same storage?".
pub trait AliasOracle<V>: Sync {
    fn may_alias(&self, a: V, b: V) -> Result<bool, AliasError>;
}

/// Only a value aliases itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliasOracle;

impl<V: PartialEq> AliasOracle<V> for NoAliasOracle {
    fn may_alias(&self, a: V, b: V) -> Result<bool, AliasError> {
        Ok(a == b)
    }
}

/// Everything may alias everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeAliasOracle;

impl<V> AliasOracle<V> for ConservativeAliasOracle {
    fn may_alias(&self, _a: V, _b: V) -> Result<bool, AliasError> {
        Ok(true)
    }
}

/// Ask the oracle, treating a failed query as "may alias".
pub fn may_alias<V, O>(oracle: &O, a: V, b: V) -> bool
where
    V: Copy + Debug,
    O: AliasOracle<V> + ?Sized,
{
    match oracle.may_alias(a, b) {
        Ok(answer) => answer,
        Err(err) => {
            log::warn!("alias query {:?} / {:?} failed ({}), assuming may-alias", a, b, err);
            true
        }
    }
}
