//! A syntactic alias oracle for TestIR.
//!
//! Pointers are traced through `gep` bases to a root. Two pointers may alias
//! when they share a root, or when either root is opaque (a loaded pointer,
//! a call result, a phi). Distinct allocas, globals and parameters never
//! alias each other; TIR parameters behave as if they were `noalias`.

use super::adaptor::{TestIRAdaptor, ValueRef};
use super::{Operation, ValueType};
use crate::analysis::AliasOracle;
use crate::core::AliasError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Named(ValueRef),
    Opaque,
}

#[derive(Debug, Clone, Copy)]
pub struct SyntacticAliasOracle<'ir> {
    adaptor: TestIRAdaptor<'ir>,
}

impl<'ir> SyntacticAliasOracle<'ir> {
    pub fn new(adaptor: TestIRAdaptor<'ir>) -> Self {
        Self { adaptor }
    }

    fn root(&self, val: ValueRef) -> Result<Root, AliasError> {
        let ir = self.adaptor.ir();
        let mut current = val;
        // Each step moves to an earlier gep operand, so the chain is bounded.
        for _ in 0..=ir.values.len() {
            let info = ir.values.get(current.0 as usize).ok_or_else(|| AliasError::QueryFailed {
                reason: format!("unknown value {:?}", current),
            })?;
            match (info.value_type, info.op) {
                (ValueType::Arg | ValueType::Global, _) => return Ok(Root::Named(current)),
                (ValueType::Phi, _) => return Ok(Root::Opaque),
                (_, Operation::Alloca) => return Ok(Root::Named(current)),
                (_, Operation::Gep) if info.op_count > 0 => {
                    current = ValueRef(ir.value_operands[info.op_begin_idx as usize]);
                }
                _ => return Ok(Root::Opaque),
            }
        }
        Err(AliasError::QueryFailed { reason: format!("cyclic address chain at {:?}", val) })
    }
}

impl AliasOracle<ValueRef> for SyntacticAliasOracle<'_> {
    fn may_alias(&self, a: ValueRef, b: ValueRef) -> Result<bool, AliasError> {
        if a == b {
            return Ok(true);
        }
        Ok(match (self.root(a)?, self.root(b)?) {
            (Root::Named(x), Root::Named(y)) => x == y,
            _ => true,
        })
    }
}
