//! Non-deterministic branch detection.
//!
//! A block is non-deterministic when whether it executes depends on program
//! input: it is the target of a conditional branch whose condition is input
//! dependent, or it merges values through an input-dependent phi.

use super::function_analysis::FunctionAnalysisResult;
use crate::core::{InstKind, IrAdaptor};
use hashbrown::HashSet;

pub struct NonDeterministicBlocks<A: IrAdaptor> {
    blocks: HashSet<A::BlockRef>,
    ordered: Vec<A::BlockRef>,
}

impl<A: IrAdaptor> NonDeterministicBlocks<A> {
    pub fn analyze(adaptor: &A, result: &FunctionAnalysisResult<A>) -> Self {
        let mut blocks = HashSet::new();
        for &block in result.order() {
            for inst in adaptor.block_insts(block) {
                match adaptor.inst_kind(inst) {
                    InstKind::CondBranch if result.is_input_dependent(inst) => {
                        blocks.extend(adaptor.block_succs(block));
                    }
                    InstKind::Phi if result.is_input_dependent(inst) => {
                        blocks.insert(block);
                    }
                    _ => {}
                }
            }
        }
        // Report in reverse post-order.
        let ordered = result.order().iter().copied().filter(|b| blocks.contains(b)).collect();
        Self { blocks, ordered }
    }

    pub fn is_non_deterministic(&self, block: A::BlockRef) -> bool {
        self.blocks.contains(&block)
    }

    /// Non-deterministic blocks in reverse post-order.
    pub fn blocks(&self) -> &[A::BlockRef] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
