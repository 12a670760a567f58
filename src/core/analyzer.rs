// This module implements the CFG analyzer that computes the block visiting structure the
// input-dependency driver needs for one function. It performs three analyses: 1) a
// reverse post-order (RPO) over the blocks reachable from the entry, computed with an
// iterative depth-first search, 2) predecessor lists restricted to reachable blocks, and
// 3) the strongly connected components of the reachable CFG in topological order, each
// flagged cyclic when it forms a loop (more than one block, or a self-loop). The driver
// visits components in that order so every acyclic block sees all predecessors before it
// is analysed and every loop nest is iterated to a fixpoint as a unit. SCCs come from
// petgraph's Tarjan implementation over a graph built from the adaptor's successor lists.

use super::adaptor::IrAdaptor;
use core::marker::PhantomData;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A strongly connected component of the CFG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component<B> {
    /// Member blocks sorted by RPO index.
    pub blocks: Vec<B>,
    /// Whether the component contains a cycle.
    pub cyclic: bool,
}

/// Computes block order, predecessors and SCCs for a function.
///
/// The analyzer walks the IR provided by [`IrAdaptor`] from the entry block.
/// Blocks that cannot be reached from the entry are left out of every result.
pub struct CfgAnalyzer<A: IrAdaptor> {
    order: Vec<A::BlockRef>,
    block_map: HashMap<A::BlockRef, usize>,
    preds: Vec<Vec<A::BlockRef>>,
    succs: Vec<Vec<A::BlockRef>>,
    components: Vec<Component<A::BlockRef>>,
    _marker: PhantomData<A>,
}

impl<A: IrAdaptor> Default for CfgAnalyzer<A> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            block_map: HashMap::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            components: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<A: IrAdaptor> CfgAnalyzer<A> {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence of reachable blocks in reverse post order.
    pub fn order(&self) -> &[A::BlockRef] {
        &self.order
    }

    /// Position of a block in [`order`](Self::order), `None` if unreachable.
    pub fn rpo_index(&self, block: A::BlockRef) -> Option<usize> {
        self.block_map.get(&block).copied()
    }

    pub fn is_reachable(&self, block: A::BlockRef) -> bool {
        self.block_map.contains_key(&block)
    }

    /// Reachable predecessors of a block, in RPO order.
    pub fn preds(&self, block: A::BlockRef) -> &[A::BlockRef] {
        match self.rpo_index(block) {
            Some(idx) => &self.preds[idx],
            None => &[],
        }
    }

    /// Distinct successors of a block.
    pub fn succs(&self, block: A::BlockRef) -> &[A::BlockRef] {
        match self.rpo_index(block) {
            Some(idx) => &self.succs[idx],
            None => &[],
        }
    }

    /// Strongly connected components in topological order.
    pub fn components(&self) -> &[Component<A::BlockRef>] {
        &self.components
    }

    /// An edge is a back edge when it does not go forward in RPO.
    pub fn is_back_edge(&self, from: A::BlockRef, to: A::BlockRef) -> bool {
        match (self.rpo_index(from), self.rpo_index(to)) {
            (Some(f), Some(t)) => t <= f,
            _ => false,
        }
    }

    /// Build order, predecessors and components for the given function.
    ///
    /// Returns `false` when the function has no body.
    pub fn switch_func(&mut self, adaptor: &A, func: A::FuncRef) -> bool {
        self.order.clear();
        self.block_map.clear();
        self.preds.clear();
        self.succs.clear();
        self.components.clear();

        let Some(entry) = adaptor.entry_block(func) else {
            return false;
        };

        // -------- build RPO order ---------
        let mut post = Vec::new();
        let mut stack = vec![(entry, false)];
        let mut visited = HashSet::new();
        while let Some((block, processed)) = stack.pop() {
            if processed {
                post.push(block);
                continue;
            }
            if !visited.insert(block) {
                continue;
            }
            stack.push((block, true));
            let succs: Vec<_> = adaptor.block_succs(block).collect();
            for succ in succs.into_iter().rev() {
                if !visited.contains(&succ) {
                    stack.push((succ, false));
                }
            }
        }
        post.reverse();
        self.order = post;
        for (idx, b) in self.order.iter().enumerate() {
            self.block_map.insert(*b, idx);
        }

        // -------- edges ---------
        // Visiting sources in RPO keeps every predecessor list in RPO order.
        self.preds = vec![Vec::new(); self.order.len()];
        self.succs = vec![Vec::new(); self.order.len()];
        for idx in 0..self.order.len() {
            let block = self.order[idx];
            let mut seen = HashSet::new();
            for succ in adaptor.block_succs(block) {
                if !seen.insert(succ) {
                    continue;
                }
                self.succs[idx].push(succ);
                if let Some(&succ_idx) = self.block_map.get(&succ) {
                    self.preds[succ_idx].push(block);
                }
            }
        }
        // -------- strongly connected components ---------
        let mut graph = DiGraph::<A::BlockRef, ()>::with_capacity(self.order.len(), 0);
        let nodes: Vec<NodeIndex> = self.order.iter().map(|&b| graph.add_node(b)).collect();
        for (idx, succs) in self.succs.iter().enumerate() {
            for succ in succs {
                graph.add_edge(nodes[idx], nodes[self.block_map[succ]], ());
            }
        }

        // tarjan_scc yields components in reverse topological order.
        let mut sccs = tarjan_scc(&graph);
        sccs.reverse();
        for scc in sccs {
            let mut blocks: Vec<_> = scc.into_iter().map(|n| graph[n]).collect();
            blocks.sort_by_key(|b| self.block_map[b]);
            let cyclic = blocks.len() > 1 || self.succs(blocks[0]).contains(&blocks[0]);
            self.components.push(Component { blocks, cyclic });
        }

        log::debug!(
            "CFG of {}: {} reachable blocks, {} components",
            adaptor.func_link_name(func),
            self.order.len(),
            self.components.len()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_ir::{TestIR, TestIRAdaptor};

    fn names<'a>(adaptor: &'a TestIRAdaptor<'_>, blocks: &[crate::test_ir::adaptor::BlockRef]) -> Vec<&'a str> {
        blocks.iter().map(|&b| adaptor.block_name(b)).collect()
    }

    #[test]
    fn test_rpo_and_preds() {
        let ir = TestIR::parse(
            r#"
f(%x) {
entry:
  condbr %x, ^l, ^r
l:
  br ^join
r:
  br ^join
join:
  ret
dead:
  br ^join
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let f = adaptor.func("f").unwrap();
        let mut cfg = CfgAnalyzer::new();
        assert!(cfg.switch_func(&adaptor, f));

        assert_eq!(names(&adaptor, cfg.order()), vec!["entry", "r", "l", "join"]);
        let join = adaptor.block(f, "join").unwrap();
        // The unreachable block is not a predecessor.
        assert_eq!(names(&adaptor, cfg.preds(join)), vec!["r", "l"]);
        let dead = adaptor.block(f, "dead").unwrap();
        assert!(!cfg.is_reachable(dead));
        assert!(cfg.components().iter().all(|c| !c.cyclic));
        assert_eq!(cfg.components().len(), 4);
    }

    #[test]
    fn test_loop_components() {
        let ir = TestIR::parse(
            r#"
f(%x) {
entry:
  br ^header
header:
  condbr %x, ^body, ^exit
body:
  br ^header
exit:
  condbr %x, ^exit, ^done
done:
  ret
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let f = adaptor.func("f").unwrap();
        let mut cfg = CfgAnalyzer::new();
        cfg.switch_func(&adaptor, f);

        let components: Vec<_> = cfg.components().iter().map(|c| (names(&adaptor, &c.blocks), c.cyclic)).collect();
        assert_eq!(
            components,
            vec![
                (vec!["entry"], false),
                (vec!["header", "body"], true),
                (vec!["exit"], true),
                (vec!["done"], false),
            ]
        );
        let header = adaptor.block(f, "header").unwrap();
        let body = adaptor.block(f, "body").unwrap();
        assert!(cfg.is_back_edge(body, header));
        assert!(!cfg.is_back_edge(header, body));
    }

    #[test]
    fn test_declaration_has_no_cfg() {
        let ir = TestIR::parse("ext(%a)!").unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let mut cfg = CfgAnalyzer::new();
        assert!(!cfg.switch_func(&adaptor, adaptor.func("ext").unwrap()));
        assert!(cfg.order().is_empty());
    }
}
