//! Cut vertices of the CFG.
//!
//! A block is a cut vertex when removing it disconnects the (undirected)
//! CFG of the reachable blocks. Together with the entry block and every
//! returning block these are the points every execution passes through in a
//! fixed order, which makes them natural checkpoints for input-dependence
//! reports.

use crate::core::{CfgAnalyzer, InstKind, IrAdaptor};

/// Articulation points of the reachable CFG plus the entry and return
/// blocks, in reverse post-order.
pub fn cut_vertices<A: IrAdaptor>(adaptor: &A, cfg: &CfgAnalyzer<A>) -> Vec<A::BlockRef> {
    let order = cfg.order();
    let n = order.len();
    if n == 0 {
        return Vec::new();
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (idx, &block) in order.iter().enumerate() {
        for &succ in cfg.succs(block) {
            let Some(succ_idx) = cfg.rpo_index(succ) else {
                continue;
            };
            if succ_idx != idx {
                adj[idx].push(succ_idx);
                adj[succ_idx].push(idx);
            }
        }
    }
    for edges in &mut adj {
        edges.sort_unstable();
        edges.dedup();
    }

    let mut is_cut = articulation_points(&adj);
    is_cut[0] = true;
    for (idx, &block) in order.iter().enumerate() {
        let returns = adaptor
            .block_insts(block)
            .any(|inst| adaptor.inst_kind(inst) == InstKind::Return);
        if returns {
            is_cut[idx] = true;
        }
    }

    order.iter().zip(is_cut).filter(|(_, cut)| *cut).map(|(&b, _)| b).collect()
}

/// Tarjan's low-link articulation points of a connected undirected graph,
/// rooted at node 0. Iterative to keep deep CFGs off the call stack.
fn articulation_points(adj: &[Vec<usize>]) -> Vec<bool> {
    const UNVISITED: usize = usize::MAX;
    let n = adj.len();
    let mut disc = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut parent = vec![UNVISITED; n];
    let mut is_cut = vec![false; n];
    let mut root_children = 0;
    let mut timer = 1;

    disc[0] = 0;
    let mut stack = vec![(0usize, 0usize)];
    while let Some(top) = stack.last_mut() {
        let u = top.0;
        if top.1 < adj[u].len() {
            let v = adj[u][top.1];
            top.1 += 1;
            if disc[v] == UNVISITED {
                parent[v] = u;
                disc[v] = timer;
                low[v] = timer;
                timer += 1;
                if u == 0 {
                    root_children += 1;
                }
                stack.push((v, 0));
            } else if v != parent[u] {
                low[u] = low[u].min(disc[v]);
            }
        } else {
            stack.pop();
            if let Some(&(p, _)) = stack.last() {
                low[p] = low[p].min(low[u]);
                if p != 0 && low[u] >= disc[p] {
                    is_cut[p] = true;
                }
            }
        }
    }
    if root_children > 1 {
        is_cut[0] = true;
    }
    is_cut
}
