// This module drives the input-dependency analysis over one procedure. It orders the
// reachable blocks with the CFG analyzer, then visits the strongly connected components of
// the CFG in topological order. Every block is first analysed against the exit facts of one
// predecessor that has already been analysed (the procedure's initial facts for the entry
// block). A block outside any loop with several predecessors is then reflected once against
// the merged exit facts of all of them; all its predecessors precede it in topological order,
// so that single reflection is exact. The blocks of a loop are reflected repeatedly with a
// worklist until no exit fact changes, bounded by the configured number of rounds. Finally
// every block is finalised and the per-block results are folded into a FunctionAnalysisResult
// that answers the queries clients care about: the fact of an instruction, the fact of a
// value at a block's exit, and the procedure-level effects (out-arguments, callee arguments
// and the return value).

//! Procedure-level driver.

use super::alias::AliasOracle;
use super::block_analyzer::{BasicBlockAnalysisResult, DepInfoOf, ValueDependencies};
use super::context::AnalysisContext;
use super::dep_info::DepInfo;
use super::reflecting::ReflectingBlockAnalyzer;
use crate::core::{
    AnalysisConfig, AnalysisError, AnalysisResult, CfgAnalyzer, InputScope, IrAdaptor,
};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeMap, BTreeSet};

/// Dependency facts of one procedure.
pub struct FunctionAnalysisResult<A: IrAdaptor> {
    func: A::FuncRef,
    order: Vec<A::BlockRef>,
    blocks: HashMap<A::BlockRef, BasicBlockAnalysisResult<A>>,
    instructions: HashMap<A::InstRef, DepInfoOf<A>>,
    inputs: BTreeSet<A::ValueRef>,
    out_args: BTreeMap<A::ValueRef, DepInfoOf<A>>,
    call_args: BTreeMap<(A::FuncRef, u32), DepInfoOf<A>>,
    return_dep: Option<DepInfoOf<A>>,
}

impl<A: IrAdaptor> FunctionAnalysisResult<A> {
    pub fn func(&self) -> A::FuncRef {
        self.func
    }

    /// Reachable blocks in reverse post-order.
    pub fn order(&self) -> &[A::BlockRef] {
        &self.order
    }

    pub fn block_result(&self, block: A::BlockRef) -> Option<&BasicBlockAnalysisResult<A>> {
        self.blocks.get(&block)
    }

    /// Fact of an instruction; `None` for instructions in unreachable blocks.
    pub fn instruction_dep(&self, inst: A::InstRef) -> Option<&DepInfoOf<A>> {
        self.instructions.get(&inst)
    }

    pub fn is_input_dependent(&self, inst: A::InstRef) -> bool {
        self.instructions.get(&inst).is_some_and(DepInfo::is_dependent)
    }

    /// All input-dependent instructions, sorted.
    pub fn dependent_instructions(&self) -> Vec<A::InstRef> {
        let mut insts: Vec<_> = self
            .instructions
            .iter()
            .filter(|(_, info)| info.is_dependent())
            .map(|(&inst, _)| inst)
            .collect();
        insts.sort();
        insts
    }

    /// Fact of `value` on exit from `block`.
    pub fn value_dep_at_exit(&self, block: A::BlockRef, value: A::ValueRef) -> Option<&DepInfoOf<A>> {
        self.blocks.get(&block).and_then(|b| b.value_dep(value))
    }

    /// Values treated as input on entry to the procedure.
    pub fn inputs(&self) -> &BTreeSet<A::ValueRef> {
        &self.inputs
    }

    /// What the procedure writes through each pointer parameter.
    pub fn out_args(&self) -> &BTreeMap<A::ValueRef, DepInfoOf<A>> {
        &self.out_args
    }

    pub fn out_arg_dep(&self, arg: A::ValueRef) -> Option<&DepInfoOf<A>> {
        self.out_args.get(&arg)
    }

    /// Facts passed at each `(callee, position)` over all call sites.
    pub fn call_args(&self) -> &BTreeMap<(A::FuncRef, u32), DepInfoOf<A>> {
        &self.call_args
    }

    pub fn call_arg_dep(&self, callee: A::FuncRef, position: u32) -> Option<&DepInfoOf<A>> {
        self.call_args.get(&(callee, position))
    }

    /// Join of every returned fact, `None` if nothing is returned.
    pub fn return_dep(&self) -> Option<&DepInfoOf<A>> {
        self.return_dep.as_ref()
    }
}

/// Runs the block analysers of a procedure to a fixpoint.
pub struct FunctionAnalysis<'a, A: IrAdaptor> {
    adaptor: &'a A,
    oracle: &'a dyn AliasOracle<A::ValueRef>,
    config: &'a AnalysisConfig,
}

impl<'a, A: IrAdaptor> FunctionAnalysis<'a, A> {
    pub fn new(
        adaptor: &'a A,
        oracle: &'a dyn AliasOracle<A::ValueRef>,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self { adaptor, oracle, config }
    }

    /// Build the analysis context of `func` from the configuration, plus
    /// `extra_inputs` seeded by the caller.
    pub fn context(&self, func: A::FuncRef, extra_inputs: &HashSet<A::ValueRef>) -> AnalysisContext<A> {
        let adaptor = self.adaptor;
        let is_entry = adaptor.func_link_name(func) == self.config.entry_function;
        let mut ctx = AnalysisContext::new(adaptor, func)
            .with_input_functions(
                adaptor.funcs().filter(|&f| self.config.is_input_function(adaptor.func_link_name(f))),
            )
            .with_input_globals(
                adaptor.globals().filter(|&g| self.config.is_input_global(adaptor.value_name(g))),
            )
            .with_inputs(extra_inputs.iter().copied());
        if is_entry || self.config.input_scope == InputScope::AllArguments {
            for arg in adaptor.func_args(func) {
                ctx.mark_input(arg);
            }
        }
        ctx
    }

    pub fn run(&self, func: A::FuncRef) -> AnalysisResult<FunctionAnalysisResult<A>> {
        self.run_with_inputs(func, &HashSet::new())
    }

    pub fn run_with_inputs(
        &self,
        func: A::FuncRef,
        extra_inputs: &HashSet<A::ValueRef>,
    ) -> AnalysisResult<FunctionAnalysisResult<A>> {
        let ctx = self.context(func, extra_inputs);
        self.run_in_context(&ctx)
    }

    pub fn run_in_context(&self, ctx: &AnalysisContext<A>) -> AnalysisResult<FunctionAnalysisResult<A>> {
        let adaptor = self.adaptor;
        let func = ctx.func();
        let name = adaptor.func_link_name(func);
        log::debug!("analysing function {}", name);

        let mut cfg = CfgAnalyzer::new();
        if !cfg.switch_func(adaptor, func) {
            return Err(AnalysisError::MissingEntry { function: name.to_string() });
        }

        let initial = ctx.initial_dependencies(adaptor);
        let mut analyzers: HashMap<A::BlockRef, ReflectingBlockAnalyzer<'_, A>> = HashMap::new();

        for component in cfg.components() {
            for &block in &component.blocks {
                let entry = cfg
                    .preds(block)
                    .iter()
                    .find_map(|pred| analyzers.get(pred))
                    .map(|pred| pred.result().values().clone())
                    .unwrap_or_else(|| initial.clone());
                let mut analyzer = ReflectingBlockAnalyzer::new(adaptor, self.oracle, ctx, block, entry);
                analyzer.analyze()?;
                analyzers.insert(block, analyzer);
            }

            if component.cyclic {
                self.settle_loop(name, &cfg, &component.blocks, &mut analyzers, &initial)?;
            } else if cfg.preds(component.blocks[0]).len() > 1 {
                let block = component.blocks[0];
                let pred_exits = exit_facts(&cfg, block, &analyzers);
                let preds: Vec<_> = pred_exits.iter().collect();
                if let Some(analyzer) = analyzers.get_mut(&block) {
                    analyzer.reflect_merged(&preds, &initial, true);
                }
            }
            for block in &component.blocks {
                if let Some(analyzer) = analyzers.get_mut(block) {
                    analyzer.reflect(&initial);
                }
            }
        }

        Ok(self.collect(ctx, cfg.order().to_vec(), analyzers))
    }

    /// Reflect the blocks of one loop nest until their exit facts stop changing.
    fn settle_loop(
        &self,
        name: &str,
        cfg: &CfgAnalyzer<A>,
        blocks: &[A::BlockRef],
        analyzers: &mut HashMap<A::BlockRef, ReflectingBlockAnalyzer<'_, A>>,
        initial: &ValueDependencies<A::ValueRef>,
    ) -> AnalysisResult<()> {
        let members: HashSet<_> = blocks.iter().copied().collect();
        let mut pending: BTreeSet<usize> = blocks.iter().filter_map(|&b| cfg.rpo_index(b)).collect();
        let limit = self.config.max_fixpoint_rounds.saturating_mul(blocks.len());
        let mut steps = 0usize;

        while let Some(idx) = pending.pop_first() {
            steps += 1;
            if steps > limit {
                return Err(AnalysisError::FixpointDiverged {
                    function: name.to_string(),
                    rounds: self.config.max_fixpoint_rounds,
                });
            }
            let block = cfg.order()[idx];
            let pred_exits = exit_facts(cfg, block, analyzers);
            let preds: Vec<_> = pred_exits.iter().collect();
            let Some(analyzer) = analyzers.get_mut(&block) else {
                continue;
            };
            let outcome = analyzer.reflect_merged(&preds, initial, false);
            if outcome.exit_changed() {
                for &succ in cfg.succs(block) {
                    if members.contains(&succ) {
                        pending.extend(cfg.rpo_index(succ));
                    }
                }
            }
        }
        log::debug!("loop nest of {} blocks in {} settled after {} reflections", blocks.len(), name, steps);
        Ok(())
    }

    fn collect(
        &self,
        ctx: &AnalysisContext<A>,
        order: Vec<A::BlockRef>,
        analyzers: HashMap<A::BlockRef, ReflectingBlockAnalyzer<'_, A>>,
    ) -> FunctionAnalysisResult<A> {
        let mut result = FunctionAnalysisResult {
            func: ctx.func(),
            order,
            blocks: HashMap::new(),
            instructions: HashMap::new(),
            inputs: ctx.inputs().collect(),
            out_args: BTreeMap::new(),
            call_args: BTreeMap::new(),
            return_dep: None,
        };
        for (block, analyzer) in analyzers {
            let block_result = analyzer.into_result();
            for (inst, info) in block_result.instructions() {
                result.instructions.insert(inst, info.clone());
            }
            for (&arg, info) in block_result.out_args() {
                result.out_args.entry(arg).or_insert_with(DepInfo::unknown).merge_from(info);
            }
            for (&site, info) in block_result.call_args() {
                result.call_args.entry(site).or_insert_with(DepInfo::unknown).merge_from(info);
            }
            if let Some(info) = block_result.return_dep() {
                result.return_dep.get_or_insert_with(DepInfo::unknown).merge_from(info);
            }
            result.blocks.insert(block, block_result);
        }
        for info in result
            .out_args
            .values_mut()
            .chain(result.call_args.values_mut())
            .chain(result.return_dep.iter_mut())
        {
            info.finalize();
        }
        result
    }
}

/// Exit facts of the already analysed predecessors of `block`.
fn exit_facts<A: IrAdaptor>(
    cfg: &CfgAnalyzer<A>,
    block: A::BlockRef,
    analyzers: &HashMap<A::BlockRef, ReflectingBlockAnalyzer<'_, A>>,
) -> Vec<ValueDependencies<A::ValueRef>> {
    cfg.preds(block)
        .iter()
        .filter_map(|pred| analyzers.get(pred))
        .map(|pred| pred.result().values().clone())
        .collect()
}
