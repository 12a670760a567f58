// This module drives the analysis over a whole module. Procedures are analysed
// independently of each other, so the driver hands them to rayon's thread pool (or runs them
// in sequence when parallelism is disabled) over a shared, read-only adaptor. A failing
// procedure is recorded with its error and does not stop the others. For the
// interprocedural input scope the driver repeats the round: every callee parameter that
// receives an input-dependent argument at some call site becomes an input of the callee,
// and the affected procedures are analysed again until no new input is discovered. The call
// graph collected up front maps call sites to callees and callee positions to parameters.

//! Module-level driver.

use super::alias::AliasOracle;
use super::function_analysis::{FunctionAnalysis, FunctionAnalysisResult};
use crate::core::{AnalysisConfig, AnalysisError, AnalysisResult, InputScope, IrAdaptor};
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Static call graph of a module.
pub struct CallGraph<A: IrAdaptor> {
    callees: HashMap<A::FuncRef, BTreeSet<A::FuncRef>>,
    callers: HashMap<A::FuncRef, BTreeSet<A::FuncRef>>,
    params: HashMap<A::FuncRef, Vec<A::ValueRef>>,
}

impl<A: IrAdaptor> CallGraph<A> {
    pub fn build(adaptor: &A) -> Self {
        let mut graph = Self { callees: HashMap::new(), callers: HashMap::new(), params: HashMap::new() };
        for func in adaptor.funcs() {
            graph.params.insert(func, adaptor.func_args(func).collect());
            if adaptor.func_is_declaration(func) {
                continue;
            }
            for block in adaptor.func_blocks(func) {
                for inst in adaptor.block_insts(block) {
                    if let Some(callee) = adaptor.inst_callee(inst) {
                        graph.callees.entry(func).or_default().insert(callee);
                        graph.callers.entry(callee).or_default().insert(func);
                    }
                }
            }
        }
        graph
    }

    /// Functions called from `func`, sorted.
    pub fn callees(&self, func: A::FuncRef) -> impl Iterator<Item = A::FuncRef> + '_ {
        self.callees.get(&func).into_iter().flatten().copied()
    }

    /// Functions calling `func`, sorted.
    pub fn callers(&self, func: A::FuncRef) -> impl Iterator<Item = A::FuncRef> + '_ {
        self.callers.get(&func).into_iter().flatten().copied()
    }

    /// Parameter of `func` at `position`.
    pub fn param(&self, func: A::FuncRef, position: u32) -> Option<A::ValueRef> {
        self.params.get(&func)?.get(position as usize).copied()
    }
}

/// Per-procedure outcome of a module analysis.
pub struct ModuleAnalysisResult<A: IrAdaptor> {
    functions: BTreeMap<A::FuncRef, AnalysisResult<FunctionAnalysisResult<A>>>,
    rounds: usize,
}

impl<A: IrAdaptor> ModuleAnalysisResult<A> {
    pub fn function(&self, func: A::FuncRef) -> Option<&AnalysisResult<FunctionAnalysisResult<A>>> {
        self.functions.get(&func)
    }

    /// Successful results, sorted by function.
    pub fn results(&self) -> impl Iterator<Item = (A::FuncRef, &FunctionAnalysisResult<A>)> + '_ {
        self.functions.iter().filter_map(|(&f, r)| r.as_ref().ok().map(|r| (f, r)))
    }

    /// Failed procedures with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (A::FuncRef, &AnalysisError)> + '_ {
        self.functions.iter().filter_map(|(&f, r)| r.as_ref().err().map(|e| (f, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.functions.values().all(Result::is_ok)
    }

    /// Number of analysis rounds run (more than one only for the
    /// interprocedural scope).
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

pub struct ModuleAnalysis<'a, A: IrAdaptor> {
    adaptor: &'a A,
    oracle: &'a dyn AliasOracle<A::ValueRef>,
    config: &'a AnalysisConfig,
}

impl<'a, A: IrAdaptor> ModuleAnalysis<'a, A> {
    pub fn new(
        adaptor: &'a A,
        oracle: &'a dyn AliasOracle<A::ValueRef>,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self { adaptor, oracle, config }
    }

    pub fn run(&self) -> AnalysisResult<ModuleAnalysisResult<A>> {
        self.config.validate()?;
        let adaptor = self.adaptor;
        if adaptor.func_by_name(&self.config.entry_function).is_none() {
            return Err(AnalysisError::UnknownFunction { name: self.config.entry_function.clone() });
        }

        let funcs: Vec<_> = adaptor.funcs().filter(|&f| !adaptor.func_is_declaration(f)).collect();
        let call_graph = CallGraph::build(adaptor);
        let mut seeds: HashMap<A::FuncRef, HashSet<A::ValueRef>> = HashMap::new();
        let mut functions: BTreeMap<_, _> = BTreeMap::new();
        let mut todo = funcs.clone();
        let mut rounds = 0;

        loop {
            rounds += 1;
            log::debug!("analysis round {}: {} functions", rounds, todo.len());
            functions.extend(self.analyze_all(&todo, &seeds));

            if self.config.input_scope != InputScope::Interprocedural {
                break;
            }
            let discovered = discover_inputs(&call_graph, &functions, &mut seeds);
            if discovered.is_empty() {
                break;
            }
            todo = discovered.into_iter().collect();
        }

        for (func, result) in &functions {
            if let Err(err) = result {
                log::warn!("analysis of {} failed: {}", adaptor.func_link_name(*func), err);
            }
        }
        Ok(ModuleAnalysisResult { functions, rounds })
    }

    fn analyze_all(
        &self,
        funcs: &[A::FuncRef],
        seeds: &HashMap<A::FuncRef, HashSet<A::ValueRef>>,
    ) -> Vec<(A::FuncRef, AnalysisResult<FunctionAnalysisResult<A>>)> {
        let empty = HashSet::new();
        let analysis = FunctionAnalysis::new(self.adaptor, self.oracle, self.config);
        let run = |&func: &A::FuncRef| (func, analysis.run_with_inputs(func, seeds.get(&func).unwrap_or(&empty)));
        if self.config.parallel {
            funcs.par_iter().map(run).collect()
        } else {
            funcs.iter().map(run).collect()
        }
    }
}

/// Turn input-dependent call arguments into callee inputs. Returns the
/// callees whose input set grew.
fn discover_inputs<A: IrAdaptor>(
    call_graph: &CallGraph<A>,
    functions: &BTreeMap<A::FuncRef, AnalysisResult<FunctionAnalysisResult<A>>>,
    seeds: &mut HashMap<A::FuncRef, HashSet<A::ValueRef>>,
) -> BTreeSet<A::FuncRef> {
    let mut grown = BTreeSet::new();
    for result in functions.values().filter_map(|r| r.as_ref().ok()) {
        for (&(callee, position), info) in result.call_args() {
            if !info.is_dependent() || !functions.contains_key(&callee) {
                continue;
            }
            let Some(param) = call_graph.param(callee, position) else {
                continue;
            };
            let already = functions
                .get(&callee)
                .and_then(|r| r.as_ref().ok())
                .is_some_and(|r| r.inputs().contains(&param));
            if !already && seeds.entry(callee).or_default().insert(param) {
                grown.insert(callee);
            }
        }
    }
    grown
}
