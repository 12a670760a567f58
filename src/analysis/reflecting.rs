// This module implements the reflecting variant of the basic block analyser. The first pass
// over a block may run before every predecessor has been analysed (loop headers, join points
// reached first along one edge), so some live-in facts are provisional. Instead of re-running
// the block when a predecessor's facts improve, the analyser keeps a reverse-dependency index
// built during that first pass: for each source value, which instructions, slot exit states,
// out-arguments, callee argument positions and return value were derived from it. Reflection
// merges the exit facts of all predecessors, compares them with the live-in facts the block
// was analysed against, and for every value whose fact changed walks the index, joining the
// corrected fact into each dependent and cascading through instructions whose own fact
// changed as a result. Facts only ever move up the lattice, so reflecting the same input
// twice is a no-op. Once the procedure's facts are stable the index is released.

//! Reflecting basic block analysis.

use super::alias::AliasOracle;
use super::block_analyzer::{
    BasicBlockAnalysisResult, BasicBlockAnalyzer, DepInfoOf, Dependent, DependencySink,
    DependentOf, ValueDependencies,
};
use super::context::AnalysisContext;
use super::dep_info::DepInfo;
use crate::core::{AnalysisResult, InstKind, IrAdaptor};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeSet, VecDeque};
use std::hash::Hash;

/// Reverse-dependency index: source value to everything derived from it.
pub struct ReverseIndex<A: IrAdaptor> {
    values: HashMap<A::ValueRef, HashSet<A::ValueRef>>,
    instructions: HashMap<A::ValueRef, HashSet<A::InstRef>>,
    out_args: HashMap<A::ValueRef, HashSet<A::ValueRef>>,
    call_args: HashMap<A::ValueRef, HashSet<(A::FuncRef, u32)>>,
    returns: HashSet<A::ValueRef>,
}

impl<A: IrAdaptor> Default for ReverseIndex<A> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            instructions: HashMap::new(),
            out_args: HashMap::new(),
            call_args: HashMap::new(),
            returns: HashSet::new(),
        }
    }
}

impl<A: IrAdaptor> ReverseIndex<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything derived from `source`, in a stable order.
    pub fn dependents_of(&self, source: A::ValueRef) -> Vec<DependentOf<A>> {
        let mut dependents = Vec::new();
        if let Some(slots) = self.values.get(&source) {
            dependents.extend(slots.iter().map(|&slot| Dependent::Value(slot)));
        }
        if let Some(insts) = self.instructions.get(&source) {
            dependents.extend(insts.iter().map(|&inst| Dependent::Instruction(inst)));
        }
        if let Some(args) = self.out_args.get(&source) {
            dependents.extend(args.iter().map(|&arg| Dependent::OutArgument(arg)));
        }
        if let Some(sites) = self.call_args.get(&source) {
            dependents.extend(
                sites
                    .iter()
                    .map(|&(callee, position)| Dependent::CallArgument { callee, position }),
            );
        }
        if self.returns.contains(&source) {
            dependents.push(Dependent::ReturnValue);
        }
        dependents.sort();
        dependents
    }

    pub fn contains(&self, source: A::ValueRef) -> bool {
        self.values.contains_key(&source)
            || self.instructions.contains_key(&source)
            || self.out_args.contains_key(&source)
            || self.call_args.contains_key(&source)
            || self.returns.contains(&source)
    }

    /// Drop every entry keyed by `source`.
    pub fn erase(&mut self, source: A::ValueRef) {
        self.values.remove(&source);
        self.instructions.remove(&source);
        self.out_args.remove(&source);
        self.call_args.remove(&source);
        self.returns.remove(&source);
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.instructions.clear();
        self.out_args.clear();
        self.call_args.clear();
        self.returns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.instructions.is_empty()
            && self.out_args.is_empty()
            && self.call_args.is_empty()
            && self.returns.is_empty()
    }
}

impl<A: IrAdaptor> DependencySink<A> for ReverseIndex<A> {
    fn record(&mut self, source: A::ValueRef, dependent: DependentOf<A>) {
        match dependent {
            Dependent::Value(slot) => {
                self.values.entry(source).or_default().insert(slot);
            }
            Dependent::Instruction(inst) => {
                self.instructions.entry(source).or_default().insert(inst);
            }
            Dependent::OutArgument(arg) => {
                self.out_args.entry(source).or_default().insert(arg);
            }
            Dependent::CallArgument { callee, position } => {
                self.call_args.entry(source).or_default().insert((callee, position));
            }
            Dependent::ReturnValue => {
                self.returns.insert(source);
            }
        }
    }

    fn forget(&mut self, source: A::ValueRef, dependent: DependentOf<A>) {
        match dependent {
            Dependent::Value(slot) => remove_dependent(&mut self.values, source, &slot),
            Dependent::Instruction(inst) => remove_dependent(&mut self.instructions, source, &inst),
            Dependent::OutArgument(arg) => remove_dependent(&mut self.out_args, source, &arg),
            Dependent::CallArgument { callee, position } => {
                remove_dependent(&mut self.call_args, source, &(callee, position))
            }
            Dependent::ReturnValue => {
                self.returns.remove(&source);
            }
        }
    }
}

/// Remove one dependent of `source`, dropping the key once nothing is left.
fn remove_dependent<K, T>(map: &mut HashMap<K, HashSet<T>>, source: K, dependent: &T)
where
    K: Eq + Hash,
    T: Eq + Hash,
{
    if let Some(set) = map.get_mut(&source) {
        set.remove(dependent);
        if set.is_empty() {
            map.remove(&source);
        }
    }
}

/// What a reflection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectOutcome<V> {
    /// Values whose exit fact moved up.
    pub changed_values: BTreeSet<V>,
    /// Number of instruction facts that moved up.
    pub changed_instructions: usize,
    /// Out-argument, call-argument or return facts moved up.
    pub changed_effects: bool,
}

impl<V> Default for ReflectOutcome<V> {
    fn default() -> Self {
        Self { changed_values: BTreeSet::new(), changed_instructions: 0, changed_effects: false }
    }
}

impl<V> ReflectOutcome<V> {
    pub fn is_unchanged(&self) -> bool {
        self.changed_values.is_empty() && self.changed_instructions == 0 && !self.changed_effects
    }

    /// Whether successors of the block may need to reflect again.
    pub fn exit_changed(&self) -> bool {
        !self.changed_values.is_empty()
    }
}

/// A [`BasicBlockAnalyzer`] that keeps its reverse-dependency index so the
/// block can be corrected when predecessor facts improve.
pub struct ReflectingBlockAnalyzer<'a, A: IrAdaptor> {
    inner: BasicBlockAnalyzer<'a, A, ReverseIndex<A>>,
    is_reflected: bool,
}

impl<'a, A: IrAdaptor> ReflectingBlockAnalyzer<'a, A> {
    pub fn new(
        adaptor: &'a A,
        oracle: &'a dyn AliasOracle<A::ValueRef>,
        ctx: &'a AnalysisContext<A>,
        block: A::BlockRef,
        entry: ValueDependencies<A::ValueRef>,
    ) -> Self {
        Self {
            inner: BasicBlockAnalyzer::with_sink(adaptor, oracle, ctx, block, entry, ReverseIndex::new()),
            is_reflected: false,
        }
    }

    pub fn block(&self) -> A::BlockRef {
        self.inner.block()
    }

    pub fn analyze(&mut self) -> AnalysisResult<()> {
        self.inner.analyze()
    }

    pub fn result(&self) -> &BasicBlockAnalysisResult<A> {
        self.inner.result()
    }

    pub fn into_result(self) -> BasicBlockAnalysisResult<A> {
        self.inner.into_result()
    }

    /// Live-in facts the block currently reflects.
    pub fn entry(&self) -> &ValueDependencies<A::ValueRef> {
        self.inner.entry()
    }

    pub fn index(&self) -> &ReverseIndex<A> {
        self.inner.sink()
    }

    /// Whether the block's facts are final.
    pub fn is_reflected(&self) -> bool {
        self.is_reflected
    }

    /// Finalise the block: fill in procedure-level facts the block never saw,
    /// resolve leftover `Unknown`s and release the index.
    pub fn reflect(&mut self, initial: &ValueDependencies<A::ValueRef>) {
        let values = &mut self.inner.result.values;
        for (&value, info) in initial {
            values.entry(value).or_insert_with(|| info.clone());
        }
        for info in values.values_mut() {
            info.finalize();
        }
        self.inner.sink.clear();
        self.is_reflected = true;
    }

    /// Reflect the merged exit facts of `preds` into the block.
    ///
    /// `initial` supplies facts for values no predecessor mentions. With
    /// `erase_after_reflection`, index entries of reflected values are
    /// dropped once the reflection settles.
    pub fn reflect_merged(
        &mut self,
        preds: &[&ValueDependencies<A::ValueRef>],
        initial: &ValueDependencies<A::ValueRef>,
        erase_after_reflection: bool,
    ) -> ReflectOutcome<A::ValueRef> {
        let mut outcome = ReflectOutcome::default();
        if self.is_reflected {
            log::warn!("block {:?} reflected after finalisation", self.block());
            return outcome;
        }

        let mut merged: ValueDependencies<A::ValueRef> = ValueDependencies::new();
        for pred in preds {
            for (&value, info) in pred.iter() {
                merged.entry(value).or_insert_with(DepInfo::unknown).merge_from(info);
            }
        }
        for (&value, info) in initial {
            merged.entry(value).or_insert_with(|| info.clone());
        }

        let mut keys: Vec<_> = merged.keys().copied().collect();
        keys.sort();
        let mut reflected = Vec::new();
        for value in keys {
            let corrected = &merged[&value];
            let entry = self.inner.entry.entry(value).or_insert_with(DepInfo::unknown);
            if !entry.merge_from(corrected) {
                continue;
            }
            let updated = entry.clone();
            if !self.inner.defined_here.contains(&value) {
                let exit = self.inner.result.values.entry(value).or_insert_with(DepInfo::unknown);
                if exit.merge_from(&updated) {
                    outcome.changed_values.insert(value);
                }
            }
            self.reflect_value(value, updated, &mut outcome, &mut reflected);
        }

        if erase_after_reflection {
            for value in reflected {
                self.inner.sink.erase(value);
            }
        }
        log::trace!(
            "reflected block {:?}: {} values, {} instructions changed",
            self.block(),
            outcome.changed_values.len(),
            outcome.changed_instructions
        );
        outcome
    }

    /// Propagate a corrected fact for `value` through the index, cascading
    /// into the results of instructions that change.
    fn reflect_value(
        &mut self,
        value: A::ValueRef,
        info: DepInfoOf<A>,
        outcome: &mut ReflectOutcome<A::ValueRef>,
        reflected: &mut Vec<A::ValueRef>,
    ) {
        let mut work = VecDeque::from([(value, info)]);
        while let Some((source, from)) = work.pop_front() {
            reflected.push(source);
            for dependent in self.inner.sink.dependents_of(source) {
                if let Some(next) = self.reflect_on_dep_info(dependent, &from, outcome) {
                    work.push_back(next);
                }
            }
        }
    }

    /// Join `from` into one dependent. Returns the dependent's own value and
    /// new fact when that change must cascade further.
    pub fn reflect_on_dep_info(
        &mut self,
        dependent: DependentOf<A>,
        from: &DepInfoOf<A>,
        outcome: &mut ReflectOutcome<A::ValueRef>,
    ) -> Option<(A::ValueRef, DepInfoOf<A>)> {
        let result = &mut self.inner.result;
        match dependent {
            Dependent::Instruction(inst) => {
                let to = result.instructions.entry(inst).or_insert_with(DepInfo::unknown);
                if !to.merge_from(from) {
                    return None;
                }
                outcome.changed_instructions += 1;
                let updated = to.clone();
                let adaptor = self.inner.adaptor;
                if adaptor.inst_kind(inst) == InstKind::Alloca || !adaptor.inst_has_result(inst) {
                    return None;
                }
                let value = adaptor.inst_value(inst);
                result.values.insert(value, updated.clone());
                outcome.changed_values.insert(value);
                Some((value, updated))
            }
            Dependent::Value(slot) => {
                let exit = result.values.entry(slot).or_insert_with(DepInfo::unknown);
                if exit.merge_from(from) {
                    outcome.changed_values.insert(slot);
                }
                if let Some(state) = self.inner.slots.get_mut(&slot) {
                    state.info.merge_from(from);
                }
                None
            }
            Dependent::OutArgument(arg) => {
                let to = result.out_args.entry(arg).or_insert_with(DepInfo::unknown);
                outcome.changed_effects |= to.merge_from(from);
                None
            }
            Dependent::CallArgument { callee, position } => {
                let to = result.call_args.entry((callee, position)).or_insert_with(DepInfo::unknown);
                outcome.changed_effects |= to.merge_from(from);
                None
            }
            Dependent::ReturnValue => {
                let to = result.return_dep.get_or_insert_with(DepInfo::unknown);
                outcome.changed_effects |= to.merge_from(from);
                None
            }
        }
    }
}
