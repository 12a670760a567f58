// This module implements the per-block half of the input-dependency analysis. A
// BasicBlockAnalyzer walks one block's instructions in program order and classifies each of
// them against the facts that are live on entry to the block: parameters and globals of the
// procedure, results of instructions in dominating blocks, and the contents of storage slots
// (stack allocations and globals) as left by the predecessor the block was first analysed
// against. Loads read the current state of the slot they resolve to, stores overwrite it (or
// merge into it when the target is only known up to aliasing), calls join their arguments and
// record which facts reach which callee parameter, and returns record the returned fact.
// Every time a fact is derived from another value's fact, the analyser reports the pair to a
// DependencySink. The plain analyser discards those reports; the reflecting analyser keeps
// them as its reverse-dependency index so it can later propagate corrected predecessor facts
// without re-running the block. The exit map is cumulative: it starts as a copy of the entry
// facts and is overlaid with what the block defines, so successors see every fact that flows
// through this block.

//! Basic block dependency analysis.
//!
//! See [`BasicBlockAnalyzer`] for the per-instruction rules.

use super::alias::{may_alias, AliasOracle};
use super::context::AnalysisContext;
use super::dep_info::DepInfo;
use crate::core::{AnalysisError, AnalysisResult, InstKind, IrAdaptor, ValueKind};
use hashbrown::{HashMap, HashSet};

/// Dependency facts keyed by value.
///
/// Storage slots (allocas and globals) are keyed by the slot's own value and
/// hold the fact for the slot's *content*, never for its address.
pub type ValueDependencies<V> = HashMap<V, DepInfo<V>>;

pub type DepInfoOf<A> = DepInfo<<A as IrAdaptor>::ValueRef>;

pub type DependentOf<A> =
    Dependent<<A as IrAdaptor>::ValueRef, <A as IrAdaptor>::InstRef, <A as IrAdaptor>::FuncRef>;

/// Something whose fact was derived from another value's fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependent<V, I, F> {
    /// Exit state of a storage slot.
    Value(V),
    Instruction(I),
    /// What the procedure writes through a pointer parameter.
    OutArgument(V),
    /// Argument at `position` of calls to `callee`.
    CallArgument { callee: F, position: u32 },
    /// The procedure's return value.
    ReturnValue,
}

/// Receives "`dependent` was derived from `source`" while a block is analysed.
pub trait DependencySink<A: IrAdaptor> {
    fn record(&mut self, source: A::ValueRef, dependent: DependentOf<A>);

    /// `dependent` no longer derives from `source` (the slot was overwritten).
    fn forget(&mut self, source: A::ValueRef, dependent: DependentOf<A>);
}

/// Sink for analysers that never reflect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndex;

impl<A: IrAdaptor> DependencySink<A> for NoIndex {
    fn record(&mut self, _source: A::ValueRef, _dependent: DependentOf<A>) {}

    fn forget(&mut self, _source: A::ValueRef, _dependent: DependentOf<A>) {}
}

/// Where a pointer operand points.
enum PointerRoot<V> {
    /// A tracked slot. `whole` is false when reached through an element
    /// address, in which case writes must not replace the slot state.
    Slot { slot: V, whole: bool },
    /// Memory reachable from a parameter.
    Param(V),
    /// Untraceable memory: loaded pointers, call results, phis, and element
    /// addresses based on them. Holds the root the address was derived from.
    Opaque(V),
}

/// Slot state written inside the block, with the values it was derived from.
pub(super) struct SlotState<V: Ord> {
    pub(super) info: DepInfo<V>,
    keys: Vec<V>,
}

/// Facts computed for one block.
pub struct BasicBlockAnalysisResult<A: IrAdaptor> {
    block: A::BlockRef,
    pub(super) instructions: HashMap<A::InstRef, DepInfoOf<A>>,
    pub(super) values: ValueDependencies<A::ValueRef>,
    pub(super) out_args: HashMap<A::ValueRef, DepInfoOf<A>>,
    pub(super) call_args: HashMap<(A::FuncRef, u32), DepInfoOf<A>>,
    pub(super) return_dep: Option<DepInfoOf<A>>,
}

impl<A: IrAdaptor> BasicBlockAnalysisResult<A> {
    fn new(block: A::BlockRef, entry: ValueDependencies<A::ValueRef>) -> Self {
        Self {
            block,
            instructions: HashMap::new(),
            values: entry,
            out_args: HashMap::new(),
            call_args: HashMap::new(),
            return_dep: None,
        }
    }

    pub fn block(&self) -> A::BlockRef {
        self.block
    }

    pub fn instruction_dep(&self, inst: A::InstRef) -> Option<&DepInfoOf<A>> {
        self.instructions.get(&inst)
    }

    pub fn instructions(&self) -> impl Iterator<Item = (A::InstRef, &DepInfoOf<A>)> + '_ {
        self.instructions.iter().map(|(&inst, info)| (inst, info))
    }

    /// Fact for `value` on exit from the block.
    pub fn value_dep(&self, value: A::ValueRef) -> Option<&DepInfoOf<A>> {
        self.values.get(&value)
    }

    /// Exit facts of the block.
    pub fn values(&self) -> &ValueDependencies<A::ValueRef> {
        &self.values
    }

    pub fn out_args(&self) -> &HashMap<A::ValueRef, DepInfoOf<A>> {
        &self.out_args
    }

    pub fn call_args(&self) -> &HashMap<(A::FuncRef, u32), DepInfoOf<A>> {
        &self.call_args
    }

    pub fn return_dep(&self) -> Option<&DepInfoOf<A>> {
        self.return_dep.as_ref()
    }
}

/// Classifies the instructions of a single block.
///
/// Rules, applied in program order:
/// - constants, globals (as addresses) and stack slot addresses are
///   independent; a parameter is dependent iff it is an input or may alias
///   one;
/// - a phi joins its incoming facts; an incoming value from a predecessor
///   not yet analysed is `Unknown` until reflection corrects it;
/// - a load takes the state of the slot it resolves to; through a pointer
///   that resolves to no slot it is dependent on the pointer itself;
/// - a store replaces the slot state with the stored fact, or merges into
///   every may-alias slot when the target is not a whole tracked slot;
/// - a call joins its arguments; calls to input functions are dependent
///   on the call and taint the slots passed to them;
/// - a conditional branch takes its condition's fact;
/// - everything else joins its operands.
///
/// `Unknown` facts left at the end of the block become `Independent`.
pub struct BasicBlockAnalyzer<'a, A: IrAdaptor, S: DependencySink<A> = NoIndex> {
    pub(super) adaptor: &'a A,
    oracle: &'a dyn AliasOracle<A::ValueRef>,
    ctx: &'a AnalysisContext<A>,
    pub(super) entry: ValueDependencies<A::ValueRef>,
    pub(super) result: BasicBlockAnalysisResult<A>,
    pub(super) slots: HashMap<A::ValueRef, SlotState<A::ValueRef>>,
    pub(super) defined_here: HashSet<A::ValueRef>,
    pub(super) sink: S,
}

impl<'a, A: IrAdaptor> BasicBlockAnalyzer<'a, A, NoIndex> {
    pub fn new(
        adaptor: &'a A,
        oracle: &'a dyn AliasOracle<A::ValueRef>,
        ctx: &'a AnalysisContext<A>,
        block: A::BlockRef,
        entry: ValueDependencies<A::ValueRef>,
    ) -> Self {
        Self::with_sink(adaptor, oracle, ctx, block, entry, NoIndex)
    }
}

impl<'a, A: IrAdaptor, S: DependencySink<A>> BasicBlockAnalyzer<'a, A, S> {
    pub fn with_sink(
        adaptor: &'a A,
        oracle: &'a dyn AliasOracle<A::ValueRef>,
        ctx: &'a AnalysisContext<A>,
        block: A::BlockRef,
        entry: ValueDependencies<A::ValueRef>,
        sink: S,
    ) -> Self {
        Self {
            adaptor,
            oracle,
            ctx,
            result: BasicBlockAnalysisResult::new(block, entry.clone()),
            entry,
            slots: HashMap::new(),
            defined_here: HashSet::new(),
            sink,
        }
    }

    pub fn adaptor(&self) -> &'a A {
        self.adaptor
    }

    pub fn block(&self) -> A::BlockRef {
        self.result.block
    }

    /// Live-in facts the block has been analysed against.
    pub fn entry(&self) -> &ValueDependencies<A::ValueRef> {
        &self.entry
    }

    pub fn result(&self) -> &BasicBlockAnalysisResult<A> {
        &self.result
    }

    pub fn into_result(self) -> BasicBlockAnalysisResult<A> {
        self.result
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run the per-instruction rules over the whole block.
    pub fn analyze(&mut self) -> AnalysisResult<()> {
        let adaptor = self.adaptor;
        let block = self.result.block;
        log::debug!("analysing block {}", adaptor.block_name(block));

        for inst in adaptor.block_insts(block) {
            let info = match adaptor.inst_kind(inst) {
                InstKind::Alloca | InstKind::Branch => DepInfo::independent(),
                InstKind::Phi => self.phi_dependencies(inst),
                InstKind::Load => self.load_dependencies(inst)?,
                InstKind::Store => self.store_dependencies(inst)?,
                InstKind::Call => self.call_dependencies(inst)?,
                InstKind::CondBranch => self.branch_dependencies(inst)?,
                InstKind::Return => self.return_dependencies(inst)?,
                InstKind::ElementAddr | InstKind::Other => self.operand_dependencies(inst)?,
            };
            log::trace!("  {:?} -> {} {:?}", inst, info.dependency(), info.sources());
            self.set_instruction(inst, info);
        }

        self.finalize_instructions();
        Ok(())
    }

    fn set_instruction(&mut self, inst: A::InstRef, info: DepInfoOf<A>) {
        // An alloca's value keys the slot content, which the alloca does not define.
        if self.adaptor.inst_kind(inst) != InstKind::Alloca && self.adaptor.inst_has_result(inst) {
            let value = self.adaptor.inst_value(inst);
            self.result.values.insert(value, info.clone());
            self.defined_here.insert(value);
        }
        self.result.instructions.insert(inst, info);
    }

    fn finalize_instructions(&mut self) {
        for (&inst, info) in self.result.instructions.iter_mut() {
            if !info.is_unknown() {
                continue;
            }
            info.finalize();
            if self.adaptor.inst_has_result(inst) {
                if let Some(value) = self.result.values.get_mut(&self.adaptor.inst_value(inst)) {
                    value.finalize();
                }
            }
        }
    }

    fn traversal_error(&self, value: A::ValueRef) -> AnalysisError {
        let name = self.adaptor.value_name(value);
        AnalysisError::TraversalOrder {
            value: if name.is_empty() { format!("{:?}", value) } else { format!("%{}", name) },
            block: self.adaptor.block_name(self.result.block).to_string(),
        }
    }

    fn is_slot_address(&self, value: A::ValueRef) -> bool {
        match self.adaptor.value_kind(value) {
            ValueKind::Instruction(def) => self.adaptor.inst_kind(def) == InstKind::Alloca,
            _ => false,
        }
    }

    /// Values whose facts may still change during the procedure's analysis.
    fn index_key(&self, value: A::ValueRef) -> Option<A::ValueRef> {
        match self.adaptor.value_kind(value) {
            ValueKind::Instruction(_) if !self.is_slot_address(value) => Some(value),
            _ => None,
        }
    }

    /// Fact of a parameter: dependent on itself if it is an input, on every
    /// input parameter it may alias otherwise.
    pub fn argument_dependencies(&self, arg: A::ValueRef) -> DepInfoOf<A> {
        if self.ctx.is_input(arg) {
            return DepInfo::dependent(arg);
        }
        let aliased: Vec<_> = self
            .ctx
            .input_args()
            .filter(|&input| may_alias(self.oracle, arg, input))
            .collect();
        if aliased.is_empty() {
            DepInfo::independent()
        } else {
            DepInfo::dependent_on(aliased)
        }
    }

    /// Fact of an operand of `user`, recording the derivation.
    fn operand(&mut self, user: A::InstRef, value: A::ValueRef) -> AnalysisResult<DepInfoOf<A>> {
        match self.adaptor.value_kind(value) {
            ValueKind::Constant | ValueKind::Global => Ok(DepInfo::independent()),
            ValueKind::Argument => Ok(self.argument_dependencies(value)),
            ValueKind::Instruction(_) if self.is_slot_address(value) => Ok(DepInfo::independent()),
            ValueKind::Instruction(_) => {
                let info = self.result.values.get(&value).cloned();
                let info = info.ok_or_else(|| self.traversal_error(value))?;
                self.sink.record(value, Dependent::Instruction(user));
                Ok(info)
            }
        }
    }

    fn operand_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let adaptor = self.adaptor;
        let mut info = DepInfo::independent();
        for value in adaptor.inst_operands(inst) {
            info.merge_from(&self.operand(inst, value)?);
        }
        Ok(info)
    }

    fn phi_dependencies(&mut self, inst: A::InstRef) -> DepInfoOf<A> {
        let adaptor = self.adaptor;
        let mut info = DepInfo::unknown();
        for (value, _pred) in adaptor.phi_incoming(inst) {
            let incoming = match self.adaptor.value_kind(value) {
                ValueKind::Constant | ValueKind::Global => DepInfo::independent(),
                ValueKind::Argument => self.argument_dependencies(value),
                ValueKind::Instruction(_) if self.is_slot_address(value) => DepInfo::independent(),
                ValueKind::Instruction(_) => {
                    self.sink.record(value, Dependent::Instruction(inst));
                    self.result.values.get(&value).cloned().unwrap_or_default()
                }
            };
            info.merge_from(&incoming);
        }
        info
    }

    fn branch_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let cond = self.adaptor.inst_operands(inst).next();
        match cond {
            Some(cond) => self.operand(inst, cond),
            None => Ok(DepInfo::independent()),
        }
    }

    fn return_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let value = self.adaptor.inst_operands(inst).next();
        let Some(value) = value else {
            return Ok(DepInfo::independent());
        };
        let info = self.operand(inst, value)?;
        self.result.return_dep.get_or_insert_with(DepInfo::unknown).merge_from(&info);
        if let Some(key) = self.index_key(value) {
            self.sink.record(key, Dependent::ReturnValue);
        }
        Ok(info)
    }

    fn resolve_pointer(&self, ptr: A::ValueRef) -> PointerRoot<A::ValueRef> {
        let mut current = ptr;
        let mut whole = true;
        loop {
            match self.adaptor.value_kind(current) {
                ValueKind::Global => return PointerRoot::Slot { slot: current, whole },
                ValueKind::Argument => return PointerRoot::Param(current),
                ValueKind::Constant => return PointerRoot::Opaque(current),
                ValueKind::Instruction(def) => match self.adaptor.inst_kind(def) {
                    InstKind::Alloca => return PointerRoot::Slot { slot: current, whole },
                    InstKind::ElementAddr => match self.adaptor.inst_operands(def).next() {
                        Some(base) => {
                            whole = false;
                            current = base;
                        }
                        None => return PointerRoot::Opaque(current),
                    },
                    _ => return PointerRoot::Opaque(current),
                },
            }
        }
    }

    /// Slots `ptr` may point to according to the alias oracle.
    fn aliasing_slots(&self, ptr: A::ValueRef) -> Vec<A::ValueRef> {
        self.ctx
            .slots()
            .iter()
            .copied()
            .filter(|&slot| may_alias(self.oracle, ptr, slot))
            .collect()
    }

    /// Current content fact of `slot`, recording the read by `user`.
    fn read_slot(&mut self, user: A::InstRef, slot: A::ValueRef) -> DepInfoOf<A> {
        if let Some(state) = self.slots.get(&slot) {
            let info = state.info.clone();
            for &key in &state.keys {
                self.sink.record(key, Dependent::Instruction(user));
            }
            info
        } else {
            self.sink.record(slot, Dependent::Instruction(user));
            self.result.values.get(&slot).cloned().unwrap_or_default()
        }
    }

    /// Write `info`, derived from `keys`, into `slot`.
    ///
    /// A strong write replaces the state and drops its previous derivations;
    /// a weak write merges, keeping the live-in state as one derivation.
    fn write_slot(&mut self, slot: A::ValueRef, info: &DepInfoOf<A>, keys: &[A::ValueRef], strong: bool) {
        if strong {
            if let Some(previous) = self.slots.remove(&slot) {
                for key in previous.keys {
                    self.sink.forget(key, Dependent::Value(slot));
                }
            }
            self.slots.insert(slot, SlotState { info: info.clone(), keys: keys.to_vec() });
        } else {
            let values = &self.result.values;
            let sink = &mut self.sink;
            let state = self.slots.entry(slot).or_insert_with(|| {
                sink.record(slot, Dependent::Value(slot));
                SlotState {
                    info: values.get(&slot).cloned().unwrap_or_default(),
                    keys: vec![slot],
                }
            });
            state.info.merge_from(info);
            state.keys.extend_from_slice(keys);
        }
        for &key in keys {
            self.sink.record(key, Dependent::Value(slot));
        }
        if let Some(state) = self.slots.get(&slot) {
            self.result.values.insert(slot, state.info.clone());
        }
        self.defined_here.insert(slot);
    }

    fn write_out_arg(&mut self, arg: A::ValueRef, info: &DepInfoOf<A>, keys: &[A::ValueRef]) {
        self.result.out_args.entry(arg).or_insert_with(DepInfo::unknown).merge_from(info);
        for &key in keys {
            self.sink.record(key, Dependent::OutArgument(arg));
        }
    }

    fn write_aliasing(&mut self, ptr: A::ValueRef, info: &DepInfoOf<A>, keys: &[A::ValueRef]) {
        for slot in self.aliasing_slots(ptr) {
            self.write_slot(slot, info, keys, false);
        }
    }

    fn load_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let ptr = self.adaptor.inst_operands(inst).next();
        let Some(ptr) = ptr else {
            return Ok(DepInfo::independent());
        };
        match self.resolve_pointer(ptr) {
            PointerRoot::Slot { slot, whole } => {
                let mut info = self.read_slot(inst, slot);
                if !whole {
                    info.merge_from(&self.operand(inst, ptr)?);
                }
                Ok(info)
            }
            PointerRoot::Param(root) | PointerRoot::Opaque(root) => {
                let mut info = DepInfo::dependent(root);
                info.merge_from(&self.operand(inst, ptr)?);
                for slot in self.aliasing_slots(ptr) {
                    info.merge_from(&self.read_slot(inst, slot));
                }
                Ok(info)
            }
        }
    }

    fn store_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let operands: Vec<_> = self.adaptor.inst_operands(inst).take(2).collect();
        let &[value, ptr] = operands.as_slice() else {
            log::warn!("store {:?} without value and pointer operands", inst);
            return Ok(DepInfo::independent());
        };
        let info = self.operand(inst, value)?;
        let mut keys: Vec<_> = self.index_key(value).into_iter().collect();

        match self.resolve_pointer(ptr) {
            PointerRoot::Slot { slot, whole: true } => self.write_slot(slot, &info, &keys, true),
            PointerRoot::Slot { slot, whole: false } => {
                // Which element gets written may itself depend on input.
                let written = info.merge(&self.operand(inst, ptr)?);
                keys.extend(self.index_key(ptr));
                self.write_slot(slot, &written, &keys, false);
            }
            PointerRoot::Param(arg) => {
                self.write_out_arg(arg, &info, &keys);
                self.write_aliasing(ptr, &info, &keys);
            }
            PointerRoot::Opaque(_) => self.write_aliasing(ptr, &info, &keys),
        }
        Ok(info)
    }

    fn call_dependencies(&mut self, inst: A::InstRef) -> AnalysisResult<DepInfoOf<A>> {
        let callee = self.adaptor.inst_callee(inst);
        let args: Vec<_> = self.adaptor.inst_operands(inst).collect();

        let mut info = DepInfo::independent();
        for (position, &arg) in args.iter().enumerate() {
            let arg_info = self.operand(inst, arg)?;
            if let Some(callee) = callee {
                if !matches!(self.adaptor.value_kind(arg), ValueKind::Constant) {
                    let position = position as u32;
                    self.result
                        .call_args
                        .entry((callee, position))
                        .or_insert_with(DepInfo::unknown)
                        .merge_from(&arg_info);
                    if let Some(key) = self.index_key(arg) {
                        self.sink.record(key, Dependent::CallArgument { callee, position });
                    }
                }
            }
            info.merge_from(&arg_info);
        }

        if callee.is_some_and(|f| self.ctx.is_input_function(f)) {
            let input = DepInfo::dependent(self.adaptor.inst_value(inst));
            info.merge_from(&input);
            // Buffers handed to an input function come back holding input.
            for &arg in &args {
                match self.resolve_pointer(arg) {
                    PointerRoot::Slot { slot, .. } => self.write_slot(slot, &input, &[], false),
                    PointerRoot::Param(param) => {
                        self.write_out_arg(param, &input, &[]);
                        self.write_aliasing(arg, &input, &[]);
                    }
                    PointerRoot::Opaque(_) => self.write_aliasing(arg, &input, &[]),
                }
            }
        }
        Ok(info)
    }
}
