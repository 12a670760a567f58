//! Per-procedure facts shared by every block analyser of that procedure.

use super::block_analyzer::ValueDependencies;
use super::dep_info::DepInfo;
use crate::core::{InstKind, IrAdaptor, ValueKind};
use hashbrown::HashSet;

/// What the block analysers of one procedure need to know beyond the block
/// itself: which values are program input, which callees deliver input, and
/// the storage slots that exist in the procedure.
pub struct AnalysisContext<A: IrAdaptor> {
    func: A::FuncRef,
    args: Vec<A::ValueRef>,
    inputs: HashSet<A::ValueRef>,
    input_functions: HashSet<A::FuncRef>,
    input_globals: HashSet<A::ValueRef>,
    slots: Vec<A::ValueRef>,
}

impl<A: IrAdaptor> AnalysisContext<A> {
    /// Context with an empty input set.
    pub fn new(adaptor: &A, func: A::FuncRef) -> Self {
        let args = adaptor.func_args(func).collect();
        let mut slots: Vec<_> = adaptor.globals().collect();
        for block in adaptor.func_blocks(func) {
            for inst in adaptor.block_insts(block) {
                if adaptor.inst_kind(inst) == InstKind::Alloca {
                    slots.push(adaptor.inst_value(inst));
                }
            }
        }
        slots.sort();
        slots.dedup();
        Self {
            func,
            args,
            inputs: HashSet::new(),
            input_functions: HashSet::new(),
            input_globals: HashSet::new(),
            slots,
        }
    }

    pub fn func(&self) -> A::FuncRef {
        self.func
    }

    pub fn args(&self) -> &[A::ValueRef] {
        &self.args
    }

    /// Mark a value as program input.
    pub fn mark_input(&mut self, value: A::ValueRef) {
        self.inputs.insert(value);
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = A::ValueRef>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_input_functions(mut self, funcs: impl IntoIterator<Item = A::FuncRef>) -> Self {
        self.input_functions.extend(funcs);
        self
    }

    pub fn with_input_globals(mut self, globals: impl IntoIterator<Item = A::ValueRef>) -> Self {
        self.input_globals.extend(globals);
        self
    }

    pub fn is_input(&self, value: A::ValueRef) -> bool {
        self.inputs.contains(&value)
    }

    pub fn is_input_function(&self, func: A::FuncRef) -> bool {
        self.input_functions.contains(&func)
    }

    pub fn inputs(&self) -> impl Iterator<Item = A::ValueRef> + '_ {
        self.inputs.iter().copied()
    }

    /// Inputs that are parameters of this procedure, in parameter order.
    pub fn input_args(&self) -> impl Iterator<Item = A::ValueRef> + '_ {
        self.args.iter().copied().filter(|a| self.inputs.contains(a))
    }

    /// Every stack slot of the procedure and every global, sorted.
    pub fn slots(&self) -> &[A::ValueRef] {
        &self.slots
    }

    /// Facts live on entry to the procedure: parameters and globals.
    pub fn initial_dependencies(&self, adaptor: &A) -> ValueDependencies<A::ValueRef> {
        let mut initial = ValueDependencies::new();
        for &arg in &self.args {
            let info = if self.is_input(arg) {
                DepInfo::dependent(arg)
            } else {
                DepInfo::independent()
            };
            initial.insert(arg, info);
        }
        for global in adaptor.globals() {
            debug_assert!(matches!(adaptor.value_kind(global), ValueKind::Global));
            let info = if self.input_globals.contains(&global) {
                DepInfo::dependent(global)
            } else {
                DepInfo::independent()
            };
            initial.insert(global, info);
        }
        initial
    }
}
