//! TestIR adaptor implementation for the dependency analysis.
//!
//! This adaptor lets the analysis run over TestIR, enabling tests of the
//! analysers with small hand-written programs.

use super::{Operation, TestIR, ValueType};
use crate::core::{InstKind, IrAdaptor, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueRef(pub u32);

/// Instructions share the index space of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(pub u32);

/// Adaptor that implements IrAdaptor for TestIR
#[derive(Debug, Clone, Copy)]
pub struct TestIRAdaptor<'ir> {
    ir: &'ir TestIR,
}

impl<'ir> TestIRAdaptor<'ir> {
    pub fn new(ir: &'ir TestIR) -> Self {
        Self { ir }
    }

    pub fn ir(&self) -> &'ir TestIR {
        self.ir
    }

    /// Look up a function by name.
    pub fn func(&self, name: &str) -> Option<FuncRef> {
        self.ir.function_index(name).map(FuncRef)
    }

    /// Look up a block of `func` by name.
    pub fn block(&self, func: FuncRef, name: &str) -> Option<BlockRef> {
        self.ir.block_index(func.0, name).map(BlockRef)
    }

    /// Look up an argument or named instruction value of `func`.
    pub fn value(&self, func: FuncRef, name: &str) -> Option<ValueRef> {
        self.ir.value_index(func.0, name).map(ValueRef)
    }

    /// The instruction defining the named value of `func`.
    pub fn inst(&self, func: FuncRef, name: &str) -> Option<InstRef> {
        self.value(func, name)
            .filter(|v| self.ir.values[v.0 as usize].value_type != ValueType::Arg)
            .map(|v| InstRef(v.0))
    }

    /// The terminator of a block.
    pub fn terminator(&self, block: BlockRef) -> Option<InstRef> {
        let info = &self.ir.blocks[block.0 as usize];
        (info.inst_begin_idx < info.inst_end_idx).then(|| InstRef(info.inst_end_idx - 1))
    }

    pub fn global(&self, name: &str) -> Option<ValueRef> {
        self.ir
            .globals
            .iter()
            .copied()
            .find(|&g| self.ir.values[g as usize].name == name)
            .map(ValueRef)
    }

    pub fn val_is_phi(&self, val: ValueRef) -> bool {
        self.ir.values[val.0 as usize].value_type == ValueType::Phi
    }

    /// Operation of the instruction defining `val`.
    pub fn val_op(&self, val: ValueRef) -> Operation {
        self.ir.values[val.0 as usize].op
    }
}

impl<'ir> IrAdaptor for TestIRAdaptor<'ir> {
    type ValueRef = ValueRef;
    type InstRef = InstRef;
    type BlockRef = BlockRef;
    type FuncRef = FuncRef;

    fn funcs(&self) -> Box<dyn Iterator<Item = Self::FuncRef> + '_> {
        Box::new((0..self.ir.functions.len()).map(|i| FuncRef(i as u32)))
    }

    fn func_link_name(&self, func: Self::FuncRef) -> &str {
        &self.ir.functions[func.0 as usize].name
    }

    fn func_is_declaration(&self, func: Self::FuncRef) -> bool {
        self.ir.functions[func.0 as usize].declaration
    }

    fn func_args(&self, func: Self::FuncRef) -> Box<dyn Iterator<Item = Self::ValueRef> + '_> {
        let info = &self.ir.functions[func.0 as usize];
        Box::new((info.arg_begin_idx..info.arg_end_idx).map(ValueRef))
    }

    fn entry_block(&self, func: Self::FuncRef) -> Option<Self::BlockRef> {
        let info = &self.ir.functions[func.0 as usize];
        (!info.declaration && info.block_begin_idx != info.block_end_idx)
            .then_some(BlockRef(info.block_begin_idx))
    }

    fn func_blocks(&self, func: Self::FuncRef) -> Box<dyn Iterator<Item = Self::BlockRef> + '_> {
        let info = &self.ir.functions[func.0 as usize];
        Box::new((info.block_begin_idx..info.block_end_idx).map(BlockRef))
    }

    fn block_insts(&self, block: Self::BlockRef) -> Box<dyn Iterator<Item = Self::InstRef> + '_> {
        let info = &self.ir.blocks[block.0 as usize];
        // Constants live in the block textually but are not instructions.
        Box::new(
            (info.inst_begin_idx..info.inst_end_idx)
                .filter(move |&idx| self.ir.values[idx as usize].op != Operation::Const)
                .map(InstRef),
        )
    }

    fn block_succs(&self, block: Self::BlockRef) -> Box<dyn Iterator<Item = Self::BlockRef> + '_> {
        let info = &self.ir.blocks[block.0 as usize];
        Box::new(
            (info.succ_begin_idx..info.succ_end_idx)
                .map(move |idx| BlockRef(self.ir.value_operands[idx as usize])),
        )
    }

    fn block_name(&self, block: Self::BlockRef) -> &str {
        &self.ir.blocks[block.0 as usize].name
    }

    fn inst_kind(&self, inst: Self::InstRef) -> InstKind {
        let info = &self.ir.values[inst.0 as usize];
        if info.value_type == ValueType::Phi {
            return InstKind::Phi;
        }
        match info.op {
            Operation::Alloca => InstKind::Alloca,
            Operation::Load => InstKind::Load,
            Operation::Store => InstKind::Store,
            Operation::Gep => InstKind::ElementAddr,
            Operation::Call => InstKind::Call,
            Operation::CondBr | Operation::Tbz => InstKind::CondBranch,
            Operation::Br | Operation::Jump | Operation::Terminate => InstKind::Branch,
            Operation::Ret => InstKind::Return,
            Operation::None
            | Operation::Any
            | Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::Cmp
            | Operation::Const => InstKind::Other,
        }
    }

    fn inst_opcode(&self, inst: Self::InstRef) -> &str {
        let info = &self.ir.values[inst.0 as usize];
        if info.value_type == ValueType::Phi {
            "phi"
        } else {
            info.op.info().name
        }
    }

    fn inst_operands(&self, inst: Self::InstRef) -> Box<dyn Iterator<Item = Self::ValueRef> + '_> {
        let info = &self.ir.values[inst.0 as usize];
        Box::new(
            (0..info.op_count)
                .map(move |i| ValueRef(self.ir.value_operands[(info.op_begin_idx + i) as usize])),
        )
    }

    fn inst_value(&self, inst: Self::InstRef) -> Self::ValueRef {
        ValueRef(inst.0)
    }

    fn inst_has_result(&self, inst: Self::InstRef) -> bool {
        let info = &self.ir.values[inst.0 as usize];
        info.value_type == ValueType::Phi || (info.op.info().is_def && !info.name.is_empty())
    }

    fn inst_callee(&self, inst: Self::InstRef) -> Option<Self::FuncRef> {
        let info = &self.ir.values[inst.0 as usize];
        (info.op == Operation::Call && (info.call_func_idx as usize) < self.ir.functions.len())
            .then_some(FuncRef(info.call_func_idx))
    }

    fn phi_incoming(
        &self,
        phi: Self::InstRef,
    ) -> Box<dyn Iterator<Item = (Self::ValueRef, Self::BlockRef)> + '_> {
        let info = &self.ir.values[phi.0 as usize];
        if info.value_type != ValueType::Phi {
            return Box::new(std::iter::empty());
        }
        let base = info.op_begin_idx;
        let count = info.op_count;
        Box::new((0..count).map(move |slot| {
            (
                ValueRef(self.ir.value_operands[(base + slot) as usize]),
                BlockRef(self.ir.value_operands[(base + count + slot) as usize]),
            )
        }))
    }

    fn value_kind(&self, val: Self::ValueRef) -> ValueKind<Self::InstRef> {
        let info = &self.ir.values[val.0 as usize];
        match info.value_type {
            ValueType::Arg => ValueKind::Argument,
            ValueType::Global => ValueKind::Global,
            _ if info.op == Operation::Const => ValueKind::Constant,
            _ => ValueKind::Instruction(InstRef(val.0)),
        }
    }

    fn value_name(&self, val: Self::ValueRef) -> &str {
        &self.ir.values[val.0 as usize].name
    }

    fn globals(&self) -> Box<dyn Iterator<Item = Self::ValueRef> + '_> {
        Box::new(self.ir.globals.iter().map(|&g| ValueRef(g)))
    }

    fn func_by_name(&self, name: &str) -> Option<Self::FuncRef> {
        self.func(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adaptor_shapes() {
        let ir = TestIR::parse(
            r#"
@g = global
f(%x) {
entry:
  %one = const 1
  %y = add %x, %one
  condbr %y, ^a, ^b
a:
  %p = phi [^entry, %one]
  ret %p
b:
  store %y, @g
  ret
}
"#,
        )
        .unwrap();
        let adaptor = TestIRAdaptor::new(&ir);
        let f = adaptor.func("f").unwrap();
        let entry = adaptor.entry_block(f).unwrap();
        assert_eq!(adaptor.block_name(entry), "entry");

        // The constant is not listed as an instruction.
        let insts: Vec<_> = adaptor.block_insts(entry).collect();
        assert_eq!(insts.len(), 2);
        assert_eq!(adaptor.inst_kind(insts[0]), InstKind::Other);
        assert_eq!(adaptor.inst_kind(insts[1]), InstKind::CondBranch);
        assert!(!adaptor.inst_has_result(insts[1]));

        let one = adaptor.value(f, "one").unwrap();
        assert_eq!(adaptor.value_kind(one), ValueKind::Constant);
        let x = adaptor.value(f, "x").unwrap();
        assert_eq!(adaptor.value_kind(x), ValueKind::Argument);
        let g = adaptor.global("g").unwrap();
        assert_eq!(adaptor.value_kind(g), ValueKind::Global);

        let succs: Vec<_> = adaptor.block_succs(entry).map(|b| adaptor.block_name(b)).collect();
        assert_eq!(succs, vec!["a", "b"]);

        let phi = adaptor.inst(f, "p").unwrap();
        assert_eq!(adaptor.inst_kind(phi), InstKind::Phi);
        assert_eq!(adaptor.phi_incoming(phi).collect::<Vec<_>>(), vec![(one, entry)]);
    }
}
