// This module defines the IrAdaptor trait, the bridge between the input-dependency analysis
// and any SSA-based intermediate representation. The analysis never touches IR data
// structures directly: it enumerates functions, blocks and instructions, asks for operands,
// successors and phi incoming edges, and classifies instructions and values through this
// trait. Handles are small Copy identifiers, which is what lets the analysis keep its own
// forward-owned reverse-dependency index instead of back-pointers into the IR. Unlike a
// compiler adaptor the trait is stateless with respect to the "current" function: every
// query names the function, block or instruction it is about, so procedures can be
// analysed in parallel over a shared adaptor.

//! IrAdaptor responsibilities.
//!
//! The adaptor is the glue between the analysis and the user's SSA IR. The
//! analysis assumes:
//! - Each defined function has a single entry block.
//! - Basic blocks list their phi nodes first, then the remaining
//!   instructions, ending in a terminator.
//! - An instruction produces at most one result, and the instruction itself
//!   has a value identity (as in LLVM, where an instruction *is* a value).
//! - Constants, arguments and globals are values without a defining
//!   instruction.
//!
//! Operand layout per [`InstKind`]:
//!
//! | kind          | operands                                  |
//! |---------------|-------------------------------------------|
//! | `Load`        | `[ptr]`                  |
//! | `Store`       | `[value, ptr]`           |
//! | `ElementAddr` | `[base, indices...]`     |
//! | `CondBranch`  | `[cond]`                 |
//! | `Return`      | `[]` or `[value]`        |
//! | `Call`        | `[args...]`              |
//! | `Phi`         | incoming values, pairs via `phi_incoming` |

use core::fmt::Debug;
use core::hash::Hash;

/// Coarse instruction classes the dependency rules distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// Stack slot allocation. Its value is a storage identity.
    Alloca,
    Load,
    Store,
    /// Address computation into an aggregate (`getelementptr`).
    ElementAddr,
    Phi,
    Call,
    CondBranch,
    /// Unconditional transfer, including multi-target jumps without a condition.
    Branch,
    Return,
    /// Arithmetic, comparisons and everything else: a join over operands.
    Other,
}

impl InstKind {
    pub fn is_terminator(self) -> bool {
        matches!(self, InstKind::CondBranch | InstKind::Branch | InstKind::Return)
    }
}

/// What a value is, independent of how it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind<I> {
    Constant,
    Argument,
    Global,
    Instruction(I),
}

/// Bridge between an SSA IR and the analysis.
pub trait IrAdaptor: Sync {
    type ValueRef: Copy + Eq + Ord + Hash + Debug + Send + Sync;
    type InstRef: Copy + Eq + Ord + Hash + Debug + Send + Sync;
    type BlockRef: Copy + Eq + Ord + Hash + Debug + Send + Sync;
    type FuncRef: Copy + Eq + Ord + Hash + Debug + Send + Sync;

    /// Iterator over all functions in the module, declarations included.
    fn funcs(&self) -> Box<dyn Iterator<Item = Self::FuncRef> + '_>;

    /// Linkage name of the function.
    fn func_link_name(&self, func: Self::FuncRef) -> &str;

    /// Whether the function is only declared (no body to analyse).
    fn func_is_declaration(&self, func: Self::FuncRef) -> bool;

    /// Formal parameters of the function, in order.
    fn func_args(&self, func: Self::FuncRef) -> Box<dyn Iterator<Item = Self::ValueRef> + '_>;

    /// Entry block, `None` for declarations.
    fn entry_block(&self, func: Self::FuncRef) -> Option<Self::BlockRef>;

    /// Blocks of the function in layout order.
    fn func_blocks(&self, func: Self::FuncRef) -> Box<dyn Iterator<Item = Self::BlockRef> + '_>;

    /// Instructions of the block in program order, phis first.
    fn block_insts(&self, block: Self::BlockRef) -> Box<dyn Iterator<Item = Self::InstRef> + '_>;

    /// Successor blocks of the block's terminator.
    fn block_succs(&self, block: Self::BlockRef) -> Box<dyn Iterator<Item = Self::BlockRef> + '_>;

    /// Name of a block (for printing).
    fn block_name(&self, _block: Self::BlockRef) -> &str {
        ""
    }

    fn inst_kind(&self, inst: Self::InstRef) -> InstKind;

    /// Mnemonic of an instruction (for printing).
    fn inst_opcode(&self, _inst: Self::InstRef) -> &str {
        ""
    }

    /// Operands of an instruction, laid out as documented at module level.
    fn inst_operands(&self, inst: Self::InstRef) -> Box<dyn Iterator<Item = Self::ValueRef> + '_>;

    /// The instruction's own value identity.
    fn inst_value(&self, inst: Self::InstRef) -> Self::ValueRef;

    /// Whether the instruction defines a result other instructions can use.
    fn inst_has_result(&self, inst: Self::InstRef) -> bool;

    /// Called function of a call instruction, if statically known.
    fn inst_callee(&self, _inst: Self::InstRef) -> Option<Self::FuncRef> {
        None
    }

    /// Incoming `(value, predecessor)` pairs of a phi.
    fn phi_incoming(
        &self,
        _phi: Self::InstRef,
    ) -> Box<dyn Iterator<Item = (Self::ValueRef, Self::BlockRef)> + '_> {
        Box::new(std::iter::empty())
    }

    fn value_kind(&self, val: Self::ValueRef) -> ValueKind<Self::InstRef>;

    /// Name of a value (for printing).
    fn value_name(&self, _val: Self::ValueRef) -> &str {
        ""
    }

    /// Module-level storage slots.
    fn globals(&self) -> Box<dyn Iterator<Item = Self::ValueRef> + '_> {
        Box::new(std::iter::empty())
    }

    /// Find a function by linkage name.
    fn func_by_name(&self, name: &str) -> Option<Self::FuncRef> {
        self.funcs().find(|&f| self.func_link_name(f) == name)
    }
}
