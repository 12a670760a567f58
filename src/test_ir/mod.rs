//! Test IR (TIR) parser and data structures for testing the dependency analysis.
//!
//! This module provides a small SSA IR for writing analysis tests without
//! depending on a real compiler IR. The format is designed to be:
//! - Human-readable and writable
//! - Easy to parse
//! - Rich enough to exercise storage, calls, phis and loops
//!
//! # TIR Format
//!
//! ```text
//! ; Comments start with semicolon
//! @counter = global
//!
//! read(%buf)!
//!
//! main(%argc, %argv) {
//! entry:
//!     %slot = alloca 8, 8
//!     %one = const 1
//!     store %argc, %slot
//!     %v = load %slot
//!     %c = cmp %v, %one
//!     condbr %c, ^then, ^done
//! then:
//!     call @read, %slot
//!     br ^done
//! done:
//!     %p = phi [^entry, %one], [^then, %v]
//!     ret %p
//! }
//! ```
//!
//! Globals must be declared before they are used. `name(...)!` declares a
//! function without a body.

use crate::core::{AnalysisError, AnalysisResult};

pub mod adaptor;
pub mod alias;
pub mod check;
pub mod parser;

pub use adaptor::TestIRAdaptor;
pub use alias::SyntacticAliasOracle;
pub use check::{render, CheckDirective, ReportOptions, TestRunner, TestSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct TestIR {
    pub functions: Vec<Function>,
    pub blocks: Vec<Block>,
    pub values: Vec<Value>,
    pub value_operands: Vec<u32>,
    /// Indices of global values in `values`.
    pub globals: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub declaration: bool,
    pub block_begin_idx: u32,
    pub block_end_idx: u32,
    pub arg_begin_idx: u32,
    pub arg_end_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub succ_begin_idx: u32,
    pub succ_end_idx: u32,
    pub inst_begin_idx: u32,
    pub phi_end_idx: u32,
    pub inst_end_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub name: String,
    pub value_type: ValueType,
    pub op: Operation,
    /// For call only: called function index
    pub call_func_idx: u32,
    /// Number of value operands
    pub op_count: u32,
    /// Operand indices into value_operands array
    pub op_begin_idx: u32,
    pub op_end_idx: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Normal,
    Arg,
    Phi,
    Terminator,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    None,
    Any,
    Add,
    Sub,
    Mul,
    Cmp,
    Const,
    Alloca,
    Load,
    Store,
    Gep,
    Call,
    Terminate,
    Ret,
    Br,
    CondBr,
    Tbz,
    Jump,
}

impl Operation {
    pub const fn info(self) -> OpInfo {
        use Operation::*;
        match self {
            None => OpInfo { name: "<none>", is_terminator: false, is_def: false, op_count: 0, succ_count: 0, imm_count: 0 },
            Any => OpInfo { name: "any", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Add => OpInfo { name: "add", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Sub => OpInfo { name: "sub", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Mul => OpInfo { name: "mul", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Cmp => OpInfo { name: "cmp", is_terminator: false, is_def: true, op_count: 2, succ_count: 0, imm_count: 0 },
            Const => OpInfo { name: "const", is_terminator: false, is_def: true, op_count: 0, succ_count: 0, imm_count: 1 },
            Alloca => OpInfo { name: "alloca", is_terminator: false, is_def: true, op_count: 0, succ_count: 0, imm_count: 2 },
            Load => OpInfo { name: "load", is_terminator: false, is_def: true, op_count: 1, succ_count: 0, imm_count: 0 },
            Store => OpInfo { name: "store", is_terminator: false, is_def: false, op_count: 2, succ_count: 0, imm_count: 0 },
            Gep => OpInfo { name: "gep", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Call => OpInfo { name: "call", is_terminator: false, is_def: true, op_count: !0, succ_count: 0, imm_count: 0 },
            Terminate => OpInfo { name: "terminate", is_terminator: true, is_def: false, op_count: 0, succ_count: 0, imm_count: 0 },
            Ret => OpInfo { name: "ret", is_terminator: true, is_def: false, op_count: !0, succ_count: 0, imm_count: 0 },
            Br => OpInfo { name: "br", is_terminator: true, is_def: false, op_count: 0, succ_count: 1, imm_count: 0 },
            CondBr => OpInfo { name: "condbr", is_terminator: true, is_def: false, op_count: 1, succ_count: 2, imm_count: 0 },
            Tbz => OpInfo { name: "tbz", is_terminator: true, is_def: false, op_count: 1, succ_count: 2, imm_count: 1 },
            Jump => OpInfo { name: "jump", is_terminator: true, is_def: false, op_count: 0, succ_count: !0, imm_count: 0 },
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Operation::Add),
            "sub" => Some(Operation::Sub),
            "mul" => Some(Operation::Mul),
            "cmp" => Some(Operation::Cmp),
            "const" => Some(Operation::Const),
            "alloca" => Some(Operation::Alloca),
            "load" => Some(Operation::Load),
            "store" => Some(Operation::Store),
            "gep" => Some(Operation::Gep),
            "call" => Some(Operation::Call),
            "terminate" => Some(Operation::Terminate),
            "ret" => Some(Operation::Ret),
            "br" => Some(Operation::Br),
            "condbr" => Some(Operation::CondBr),
            "tbz" => Some(Operation::Tbz),
            "jump" => Some(Operation::Jump),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub is_terminator: bool,
    pub is_def: bool,
    pub op_count: u32,
    pub succ_count: u32,
    pub imm_count: u32,
}

impl TestIR {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            value_operands: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> AnalysisResult<Self> {
        parser::parse_ir(text).map_err(|reason| AnalysisError::Parse { reason })
    }

    /// Index of the function called `name`.
    pub fn function_index(&self, name: &str) -> Option<u32> {
        self.functions.iter().position(|f| f.name == name).map(|i| i as u32)
    }

    /// Index of the block called `name` inside function `func`.
    pub fn block_index(&self, func: u32, name: &str) -> Option<u32> {
        let func = self.functions.get(func as usize)?;
        (func.block_begin_idx..func.block_end_idx).find(|&b| self.blocks[b as usize].name == name)
    }

    /// Index of the value called `name` inside function `func` (arguments
    /// and instructions).
    pub fn value_index(&self, func: u32, name: &str) -> Option<u32> {
        let func = self.functions.get(func as usize)?;
        let args = func.arg_begin_idx..func.arg_end_idx;
        let insts = (func.block_begin_idx..func.block_end_idx).flat_map(|b| {
            let block = &self.blocks[b as usize];
            block.inst_begin_idx..block.inst_end_idx
        });
        args.chain(insts).find(|&v| self.values[v as usize].name == name)
    }

    fn operand_name(&self, idx: u32) -> String {
        match self.values.get(idx as usize) {
            Some(val) if val.value_type == ValueType::Global => format!("@{}", val.name),
            Some(val) => val.name.clone(),
            None => format!("<{}>", idx),
        }
    }

    pub fn print(&self) -> String {
        let mut output = String::new();
        output.push_str("Printing IR\n");

        for &global in &self.globals {
            output.push_str(&format!("Global {}\n", self.values[global as usize].name));
        }

        for func in &self.functions {
            if func.declaration {
                output.push_str(&format!("Extern function {}", func.name));
            } else {
                output.push_str(&format!("Function {}", func.name));
            }

            for arg_idx in func.arg_begin_idx..func.arg_end_idx {
                let arg = &self.values[arg_idx as usize];
                output.push_str(&format!("\nArgument {}", arg.name));
            }

            for block_idx in func.block_begin_idx..func.block_end_idx {
                let block = &self.blocks[block_idx as usize];
                output.push_str(&format!("\nBlock {}", block.name));

                for succ_idx in block.succ_begin_idx..block.succ_end_idx {
                    let succ_block_idx = self.value_operands[succ_idx as usize];
                    if let Some(succ_block) = self.blocks.get(succ_block_idx as usize) {
                        output.push_str(&format!("\nSucc {}", succ_block.name));
                    }
                }

                for inst_idx in block.inst_begin_idx..block.phi_end_idx {
                    let phi = &self.values[inst_idx as usize];
                    output.push_str(&format!("\nPHI {}", phi.name));

                    let incoming_count = phi.op_count;
                    for i in 0..incoming_count {
                        let val_idx = self.value_operands[(phi.op_begin_idx + i) as usize];
                        let block_idx =
                            self.value_operands[(phi.op_begin_idx + incoming_count + i) as usize];
                        if let Some(from_block) = self.blocks.get(block_idx as usize) {
                            output.push_str(&format!(
                                "\n{} from {}",
                                self.operand_name(val_idx),
                                from_block.name
                            ));
                        }
                    }
                }

                for inst_idx in block.phi_end_idx..block.inst_end_idx {
                    let inst = &self.values[inst_idx as usize];
                    let info = inst.op.info();

                    if inst.name.is_empty() {
                        output.push_str(&format!("\nValue ({})", info.name));
                    } else {
                        output.push_str(&format!("\nValue {} ({})", inst.name, info.name));
                    }

                    if inst.op == Operation::Call {
                        if let Some(target) = self.functions.get(inst.call_func_idx as usize) {
                            output.push_str(&format!("\nTarget {}", target.name));
                        }
                    }

                    for op_idx in 0..inst.op_count {
                        let operand_idx = self.value_operands[(inst.op_begin_idx + op_idx) as usize];
                        output.push_str(&format!("\nOp {}", self.operand_name(operand_idx)));
                    }

                    // Block operands (for branches)
                    let block_op_start = inst.op_begin_idx + inst.op_count;
                    let block_op_count = if info.succ_count == !0 {
                        block.succ_end_idx - block.succ_begin_idx
                    } else {
                        info.succ_count
                    };
                    for i in 0..block_op_count {
                        let block_idx = self.value_operands[(block_op_start + i) as usize];
                        if let Some(target_block) = self.blocks.get(block_idx as usize) {
                            output.push_str(&format!("\nOp ^{}", target_block.name));
                        }
                    }

                    let imm_start = block_op_start + block_op_count;
                    for i in 0..info.imm_count {
                        if let Some(imm) = self.value_operands.get((imm_start + i) as usize) {
                            output.push_str(&format!("\nOp ${}", imm));
                        }
                    }
                }
            }
            output.push('\n');
        }

        output
    }
}

impl Default for TestIR {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TestIR {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.print())
    }
}
