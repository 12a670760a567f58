//! Plain-text reports of analysis results.
//!
//! The format is line oriented so it can be matched by the Test IR check
//! directives:
//!
//! ```text
//! Dependencies for main
//! entry:
//!   %y = add: dependent [%x]
//!   condbr: dependent [%x]
//! End Dependencies
//! ```

use super::block_analyzer::DepInfoOf;
use super::function_analysis::FunctionAnalysisResult;
use super::nondet::NonDeterministicBlocks;
use crate::core::{InstKind, IrAdaptor, ValueKind};
use std::fmt::{self, Write};

/// `%name` for locals, `@name` for globals.
pub fn value_label<A: IrAdaptor>(adaptor: &A, value: A::ValueRef) -> String {
    let name = adaptor.value_name(value);
    if name.is_empty() {
        return format!("{:?}", value);
    }
    match adaptor.value_kind(value) {
        ValueKind::Global => format!("@{}", name),
        _ => format!("%{}", name),
    }
}

pub fn format_dep<A: IrAdaptor>(adaptor: &A, info: &DepInfoOf<A>) -> String {
    if !info.is_dependent() {
        return info.dependency().to_string();
    }
    let sources: Vec<_> = info.sources().iter().map(|&s| value_label(adaptor, s)).collect();
    format!("dependent [{}]", sources.join(", "))
}

fn inst_label<A: IrAdaptor>(adaptor: &A, inst: A::InstRef) -> String {
    let opcode = match adaptor.inst_opcode(inst) {
        "" => format!("{:?}", adaptor.inst_kind(inst)).to_lowercase(),
        op => op.to_string(),
    };
    if adaptor.inst_has_result(inst) || adaptor.inst_kind(inst) == InstKind::Phi {
        format!("{} = {}", value_label(adaptor, adaptor.inst_value(inst)), opcode)
    } else {
        opcode
    }
}

/// Fact of every instruction, block by block in reverse post-order.
pub fn write_dependencies<A: IrAdaptor>(
    out: &mut impl Write,
    adaptor: &A,
    result: &FunctionAnalysisResult<A>,
) -> fmt::Result {
    writeln!(out, "Dependencies for {}", adaptor.func_link_name(result.func()))?;
    for &block in result.order() {
        writeln!(out, "{}:", adaptor.block_name(block))?;
        for inst in adaptor.block_insts(block) {
            if let Some(info) = result.instruction_dep(inst) {
                writeln!(out, "  {}: {}", inst_label(adaptor, inst), format_dep(adaptor, info))?;
            }
        }
    }
    writeln!(out, "End Dependencies")
}

/// Out-argument, callee argument and return facts.
pub fn write_effects<A: IrAdaptor>(
    out: &mut impl Write,
    adaptor: &A,
    result: &FunctionAnalysisResult<A>,
) -> fmt::Result {
    writeln!(out, "Effects for {}", adaptor.func_link_name(result.func()))?;
    for (&arg, info) in result.out_args() {
        writeln!(out, "  out {}: {}", value_label(adaptor, arg), format_dep(adaptor, info))?;
    }
    for (&(callee, position), info) in result.call_args() {
        writeln!(
            out,
            "  call {}#{}: {}",
            adaptor.func_link_name(callee),
            position,
            format_dep(adaptor, info)
        )?;
    }
    if let Some(info) = result.return_dep() {
        writeln!(out, "  return: {}", format_dep(adaptor, info))?;
    }
    writeln!(out, "End Effects")
}

pub fn write_non_deterministic<A: IrAdaptor>(
    out: &mut impl Write,
    adaptor: &A,
    func: A::FuncRef,
    nondet: &NonDeterministicBlocks<A>,
) -> fmt::Result {
    writeln!(out, "Non-deterministic blocks for {}", adaptor.func_link_name(func))?;
    for &block in nondet.blocks() {
        writeln!(out, "{}", adaptor.block_name(block))?;
    }
    writeln!(out, "End Non-deterministic blocks")
}

pub fn write_cut_vertices<A: IrAdaptor>(
    out: &mut impl Write,
    adaptor: &A,
    func: A::FuncRef,
    blocks: &[A::BlockRef],
) -> fmt::Result {
    writeln!(out, "Cut vertices for {}", adaptor.func_link_name(func))?;
    for &block in blocks {
        writeln!(out, "{}", adaptor.block_name(block))?;
    }
    writeln!(out, "End Cut vertices")
}
