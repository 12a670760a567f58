// This module holds the input-dependency analysis proper. Facts live in the DepInfo lattice
// (dep_info). A BasicBlockAnalyzer classifies one block's instructions against its live-in
// facts (block_analyzer); its reflecting variant keeps a reverse-dependency index so loop
// headers and join points can be corrected when predecessor facts improve (reflecting). The
// procedure driver orders blocks and runs reflection to a fixpoint (function_analysis), the
// module driver fans procedures out over rayon and propagates inputs across calls
// (module_analysis). Clients on top of the facts: the non-deterministic block detector
// (nondet), the CFG cut vertices (cut_vertices) and the text reports (report).

//! Input-dependency analysis.
//!
//! # Key Components
//!
//! ## Facts
//! - [`DepInfo`]: `Unknown < Independent < Dependent(sources)`
//! - [`ValueDependencies`]: facts per value at a block boundary
//!
//! ## Analysers
//! - [`BasicBlockAnalyzer`] / [`ReflectingBlockAnalyzer`]
//! - [`FunctionAnalysis`] and [`ModuleAnalysis`] drivers
//!
//! ## Clients
//! - [`NonDeterministicBlocks`] and [`cut_vertices`]

pub mod alias;
pub mod block_analyzer;
pub mod context;
pub mod cut_vertices;
pub mod dep_info;
pub mod function_analysis;
pub mod module_analysis;
pub mod nondet;
pub mod reflecting;
pub mod report;

pub use alias::{AliasOracle, ConservativeAliasOracle, NoAliasOracle};
pub use block_analyzer::{
    BasicBlockAnalysisResult, BasicBlockAnalyzer, DepInfoOf, Dependent, DependencySink,
    DependentOf, NoIndex, ValueDependencies,
};
pub use context::AnalysisContext;
pub use cut_vertices::cut_vertices;
pub use dep_info::{DepInfo, Dependency};
pub use function_analysis::{FunctionAnalysis, FunctionAnalysisResult};
pub use module_analysis::{CallGraph, ModuleAnalysis, ModuleAnalysisResult};
pub use nondet::NonDeterministicBlocks;
pub use reflecting::{ReflectOutcome, ReflectingBlockAnalyzer, ReverseIndex};
