//! inputdep - input-dependency analysis for SSA control-flow graphs.
//!
//! Given a procedure as basic blocks of SSA instructions, the analysis
//! decides for every instruction whether its result (or, for branches, its
//! decision) can be influenced by program input, and which input sources
//! are responsible. Facts computed optimistically on the first pass over a
//! block are corrected in place once all predecessors are known, so loops
//! and merge points are handled without re-analysing whole blocks.
//!
//! # Primary Usage
//!
//! ```ignore
//! use inputdep::analysis::ModuleAnalysis;
//! use inputdep::core::AnalysisConfig;
//! use inputdep::test_ir::{SyntacticAliasOracle, TestIR, TestIRAdaptor};
//!
//! let ir = TestIR::parse(&text)?;
//! let adaptor = TestIRAdaptor::new(&ir);
//! let oracle = SyntacticAliasOracle::new(adaptor);
//! let config = AnalysisConfig::default();
//! let result = ModuleAnalysis::new(&adaptor, &oracle, &config).run()?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - IR adaptor seam, CFG ordering, configuration and errors
//! - [`analysis`] - the dependency lattice, block and procedure analysers,
//!   non-deterministic block detection and reports
//! - [`test_ir`] - a small textual IR for tests and the command line driver

pub mod analysis;
pub mod core;
pub mod test_ir;

pub use analysis::{
    DepInfo, Dependency, FunctionAnalysis, FunctionAnalysisResult, ModuleAnalysis,
    ModuleAnalysisResult, NonDeterministicBlocks,
};
pub use core::{AnalysisConfig, AnalysisError, AnalysisResult, InputScope, IrAdaptor};
