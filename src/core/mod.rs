// This module is the hub for the infrastructure the input-dependency analysis is built on,
// shared by every IR it can run over. It exports the IrAdaptor trait (the only way the
// analysis reads IR), the CFG analyzer that orders blocks and finds loop nests, the
// analysis configuration that decides what counts as program input, and the error types.
// Nothing here knows about dependency facts; the analysis proper lives in `analysis`.

//! Core infrastructure.
//!
//! # Key Components
//!
//! ## IR access (`adaptor`)
//! - [`IrAdaptor`] trait with opaque, copyable handles
//! - [`InstKind`] / [`ValueKind`] classification used by the dependency rules
//!
//! ## Block structure (`analyzer`)
//! - Reverse post-order of reachable blocks
//! - Predecessor lists and strongly connected components
//!
//! ## Configuration (`config`)
//! - Entry procedure, input scope, input functions and globals
//!
//! ## Errors (`error`)
//! - Fatal [`AnalysisError`]s and the recoverable [`AliasError`]

pub mod adaptor;
pub mod analyzer;
pub mod config;
pub mod error;

pub use adaptor::{InstKind, IrAdaptor, ValueKind};
pub use analyzer::{CfgAnalyzer, Component};
pub use config::{AnalysisConfig, InputScope};
pub use error::{AliasError, AnalysisError, AnalysisResult, ConfigError};
