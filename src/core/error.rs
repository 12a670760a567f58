// This module defines the error types of the input-dependency analysis using the thiserror
// crate. AnalysisError is the main enum and covers the fatal conditions of a procedure's
// analysis: an operand queried before the block defining it was analysed (a traversal
// order defect in the driver), a procedure without an entry block, a reference to an
// unknown function, a loop fixpoint that fails to settle within the configured number of
// rounds, configuration problems and Test IR parse failures. Recoverable conditions such as
// unresolvable storage or a failing alias query never surface here; they are folded into
// conservative dependency facts by the analysers. Identities are carried as printable
// names so the enum stays independent of the concrete IR handle types.

//! Error types for the input-dependency analysis.

use thiserror::Error;

/// Fatal analysis errors.
///
/// Any of these aborts the analysis of the procedure it was raised for; the
/// module driver records it as that procedure's failure and carries on with
/// the rest of the module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("operand {value} used in block {block} has no recorded dependency and no visited definition")]
    TraversalOrder {
        value: String,
        block: String,
    },

    #[error("function {function} has no entry block")]
    MissingEntry {
        function: String,
    },

    #[error("function not found: {name}")]
    UnknownFunction {
        name: String,
    },

    #[error("fixpoint for function {function} did not settle after {rounds} rounds")]
    FixpointDiverged {
        function: String,
        rounds: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to parse IR: {reason}")]
    Parse {
        reason: String,
    },
}

/// Failure of an alias-oracle query.
///
/// Callers treat a failed query as "may alias".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias oracle unavailable")]
    Unavailable,

    #[error("alias query failed: {reason}")]
    QueryFailed {
        reason: String,
    },
}

/// Problems loading an [`AnalysisConfig`](super::config::AnalysisConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not read {path}: {reason}")]
    Read {
        path: String,
        reason: String,
    },

    #[error("malformed configuration: {0}")]
    Malformed(String),

    #[error("max_fixpoint_rounds must be at least 1")]
    ZeroFixpointRounds,
}

/// Result type alias for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
