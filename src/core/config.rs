//! Analysis configuration.
//!
//! Which values count as program input is a policy decision, not something the
//! IR can tell us. [`AnalysisConfig`] makes it explicit: the entry procedure,
//! how far the input set extends beyond the entry's parameters, and which
//! callees and globals deliver external input. It can be built in code or
//! loaded from TOML:
//!
//! ```toml
//! entry_function = "main"
//! input_scope = "interprocedural"
//! input_functions = ["getenv", "read"]
//! input_globals = ["environ"]
//! max_fixpoint_rounds = 1000
//! parallel = true
//! ```

use super::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Which procedure parameters seed the input set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputScope {
    /// Only the entry procedure's parameters are inputs.
    #[default]
    EntryArguments,
    /// Every procedure's parameters are inputs.
    AllArguments,
    /// Entry parameters, plus any callee parameter that receives an
    /// input-dependent argument at some call site, iterated to a fixpoint.
    Interprocedural,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub entry_function: String,
    pub input_scope: InputScope,
    /// Callees whose result, and whatever they write through pointer
    /// arguments, is external input.
    pub input_functions: Vec<String>,
    /// Globals whose initial content is external input.
    pub input_globals: Vec<String>,
    /// Upper bound on reflection rounds per loop nest.
    pub max_fixpoint_rounds: usize,
    /// Analyse independent procedures on the rayon thread pool.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            entry_function: "main".to_string(),
            input_scope: InputScope::default(),
            input_functions: Vec::new(),
            input_globals: Vec::new(),
            max_fixpoint_rounds: 10_000,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fixpoint_rounds == 0 {
            return Err(ConfigError::ZeroFixpointRounds);
        }
        Ok(())
    }

    pub fn with_entry(mut self, name: impl Into<String>) -> Self {
        self.entry_function = name.into();
        self
    }

    pub fn with_scope(mut self, scope: InputScope) -> Self {
        self.input_scope = scope;
        self
    }

    pub fn with_input_function(mut self, name: impl Into<String>) -> Self {
        self.input_functions.push(name.into());
        self
    }

    pub fn with_input_global(mut self, name: impl Into<String>) -> Self {
        self.input_globals.push(name.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_input_function(&self, name: &str) -> bool {
        self.input_functions.iter().any(|f| f == name)
    }

    pub fn is_input_global(&self, name: &str) -> bool {
        self.input_globals.iter().any(|g| g == name)
    }
}
