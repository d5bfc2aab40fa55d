use crate::transform::TransformerConfig;
use log::Level;
use serde::{Deserialize, Serialize};

/// How chatty the parser, evaluator and codecs are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Errors only; nothing is logged.
    Silent,
    /// Warnings such as input that matched no record field.
    #[default]
    Warning,
    /// Progress updates.
    Updates,
    /// Internal tracing of every classified line.
    All,
}

impl DebugLevel {
    /// Whether a message at `level` should be emitted.
    pub fn allows(self, level: Level) -> bool {
        let required = match level {
            Level::Error | Level::Warn => DebugLevel::Warning,
            Level::Info | Level::Debug => DebugLevel::Updates,
            Level::Trace => DebugLevel::All,
        };
        self >= required
    }
}

/// Configuration threaded through every parse, evaluation, encode and
/// transform call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub debug: DebugLevel,
    /// Heading level given to the root record when encoding.
    pub block_level: usize,
    pub transformer: TransformerConfig,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            debug: DebugLevel::default(),
            block_level: 1,
            transformer: TransformerConfig::default(),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_debug(mut self, debug: DebugLevel) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_block_level(mut self, block_level: usize) -> Self {
        self.block_level = block_level;
        self
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: TransformerConfig) -> Self {
        self.transformer = transformer;
        self
    }

    /// Loads a context from YAML; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if the text is not a valid context.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Loads a context from JSON; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if the text is not a valid context.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub(crate) fn enabled(&self, level: Level) -> bool {
        self.debug.allows(level)
    }
}
