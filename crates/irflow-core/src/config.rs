//! Analysis configuration loaded from JSON

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataflow::SolverStrategy;
use crate::error::ConfigError;

/// How results are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub strategy: SolverStrategy,
    /// Run constant folding after the analysis converges
    pub fold: bool,
    /// Check solver properties on every analysed function
    pub verify: bool,
    pub output: OutputFormat,
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
