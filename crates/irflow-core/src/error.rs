//! Error types for IR construction and configuration loading
//!
//! The analysis and the folding pass are total over well-formed IR and do not
//! produce errors; everything here is raised while building or loading input.

use std::path::PathBuf;
use thiserror::Error;

use crate::ir::{BlockId, Var};

/// Malformed IR rejected by [`FunctionBuilder::build`](crate::ir::FunctionBuilder::build)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("block {0} does not belong to this function")]
    UnknownBlock(BlockId),

    #[error("entry block cannot have a predecessor (edge from {0})")]
    EntryHasPredecessors(BlockId),

    #[error("exit block cannot have a successor (edge to {0})")]
    ExitHasSuccessors(BlockId),

    #[error("statement in {block} jumps to unknown block {target}")]
    UnknownBranchTarget { block: BlockId, target: BlockId },

    #[error("parameter {0} declared more than once")]
    DuplicateParam(Var),
}

/// Failure while reading a configuration or function description from disk
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
