//! Serializable description of a function
//!
//! Block numbering is implicit: `0` is the synthetic entry, `1` the synthetic
//! exit, and body blocks are numbered from `2` in the order they are listed.
//! Edges and jump targets use these numbers.
//!
//! ```json
//! {
//!   "name": "main",
//!   "params": [1],
//!   "blocks": [
//!     { "stmts": [ { "kind": "assign", "def": 2, "src": { "const": 3 } } ] }
//!   ],
//!   "edges": [[0, 2], [2, 1]]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{BlockId, Function, FunctionBuilder, Stmt, Var};
use crate::error::{ConfigError, IrError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Var>,
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    #[serde(default)]
    pub edges: Vec<(BlockId, BlockId)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

impl FunctionSpec {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

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

    /// Validate the description and build the function
    pub fn build(&self) -> Result<Function, IrError> {
        let mut builder = FunctionBuilder::new(self.name.clone());
        for &param in &self.params {
            builder.add_param(param)?;
        }
        for block in &self.blocks {
            let id = builder.new_block();
            for stmt in &block.stmts {
                builder.push(id, stmt.clone())?;
            }
        }
        for &(from, to) in &self.edges {
            builder.add_edge(from, to);
        }
        builder.build()
    }
}

impl From<&Function> for FunctionSpec {
    fn from(func: &Function) -> Self {
        let blocks = func
            .blocks()
            .iter()
            .filter(|block| block.id != func.entry() && block.id != func.exit())
            .map(|block| BlockSpec {
                stmts: block.stmts.clone(),
            })
            .collect();
        Self {
            name: func.name.clone(),
            params: func.params.clone(),
            blocks,
            edges: func.edges().collect(),
        }
    }
}
