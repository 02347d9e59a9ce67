//! IR transformations driven by dataflow results

mod fold;

pub use fold::{constant_folding, fold_block, Rewrite};
