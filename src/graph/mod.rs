/*!
## Rust Graph Module

This Rust module lowers the syntax tree into a program graph and runs the
semantic analysis over it: binding types and names, laying out static
data, checking and folding expressions, and computing memory offsets.

*/

mod analyze;
mod build;
mod check;
mod node;
mod source;
mod types;
mod variant;

pub mod fold;

pub use analyze::{analyze, is_addressable, needs_temp};
pub use build::build;
pub use node::{Ancestors, Frame, Graph, Node, NodeId, NodeKind, StaticData};
pub use source::to_source_code;
pub use types::{DataType, TypeId, Types};
pub use variant::{comparator, opcode, Variant};

use crate::lang::{parse, splice, Error, Loader};
use tracing::debug;

/// Load, parse and analyse a program and everything it imports.
pub fn load(loader: &dyn Loader, name: &str) -> Result<Graph, Error> {
    let lines = splice(loader, name)?;
    debug!(file = name, lines = lines.len(), "spliced");
    let program = parse(&lines)?;
    let mut graph = build(&program)?;
    analyze(&mut graph)?;
    Ok(graph)
}

#[cfg(test)]
mod tests;
