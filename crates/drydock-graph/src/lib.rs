mod cache;
mod cycles;
mod export;
mod graph;

pub use cache::GraphCache;
pub use cycles::simple_cycles;
pub use export::{render_graph, GraphExportError, GraphFormat};
pub use graph::{DepGraph, GraphSnapshot, NodeAttrs, NodeRecord};
