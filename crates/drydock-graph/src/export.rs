use std::fmt::Write as _;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::DepGraph;

#[derive(Error, Debug)]
pub enum GraphExportError {
    #[error("unsupported graph format: {0}")]
    Unsupported(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GraphFormat {
    Json,
    Dot,
}

impl GraphFormat {
    /// Parses a format name. Rejection happens before any output exists, so
    /// an unsupported request never leaves a partial file behind.
    pub fn parse(name: &str) -> Result<Self, GraphExportError> {
        match name {
            "json" => Ok(Self::Json),
            "dot" => Ok(Self::Dot),
            other => Err(GraphExportError::Unsupported(other.to_string())),
        }
    }
}

/// Renders the graph in the requested format: `json` is the cache snapshot
/// shape pretty-printed, `dot` a plain digraph listing.
pub fn render_graph(graph: &DepGraph, format: GraphFormat) -> Result<String> {
    match format {
        GraphFormat::Json => serde_json::to_string_pretty(&graph.serialize())
            .context("failed serializing graph snapshot"),
        GraphFormat::Dot => Ok(render_dot(graph)),
    }
}

fn render_dot(graph: &DepGraph) -> String {
    let mut out = String::from("digraph deps {\n");
    for name in graph.node_names() {
        let _ = writeln!(out, "    {:?};", name);
    }
    for name in graph.node_names() {
        for dep in graph.dependencies_of(name) {
            let _ = writeln!(out, "    {:?} -> {:?};", name, dep);
        }
    }
    out.push_str("}\n");
    out
}
