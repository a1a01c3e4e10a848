use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{DepGraph, GraphSnapshot};

/// Persists the dependency graph as a JSON snapshot. Load failures of any
/// kind degrade to an empty graph; the resolver then rebuilds lazily.
#[derive(Debug, Clone)]
pub struct GraphCache {
    path: PathBuf,
}

impl GraphCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted snapshot. Missing, unreadable, or structurally
    /// invalid caches yield an empty graph with a logged warning, never an
    /// error.
    pub fn load(&self) -> DepGraph {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no graph cache present");
                return DepGraph::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed reading graph cache, starting empty");
                return DepGraph::new();
            }
        };

        match serde_json::from_str::<GraphSnapshot>(&raw) {
            Ok(snapshot) => {
                let graph = DepGraph::deserialize(snapshot);
                info!(
                    path = %self.path.display(),
                    nodes = graph.node_count(),
                    "loaded dependency graph cache"
                );
                graph
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "graph cache is corrupt, starting empty");
                DepGraph::new()
            }
        }
    }

    /// Writes the snapshot to a temporary file beside the target and renames
    /// it into place, so an interrupted write never leaves a partial cache
    /// observable by a later `load`.
    pub fn persist(&self, graph: &DepGraph) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating cache directory: {}", parent.display()))?;
        }

        let payload = serde_json::to_string_pretty(&graph.serialize())
            .context("failed serializing graph snapshot")?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, payload)
            .with_context(|| format!("failed writing graph cache: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("failed replacing graph cache: {}", self.path.display())
        })?;

        info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            "persisted dependency graph cache"
        );
        Ok(())
    }
}
