use std::collections::{BTreeSet, HashSet};

use anyhow::Context;
use drydock_core::{DescriptorSource, PackageDescriptor};
use drydock_db::PackageDb;
use drydock_graph::{simple_cycles, DepGraph, GraphCache, NodeAttrs};
use tracing::{debug, error, info, warn};

use crate::decision::{Decision, DecisionProvider, DeclineAll};
use crate::error::ResolveError;
use crate::{detect_orphans, mark_for_rebuild};

/// Behavior switches, loaded from configuration. Defaults match the engine's
/// documented behavior table: no optional prompting, caching on.
#[derive(Debug, Clone, Copy)]
pub struct ResolverPolicy {
    pub resolve_optional: bool,
    pub cache_graph: bool,
    pub prefer_cached_graph: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            resolve_optional: false,
            cache_graph: true,
            prefer_cached_graph: true,
        }
    }
}

/// Outcome of one resolution run. Cycles are reported as data: a non-empty
/// cycle report means the resolution failed and the (empty) build order must
/// not be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub build_order: Vec<String>,
    pub cycles: Vec<Vec<String>>,
}

impl Resolution {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Drives dependency resolution over one graph instance: lazy graph
/// population from the descriptor source, the optional-dependency decision
/// protocol, cycle detection, build ordering, orphan detection, and rebuild
/// impact. Single-threaded; one live resolver per process.
pub struct Resolver<S, D> {
    graph: DepGraph,
    source: S,
    db: D,
    cache: Option<GraphCache>,
    policy: ResolverPolicy,
}

impl<S: DescriptorSource, D: PackageDb> Resolver<S, D> {
    pub fn new(source: S, db: D, cache: Option<GraphCache>, policy: ResolverPolicy) -> Self {
        let graph = match &cache {
            Some(cache) if policy.prefer_cached_graph => cache.load(),
            _ => DepGraph::new(),
        };
        Self {
            graph,
            source,
            db,
            cache,
            policy,
        }
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// Resolves the transitive dependency set of `root` and computes its
    /// build order, or a cycle report when the resolved subgraph is cyclic.
    /// The decision provider is consulted only when the policy enables
    /// optional resolution and the caller allows prompting.
    pub fn resolve(
        &mut self,
        root: &str,
        decisions: &mut dyn DecisionProvider,
        allow_optional_prompt: bool,
    ) -> Result<Resolution, ResolveError> {
        if !self.graph.contains(root) && !self.describe(root)? {
            warn!(package = root, "package not found in graph or ports tree");
            return Err(ResolveError::PackageNotFound(root.to_string()));
        }

        self.populate_closure(root)?;
        let mut deps = self.graph.reachable_from(root);

        let optional_pairs = self.collect_optional_pairs(root, &deps);
        if allow_optional_prompt && self.policy.resolve_optional {
            for (parent, candidate) in optional_pairs {
                if decisions.decide(&parent, &candidate) != Decision::Include {
                    continue;
                }
                debug!(parent = %parent, candidate = %candidate, "including optional dependency");
                if !self.graph.contains(&candidate) && !self.describe(&candidate)? {
                    warn!(
                        parent = %parent,
                        candidate = %candidate,
                        "accepted optional dependency not found, skipping"
                    );
                    continue;
                }
                self.populate_closure(&candidate)?;
                // The candidate's own membership still comes from real
                // edges; only its dependency closure is merged.
                deps.extend(self.graph.reachable_from(&candidate));
            }
        }

        let mut members: BTreeSet<String> = deps;
        members.insert(root.to_string());
        let subgraph = self.graph.subgraph(&members);

        let cycles = simple_cycles(&subgraph);
        if !cycles.is_empty() {
            error!(package = root, ?cycles, "dependency cycles detected");
            return Ok(Resolution {
                build_order: Vec::new(),
                cycles,
            });
        }

        let build_order = subgraph
            .build_order()
            .context("topological sort failed")?;
        Ok(Resolution {
            build_order,
            cycles: Vec::new(),
        })
    }

    /// Packages in `root`'s build order with no installed record. Cycles make
    /// this an empty list with a logged error; callers that must distinguish
    /// "nothing missing" from "resolution failed" check for cycles
    /// themselves.
    pub fn missing_deps(&mut self, root: &str) -> Result<Vec<String>, ResolveError> {
        let resolution = self.resolve(root, &mut DeclineAll, false)?;
        if resolution.has_cycles() {
            error!(package = root, "cannot compute missing deps due to cycles");
            return Ok(Vec::new());
        }

        Ok(resolution
            .build_order
            .into_iter()
            .filter(|pkg| pkg != root)
            .filter(|pkg| !self.is_installed(pkg))
            .collect())
    }

    /// Build/install order for `root`, dependencies first, optionally
    /// dropping already-installed packages. Unlike `missing_deps` this
    /// propagates cycles as an error.
    pub fn install_order(
        &mut self,
        root: &str,
        skip_installed: bool,
    ) -> Result<Vec<String>, ResolveError> {
        let resolution = self.resolve(root, &mut DeclineAll, false)?;
        if resolution.has_cycles() {
            return Err(ResolveError::CycleDetected(resolution.cycles));
        }

        let mut order: Vec<String> = resolution
            .build_order
            .into_iter()
            .filter(|pkg| pkg != root)
            .filter(|pkg| {
                if skip_installed && self.is_installed(pkg) {
                    debug!(package = %pkg, "skipping installed package");
                    return false;
                }
                true
            })
            .collect();

        if !(skip_installed && self.is_installed(root)) {
            order.push(root.to_string());
        }
        Ok(order)
    }

    /// Rebuilds the graph from the full descriptor corpus, then persists it
    /// when caching is enabled. `on_descriptor` observes each descriptor as
    /// it lands (progress reporting). Returns the number of packages added.
    pub fn sync_from_ports<F>(&mut self, mut on_descriptor: F) -> Result<usize, ResolveError>
    where
        F: FnMut(&PackageDescriptor),
    {
        info!("scanning ports tree to build dependency graph");
        self.graph = DepGraph::new();

        let descriptors = self
            .source
            .enumerate_all()
            .context("failed scanning descriptor corpus")?;
        let count = descriptors.len();
        for descriptor in &descriptors {
            self.graph.add_package(descriptor);
            on_descriptor(descriptor);
        }
        info!(count, "scanned ports tree");

        self.persist_cache();
        Ok(count)
    }

    /// Installed packages no known package depends on. Database failures
    /// degrade to an empty report with a warning.
    pub fn detect_orphans(&self) -> Vec<String> {
        detect_orphans(&self.graph, &self.db)
    }

    /// Packages that must be rebuilt when `pkg` changes, farthest dependents
    /// first.
    pub fn mark_for_rebuild(&self, pkg: &str) -> Vec<String> {
        mark_for_rebuild(&self.graph, &self.db, pkg)
    }

    /// Writes the graph through the cache if one is configured and caching
    /// is enabled. Persist failures are logged; in-memory state stands.
    pub fn persist_cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if !self.policy.cache_graph {
            return;
        }
        if let Err(err) = cache.persist(&self.graph) {
            warn!(%err, "failed persisting dependency graph cache");
        }
    }

    fn is_installed(&self, name: &str) -> bool {
        match self.db.query(name) {
            Ok(record) => record.is_some(),
            Err(err) => {
                // Conservative: an unreachable database must never yield a
                // false "already satisfied".
                warn!(package = name, %err, "database query failed, treating as not installed");
                false
            }
        }
    }

    /// Fetches and adds one package's descriptor. `Ok(false)` means the
    /// source has no descriptor for the name.
    fn describe(&mut self, name: &str) -> Result<bool, ResolveError> {
        match self
            .source
            .find(name)
            .with_context(|| format!("descriptor lookup failed for '{name}'"))?
        {
            Some(descriptor) => {
                self.graph.add_package(&descriptor);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Describes placeholder nodes reachable from `root` until a fixpoint,
    /// so a resolution against a cold graph still sees the full closure.
    /// Each name is queried at most once per call.
    fn populate_closure(&mut self, root: &str) -> Result<(), ResolveError> {
        let mut attempted: HashSet<String> = HashSet::new();
        loop {
            let mut frontier: Vec<String> = Vec::new();
            let mut members = self.graph.reachable_from(root);
            members.insert(root.to_string());
            for name in members {
                let is_placeholder = self
                    .graph
                    .attrs(&name)
                    .map(|attrs| *attrs == NodeAttrs::default())
                    .unwrap_or(false)
                    && self.graph.dependencies_of(&name).is_empty();
                if is_placeholder && !attempted.contains(&name) {
                    frontier.push(name);
                }
            }
            if frontier.is_empty() {
                return Ok(());
            }
            for name in frontier {
                if !self.describe(&name)? {
                    debug!(package = %name, "no descriptor for dependency, leaving placeholder");
                }
                attempted.insert(name);
            }
        }
    }

    fn collect_optional_pairs(&self, root: &str, deps: &BTreeSet<String>) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut visited: Vec<&str> = vec![root];
        visited.extend(deps.iter().map(String::as_str));
        for parent in visited {
            if let Some(attrs) = self.graph.attrs(parent) {
                for candidate in &attrs.optional {
                    pairs.push((parent.to_string(), candidate.clone()));
                }
            }
        }
        pairs
    }
}
