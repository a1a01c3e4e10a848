use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use anyhow::{anyhow, Result};
use drydock_core::PackageDescriptor;
use serde::{Deserialize, Serialize};

/// Attributes recorded against a described node. A placeholder node (one
/// only ever referenced as a dependency) carries the default value and
/// serializes as an empty mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<String>,
}

/// One node in the persisted/exported shape: its attributes plus the sorted,
/// deduplicated list of direct dependency names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub attrs: NodeAttrs,
    #[serde(default)]
    pub deps: Vec<String>,
}

/// The on-disk cache and export mapping: node name to record.
pub type GraphSnapshot = BTreeMap<String, NodeRecord>;

/// Directed dependency graph over package names. An edge `A -> B` means
/// "A depends on B". At most one edge per ordered pair; self-loops are
/// dropped at every insertion point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepGraph {
    nodes: BTreeMap<String, NodeAttrs>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn attrs(&self, name: &str) -> Option<&NodeAttrs> {
        self.nodes.get(name)
    }

    /// Direct dependencies of `name` (empty for unknown nodes).
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<String> {
        self.edges.get(name).cloned().unwrap_or_default()
    }

    pub fn ensure_node(&mut self, name: &str) {
        if !self.nodes.contains_key(name) {
            self.nodes.insert(name.to_string(), NodeAttrs::default());
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.ensure_node(from);
        self.ensure_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Inserts or updates the node for the descriptor and one edge per
    /// distinct build/runtime dependency. Attributes already present on a
    /// placeholder are upgraded, never dropped: an absent field in the new
    /// descriptor keeps whatever an earlier one recorded. Idempotent.
    pub fn add_package(&mut self, descriptor: &PackageDescriptor) {
        let attrs = self.nodes.entry(descriptor.name.clone()).or_default();

        if descriptor.version.is_some() {
            attrs.version = descriptor.version.clone();
        }
        if !descriptor.origin.is_empty() {
            attrs.origin = Some(descriptor.origin.clone());
        }
        if !descriptor.provides.is_empty() {
            attrs.provides = descriptor.provides.clone();
        }
        if !descriptor.optional_depends.is_empty() {
            attrs.optional = descriptor.optional_depends.clone();
        }

        for dep in descriptor.dependencies() {
            self.add_edge(&descriptor.name, &dep);
        }
    }

    /// Nodes reachable from `root` via dependency edges, excluding `root`
    /// itself. Empty for unknown roots.
    pub fn reachable_from(&self, root: &str) -> BTreeSet<String> {
        let mut reachable = BTreeSet::new();
        if !self.contains(root) {
            return reachable;
        }

        let mut stack: Vec<&str> = vec![root];
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = self.edges.get(current) {
                for dep in deps {
                    reachable.insert(dep.clone());
                    stack.push(dep.as_str());
                }
            }
        }

        reachable.remove(root);
        reachable
    }

    /// Whether a directed path `from -> ... -> to` exists. A known node has a
    /// zero-length path to itself.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.shortest_path_length(from, to).is_some()
    }

    /// BFS distance in edges, `None` when no path exists. `Some(0)` for a
    /// node queried against itself; callers rely on the distinction.
    pub fn shortest_path_length(&self, from: &str, to: &str) -> Option<usize> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(0);
        }

        let mut distances: BTreeMap<&str, usize> = BTreeMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        distances.insert(from, 0);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            let next_distance = distances[current] + 1;
            if let Some(deps) = self.edges.get(current) {
                for dep in deps {
                    if dep == to {
                        return Some(next_distance);
                    }
                    if !distances.contains_key(dep.as_str()) {
                        distances.insert(dep.as_str(), next_distance);
                        queue.push_back(dep.as_str());
                    }
                }
            }
        }

        None
    }

    /// Induced subgraph over the known nodes in `names`, keeping attributes
    /// and every edge whose endpoints both survive.
    pub fn subgraph(&self, names: &BTreeSet<String>) -> DepGraph {
        let mut sub = DepGraph::new();
        for name in names {
            if let Some(attrs) = self.nodes.get(name) {
                sub.nodes.insert(name.clone(), attrs.clone());
            }
        }
        for (from, deps) in &self.edges {
            if !sub.nodes.contains_key(from) {
                continue;
            }
            for to in deps {
                if sub.nodes.contains_key(to) {
                    sub.edges
                        .entry(from.clone())
                        .or_default()
                        .insert(to.clone());
                }
            }
        }
        sub
    }

    /// Reverse-dependency map over the whole graph: for every edge `A -> B`,
    /// `B`'s entry gains `A`. Every node has an entry, possibly empty.
    pub fn reverse_dependencies(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut reverse: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for name in self.nodes.keys() {
            reverse.entry(name.clone()).or_default();
        }
        for (from, deps) in &self.edges {
            for to in deps {
                reverse.entry(to.clone()).or_default().insert(from.clone());
            }
        }
        reverse
    }

    /// Kahn's algorithm under the depends-on orientation, emitting
    /// dependencies before dependents with lexicographic tie-breaks. Errors
    /// name the cycle-involved nodes; callers that need the cycles
    /// themselves run `simple_cycles` first.
    pub fn build_order(&self) -> Result<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for name in self.nodes.keys() {
            in_degree.insert(name.as_str(), 0);
            reverse.insert(name.as_str(), BTreeSet::new());
        }
        for (from, deps) in &self.edges {
            in_degree.insert(from.as_str(), deps.len());
            for to in deps {
                reverse.entry(to.as_str()).or_default().insert(from.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
            .collect();
        let mut ordered = Vec::new();

        while let Some(next) = ready.pop_first() {
            ordered.push(next.to_string());
            if let Some(dependents) = reverse.get(next) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            ready.insert(*dependent);
                        }
                    }
                }
            }
        }

        if ordered.len() != self.nodes.len() {
            let ordered_set: HashSet<&str> = ordered.iter().map(String::as_str).collect();
            let cycle_nodes = self
                .nodes
                .keys()
                .filter(|name| !ordered_set.contains(name.as_str()))
                .cloned()
                .collect::<Vec<_>>();
            return Err(anyhow!(
                "dependency cycle detected involving: {}",
                cycle_nodes.join(", ")
            ));
        }

        Ok(ordered)
    }

    /// Snapshot in the persisted/exported shape. `deserialize(serialize(g))`
    /// is graph-equal to `g` for any graph built through `add_package`.
    pub fn serialize(&self) -> GraphSnapshot {
        self.nodes
            .iter()
            .map(|(name, attrs)| {
                let deps = self
                    .edges
                    .get(name)
                    .map(|deps| deps.iter().cloned().collect())
                    .unwrap_or_default();
                (
                    name.clone(),
                    NodeRecord {
                        attrs: attrs.clone(),
                        deps,
                    },
                )
            })
            .collect()
    }

    pub fn deserialize(snapshot: GraphSnapshot) -> DepGraph {
        let mut graph = DepGraph::new();
        for (name, record) in &snapshot {
            graph.nodes.insert(name.clone(), record.attrs.clone());
        }
        for (name, record) in &snapshot {
            for dep in &record.deps {
                graph.add_edge(name, dep);
            }
        }
        graph
    }
}
