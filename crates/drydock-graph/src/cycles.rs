use std::collections::HashSet;

use crate::DepGraph;

/// Enumerates every simple cycle in the graph. Each cycle is anchored at its
/// lexicographically smallest member, so each is reported exactly once and
/// the report is deterministic: cycles appear in anchor order, members in
/// traversal order starting at the anchor.
pub fn simple_cycles(graph: &DepGraph) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    for anchor in graph.node_names() {
        let mut path: Vec<String> = vec![anchor.clone()];
        let mut on_path: HashSet<String> = HashSet::new();
        on_path.insert(anchor.clone());
        walk(graph, anchor, anchor, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn walk(
    graph: &DepGraph,
    anchor: &str,
    current: &str,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    cycles: &mut Vec<Vec<String>>,
) {
    for dep in graph.dependencies_of(current) {
        if dep == anchor {
            cycles.push(path.clone());
            continue;
        }
        // Restricting the walk to nodes above the anchor makes the anchor
        // the unique minimal member of every cycle reported from it.
        if dep.as_str() < anchor || on_path.contains(&dep) {
            continue;
        }
        path.push(dep.clone());
        on_path.insert(dep.clone());
        walk(graph, anchor, &dep, path, on_path, cycles);
        on_path.remove(&dep);
        path.pop();
    }
}
