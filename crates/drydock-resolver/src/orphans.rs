use drydock_db::PackageDb;
use drydock_graph::DepGraph;
use tracing::warn;

/// Installed packages with an empty reverse-dependency set in the loaded
/// graph, in the database's listing order. Conservative: a package the
/// graph has never seen has no recorded dependents and is reported when
/// installed.
pub fn detect_orphans<D: PackageDb>(graph: &DepGraph, db: &D) -> Vec<String> {
    let installed = match db.list_installed() {
        Ok(installed) => installed,
        Err(err) => {
            warn!(%err, "failed listing installed packages, cannot detect orphans");
            return Vec::new();
        }
    };

    let reverse = graph.reverse_dependencies();
    installed
        .into_iter()
        .filter(|name| reverse.get(name).map_or(true, |dependents| dependents.is_empty()))
        .collect()
}
