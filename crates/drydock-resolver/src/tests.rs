use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use drydock_core::{DescriptorSource, PackageDescriptor};
use drydock_db::{InstalledPackage, PackageDb};
use drydock_graph::GraphCache;
use serde_json::json;

use crate::{
    decision_prompt, mark_for_rebuild, Decision, DecisionProvider, DeclineAll, Resolution,
    ResolveError, Resolver, ResolverPolicy, ScriptedDecisions,
};

#[derive(Default)]
struct TableSource {
    descriptors: BTreeMap<String, PackageDescriptor>,
}

impl TableSource {
    fn with(mut self, name: &str, deps: &[&str], optional: &[&str]) -> Self {
        let doc = json!({
            "name": name,
            "runtime": { "depends": deps },
            "build": { "optional": optional }
        });
        let descriptor = PackageDescriptor::from_document(&doc).expect("must normalize");
        self.descriptors.insert(name.to_string(), descriptor);
        self
    }
}

impl DescriptorSource for TableSource {
    fn find(&self, name: &str) -> Result<Option<PackageDescriptor>> {
        Ok(self.descriptors.get(name).cloned())
    }

    fn enumerate_all(&self) -> Result<Vec<PackageDescriptor>> {
        Ok(self.descriptors.values().cloned().collect())
    }
}

#[derive(Default)]
struct FakeDb {
    installed: Vec<InstalledPackage>,
    revdeps: BTreeMap<String, Vec<String>>,
    unavailable: bool,
}

impl FakeDb {
    fn installed(mut self, names: &[&str]) -> Self {
        for name in names {
            self.installed.push(InstalledPackage {
                name: name.to_string(),
                version: Some("1.0".to_string()),
                dependencies: Vec::new(),
                installed_at_unix: None,
            });
        }
        self
    }

    fn revdeps(mut self, name: &str, dependents: &[&str]) -> Self {
        self.revdeps.insert(
            name.to_string(),
            dependents.iter().map(|d| d.to_string()).collect(),
        );
        self
    }
}

impl PackageDb for FakeDb {
    fn query(&self, name: &str) -> Result<Option<InstalledPackage>> {
        if self.unavailable {
            return Err(anyhow!("package database unavailable"));
        }
        Ok(self.installed.iter().find(|r| r.name == name).cloned())
    }

    fn list_installed(&self) -> Result<Vec<String>> {
        if self.unavailable {
            return Err(anyhow!("package database unavailable"));
        }
        Ok(self.installed.iter().map(|r| r.name.clone()).collect())
    }

    fn reverse_depends(&self, name: &str) -> Result<Vec<String>> {
        if self.unavailable {
            return Err(anyhow!("package database unavailable"));
        }
        Ok(self.revdeps.get(name).cloned().unwrap_or_default())
    }
}

struct RecordingProvider {
    asked: Vec<(String, String)>,
    answer: Decision,
}

impl DecisionProvider for RecordingProvider {
    fn decide(&mut self, parent: &str, candidate: &str) -> Decision {
        self.asked.push((parent.to_string(), candidate.to_string()));
        self.answer
    }
}

fn resolver(source: TableSource, db: FakeDb) -> Resolver<TableSource, FakeDb> {
    Resolver::new(source, db, None, ResolverPolicy::default())
}

#[test]
fn resolves_transitive_closure_from_cold_graph() {
    let source = TableSource::default()
        .with("app", &["lib"], &[])
        .with("lib", &["zlib"], &[])
        .with("zlib", &[], &[]);
    let mut resolver = resolver(source, FakeDb::default());

    let resolution = resolver
        .resolve("app", &mut DeclineAll, true)
        .expect("must resolve");
    assert_eq!(resolution, Resolution {
        build_order: vec!["zlib".to_string(), "lib".to_string(), "app".to_string()],
        cycles: Vec::new(),
    });
}

#[test]
fn unknown_root_is_package_not_found() {
    let mut resolver = resolver(TableSource::default(), FakeDb::default());
    let err = resolver
        .resolve("ghost", &mut DeclineAll, true)
        .expect_err("must fail for unknown package");
    assert!(matches!(err, ResolveError::PackageNotFound(name) if name == "ghost"));
}

#[test]
fn cycles_fail_resolution_with_a_report() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &["c"], &[])
        .with("c", &["a"], &[]);
    let mut resolver = resolver(source, FakeDb::default());

    let resolution = resolver
        .resolve("a", &mut DeclineAll, true)
        .expect("must produce a cycle report");
    assert!(resolution.has_cycles());
    assert!(resolution.build_order.is_empty());
    assert_eq!(
        resolution.cycles,
        vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
    );
}

#[test]
fn missing_deps_reports_uninstalled_in_build_order() {
    let source = TableSource::default()
        .with("a", &["b", "c"], &[])
        .with("b", &[], &[])
        .with("c", &[], &[]);
    let db = FakeDb::default().installed(&["b"]);
    let mut resolver = resolver(source, db);

    assert_eq!(resolver.missing_deps("a").expect("must resolve"), vec!["c"]);
}

#[test]
fn missing_deps_with_cycles_is_empty() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &["a"], &[]);
    let mut resolver = resolver(source, FakeDb::default());

    assert!(resolver.missing_deps("a").expect("must resolve").is_empty());
}

#[test]
fn missing_deps_treats_database_failure_as_not_installed() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &[], &[]);
    let db = FakeDb {
        unavailable: true,
        ..FakeDb::default().installed(&["b"])
    };
    let mut resolver = resolver(source, db);

    assert_eq!(resolver.missing_deps("a").expect("must resolve"), vec!["b"]);
}

#[test]
fn install_order_appends_root_and_skips_installed() {
    let source = TableSource::default()
        .with("app", &["lib", "zlib"], &[])
        .with("lib", &["zlib"], &[])
        .with("zlib", &[], &[]);
    let db = FakeDb::default().installed(&["zlib"]);
    let mut resolver = resolver(source, db);

    assert_eq!(
        resolver
            .install_order("app", true)
            .expect("must compute order"),
        vec!["lib", "app"]
    );
    assert_eq!(
        resolver
            .install_order("app", false)
            .expect("must compute order"),
        vec!["zlib", "lib", "app"]
    );
}

#[test]
fn install_order_omits_installed_root_when_skipping() {
    let source = TableSource::default()
        .with("app", &["lib"], &[])
        .with("lib", &[], &[]);
    let db = FakeDb::default().installed(&["app", "lib"]);
    let mut resolver = resolver(source, db);

    assert!(resolver
        .install_order("app", true)
        .expect("must compute order")
        .is_empty());
}

#[test]
fn install_order_propagates_cycles() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &["a"], &[]);
    let mut resolver = resolver(source, FakeDb::default());

    let err = resolver
        .install_order("a", false)
        .expect_err("must propagate cycles");
    assert!(matches!(err, ResolveError::CycleDetected(_)));
}

#[test]
fn optional_candidates_are_offered_with_parent_and_name() {
    let source = TableSource::default()
        .with("app", &["lib"], &["docs"])
        .with("lib", &[], &["extras"])
        .with("docs", &["sphinx"], &[])
        .with("sphinx", &[], &[]);
    let policy = ResolverPolicy {
        resolve_optional: true,
        ..Default::default()
    };
    let mut resolver = Resolver::new(source, FakeDb::default(), None, policy);

    let mut provider = RecordingProvider {
        asked: Vec::new(),
        answer: Decision::Exclude,
    };
    resolver
        .resolve("app", &mut provider, true)
        .expect("must resolve");
    assert_eq!(
        provider.asked,
        vec![
            ("app".to_string(), "docs".to_string()),
            ("lib".to_string(), "extras".to_string()),
        ]
    );
}

#[test]
fn accepted_optional_merges_its_dependency_closure() {
    let source = TableSource::default()
        .with("app", &["lib"], &["docs"])
        .with("lib", &[], &[])
        .with("docs", &["sphinx"], &[])
        .with("sphinx", &["pygments"], &[])
        .with("pygments", &[], &[]);
    let policy = ResolverPolicy {
        resolve_optional: true,
        ..Default::default()
    };
    let mut resolver = Resolver::new(source, FakeDb::default(), None, policy);

    let mut decisions = ScriptedDecisions::including(["docs".to_string()]);
    let resolution = resolver
        .resolve("app", &mut decisions, true)
        .expect("must resolve");

    assert!(resolution.build_order.contains(&"sphinx".to_string()));
    assert!(resolution.build_order.contains(&"pygments".to_string()));
    // The candidate itself joins only through real edges, and optional
    // candidates have none.
    assert!(!resolution.build_order.contains(&"docs".to_string()));
}

#[test]
fn declined_optional_contributes_nothing() {
    let source = TableSource::default()
        .with("app", &[], &["docs"])
        .with("docs", &["sphinx"], &[])
        .with("sphinx", &[], &[]);
    let policy = ResolverPolicy {
        resolve_optional: true,
        ..Default::default()
    };
    let mut resolver = Resolver::new(source, FakeDb::default(), None, policy);

    let resolution = resolver
        .resolve("app", &mut DeclineAll, true)
        .expect("must resolve");
    assert_eq!(resolution.build_order, vec!["app"]);
}

#[test]
fn policy_disables_optional_prompting_entirely() {
    let source = TableSource::default().with("app", &[], &["docs"]);
    let mut resolver = resolver(source, FakeDb::default());

    let mut provider = RecordingProvider {
        asked: Vec::new(),
        answer: Decision::Include,
    };
    resolver
        .resolve("app", &mut provider, true)
        .expect("must resolve");
    assert!(provider.asked.is_empty());
}

#[test]
fn missing_optional_candidate_is_skipped() {
    let source = TableSource::default().with("app", &[], &["phantom"]);
    let policy = ResolverPolicy {
        resolve_optional: true,
        ..Default::default()
    };
    let mut resolver = Resolver::new(source, FakeDb::default(), None, policy);

    let mut decisions = ScriptedDecisions::including(["phantom".to_string()]);
    let resolution = resolver
        .resolve("app", &mut decisions, true)
        .expect("must resolve despite missing candidate");
    assert_eq!(resolution.build_order, vec!["app"]);
}

#[test]
fn sync_rebuilds_graph_and_persists_cache() {
    let root = test_root();
    let cache_path = root.join("depgraph.json");
    let source = TableSource::default()
        .with("app", &["lib"], &[])
        .with("lib", &[], &[]);
    let mut resolver = Resolver::new(
        source,
        FakeDb::default(),
        Some(GraphCache::new(&cache_path)),
        ResolverPolicy::default(),
    );

    let mut seen = 0usize;
    let count = resolver.sync_from_ports(|_| seen += 1).expect("must sync");
    assert_eq!(count, 2);
    assert_eq!(seen, 2);

    let reloaded = GraphCache::new(&cache_path).load();
    assert!(reloaded.contains("app"));
    assert!(reloaded.dependencies_of("app").contains("lib"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn construction_prefers_the_cached_graph() {
    let root = test_root();
    let cache_path = root.join("depgraph.json");
    let cache = GraphCache::new(&cache_path);

    let mut seeded = drydock_graph::DepGraph::new();
    let doc = json!({ "name": "cached", "runtime": { "depends": ["lib"] } });
    seeded.add_package(&PackageDescriptor::from_document(&doc).expect("must normalize"));
    cache.persist(&seeded).expect("must persist seed graph");

    let resolver = Resolver::new(
        TableSource::default(),
        FakeDb::default(),
        Some(GraphCache::new(&cache_path)),
        ResolverPolicy::default(),
    );
    assert!(resolver.graph().contains("cached"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn orphans_preserve_database_order() {
    let source = TableSource::default()
        .with("z", &["x"], &[])
        .with("x", &[], &[]);
    let db = FakeDb::default().installed(&["x", "y"]);
    let mut resolver = resolver(source, db);
    resolver.sync_from_ports(|_| {}).expect("must sync");

    // x has dependent z in the graph; y has none.
    assert_eq!(resolver.detect_orphans(), vec!["y"]);
}

#[test]
fn orphan_detection_degrades_when_database_is_unavailable() {
    let db = FakeDb {
        unavailable: true,
        ..FakeDb::default()
    };
    let resolver = resolver(TableSource::default(), db);
    assert!(resolver.detect_orphans().is_empty());
}

#[test]
fn rebuild_orders_farthest_dependents_first() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &["c"], &[])
        .with("c", &[], &[]);
    let mut resolver = resolver(source, FakeDb::default());
    resolver.sync_from_ports(|_| {}).expect("must sync");

    assert_eq!(resolver.mark_for_rebuild("c"), vec!["a", "b"]);
}

#[test]
fn rebuild_merges_database_dependents_at_distance_zero() {
    let source = TableSource::default()
        .with("a", &["b"], &[])
        .with("b", &["c"], &[])
        .with("c", &[], &[]);
    let db = FakeDb::default().revdeps("c", &["external-2.0", "b-1.0"]);
    let mut resolver = Resolver::new(source, db, None, ResolverPolicy::default());
    resolver.sync_from_ports(|_| {}).expect("must sync");

    // b appears once (db record deduplicated against traversal); external
    // is unreachable in the graph and sorts last at distance 0.
    assert_eq!(resolver.mark_for_rebuild("c"), vec!["a", "b", "external"]);
}

#[test]
fn rebuild_splits_revdep_names_at_first_hyphen() {
    let graph = drydock_graph::DepGraph::new();
    let db = FakeDb::default().revdeps("zlib", &["my-tool-1.0"]);
    assert_eq!(mark_for_rebuild(&graph, &db, "zlib"), vec!["my"]);
}

#[test]
fn decision_prompt_is_stable() {
    assert_eq!(
        decision_prompt("app", "docs"),
        "Package app has optional dependency 'docs'. Include it?"
    );
}

fn test_root() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "drydock-resolver-tests-{}-{}",
        std::process::id(),
        nanos
    ))
}
