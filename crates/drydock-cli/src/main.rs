mod config;
mod hooks;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use drydock_db::StateDb;
use drydock_graph::{render_graph, GraphCache, GraphFormat};
use drydock_ports::PortsTree;
use drydock_resolver::{InteractivePrompt, Resolver, ResolverPolicy};
use indicatif::ProgressBar;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, ConfigStatus};
use crate::hooks::HookRunner;

#[derive(Parser, Debug)]
#[command(name = "drydock")]
#[command(about = "Dependency resolver for the ports tree", long_about = None)]
struct Cli {
    /// Path to the config file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve dependencies and print the build order.
    Resolve {
        package: String,
        /// Never prompt for optional dependencies.
        #[arg(long)]
        no_prompt: bool,
    },
    /// Show the install order for a package.
    Order {
        package: String,
        /// Drop packages that are already installed.
        #[arg(long)]
        skip_installed: bool,
    },
    /// List dependencies that are not installed.
    Missing { package: String },
    /// Export the dependency graph.
    Graph {
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Check whether all dependencies of a package are installed.
    Check { package: String },
    /// Show orphaned packages (installed, no recorded dependents).
    Clean,
    /// List packages to rebuild when a package changes.
    Rebuild { package: String },
    /// Rebuild the graph cache from the ports tree.
    Sync,
    /// Generate shell completions.
    Completions { shell: clap_complete::Shell },
}

const EXIT_CYCLES: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, status) = CliConfig::load(cli.config.as_deref());
    init_tracing(&config.log_filter);
    report_config_status(&status);

    match run(cli.command, config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(fallback_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_config_status(status: &ConfigStatus) {
    match status {
        ConfigStatus::Loaded(path) => info!(path = %path.display(), "loaded config"),
        ConfigStatus::Missing(path) => {
            info!(path = %path.display(), "no config file, using defaults")
        }
        ConfigStatus::Malformed(path, err) => {
            warn!(path = %path.display(), err = %err, "failed to parse config, using defaults")
        }
    }
}

fn run(command: Commands, config: CliConfig) -> Result<ExitCode> {
    let hooks = HookRunner::new(&config.hooks_dir);
    let policy = ResolverPolicy {
        resolve_optional: config.resolve_optional,
        cache_graph: config.cache_graph,
        prefer_cached_graph: config.prefer_cached_graph,
    };
    let source = PortsTree::new(config.ports_paths.clone());
    let db = StateDb::new(&config.state_dir);
    let cache = GraphCache::new(&config.cache_path);
    let mut resolver = Resolver::new(source, db, Some(cache), policy);

    match command {
        Commands::Resolve { package, no_prompt } => {
            hooks.run("pre-resolve", Some(&package));
            let resolution =
                resolver.resolve(&package, &mut InteractivePrompt, !no_prompt)?;
            hooks.run("post-resolve", Some(&package));

            if resolution.has_cycles() {
                println!("Dependency cycles detected:");
                for cycle in &resolution.cycles {
                    println!(" - {}", cycle.join(" -> "));
                }
                return Ok(ExitCode::from(EXIT_CYCLES));
            }

            println!("Resolved order (dependencies first):");
            for name in &resolution.build_order {
                println!("{name}");
            }
        }
        Commands::Order {
            package,
            skip_installed,
        } => {
            let order = resolver.install_order(&package, skip_installed)?;
            for name in &order {
                println!("{name}");
            }
        }
        Commands::Missing { package } => {
            let missing = resolver.missing_deps(&package)?;
            if missing.is_empty() {
                println!("No missing dependencies (or resolution failed).");
            } else {
                for name in &missing {
                    println!("{name}");
                }
            }
        }
        Commands::Graph { format, out } => {
            let format = GraphFormat::parse(&format)?;
            let rendered = render_graph(resolver.graph(), format)?;
            fs::write(&out, rendered)
                .with_context(|| format!("failed writing graph export: {}", out.display()))?;
            println!("Graph exported to {}", out.display());
        }
        Commands::Check { package } => {
            hooks.run("pre-resolve", Some(&package));
            let missing = resolver.missing_deps(&package)?;
            hooks.run("post-resolve", Some(&package));

            if missing.is_empty() {
                println!("All dependencies present.");
            } else {
                println!("Missing dependencies:");
                for name in &missing {
                    println!(" - {name}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Clean => {
            let orphans = resolver.detect_orphans();
            if orphans.is_empty() {
                println!("No orphans detected.");
            } else {
                println!("Orphan packages (installed but no reverse-deps):");
                for name in &orphans {
                    println!(" - {name}");
                }
            }
        }
        Commands::Rebuild { package } => {
            let rebuilds = resolver.mark_for_rebuild(&package);
            if rebuilds.is_empty() {
                println!("No dependents detected.");
            } else {
                println!("Packages to rebuild (dependents of {package}):");
                for name in &rebuilds {
                    println!(" - {name}");
                }
            }
        }
        Commands::Sync => {
            hooks.run("pre-sync", None);
            let progress = ProgressBar::new_spinner();
            progress.enable_steady_tick(std::time::Duration::from_millis(80));
            let count = resolver.sync_from_ports(|descriptor| {
                progress.set_message(descriptor.name.clone());
                progress.inc(1);
            })?;
            progress.finish_and_clear();
            hooks.run("post-sync", None);
            println!("Graph rebuilt and cached ({count} packages).");
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "drydock", &mut std::io::stdout());
        }
    }

    Ok(ExitCode::SUCCESS)
}
