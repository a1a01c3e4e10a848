use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

/// Runs the executable files under `<hooks_dir>/<event>/` in name order,
/// passing the package name when the event has one. Fire-and-return: a hook
/// that fails to spawn is logged, exit statuses are ignored, and the
/// surrounding operation never aborts.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    pub fn new(hooks_dir: impl Into<PathBuf>) -> Self {
        Self {
            hooks_dir: hooks_dir.into(),
        }
    }

    pub fn run(&self, event: &str, package: Option<&str>) {
        let event_dir = self.hooks_dir.join(event);
        if !event_dir.is_dir() {
            return;
        }

        let mut hooks: Vec<PathBuf> = match fs::read_dir(&event_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_executable(path))
                .collect(),
            Err(err) => {
                warn!(event, %err, "failed reading hooks directory");
                return;
            }
        };
        hooks.sort();

        for hook in hooks {
            info!(event, hook = %hook.display(), "running hook");
            let mut command = Command::new(&hook);
            if let Some(package) = package {
                command.arg(package);
            }
            match command.status() {
                Ok(status) if !status.success() => {
                    debug!(hook = %hook.display(), %status, "hook exited non-zero");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(hook = %hook.display(), %err, "hook failed to run");
                }
            }
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}
