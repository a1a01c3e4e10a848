use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Installed record for one package as the state database knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub installed_at_unix: Option<u64>,
}

/// Authoritative installed-package source. Callers treat any error as
/// "not installed" / "no data" so an unavailable database can never produce
/// a false already-satisfied conclusion.
pub trait PackageDb {
    /// Installed record for `name`, or `None` when not installed.
    fn query(&self, name: &str) -> Result<Option<InstalledPackage>>;

    /// Names of all installed packages. The returned order is the
    /// database's documented order and is preserved by consumers.
    fn list_installed(&self) -> Result<Vec<String>>;

    /// `"name-version"` strings for every installed package that records a
    /// direct dependency on `name`.
    fn reverse_depends(&self, name: &str) -> Result<Vec<String>>;
}

/// Receipt-file database: one `<name>.receipt` per installed package under a
/// state directory, key=value lines. A missing directory is an empty
/// database; unreadable receipts are skipped with a warning.
#[derive(Debug, Clone)]
pub struct StateDb {
    state_dir: PathBuf,
}

impl StateDb {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn read_all(&self) -> Result<Vec<InstalledPackage>> {
        if !self.state_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let entries = fs::read_dir(&self.state_dir).with_context(|| {
            format!("failed reading state directory: {}", self.state_dir.display())
        })?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some("receipt") {
                continue;
            }

            match read_receipt(&path) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unreadable receipt");
                }
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

impl PackageDb for StateDb {
    fn query(&self, name: &str) -> Result<Option<InstalledPackage>> {
        let path = self.state_dir.join(format!("{name}.receipt"));
        if !path.exists() {
            return Ok(None);
        }
        read_receipt(&path).map(Some)
    }

    fn list_installed(&self) -> Result<Vec<String>> {
        Ok(self.read_all()?.into_iter().map(|r| r.name).collect())
    }

    fn reverse_depends(&self, name: &str) -> Result<Vec<String>> {
        let mut dependents = Vec::new();
        for record in self.read_all()? {
            if record.dependencies.iter().any(|dep| dep == name) {
                let version = record.version.as_deref().unwrap_or("0");
                dependents.push(format!("{}-{}", record.name, version));
            }
        }
        Ok(dependents)
    }
}

/// Writes a receipt; used by installers and by tests seeding a database.
pub fn write_receipt(state_dir: &Path, record: &InstalledPackage) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("failed creating state directory: {}", state_dir.display()))?;

    let mut payload = String::new();
    payload.push_str(&format!("name={}\n", record.name));
    if let Some(version) = &record.version {
        payload.push_str(&format!("version={}\n", version));
    }
    for dependency in &record.dependencies {
        payload.push_str(&format!("dependency={}\n", dependency));
    }
    if let Some(installed_at) = record.installed_at_unix {
        payload.push_str(&format!("installed_at_unix={}\n", installed_at));
    }

    let path = state_dir.join(format!("{}.receipt", record.name));
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed writing receipt: {}", path.display()))?;
    Ok(path)
}

fn read_receipt(path: &Path) -> Result<InstalledPackage> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading receipt: {}", path.display()))?;
    parse_receipt(&raw).with_context(|| format!("failed parsing receipt: {}", path.display()))
}

fn parse_receipt(raw: &str) -> Result<InstalledPackage> {
    let mut name = None;
    let mut version = None;
    let mut dependencies = Vec::new();
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "name" => name = Some(value.to_string()),
            "version" => version = Some(value.to_string()),
            "dependency" => dependencies.push(value.to_string()),
            "installed_at_unix" => {
                installed_at_unix = Some(value.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(InstalledPackage {
        name: name.context("missing name")?,
        version,
        dependencies,
        installed_at_unix,
    })
}
