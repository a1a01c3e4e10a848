use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use drydock_core::{DescriptorSource, PackageDescriptor};
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Descriptor source over one or more ports-tree roots. Descriptor files are
/// YAML or JSON documents anywhere under a root; a package is found by the
/// name its document declares, not by file location.
#[derive(Debug, Clone)]
pub struct PortsTree {
    roots: Vec<PathBuf>,
}

impl PortsTree {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn descriptor_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.roots.iter().flat_map(|root| {
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        warn!(%err, "skipping unreadable ports entry");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| has_descriptor_extension(path))
        })
    }
}

impl DescriptorSource for PortsTree {
    fn find(&self, name: &str) -> Result<Option<PackageDescriptor>> {
        for path in self.descriptor_files() {
            let Some(descriptor) = load_descriptor(&path) else {
                continue;
            };
            if descriptor.name == name {
                debug!(name, path = %path.display(), "found descriptor in ports tree");
                return Ok(Some(descriptor));
            }
        }
        debug!(name, "descriptor not found in ports tree");
        Ok(None)
    }

    fn enumerate_all(&self) -> Result<Vec<PackageDescriptor>> {
        let mut descriptors = Vec::new();
        for path in self.descriptor_files() {
            if let Some(descriptor) = load_descriptor(&path) {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }
}

fn has_descriptor_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml" | "json")
    )
}

/// Decodes and normalizes one descriptor file. Every failure mode is
/// absorbed here: scans and lookups keep going past bad documents.
fn load_descriptor(path: &Path) -> Option<PackageDescriptor> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed reading descriptor file");
            return None;
        }
    };

    let document = match decode_document(path, &raw) {
        Ok(document) => document,
        Err(err) => {
            debug!(path = %path.display(), %err, "skipping undecodable descriptor");
            return None;
        }
    };

    match PackageDescriptor::from_document(&document) {
        Ok(descriptor) => Some(descriptor),
        Err(err) => {
            warn!(path = %path.display(), %err, "skipping descriptor");
            None
        }
    }
}

fn decode_document(path: &Path, raw: &str) -> Result<Value> {
    if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
        return Ok(serde_json::from_str(raw)?);
    }
    // YAML first for everything else; YAML is a superset of enough JSON
    // that stray .yml files holding JSON still decode.
    Ok(serde_yaml::from_str(raw)?)
}
