use anyhow::Result;

use crate::PackageDescriptor;

/// Resolves package names to normalized descriptors on demand. Implementors
/// absorb per-document decode failures; only infrastructure failures
/// propagate.
pub trait DescriptorSource {
    /// Looks up the descriptor for one package name.
    fn find(&self, name: &str) -> Result<Option<PackageDescriptor>>;

    /// Every normalizable descriptor in the source's corpus. Used by the
    /// full rescan; cost scales with the corpus, not one package's closure.
    fn enumerate_all(&self) -> Result<Vec<PackageDescriptor>>;
}
