mod descriptor;
mod source;

pub use descriptor::{normalize_dep_token, DescriptorError, PackageDescriptor};
pub use source::DescriptorSource;
