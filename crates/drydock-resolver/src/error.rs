use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("package '{0}' not found in graph or ports tree")]
    PackageNotFound(String),

    #[error("dependency cycles detected: {}", format_cycles(.0))]
    CycleDetected(Vec<Vec<String>>),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}
