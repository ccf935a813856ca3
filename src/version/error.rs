use thiserror::Error;

use crate::tool::CliError;
use crate::version::types::SourceKind;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("NuGet CLI error: {0}")]
    Tool(#[from] CliError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("All {} version sources failed for {package}: {}", .failures.len(), format_failures(.failures))]
    AllSourcesFailed {
        package: String,
        failures: Vec<(SourceKind, String)>,
    },
}

fn format_failures(failures: &[(SourceKind, String)]) -> String {
    failures
        .iter()
        .map(|(kind, reason)| format!("{kind}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}
