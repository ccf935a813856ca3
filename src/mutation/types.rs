use std::fmt;

use chrono::{DateTime, Utc};

use crate::version::types::PackageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Delist,
    /// nuget.org exposes no deprecation endpoint to API keys, so this is
    /// carried out as an unlist tagged with the deprecation reason
    Deprecate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeprecationReason {
    CriticalBugs,
    Legacy,
    Other(String),
}

impl fmt::Display for DeprecationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeprecationReason::CriticalBugs => f.write_str("Critical bugs"),
            DeprecationReason::Legacy => f.write_str("Legacy"),
            DeprecationReason::Other(text) => write!(f, "Other: {}", text.trim()),
        }
    }
}

/// Why versions are being deprecated, and what to use instead
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationNote {
    pub reasons: Vec<DeprecationReason>,
    pub alternative_package: Option<String>,
    pub alternative_version: Option<String>,
}

impl DeprecationNote {
    pub fn new(reasons: Vec<DeprecationReason>) -> Self {
        Self {
            reasons,
            ..Self::default()
        }
    }

    pub fn with_alternative(mut self, package: &str, version: Option<&str>) -> Self {
        let package = package.trim();
        if !package.is_empty() {
            self.alternative_package = Some(package.to_string());
            self.alternative_version = version
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
        }
        self
    }
}

/// Renders as `Reasons: Critical bugs, Legacy; Alternative package: Foo v2.0.0`
impl fmt::Display for DeprecationNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            f.write_str("Reasons: unspecified")?;
        } else {
            let reasons: Vec<String> = self.reasons.iter().map(ToString::to_string).collect();
            write!(f, "Reasons: {}", reasons.join(", "))?;
        }

        if let Some(package) = &self.alternative_package {
            write!(f, "; Alternative package: {}", package)?;
            if let Some(version) = &self.alternative_version {
                write!(f, " v{}", version)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MutationRequest {
    pub package: PackageId,
    /// NuGet API key, passed through to the CLI untouched
    pub credential: String,
    pub targets: Vec<String>,
    pub kind: MutationKind,
    pub reason: Option<DeprecationNote>,
}

impl MutationRequest {
    pub fn delist(package: PackageId, credential: &str, targets: Vec<String>) -> Self {
        Self {
            package,
            credential: credential.to_string(),
            targets,
            kind: MutationKind::Delist,
            reason: None,
        }
    }

    pub fn deprecate(
        package: PackageId,
        credential: &str,
        targets: Vec<String>,
        reason: DeprecationNote,
    ) -> Self {
        Self {
            package,
            credential: credential.to_string(),
            targets,
            kind: MutationKind::Deprecate,
            reason: Some(reason),
        }
    }
}

impl fmt::Debug for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("package", &self.package)
            .field("credential", &"<redacted>")
            .field("targets", &self.targets)
            .field("kind", &self.kind)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Lifecycle of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchState {
    #[default]
    Pending,
    Running,
    Completed,
    Cancelled,
    /// The batch could not start, e.g. the NuGet CLI is missing
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub version: String,
    pub succeeded: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub items: Vec<ItemOutcome>,
    pub success_count: usize,
    /// Number of requested targets, including ones never attempted
    pub total_count: usize,
    pub cancelled: bool,
    pub state: BatchState,
    /// Reason the batch failed to start
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MutationOutcome {
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.success_count == self.total_count
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("{}/{} successful", self.success_count, self.total_count);
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        if let Some(error) = &self.error {
            summary.push_str(&format!(" ({})", error));
        }
        summary
    }
}
