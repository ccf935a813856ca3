use tracing::debug;

use crate::version::types::{ResolutionResult, version_key};

/// Which selected versions an unlist batch should actually touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlistPlan {
    /// Listed versions to unlist, in selection order
    pub targets: Vec<String>,
    /// Already unlisted; unlisting them again is a no-op on the registry
    pub already_unlisted: Vec<String>,
    /// Not present in the resolution at all
    pub unknown: Vec<String>,
}

impl UnlistPlan {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Splits `selected` against a resolved version list
///
/// Versions are matched case-insensitively and selecting the same version
/// twice yields a single target.
pub fn plan_unlist(result: &ResolutionResult, selected: &[String]) -> UnlistPlan {
    let mut plan = UnlistPlan::default();
    let mut seen = std::collections::HashSet::new();

    for version in selected {
        let version = version.trim();
        if version.is_empty() || !seen.insert(version_key(version)) {
            continue;
        }

        match result.get(version) {
            Some(record) if record.listed => plan.targets.push(record.version.clone()),
            Some(record) => plan.already_unlisted.push(record.version.clone()),
            None => plan.unknown.push(version.to_string()),
        }
    }

    debug!(
        "Unlist plan: {} targets, {} already unlisted, {} unknown",
        plan.targets.len(),
        plan.already_unlisted.len(),
        plan.unknown.len()
    );
    plan
}
