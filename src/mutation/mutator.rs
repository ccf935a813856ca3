//! Trait for the per-version mutation primitive

#[cfg(test)]
use mockall::automock;

use crate::cancel::CancelToken;
use crate::tool::{CliError, NugetCli};
use crate::version::types::PackageId;

/// Unlists single versions of a package
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PackageMutator: Send + Sync {
    /// Checks the mutator can run at all before a batch starts
    async fn prepare(&self) -> Result<(), CliError>;

    /// Unlists `version`; returns [`CliError::Cancelled`] if `cancel` fires
    /// while the call is in flight
    async fn unlist(
        &self,
        package: &PackageId,
        version: &str,
        credential: &str,
        cancel: &CancelToken,
    ) -> Result<(), CliError>;
}

#[async_trait::async_trait]
impl PackageMutator for NugetCli {
    async fn prepare(&self) -> Result<(), CliError> {
        self.executable().await.map(|_| ())
    }

    async fn unlist(
        &self,
        package: &PackageId,
        version: &str,
        credential: &str,
        cancel: &CancelToken,
    ) -> Result<(), CliError> {
        self.delete(package, version, credential, cancel).await
    }
}
