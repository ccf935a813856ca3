//! NuGet CLI source
//!
//! `nuget list` only reports listed versions. That makes it a weak
//! discovery source but a useful status authority: a version it does not
//! report is unlisted.

use std::sync::Arc;

use tracing::debug;

use crate::tool::NugetCli;
use crate::version::error::SourceError;
use crate::version::source::{SourceOutput, StatusAuthority, StatusSnapshot, VersionSource};
use crate::version::types::{PackageId, SourceKind, VersionRecord};

pub struct CliToolSource {
    cli: Arc<NugetCli>,
}

impl CliToolSource {
    pub fn new(cli: Arc<NugetCli>) -> Self {
        Self { cli }
    }
}

#[async_trait::async_trait]
impl VersionSource for CliToolSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CliTool
    }

    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        let versions = self.cli.list_versions(package).await?;
        debug!("Found {} listed versions of {} via nuget cli", versions.len(), package);

        Ok(SourceOutput::new(
            versions.into_iter().map(VersionRecord::listed).collect(),
        ))
    }
}

#[async_trait::async_trait]
impl StatusAuthority for CliToolSource {
    fn name(&self) -> &'static str {
        "nuget cli"
    }

    async fn lookup_status(&self, package: &PackageId) -> Result<StatusSnapshot, SourceError> {
        let versions = self.cli.list_versions(package).await?;
        Ok(StatusSnapshot::listed_set(versions))
    }
}
