//! Package base address (flat container) source
//!
//! The flat container only ever exposes listed versions, so every record
//! it produces is `listed = true`.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::DEFAULT_FLAT_CONTAINER_URL;
use crate::version::error::SourceError;
use crate::version::source::{SourceOutput, VersionSource};
use crate::version::sources::check_status;
use crate::version::types::{PackageId, SourceKind, VersionRecord};

/// Response from `{base}/{id}/index.json`
#[derive(Debug, Deserialize)]
struct FlatContainerIndex {
    #[serde(default)]
    versions: Vec<String>,
}

pub struct FlatContainerSource {
    client: reqwest::Client,
    base_url: String,
}

impl FlatContainerSource {
    /// Creates a new FlatContainerSource with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self::with_client(super::default_client(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for FlatContainerSource {
    fn default() -> Self {
        Self::new(DEFAULT_FLAT_CONTAINER_URL)
    }
}

#[async_trait::async_trait]
impl VersionSource for FlatContainerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::FlatContainer
    }

    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        let url = format!("{}/{}/index.json", self.base_url, package.normalized());
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, package, &url)?;

        let index: FlatContainerIndex = response.json().await.map_err(|e| {
            warn!("Failed to parse flat container response: {}", e);
            SourceError::InvalidResponse(e.to_string())
        })?;

        let records: Vec<VersionRecord> = index
            .versions
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(VersionRecord::listed)
            .collect();

        debug!(
            "Found {} listed versions of {} via package base address",
            records.len(),
            package
        );

        Ok(SourceOutput::new(records))
    }
}
