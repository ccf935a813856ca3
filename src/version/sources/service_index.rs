//! NuGet V3 service index discovery
//!
//! Resolves the flat container and registration base URLs from the feed's
//! `index.json` instead of relying on hard-coded nuget.org endpoints.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::version::error::SourceError;

/// `@type` prefix of registration resources (e.g. `RegistrationsBaseUrl/3.6.0`)
pub const REGISTRATION_TYPE_PREFIX: &str = "RegistrationsBaseUrl";

/// `@type` prefix of the flat container resource
pub const PACKAGE_BASE_ADDRESS_TYPE_PREFIX: &str = "PackageBaseAddress";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ServiceIndex {
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

impl ServiceIndex {
    pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Self, SourceError> {
        debug!("GET {}", url);
        let response = client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Service index returned status {}: {}", status, url);
            return Err(SourceError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let index: ServiceIndex = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        info!("Service index lists {} resources", index.resources.len());
        Ok(index)
    }

    /// First resource whose `@type` starts with `prefix`
    pub fn resource(&self, prefix: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.resource_type.starts_with(prefix))
            .map(|r| r.id.trim_end_matches('/'))
    }

    pub fn registration_base(&self) -> Option<&str> {
        self.resource(REGISTRATION_TYPE_PREFIX)
    }

    pub fn package_base_address(&self) -> Option<&str> {
        self.resource(PACKAGE_BASE_ADDRESS_TYPE_PREFIX)
    }
}
