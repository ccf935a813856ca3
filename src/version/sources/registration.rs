//! Registration API source
//!
//! The registration index lists catalog pages. A page either carries its
//! entries inline or only an `@id` that has to be fetched separately:
//!
//! ```text
//! index.json
//! ├── page 0   (items inline)  ──▶ catalogEntry { version, listed }
//! └── page 1   (@id only)      ──▶ GET @id ──▶ catalogEntry ...
//! ```
//!
//! Pages are walked depth-first in document order. Each URL is fetched at
//! most once, so pages that link back to each other cannot loop forever.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DEFAULT_REGISTRATION_URL;
use crate::version::error::SourceError;
use crate::version::source::{SourceOutput, StatusAuthority, StatusSnapshot, VersionSource};
use crate::version::sources::check_status;
use crate::version::types::{PackageId, SourceKind, VersionRecord};

/// Any node of a registration document: the index, a page, or a leaf
#[derive(Debug, Deserialize)]
struct RegistrationNode {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    #[serde(default)]
    items: Option<Vec<RegistrationNode>>,
    #[serde(rename = "catalogEntry", default)]
    catalog_entry: Option<Value>,
}

/// URLs already fetched during one registration walk
#[derive(Debug, Default)]
struct VisitedUrlSet(HashSet<String>);

impl VisitedUrlSet {
    /// Returns false if `url` was already visited
    fn insert(&mut self, url: &str) -> bool {
        self.0.insert(url.trim_end_matches('/').to_string())
    }
}

pub struct RegistrationSource {
    client: reqwest::Client,
    base_url: String,
}

impl RegistrationSource {
    /// Creates a new RegistrationSource with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self::with_client(super::default_client(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_node(
        &self,
        url: &str,
        package: &PackageId,
    ) -> Result<RegistrationNode, SourceError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response, package, url)?;

        response.json().await.map_err(|e| {
            warn!("Failed to parse registration document {}: {}", url, e);
            SourceError::InvalidResponse(e.to_string())
        })
    }

    /// Walks the index and every reachable page
    ///
    /// A failure on the index aborts the walk; a failure on a page only
    /// drops that page and is recorded as a note.
    async fn walk(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        let index_url = format!("{}/{}/index.json", self.base_url, package.normalized());
        let mut visited = VisitedUrlSet::default();
        visited.insert(&index_url);

        let index = self.fetch_node(&index_url, package).await?;

        let mut output = SourceOutput::default();
        let mut pending: Vec<RegistrationNode> =
            index.items.unwrap_or_default().into_iter().rev().collect();

        while let Some(node) = pending.pop() {
            if let Some(entry) = node.catalog_entry {
                if let Some(record) = record_from_catalog_entry(&entry) {
                    output.records.push(record);
                }
                continue;
            }

            if let Some(items) = node.items {
                if let Some(id) = &node.id {
                    visited.insert(id);
                }
                pending.extend(items.into_iter().rev());
                continue;
            }

            let Some(page_url) = node.id else {
                continue;
            };

            if !visited.insert(&page_url) {
                debug!("Skipping already visited registration page {}", page_url);
                continue;
            }

            match self.fetch_node(&page_url, package).await {
                Ok(page) => pending.extend(page.items.unwrap_or_default().into_iter().rev()),
                Err(e) => {
                    warn!("Registration page {} failed: {}", page_url, e);
                    output
                        .notes
                        .push(format!("registration page {} skipped: {}", page_url, e));
                }
            }
        }

        debug!(
            "Found {} versions of {} via registration api",
            output.records.len(),
            package
        );

        Ok(output)
    }
}

impl Default for RegistrationSource {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRATION_URL)
    }
}

/// Extracts `version`/`listed` from a catalog entry; `listed` defaults to true
fn record_from_catalog_entry(entry: &Value) -> Option<VersionRecord> {
    let version = entry.get("version")?.as_str()?.trim();
    if version.is_empty() {
        return None;
    }
    let listed = entry
        .get("listed")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    Some(VersionRecord::new(version, listed))
}

#[async_trait::async_trait]
impl VersionSource for RegistrationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Registration
    }

    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        self.walk(package).await
    }
}

#[async_trait::async_trait]
impl StatusAuthority for RegistrationSource {
    fn name(&self) -> &'static str {
        "registration api"
    }

    async fn lookup_status(&self, package: &PackageId) -> Result<StatusSnapshot, SourceError> {
        let output = self.walk(package).await?;

        Ok(StatusSnapshot::partial(
            output.records.into_iter().map(|r| (r.version, r.listed)),
        ))
    }
}
