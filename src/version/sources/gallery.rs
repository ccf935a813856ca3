//! NuGet gallery web page scraper
//!
//! Last-resort source. The gallery only renders listed versions. Both the
//! package page and its version history page are scraped; the source only
//! fails when neither of them loads.

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::DEFAULT_GALLERY_URL;
use crate::version::error::SourceError;
use crate::version::source::{SourceOutput, VersionSource};
use crate::version::sources::check_status;
use crate::version::types::{PackageId, SourceKind, VersionRecord, version_key};

pub struct GallerySource {
    client: reqwest::Client,
    base_url: String,
    /// `<table class="...version...">` body
    table_re: Regex,
    /// One `<tr>` row
    row_re: Regex,
    /// `<a href="/packages/{id}/{version}">`
    version_link_re: Regex,
    /// Plausible version token: leading digits, dot-separated segments
    version_format_re: Regex,
}

impl GallerySource {
    /// Creates a new GallerySource with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self::with_client(super::default_client(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            table_re: Regex::new(r#"(?is)<table[^>]*class="[^"]*version[^"]*"[^>]*>(.*?)</table>"#)
                .unwrap(),
            row_re: Regex::new(r"(?is)<tr[^>]*>.*?</tr>").unwrap(),
            version_link_re: Regex::new(
                r#"(?i)<a[^>]*href="/packages/[^/"]+/([^/"]+)/?"[^>]*>[^<]*</a>"#,
            )
            .unwrap(),
            version_format_re: Regex::new(r#"^\d+(\.[^\s/"<>]+)*$"#).unwrap(),
        }
    }

    async fn fetch_page(&self, url: &str, package: &PackageId) -> Result<String, SourceError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response, package, url)?;

        response
            .text()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }

    /// Pulls version tokens out of a gallery page, in page order
    ///
    /// Rows inside a version table are preferred; pages without such a
    /// table are scanned row by row.
    fn extract_versions(&self, html: &str) -> Vec<String> {
        let region = self
            .table_re
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(html);

        self.row_re
            .find_iter(region)
            .filter_map(|row| self.version_link_re.captures(row.as_str()))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|version| self.version_format_re.is_match(version))
            .collect()
    }
}

impl Default for GallerySource {
    fn default() -> Self {
        Self::new(DEFAULT_GALLERY_URL)
    }
}

#[async_trait::async_trait]
impl VersionSource for GallerySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gallery
    }

    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        let pages = [
            format!("{}/packages/{}", self.base_url, package.normalized()),
            format!("{}/packages/{}/versions", self.base_url, package.normalized()),
        ];

        let mut output = SourceOutput::default();
        let mut seen = HashSet::new();
        let mut first_error = None;
        let mut any_page_loaded = false;

        for url in &pages {
            match self.fetch_page(url, package).await {
                Ok(html) => {
                    any_page_loaded = true;
                    for version in self.extract_versions(&html) {
                        if seen.insert(version_key(&version)) {
                            output.records.push(VersionRecord::listed(version));
                        }
                    }
                }
                Err(e) => {
                    warn!("Gallery page {} failed: {}", url, e);
                    output.notes.push(format!("gallery page {} skipped: {}", url, e));
                    first_error.get_or_insert(e);
                }
            }
        }

        if !any_page_loaded {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        debug!(
            "Scraped {} versions of {} from the gallery",
            output.records.len(),
            package
        );

        Ok(output)
    }
}
