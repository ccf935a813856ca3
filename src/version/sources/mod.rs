//! Version source implementations

pub mod cli_tool;
pub mod flat_container;
pub mod gallery;
pub mod registration;
pub mod service_index;

pub use cli_tool::CliToolSource;
pub use flat_container::FlatContainerSource;
pub use gallery::GallerySource;
pub use registration::RegistrationSource;
pub use service_index::ServiceIndex;

use tracing::warn;

use crate::config::HttpConfig;
use crate::version::error::SourceError;
use crate::version::types::PackageId;

fn default_client() -> reqwest::Client {
    HttpConfig::default()
        .build_client()
        .expect("Failed to create HTTP client")
}

/// Maps non-success statuses to the matching [`SourceError`]
fn check_status(
    response: reqwest::Response,
    package: &PackageId,
    url: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(package.normalized().to_string()));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(SourceError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Registry returned status {}: {}", status, url);
        return Err(SourceError::InvalidResponse(format!(
            "Unexpected status: {}",
            status
        )));
    }

    Ok(response)
}
