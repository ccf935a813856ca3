use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::version::ordering::VersionOrdering;
use crate::version::types::SourceSelector;

// =============================================================================
// Endpoint defaults
// =============================================================================

/// NuGet V3 service index, also the `-Source` passed to `nuget delete`
pub const DEFAULT_SERVICE_INDEX_URL: &str = "https://api.nuget.org/v3/index.json";

/// Package base address (flat container) endpoint
pub const DEFAULT_FLAT_CONTAINER_URL: &str = "https://api.nuget.org/v3-flatcontainer";

/// Registration endpoint exposing `listed` in catalog entries
pub const DEFAULT_REGISTRATION_URL: &str = "https://api.nuget.org/v3/registration5-semver1";

/// Human-facing gallery used for web scraping
pub const DEFAULT_GALLERY_URL: &str = "https://www.nuget.org";

// =============================================================================
// HTTP
// =============================================================================

/// Timeout for a single HTTP request in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str = concat!("nuget-manager/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the tracing filter
pub const LOG_ENV_VAR: &str = "NUGET_MANAGER_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
    pub registry: RegistryConfig,
    pub http: HttpConfig,
    pub tool: ToolConfig,
    pub resolution: ResolutionConfig,
}

/// Registry endpoints
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub service_index_url: String,
    pub flat_container_url: String,
    pub registration_url: String,
    pub gallery_url: String,
    /// Look up flat container and registration bases from the service index
    pub discover_endpoints: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            service_index_url: DEFAULT_SERVICE_INDEX_URL.to_string(),
            flat_container_url: DEFAULT_FLAT_CONTAINER_URL.to_string(),
            registration_url: DEFAULT_REGISTRATION_URL.to_string(),
            gallery_url: DEFAULT_GALLERY_URL.to_string(),
            discover_endpoints: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout())
            .build()
    }
}

/// NuGet CLI location
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolConfig {
    /// Explicit path to nuget.exe, checked before any other location
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolutionConfig {
    /// Sources used when the operator does not pick one
    pub source: SourceSelector,
    pub ordering: VersionOrdering,
    /// Cross-check listed flags against the registration API and the CLI
    pub calibrate: bool,
}

impl ManagerConfig {
    /// Loads the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the path to the data directory for nuget-manager.
/// Uses $XDG_DATA_HOME/nuget-manager if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/nuget-manager,
/// or ./nuget-manager if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("nuget-manager.log")
}

/// Returns the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nuget-manager")
        .join("config.json")
}

/// Directory where a bundled nuget.exe gets extracted
pub fn tool_extract_dir() -> PathBuf {
    std::env::temp_dir().join("nuget-manager")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("nuget-manager")
}
