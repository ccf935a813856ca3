//! Locates the NuGet CLI executable
//!
//! Lookup order:
//! 1. explicitly configured path
//! 2. copy extracted to the temp directory. When the embedding program
//!    supplies a payload through [`ToolLocator::with_bundle`] it is written
//!    there on first use. The `nuget-manager` binary ships no payload, so
//!    for it this step only picks up a copy that already exists.
//! 3. well-known install directories
//! 4. `PATH`
//!
//! The result is cached for the lifetime of the locator. The cache sits
//! behind a mutex so concurrent first calls cannot extract the bundle twice.
//! Async callers go through [`ToolLocator::locate_async`], which runs the
//! lookup on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::tool_extract_dir;
use crate::tool::CliError;

pub const TOOL_FILE_NAME: &str = "nuget.exe";

pub struct ToolLocator {
    explicit: Option<PathBuf>,
    extract_dir: PathBuf,
    bundle: Option<Vec<u8>>,
    install_dirs: Vec<PathBuf>,
    search_path: bool,
    cached: Mutex<Option<PathBuf>>,
}

impl ToolLocator {
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            extract_dir: tool_extract_dir(),
            bundle: None,
            install_dirs: default_install_dirs(),
            search_path: true,
            cached: Mutex::new(None),
        }
    }

    /// Directory the bundled executable is extracted to
    pub fn with_extract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extract_dir = dir.into();
        self
    }

    /// Executable bytes to extract when no extracted copy exists yet
    pub fn with_bundle(mut self, bytes: Vec<u8>) -> Self {
        self.bundle = Some(bytes);
        self
    }

    pub fn with_install_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.install_dirs = dirs;
        self
    }

    pub fn without_path_lookup(mut self) -> Self {
        self.search_path = false;
        self
    }

    /// Path of the extracted copy
    pub fn extracted_path(&self) -> PathBuf {
        self.extract_dir.join(TOOL_FILE_NAME)
    }

    /// Returns the cached path, resolving it on first use or when the
    /// cached file has disappeared
    pub fn locate(&self) -> Result<PathBuf, CliError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(path) = cached.as_ref() {
            if path.is_file() {
                return Ok(path.clone());
            }
            debug!("Cached NuGet CLI {:?} no longer exists", path);
        }

        let path = self.resolve().ok_or(CliError::NotFound)?;
        info!("Using NuGet CLI at {:?}", path);
        *cached = Some(path.clone());
        Ok(path)
    }

    /// [`locate`](Self::locate) on the blocking pool, keeping filesystem
    /// writes and the `PATH` scan off the runtime workers
    pub async fn locate_async(self: &Arc<Self>) -> Result<PathBuf, CliError> {
        let locator = Arc::clone(self);
        tokio::task::spawn_blocking(move || locator.locate())
            .await
            .map_err(|e| CliError::Lookup(e.to_string()))?
    }

    fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            if path.is_file() {
                return Some(path.clone());
            }
            warn!("Configured NuGet CLI {:?} does not exist", path);
        }

        if let Some(path) = self.extracted() {
            return Some(path);
        }

        if let Some(path) = self
            .install_dirs
            .iter()
            .map(|dir| dir.join(TOOL_FILE_NAME))
            .find(|path| path.is_file())
        {
            return Some(path);
        }

        if self.search_path {
            return which::which(TOOL_FILE_NAME)
                .or_else(|_| which::which("nuget"))
                .ok();
        }

        None
    }

    fn extracted(&self) -> Option<PathBuf> {
        let path = self.extracted_path();
        if path.is_file() {
            return Some(path);
        }

        let bundle = self.bundle.as_ref()?;
        match write_executable(&path, bundle) {
            Ok(()) => {
                info!("Extracted bundled NuGet CLI to {:?}", path);
                Some(path)
            }
            Err(e) => {
                warn!("Failed to extract bundled NuGet CLI to {:?}: {}", path, e);
                None
            }
        }
    }
}

fn write_executable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

fn default_install_dirs() -> Vec<PathBuf> {
    let mut install_dirs = Vec::new();
    if let Some(local) = dirs::data_local_dir() {
        install_dirs.push(local.join("Microsoft").join("WindowsApps"));
    }
    for var in ["ProgramFiles", "ProgramFiles(x86)"] {
        if let Some(dir) = std::env::var_os(var) {
            install_dirs.push(PathBuf::from(dir).join("NuGet"));
        }
    }
    install_dirs
}
