//! Runs `nuget list` and `nuget delete`
//!
//! Every child process is spawned with `kill_on_drop`, so a cancelled or
//! failed call never leaves an orphaned `nuget` behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::DEFAULT_SERVICE_INDEX_URL;
use crate::tool::{CliError, ToolLocator};
use crate::version::types::PackageId;

const REDACTED: &str = "********";

pub struct NugetCli {
    locator: Arc<ToolLocator>,
    push_source: String,
}

impl NugetCli {
    /// `push_source` is the feed passed as `-Source` to `delete`
    pub fn new(locator: Arc<ToolLocator>, push_source: &str) -> Self {
        Self {
            locator,
            push_source: push_source.to_string(),
        }
    }

    pub fn with_default_source(locator: Arc<ToolLocator>) -> Self {
        Self::new(locator, DEFAULT_SERVICE_INDEX_URL)
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    /// Path of the `nuget` executable, looked up off the async workers
    pub async fn executable(&self) -> Result<PathBuf, CliError> {
        self.locator.locate_async().await
    }

    /// Lists every listed version, including pre-releases
    pub async fn list_versions(&self, package: &PackageId) -> Result<Vec<String>, CliError> {
        let exe = self.executable().await?;
        let args = list_args(package);
        debug!("Running {:?} {}", exe, args.join(" "));

        let output = command(&exe, &args)
            .output()
            .await
            .map_err(|source| CliError::Spawn {
                path: exe.clone(),
                source,
            })?;

        if !output.status.success() {
            let message = failure_message(&output.stdout, &output.stderr);
            warn!("nuget list failed for {}: {}", package, message);
            return Err(CliError::Failed {
                command: "list",
                code: output.status.code(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let versions = parse_list_output(package, &stdout);
        debug!("nuget list reported {} versions of {}", versions.len(), package);
        Ok(versions)
    }

    /// Unlists one version; exit code zero means success
    ///
    /// When `cancel` fires before the process exits, the child is killed
    /// and [`CliError::Cancelled`] is returned.
    pub async fn delete(
        &self,
        package: &PackageId,
        version: &str,
        api_key: &str,
        cancel: &CancelToken,
    ) -> Result<(), CliError> {
        let exe = self.executable().await?;
        let args = delete_args(package, version, api_key, &self.push_source);
        debug!("Running {:?} {}", exe, redact(&args, api_key).join(" "));

        let child = command(&exe, &args)
            .spawn()
            .map_err(|source| CliError::Spawn {
                path: exe.clone(),
                source,
            })?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Cancelled nuget delete for {} {}", package, version);
                return Err(CliError::Cancelled("delete"));
            }
            output = child.wait_with_output() => output.map_err(|source| CliError::Spawn {
                path: exe.clone(),
                source,
            })?,
        };

        if output.status.success() {
            return Ok(());
        }

        let message = failure_message(&output.stdout, &output.stderr);
        Err(CliError::Failed {
            command: "delete",
            code: output.status.code(),
            message: redact_message(&message, api_key),
        })
    }
}

fn command(exe: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

pub fn list_args(package: &PackageId) -> Vec<String> {
    vec![
        "list".to_string(),
        package.normalized().to_string(),
        "-AllVersions".to_string(),
        "-PreRelease".to_string(),
    ]
}

pub fn delete_args(package: &PackageId, version: &str, api_key: &str, source: &str) -> Vec<String> {
    vec![
        "delete".to_string(),
        package.normalized().to_string(),
        version.to_string(),
        "-ApiKey".to_string(),
        api_key.to_string(),
        "-Source".to_string(),
        source.to_string(),
        "-NonInteractive".to_string(),
    ]
}

fn redact(args: &[String], secret: &str) -> Vec<String> {
    args.iter()
        .map(|arg| {
            if !secret.is_empty() && arg == secret {
                REDACTED.to_string()
            } else {
                arg.clone()
            }
        })
        .collect()
}

fn redact_message(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, REDACTED)
}

/// Extracts versions from `nuget list` output
///
/// Relevant lines look like `Contoso.Core 1.2.3`; anything else (feed
/// banners, other packages whose name merely starts the same) is ignored.
pub fn parse_list_output(package: &PackageId, stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let version = parts.next()?;
            name.eq_ignore_ascii_case(package.normalized())
                .then(|| version.to_string())
        })
        .collect()
}

fn failure_message(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        return stderr.trim().to_string();
    }
    String::from_utf8_lossy(stdout).trim().to_string()
}
