//! NuGet command-line tool integration
//!
//! - [`locator`]: finds `nuget.exe` once and caches the path
//! - [`nuget_cli`]: runs `list` and `delete` commands

pub mod locator;
pub mod nuget_cli;

pub use locator::ToolLocator;
pub use nuget_cli::NugetCli;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("NuGet CLI not found")]
    NotFound,

    #[error("Failed to run {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("nuget {command} exited with code {code:?}: {message}")]
    Failed {
        command: &'static str,
        code: Option<i32>,
        message: String,
    },

    #[error("nuget {0} was cancelled")]
    Cancelled(&'static str),

    #[error("NuGet CLI lookup failed: {0}")]
    Lookup(String),
}
