//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use nuget_manager::cancel::CancelToken;
use nuget_manager::mutation::PackageMutator;
use nuget_manager::tool::CliError;
use nuget_manager::version::error::SourceError;
use nuget_manager::version::source::{SourceOutput, VersionSource};
use nuget_manager::version::types::{PackageId, SourceKind, VersionRecord};

/// Source returning canned records per package
pub struct FakeSource {
    kind: SourceKind,
    versions: HashMap<String, Vec<VersionRecord>>,
}

impl FakeSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            versions: HashMap::new(),
        }
    }

    pub fn with_versions(mut self, package: &str, records: Vec<VersionRecord>) -> Self {
        self.versions.insert(package.to_lowercase(), records);
        self
    }
}

#[async_trait]
impl VersionSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError> {
        match self.versions.get(package.normalized()) {
            Some(records) => Ok(SourceOutput::new(records.clone())),
            None => Err(SourceError::NotFound(package.normalized().to_string())),
        }
    }
}

/// Mutator that records every call; versions in `failing` return an error
#[derive(Default)]
pub struct RecordingMutator {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
    block_until_cancelled: bool,
    started: tokio::sync::Notify,
}

impl RecordingMutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, version: &str) -> Self {
        self.failing.push(version.to_string());
        self
    }

    /// Every call waits for its cancel token before returning
    pub fn blocking(mut self) -> Self {
        self.block_until_cancelled = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Resolves once a call has started
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl PackageMutator for RecordingMutator {
    async fn prepare(&self) -> Result<(), CliError> {
        Ok(())
    }

    async fn unlist(
        &self,
        _package: &PackageId,
        version: &str,
        _credential: &str,
        cancel: &CancelToken,
    ) -> Result<(), CliError> {
        self.calls.lock().unwrap().push(version.to_string());
        self.started.notify_one();

        if self.block_until_cancelled {
            cancel.cancelled().await;
            return Err(CliError::Cancelled("delete"));
        }

        if self.failing.iter().any(|v| v == version) {
            return Err(CliError::Failed {
                command: "delete",
                code: Some(1),
                message: format!("{version} could not be unlisted"),
            });
        }
        Ok(())
    }
}

pub fn package(name: &str) -> PackageId {
    PackageId::new(name).unwrap()
}

pub fn versions(list: &[&str]) -> Vec<String> {
    list.iter().map(|v| v.to_string()).collect()
}
