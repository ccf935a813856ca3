//! Version resolution across sources
//!
//! Runs the sources picked by a [`SourceSelector`] one after another,
//! concatenates what they return, optionally calibrates listed flags, then
//! deduplicates (first-seen wins, so source order matters) and sorts.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::version::calibrator::{CalibrationReport, StatusCalibrator};
use crate::version::error::ResolveError;
use crate::version::ordering::VersionOrdering;
use crate::version::source::VersionSource;
use crate::version::types::{PackageId, ResolutionResult, SourceKind, SourceSelector, VersionRecord};

/// What one source contributed to a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: SourceKind,
    pub found: usize,
    /// Set when the source failed and contributed nothing
    pub error: Option<String>,
    pub notes: Vec<String>,
}

impl SourceReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Human-readable log lines for this source
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = match &self.error {
            Some(error) => vec![format!("× {} failed: {}", self.source, error)],
            None => vec![format!("✓ {}: {} versions", self.source, self.found)],
        };
        lines.extend(self.notes.iter().map(|note| format!("  {note}")));
        lines
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Cross-check listed flags against the configured status authorities
    pub calibrate: bool,
}

/// Outcome of [`VersionResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub result: ResolutionResult,
    pub reports: Vec<SourceReport>,
    pub calibration: Option<CalibrationReport>,
}

impl Resolution {
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.reports.iter().flat_map(SourceReport::log_lines).collect();
        if let Some(calibration) = &self.calibration {
            lines.extend(calibration.notes.iter().map(|note| format!("  {note}")));
        }
        lines.push(format!("✓ Found {} versions total", self.result.len()));
        lines
    }
}

pub struct VersionResolver {
    sources: HashMap<SourceKind, Arc<dyn VersionSource>>,
    calibrator: Option<StatusCalibrator>,
    ordering: VersionOrdering,
}

impl VersionResolver {
    pub fn new(sources: Vec<Arc<dyn VersionSource>>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.kind(), s)).collect(),
            calibrator: None,
            ordering: VersionOrdering::default(),
        }
    }

    pub fn with_calibrator(mut self, calibrator: StatusCalibrator) -> Self {
        self.calibrator = Some(calibrator);
        self
    }

    pub fn with_ordering(mut self, ordering: VersionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sources to run for `selector`; unregistered sources fall back to the
    /// flat container
    fn plan(&self, selector: SourceSelector) -> Vec<Arc<dyn VersionSource>> {
        let mut planned: Vec<Arc<dyn VersionSource>> = Vec::new();
        for kind in selector.plan() {
            let source = self
                .sources
                .get(&kind)
                .or_else(|| {
                    warn!("Source {} is not configured, using package base address", kind);
                    self.sources.get(&SourceKind::FlatContainer)
                })
                .cloned();

            if let Some(source) = source {
                if !planned.iter().any(|p| p.kind() == source.kind()) {
                    planned.push(source);
                }
            }
        }
        planned
    }

    pub async fn resolve(
        &self,
        package: &PackageId,
        selector: SourceSelector,
        options: ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let plan = self.plan(selector);
        info!("Resolving {} with {:?} ({} sources)", package, selector, plan.len());

        let mut records: Vec<VersionRecord> = Vec::new();
        let mut reports = Vec::with_capacity(plan.len());

        for source in &plan {
            let report = match source.fetch_versions(package).await {
                Ok(output) => {
                    info!("{} returned {} versions of {}", source.kind(), output.records.len(), package);
                    let report = SourceReport {
                        source: source.kind(),
                        found: output.records.len(),
                        error: None,
                        notes: output.notes,
                    };
                    records.extend(output.records);
                    report
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", source.kind(), package, e);
                    SourceReport {
                        source: source.kind(),
                        found: 0,
                        error: Some(e.to_string()),
                        notes: Vec::new(),
                    }
                }
            };
            reports.push(report);
        }

        if plan.len() > 1 && reports.iter().all(SourceReport::failed) {
            return Err(ResolveError::AllSourcesFailed {
                package: package.to_string(),
                failures: reports
                    .into_iter()
                    .map(|r| (r.source, r.error.unwrap_or_default()))
                    .collect(),
            });
        }

        let calibration = match (&self.calibrator, options.calibrate) {
            (Some(calibrator), true) => Some(calibrator.calibrate(package, &mut records).await),
            (None, true) => {
                warn!("Calibration requested but no calibrator is configured");
                None
            }
            _ => None,
        };

        let result = ResolutionResult::from_records(records, self.ordering);
        info!(
            "Resolved {} versions of {} ({} listed, {} unlisted)",
            result.len(),
            package,
            result.listed_count(),
            result.unlisted_count()
        );

        Ok(Resolution {
            result,
            reports,
            calibration,
        })
    }
}
