//! Listed-status calibration
//!
//! Fast sources disagree about visibility: the flat container reports every
//! version as listed, and the registration API can lag behind an unlist.
//! The calibrator asks authoritative sources in turn and overwrites the
//! `listed` flag wherever they disagree. Authorities consulted later win.
//!
//! Calibration only corrects flags; it never adds or drops versions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::version::source::StatusAuthority;
use crate::version::types::{PackageId, VersionRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationReport {
    /// Number of flag overwrites across all authorities
    pub corrections: usize,
    pub notes: Vec<String>,
}

pub struct StatusCalibrator {
    authorities: Vec<Arc<dyn StatusAuthority>>,
}

impl StatusCalibrator {
    /// Authorities are consulted in order; later ones override earlier ones
    pub fn new(authorities: Vec<Arc<dyn StatusAuthority>>) -> Self {
        Self { authorities }
    }

    pub async fn calibrate(
        &self,
        package: &PackageId,
        records: &mut [VersionRecord],
    ) -> CalibrationReport {
        let mut report = CalibrationReport::default();
        if records.is_empty() {
            return report;
        }

        for authority in &self.authorities {
            let snapshot = match authority.lookup_status(package).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Skipping {} calibration for {}: {}", authority.name(), package, e);
                    report
                        .notes
                        .push(format!("{} calibration skipped: {}", authority.name(), e));
                    continue;
                }
            };

            if snapshot.is_empty() {
                info!("{} reported no versions of {}, skipping calibration", authority.name(), package);
                report
                    .notes
                    .push(format!("{} calibration skipped: no versions reported", authority.name()));
                continue;
            }

            let mut corrected = 0;
            for record in records.iter_mut() {
                let Some(listed) = snapshot.status_of(&record.version) else {
                    continue;
                };
                if record.listed != listed {
                    debug!(
                        "Status corrected by {}: {} listed {} -> {}",
                        authority.name(),
                        record.version,
                        record.listed,
                        listed
                    );
                    record.listed = listed;
                    corrected += 1;
                }
            }

            report.corrections += corrected;
            report.notes.push(format!(
                "{} calibration: {} corrections against {} versions",
                authority.name(),
                corrected,
                snapshot.len()
            ));
        }

        let listed = records.iter().filter(|r| r.listed).count();
        info!(
            "Calibrated {}: {} corrections, {} listed, {} unlisted",
            package,
            report.corrections,
            listed,
            records.len() - listed
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::error::SourceError;
    use crate::version::source::{MockStatusAuthority, StatusSnapshot};

    fn package() -> PackageId {
        PackageId::new("Contoso").unwrap()
    }

    fn authority(name: &'static str, snapshot: StatusSnapshot) -> Arc<dyn StatusAuthority> {
        let mut mock = MockStatusAuthority::new();
        mock.expect_name().return_const(name);
        mock.expect_lookup_status()
            .times(1)
            .returning(move |_| Ok(snapshot.clone()));
        Arc::new(mock)
    }

    fn failing_authority(name: &'static str) -> Arc<dyn StatusAuthority> {
        let mut mock = MockStatusAuthority::new();
        mock.expect_name().return_const(name);
        mock.expect_lookup_status()
            .times(1)
            .returning(|_| Err(SourceError::InvalidResponse("boom".to_string())));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn calibrate_overwrites_conflicting_flags() {
        let calibrator = StatusCalibrator::new(vec![authority(
            "registration api",
            StatusSnapshot::partial([("v1".to_string(), false), ("v2".to_string(), false)]),
        )]);
        let mut records = vec![VersionRecord::listed("v1"), VersionRecord::unlisted("v2")];

        let report = calibrator.calibrate(&package(), &mut records).await;

        assert_eq!(
            records,
            vec![VersionRecord::unlisted("v1"), VersionRecord::unlisted("v2")]
        );
        assert_eq!(report.corrections, 1);
    }

    #[tokio::test]
    async fn calibrate_never_adds_versions_from_the_authority() {
        let calibrator = StatusCalibrator::new(vec![authority(
            "registration api",
            StatusSnapshot::partial([("1.0.0".to_string(), true), ("9.0.0".to_string(), false)]),
        )]);
        let mut records = vec![VersionRecord::unlisted("1.0.0"), VersionRecord::listed("2.0.0")];

        calibrator.calibrate(&package(), &mut records).await;

        assert_eq!(
            records,
            vec![VersionRecord::listed("1.0.0"), VersionRecord::listed("2.0.0")]
        );
    }

    #[tokio::test]
    async fn later_authority_overrides_earlier_one() {
        let calibrator = StatusCalibrator::new(vec![
            authority("nuget cli", StatusSnapshot::listed_set(["2.0.0".to_string()])),
            authority(
                "registration api",
                StatusSnapshot::partial([("1.0.0".to_string(), true)]),
            ),
        ]);
        let mut records = vec![
            VersionRecord::listed("2.0.0"),
            VersionRecord::listed("1.0.0"),
            VersionRecord::listed("0.9.0"),
        ];

        let report = calibrator.calibrate(&package(), &mut records).await;

        assert_eq!(
            records,
            vec![
                VersionRecord::listed("2.0.0"),
                VersionRecord::listed("1.0.0"),
                VersionRecord::unlisted("0.9.0"),
            ]
        );
        // cli unlists 1.0.0 and 0.9.0, registration relists 1.0.0
        assert_eq!(report.corrections, 3);
    }

    #[tokio::test]
    async fn unavailable_or_empty_authorities_are_skipped() {
        let calibrator = StatusCalibrator::new(vec![
            failing_authority("nuget cli"),
            authority("registration api", StatusSnapshot::default()),
        ]);
        let mut records = vec![VersionRecord::listed("1.0.0")];

        let report = calibrator.calibrate(&package(), &mut records).await;

        assert_eq!(records, vec![VersionRecord::listed("1.0.0")]);
        assert_eq!(report.corrections, 0);
        assert_eq!(report.notes.len(), 2);
        assert!(report.notes[0].contains("nuget cli calibration skipped"));
    }

    #[tokio::test]
    async fn calibrate_skips_lookup_for_empty_records() {
        let mut mock = MockStatusAuthority::new();
        mock.expect_lookup_status().times(0);
        let calibrator = StatusCalibrator::new(vec![Arc::new(mock)]);

        let report = calibrator.calibrate(&package(), &mut []).await;

        assert_eq!(report, CalibrationReport::default());
    }
}
