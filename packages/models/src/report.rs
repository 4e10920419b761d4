//! Run report accumulated by the pipeline.
//!
//! Recoverable problems (undecodable rows, merged duplicates, discarded
//! classes) never abort a run; they are counted here so the caller can
//! surface them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Counters for one cleaned source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    /// Source name (`conexiones`, `longitudes`, `proyectos`).
    pub source: String,
    /// Records that decoded successfully.
    pub records_read: u64,
    /// Records dropped because they failed to decode.
    pub records_dropped: u64,
    /// Records merged into an earlier record with the same key.
    pub duplicates_merged: u64,
    /// Records discarded because a categorical value was invalid.
    pub records_discarded: u64,
    /// Records emitted after cleaning (after expansion and merging).
    pub records_cleaned: u64,
}

impl SourceReport {
    /// Creates an empty report for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Human-readable warnings for this source. Merged duplicates are
    /// informational and do not produce a warning.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.records_dropped > 0 {
            warnings.push(format!(
                "{}: {} record(s) dropped because they could not be decoded",
                self.source, self.records_dropped
            ));
        }
        if self.records_discarded > 0 {
            warnings.push(format!(
                "{}: {} record(s) discarded due to an invalid network class",
                self.source, self.records_discarded
            ));
        }
        warnings
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Location of the exported table.
    pub output_path: PathBuf,
    /// Per-source counters, in processing order.
    pub sources: Vec<SourceReport>,
    /// Data rows written (excluding the header).
    pub rows_written: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl RunReport {
    /// All warnings across sources.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.sources
            .iter()
            .flat_map(SourceReport::warnings)
            .collect()
    }

    /// Looks up the counters of one source by name.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_has_no_warnings() {
        let report = SourceReport {
            duplicates_merged: 4,
            ..SourceReport::new("conexiones")
        };
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn run_warnings_collect_every_source() {
        let report = RunReport {
            output_path: PathBuf::from("out.csv"),
            sources: vec![
                SourceReport {
                    records_dropped: 2,
                    ..SourceReport::new("conexiones")
                },
                SourceReport {
                    records_discarded: 1,
                    ..SourceReport::new("longitudes")
                },
            ],
            rows_written: 3,
            duration: Duration::from_millis(5),
        };
        let warnings = report.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("conexiones: 2"));
        assert!(warnings[1].contains("invalid network class"));
        assert_eq!(report.source("longitudes").unwrap().records_discarded, 1);
        assert!(report.source("proyectos").is_none());
    }
}
