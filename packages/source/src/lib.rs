#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Source cleaners and micro-zone key normalization.
//!
//! Each raw extract (connections, network length, projects) implements the
//! [`SourceCleaner`] trait: [`SourceCleaner::load`] reads the file into an
//! untyped [`RawTable`], and [`SourceCleaner::clean`] resolves columns,
//! coerces values, normalizes the key and merges duplicate keys.

pub mod columns;
pub mod connections;
pub mod key;
pub mod lengths;
pub mod parsing;
pub mod projects;
pub mod reader;

use std::path::{Path, PathBuf};

use microzone_models::SourceReport;
use strum_macros::{AsRefStr, Display, EnumString};

pub use columns::{ColumnMapping, ColumnOverrides};
pub use connections::ConnectionsCleaner;
pub use lengths::NetworkLengthCleaner;
pub use projects::ProjectsCleaner;
pub use reader::{RawRecord, RawTable};

/// Errors that can occur while loading or cleaning a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be read or is not tabular.
    #[error("Cannot read source {}: {message}", .path.display())]
    SourceRead {
        /// Location that failed.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Required columns could not be resolved.
    #[error("Schema error in {dataset}: missing required column(s): {}", .missing.join(", "))]
    Schema {
        /// Source name.
        dataset: String,
        /// Every semantic field that has no matching header.
        missing: Vec<String>,
    },

    /// A column mapping or override is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// The three raw extracts the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// Water and sewage connections.
    Conexiones,
    /// Network length by class.
    Longitudes,
    /// Infrastructure projects.
    Proyectos,
}

impl SourceKind {
    /// Returns all variants in processing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Conexiones, Self::Longitudes, Self::Proyectos]
    }
}

/// Output of a cleaner: one record per canonical key plus counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSource<R> {
    /// Cleaned records in key order.
    pub records: Vec<R>,
    /// Read, dropped, merged and discarded counters.
    pub report: SourceReport,
}

/// Trait implemented by each source cleaner.
///
/// Cleaners are pure apart from [`load`](SourceCleaner::load): cleaning the
/// same [`RawTable`] twice gives identical output.
pub trait SourceCleaner {
    /// Cleaned record type produced by this source.
    type Record;

    /// Which extract this cleaner handles.
    fn kind(&self) -> SourceKind;

    /// Reads the raw file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::SourceRead`] if the file is unreadable or not
    /// tabular.
    fn load(&self, path: &Path) -> Result<RawTable, SourceError> {
        log::info!("Loading {} from {}", self.kind(), path.display());
        reader::read_table(path)
    }

    /// Cleans a loaded table.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Schema`] if required columns are missing.
    fn clean(&self, raw: &RawTable) -> Result<CleanedSource<Self::Record>, SourceError>;

    /// Loads and cleans in one step.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`load`](SourceCleaner::load) and
    /// [`clean`](SourceCleaner::clean).
    fn load_and_clean(&self, path: &Path) -> Result<CleanedSource<Self::Record>, SourceError> {
        let raw = self.load(path)?;
        let cleaned = self.clean(&raw)?;
        for warning in cleaned.report.warnings() {
            log::warn!("{warning}");
        }
        Ok(cleaned)
    }
}

/// Keeps the last non-null value seen for a categorical field.
pub(crate) fn keep_last<T>(current: &mut Option<T>, next: Option<T>) {
    if next.is_some() {
        *current = next;
    }
}

/// Starts a report for `kind` from the counters of the raw table.
#[must_use]
pub(crate) fn start_report(kind: SourceKind, raw: &RawTable) -> SourceReport {
    SourceReport {
        records_read: raw.records.len() as u64,
        records_dropped: raw.dropped,
        ..SourceReport::new(kind.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_round_trips_through_strings() {
        for kind in SourceKind::all() {
            let parsed: SourceKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert_eq!(SourceKind::Longitudes.to_string(), "longitudes");
    }

    #[test]
    fn schema_error_lists_columns() {
        let err = SourceError::Schema {
            dataset: "conexiones".to_string(),
            missing: vec!["tarifa".to_string(), "ubigeo".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Schema error in conexiones: missing required column(s): tarifa, ubigeo"
        );
    }
}
