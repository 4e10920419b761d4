#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only query layer over the exported micro-zone table.
//!
//! [`MicrozoneTable::load`] reads the CSV written by the ETL once, scores
//! every row with the criticality criteria and keeps the result in memory.
//! All queries borrow the table and never mutate it, so one instance can be
//! shared by many readers.

pub mod scoring;
pub mod stats;

use std::path::{Path, PathBuf};

use microzone_models::IndicatorRow;
use microzone_query_models::{
    Category, CriticalityCriteria, Filter, MAX_LIMIT, Page, Pagination, ScoredRow, Summary,
};
use microzone_source::key::{normalize_ubigeo, parse_key};

/// Errors that can occur while loading or querying the table.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The table or the criteria file could not be read or parsed.
    #[error("Cannot read {}: {message}", .path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// No row matches the requested key.
    #[error("Micro-zone not found: {key}")]
    NotFound {
        /// Key or UBIGEO as requested.
        key: String,
    },
}

/// Loads criticality criteria from a TOML file and normalizes them.
///
/// # Errors
///
/// Returns [`QueryError::Read`] if the file cannot be read or is not valid
/// TOML for [`CriticalityCriteria`].
pub fn load_criteria(path: &Path) -> Result<CriticalityCriteria, QueryError> {
    let read_error = |message: String| QueryError::Read {
        path: path.to_path_buf(),
        message,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
    let criteria: CriticalityCriteria =
        toml::from_str(&contents).map_err(|e| read_error(e.to_string()))?;
    Ok(criteria.normalized())
}

/// Scored micro-zone table held in memory.
#[derive(Debug, Clone)]
pub struct MicrozoneTable {
    rows: Vec<ScoredRow>,
    criteria: CriticalityCriteria,
    reference: f64,
    max_limit: usize,
}

impl MicrozoneTable {
    /// Reads the indicator CSV at `path` and scores it.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Read`] if the file is missing or a row does not
    /// deserialize into an [`IndicatorRow`].
    pub fn load(path: &Path, criteria: CriticalityCriteria) -> Result<Self, QueryError> {
        let read_error = |message: String| QueryError::Read {
            path: path.to_path_buf(),
            message,
        };
        let mut reader = csv::Reader::from_path(path).map_err(|e| read_error(e.to_string()))?;
        let rows = reader
            .deserialize::<IndicatorRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| read_error(e.to_string()))?;

        log::info!("Loaded {} micro-zone(s) from {}", rows.len(), path.display());
        Ok(Self::from_rows(rows, criteria))
    }

    /// Scores already loaded rows. Rows are kept in key order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_rows(mut rows: Vec<IndicatorRow>, criteria: CriticalityCriteria) -> Self {
        rows.sort_by_cached_key(IndicatorRow::key);

        let criteria = criteria.normalized();
        let connections =
            stats::sorted_finite(rows.iter().map(|r| r.water_connections as f64));
        let reference = criteria.reference_or(stats::quantile(&connections, 0.75));
        log::debug!("Scoring against a reference of {reference} connection(s)");

        let rows: Vec<ScoredRow> = rows
            .into_iter()
            .map(|row| scoring::score_row(row, &criteria, reference))
            .collect();

        Self {
            rows,
            criteria,
            reference,
            max_limit: MAX_LIMIT,
        }
    }

    /// Sets the largest page size callers may request.
    #[must_use]
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    /// Number of scored micro-zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no micro-zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All scored rows in key order.
    #[must_use]
    pub fn rows(&self) -> &[ScoredRow] {
        &self.rows
    }

    /// Normalized criteria used for scoring.
    #[must_use]
    pub const fn criteria(&self) -> &CriticalityCriteria {
        &self.criteria
    }

    /// Reference connection count used for the scale gap.
    #[must_use]
    pub const fn reference_connections(&self) -> f64 {
        self.reference
    }

    /// Largest page size a request can get; larger limits are clamped.
    #[must_use]
    pub const fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Filtered, paged listing in key order.
    #[must_use]
    pub fn list(&self, filter: &Filter, pagination: Pagination) -> Page {
        let matching: Vec<&ScoredRow> = self.rows.iter().filter(|r| filter.matches(&r.row)).collect();
        self.page(matching, filter, pagination)
    }

    /// `CRITICA` rows only, highest index first, then filtered and paged.
    #[must_use]
    pub fn critical(&self, filter: &Filter, pagination: Pagination) -> Page {
        let mut matching: Vec<&ScoredRow> = self
            .rows
            .iter()
            .filter(|r| r.category == Category::Critica && filter.matches(&r.row))
            .collect();
        matching.sort_by(|a, b| {
            b.index
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&a.index.unwrap_or(f64::NEG_INFINITY))
        });
        self.page(matching, filter, pagination)
    }

    /// Table-wide statistics.
    #[must_use]
    pub fn summary(&self) -> Summary {
        stats::summarize(&self.rows)
    }

    /// Looks up one row by its rendered key (`ubigeo|year|month|zone`) or,
    /// when the input has no separator, by UBIGEO. A UBIGEO that covers
    /// several periods or zones returns the first in key order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] if no row matches.
    pub fn detail(&self, requested: &str) -> Result<&ScoredRow, QueryError> {
        let found = if requested.contains('|') {
            parse_key(requested).and_then(|key| self.rows.iter().find(|r| r.row.key() == key))
        } else {
            let ubigeo = normalize_ubigeo(requested);
            self.rows.iter().find(|r| r.row.ubigeo == ubigeo)
        };
        found.ok_or_else(|| QueryError::NotFound {
            key: requested.to_string(),
        })
    }

    fn page(&self, matching: Vec<&ScoredRow>, filter: &Filter, pagination: Pagination) -> Page {
        let pagination = pagination.clamped(self.max_limit);
        let messages = stats::page_messages(&matching);
        let total = matching.len();
        let rows = matching
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.limit)
            .cloned()
            .collect();

        Page {
            total,
            rows,
            pagination,
            filter: filter.clone(),
            messages,
        }
    }
}
