#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the micro-zone server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the query result types to allow independent evolution of the API
//! contract. Indicator rows are flattened with their table column names so
//! API clients see the same fields as the exported CSV.

use std::collections::BTreeMap;

use microzone_models::IndicatorRow;
use microzone_query_models::{
    Category, ConnectionPercentiles, DataWarning, Filter, MessageCode, Page, Pagination,
    ScoredRow, ServiceMessage, Summary,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Micro-zones loaded at start-up.
    pub microzones: usize,
}

/// Query parameters shared by the listing endpoints.
///
/// The Spanish names used by earlier clients are accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrozoneQueryParams {
    /// Service-management unit (case-insensitive).
    #[serde(alias = "gerencia_servicios")]
    pub service_unit: Option<String>,
    /// Minimum water connections.
    #[serde(alias = "conexiones_min")]
    pub min_connections: Option<u64>,
    /// Maximum water connections.
    #[serde(alias = "conexiones_max")]
    pub max_connections: Option<u64>,
    /// Maximum sewage ratio.
    #[serde(alias = "ratio_max")]
    pub max_ratio: Option<f64>,
    /// Page size.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: Option<usize>,
}

impl MicrozoneQueryParams {
    /// Row filter described by these parameters.
    #[must_use]
    pub fn filter(&self) -> Filter {
        Filter {
            service_unit: self.service_unit.clone(),
            min_water_connections: self.min_connections,
            max_water_connections: self.max_connections,
            max_ratio: self.max_ratio,
        }
    }

    /// Page window, using `default_limit` when no limit was given.
    #[must_use]
    pub fn pagination(&self, default_limit: usize) -> Pagination {
        Pagination {
            limit: self.limit.unwrap_or(default_limit),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Score and warnings of a micro-zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIndicators {
    /// Criticality index in `0..=1`, three decimals.
    pub criticality_index: Option<f64>,
    pub category: Category,
    /// Human-readable warnings.
    pub data_warnings: Vec<String>,
}

/// Data-quality summary of a micro-zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiQualityMetadata {
    pub total_warnings: usize,
    /// Short flag per warning.
    pub flags: Vec<DataWarning>,
}

/// A micro-zone as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMicrozone {
    /// Rendered key, usable with `GET /api/microzonas/{key}`.
    pub key: String,
    #[serde(flatten)]
    pub row: IndicatorRow,
    pub indicators: ApiIndicators,
    pub quality_metadata: ApiQualityMetadata,
}

impl From<&ScoredRow> for ApiMicrozone {
    fn from(scored: &ScoredRow) -> Self {
        Self {
            key: scored.row.key().to_string(),
            row: scored.row.clone(),
            indicators: ApiIndicators {
                criticality_index: scored.index,
                category: scored.category,
                data_warnings: scored
                    .warnings
                    .iter()
                    .map(|w| w.message().to_string())
                    .collect(),
            },
            quality_metadata: ApiQualityMetadata {
                total_warnings: scored.warnings.len(),
                flags: scored.warnings.clone(),
            },
        }
    }
}

/// A contextual message, also used as the body of error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    pub code: MessageCode,
    pub detail: String,
    pub plain_explanation: String,
}

impl From<ServiceMessage> for ApiMessage {
    fn from(message: ServiceMessage) -> Self {
        Self {
            code: message.code,
            detail: message.detail,
            plain_explanation: message.plain_explanation,
        }
    }
}

/// Filters echoed back with a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFilters {
    pub service_unit: Option<String>,
    pub min_connections: Option<u64>,
    pub max_connections: Option<u64>,
    pub max_ratio: Option<f64>,
}

impl From<Filter> for ApiFilters {
    fn from(filter: Filter) -> Self {
        Self {
            service_unit: filter.service_unit,
            min_connections: filter.min_water_connections,
            max_connections: filter.max_water_connections,
            max_ratio: filter.max_ratio,
        }
    }
}

/// Effective page window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPagination {
    pub limit: usize,
    pub offset: usize,
}

/// One page of micro-zones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMicrozonePage {
    /// Micro-zones matching the filters, before paging.
    pub total: usize,
    pub microzones: Vec<ApiMicrozone>,
    pub pagination: ApiPagination,
    pub filters: ApiFilters,
    pub messages: Vec<ApiMessage>,
}

impl From<Page> for ApiMicrozonePage {
    fn from(page: Page) -> Self {
        Self {
            total: page.total,
            microzones: page.rows.iter().map(ApiMicrozone::from).collect(),
            pagination: ApiPagination {
                limit: page.pagination.limit,
                offset: page.pagination.offset,
            },
            filters: page.filter.into(),
            messages: page.messages.into_iter().map(ApiMessage::from).collect(),
        }
    }
}

/// Water-connection percentiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPercentiles {
    pub p10: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
}

impl From<ConnectionPercentiles> for ApiPercentiles {
    fn from(p: ConnectionPercentiles) -> Self {
        Self {
            p10: p.p10,
            p25: p.p25,
            median: p.median,
            p75: p.p75,
        }
    }
}

/// Table-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSummary {
    pub total_microzones: usize,
    pub connection_percentiles: ApiPercentiles,
    pub median_ratio: Option<f64>,
    pub max_ratio: Option<f64>,
    pub mean_water_density: Option<f64>,
    pub mean_sewage_density: Option<f64>,
    pub missing_project_data: usize,
    pub missing_length_data: usize,
    pub inconsistent_records: usize,
    /// Micro-zones per criticality category.
    pub categories: BTreeMap<Category, usize>,
    pub global_warnings: Vec<String>,
}

impl From<Summary> for ApiSummary {
    fn from(summary: Summary) -> Self {
        Self {
            total_microzones: summary.total,
            connection_percentiles: summary.connection_percentiles.into(),
            median_ratio: summary.median_ratio,
            max_ratio: summary.max_ratio,
            mean_water_density: summary.mean_water_density,
            mean_sewage_density: summary.mean_sewage_density,
            missing_project_data: summary.missing_project_data,
            missing_length_data: summary.missing_length_data,
            inconsistent_records: summary.inconsistent_records,
            categories: summary.categories,
            global_warnings: summary.warnings,
        }
    }
}
