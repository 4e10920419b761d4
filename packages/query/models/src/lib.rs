#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Criticality criteria, filters, and query result types for micro-zones.
//!
//! These types are independent of how the indicator table is stored. The
//! query crate fills them from the exported CSV; the server maps them to its
//! own JSON contract.

use std::collections::BTreeMap;

use microzone_models::IndicatorRow;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: usize = 50;

/// Largest page size a caller may ask for.
pub const MAX_LIMIT: usize = 200;

/// Weights and thresholds of the criticality index.
///
/// Deserialized from TOML with every field optional. Raw values may be out
/// of range; call [`CriticalityCriteria::normalized`] before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalityCriteria {
    /// Weight of the sewage coverage gap (`1 - ratio`).
    pub ratio_weight: f64,
    /// Weight of the connection-scale gap.
    pub connections_weight: f64,
    /// Water connections at which a micro-zone counts as fully covered.
    /// When absent the 75th percentile of the loaded table is used.
    pub reference_connections: Option<f64>,
    /// Index at or above which a micro-zone is `VIGILANCIA`.
    pub alert_threshold: f64,
    /// Index at or above which a micro-zone is `CRITICA`.
    pub critical_threshold: f64,
}

impl Default for CriticalityCriteria {
    fn default() -> Self {
        Self {
            ratio_weight: 0.6,
            connections_weight: 0.4,
            reference_connections: Some(15_162.0),
            alert_threshold: 0.3,
            critical_threshold: 0.6,
        }
    }
}

impl CriticalityCriteria {
    /// Returns a copy with weights summing to one, a reference of at least
    /// one connection and thresholds ordered inside `0..=1`.
    ///
    /// Negative weights are clipped to zero before renormalizing; when both
    /// end up zero they are split evenly.
    #[must_use]
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let ratio = finite_or(self.ratio_weight, 0.0).max(0.0);
        let connections = finite_or(self.connections_weight, 0.0).max(0.0);
        let sum = ratio + connections;
        let (ratio_weight, connections_weight) = if sum > 0.0 {
            (ratio / sum, connections / sum)
        } else {
            (0.5, 0.5)
        };

        let reference_connections = self
            .reference_connections
            .filter(|r| r.is_finite())
            .map(|r| r.max(1.0));

        let mut alert = finite_or(self.alert_threshold, defaults.alert_threshold).clamp(0.0, 1.0);
        let mut critical =
            finite_or(self.critical_threshold, defaults.critical_threshold).clamp(0.0, 1.0);
        if alert > critical {
            std::mem::swap(&mut alert, &mut critical);
        }

        Self {
            ratio_weight,
            connections_weight,
            reference_connections,
            alert_threshold: alert,
            critical_threshold: critical,
        }
    }

    /// Reference connection count to score against: the configured one, or
    /// `fallback` (usually the data's 75th percentile) when unset, or `1.0`
    /// when neither is positive.
    #[must_use]
    pub fn reference_or(&self, fallback: Option<f64>) -> f64 {
        self.reference_connections
            .or(fallback)
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(1.0)
    }
}

const fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() { value } else { default }
}

/// Criticality band of a scored micro-zone.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Index at or above the critical threshold.
    Critica,
    /// Index at or above the alert threshold.
    Vigilancia,
    /// Index below the alert threshold.
    Estable,
    /// No usable index.
    SinDatos,
}

impl Category {
    /// All categories, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Critica, Self::Vigilancia, Self::Estable, Self::SinDatos]
    }

    /// Bands an index against normalized criteria. A missing or
    /// non-finite index is [`Category::SinDatos`].
    #[must_use]
    pub fn classify(index: Option<f64>, criteria: &CriticalityCriteria) -> Self {
        match index {
            Some(i) if i.is_finite() && i >= criteria.critical_threshold => Self::Critica,
            Some(i) if i.is_finite() && i >= criteria.alert_threshold => Self::Vigilancia,
            Some(i) if i.is_finite() => Self::Estable,
            _ => Self::SinDatos,
        }
    }
}

/// Per-row data-quality warning. The serialized name is the short flag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DataWarning {
    /// Water network length is zero.
    SinLongitudAgua,
    /// Sewage network length is zero.
    SinLongitudDesague,
    /// No active project matched the micro-zone.
    SinProyectos,
    /// Zero water connections.
    SinConexionesAgua,
    /// More sewage than water connections.
    RatioMayorUno,
}

impl DataWarning {
    /// Human-readable text shown next to the row.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SinLongitudAgua => "Sin longitud de red de agua reportada.",
            Self::SinLongitudDesague => "Sin longitud de red de desagüe reportada.",
            Self::SinProyectos => "Sin proyectos activos registrados para la microzona.",
            Self::SinConexionesAgua => "Sin conexiones de agua registradas.",
            Self::RatioMayorUno => {
                "El ratio de alcantarillado supera la unidad; revisar consistencia."
            }
        }
    }
}

/// Row filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Service-management unit, compared case-insensitively.
    pub service_unit: Option<String>,
    /// Minimum water connections, inclusive.
    pub min_water_connections: Option<u64>,
    /// Maximum water connections, inclusive.
    pub max_water_connections: Option<u64>,
    /// Maximum sewage ratio, inclusive.
    pub max_ratio: Option<f64>,
}

impl Filter {
    /// Whether `row` passes every set criterion.
    #[must_use]
    pub fn matches(&self, row: &IndicatorRow) -> bool {
        if let Some(unit) = self
            .service_unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            let same = row
                .service_unit
                .as_deref()
                .is_some_and(|s| s.trim().to_lowercase() == unit.to_lowercase());
            if !same {
                return false;
            }
        }
        if self
            .min_water_connections
            .is_some_and(|min| row.water_connections < min)
        {
            return false;
        }
        if self
            .max_water_connections
            .is_some_and(|max| row.water_connections > max)
        {
            return false;
        }
        if let Some(max) = self.max_ratio {
            let ratio = if row.sewage_ratio.is_finite() {
                row.sewage_ratio
            } else {
                0.0
            };
            if ratio > max {
                return false;
            }
        }
        true
    }
}

/// Page window over a filtered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum rows returned.
    pub limit: usize,
    /// Rows skipped before the first returned one.
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Returns a copy whose limit lies in `1..=max_limit`.
    #[must_use]
    pub fn clamped(self, max_limit: usize) -> Self {
        Self {
            limit: self.limit.clamp(1, max_limit.max(1)),
            offset: self.offset,
        }
    }
}

/// Machine-readable code of a [`ServiceMessage`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    /// The filters matched nothing.
    SinResultados,
    /// Every matching row has zero water network length.
    LongitudAguaCero,
    /// Every matching row has zero sewage network length.
    LongitudDesagueCero,
    /// No matching row has an active project.
    SinProyectosActivos,
    /// Some matching row has a sewage ratio above one.
    RatioSuperiorUno,
    /// The requested key or UBIGEO is unknown.
    MicrozonaNoEncontrada,
}

impl MessageCode {
    /// Builds the full message for this code.
    #[must_use]
    pub fn message(self) -> ServiceMessage {
        let (detail, plain_explanation) = match self {
            Self::SinResultados => (
                "La combinación de filtros no devolvió microzonas.",
                "No hay registros que cumplan los criterios seleccionados.",
            ),
            Self::LongitudAguaCero => (
                "Todas las microzonas seleccionadas reportan longitud de red de agua igual a cero.",
                "No se cuenta con información de longitud de red de agua para estas zonas.",
            ),
            Self::LongitudDesagueCero => (
                "Todas las microzonas seleccionadas reportan longitud de red de desagüe igual a cero.",
                "No se cuenta con información de red de desagüe para estas zonas.",
            ),
            Self::SinProyectosActivos => (
                "No existen proyectos activos registrados para las microzonas devueltas.",
                "No hay intervenciones en curso para estas microzonas.",
            ),
            Self::RatioSuperiorUno => (
                "Existen microzonas con ratio de alcantarillado mayor a 1; podría indicar inconsistencias.",
                "Algunas zonas muestran más conexiones de desagüe que de agua.",
            ),
            Self::MicrozonaNoEncontrada => (
                "No se halló la microzona solicitada.",
                "Revisa el código UBIGEO proporcionado.",
            ),
        };
        ServiceMessage {
            code: self,
            detail: detail.to_string(),
            plain_explanation: plain_explanation.to_string(),
        }
    }
}

/// Contextual note attached to a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMessage {
    /// Machine-readable code.
    pub code: MessageCode,
    /// Technical description.
    pub detail: String,
    /// Explanation for non-specialists.
    pub plain_explanation: String,
}

/// An indicator row with its criticality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// Indicator row as exported.
    pub row: IndicatorRow,
    /// Criticality index rounded to three decimals.
    pub index: Option<f64>,
    /// Band of `index`.
    pub category: Category,
    /// Data-quality warnings, in declaration order.
    pub warnings: Vec<DataWarning>,
}

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Rows matching the filter, before paging.
    pub total: usize,
    /// Rows inside the window.
    pub rows: Vec<ScoredRow>,
    /// Effective window after clamping.
    pub pagination: Pagination,
    /// Filter the rows were selected with.
    pub filter: Filter,
    /// Quality notes over the whole filtered set.
    pub messages: Vec<ServiceMessage>,
}

/// Water-connection percentiles, `None` on an empty table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPercentiles {
    /// 10th percentile.
    pub p10: Option<f64>,
    /// 25th percentile.
    pub p25: Option<f64>,
    /// 50th percentile.
    pub median: Option<f64>,
    /// 75th percentile.
    pub p75: Option<f64>,
}

/// Table-wide statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Rows in the table.
    pub total: usize,
    /// Percentiles of water connections.
    pub connection_percentiles: ConnectionPercentiles,
    /// Median sewage ratio over finite values.
    pub median_ratio: Option<f64>,
    /// Largest finite sewage ratio.
    pub max_ratio: Option<f64>,
    /// Mean water network density over finite values.
    pub mean_water_density: Option<f64>,
    /// Mean sewage network density over finite values.
    pub mean_sewage_density: Option<f64>,
    /// Rows flagged `faltan_datos_proyectos`.
    pub missing_project_data: usize,
    /// Rows flagged `faltan_datos_longitud`.
    pub missing_length_data: usize,
    /// Rows flagged `registros_inconsistentes`.
    pub inconsistent_records: usize,
    /// Rows per category, every category present.
    pub categories: BTreeMap<Category, usize>,
    /// Table-wide quality warnings.
    pub warnings: Vec<String>,
}
