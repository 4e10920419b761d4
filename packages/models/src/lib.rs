#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Micro-zone key, cleaned record, and indicator row types.
//!
//! This crate defines the shared vocabulary of the micro-zone pipeline:
//! the canonical [`MicrozoneKey`] every source is joined on, the cleaned
//! per-source records, the [`IntegratedRow`] produced by the join, and the
//! persisted [`IndicatorRow`] whose field order *is* the exported schema.

pub mod report;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use report::{RunReport, SourceReport};

/// Canonical identity of a micro-zone for one reporting period.
///
/// Built by the key normalizer in `microzone_source`; two raw rows that
/// describe the same micro-zone and period always produce equal keys.
/// Ordering is lexicographic over (`ubigeo`, `year`, `month`, `zone`), which
/// is also the row order of the exported table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MicrozoneKey {
    /// Six-digit UBIGEO code, or the trimmed raw value when malformed.
    pub ubigeo: String,
    /// Reporting year (2000-2100), if known.
    pub year: Option<i32>,
    /// Reporting month (1-12), if known.
    pub month: Option<u32>,
    /// Normalized district name identifying the zone.
    pub zone: String,
}

impl MicrozoneKey {
    /// Creates a key from already-normalized components.
    #[must_use]
    pub fn new(
        ubigeo: impl Into<String>,
        year: Option<i32>,
        month: Option<u32>,
        zone: impl Into<String>,
    ) -> Self {
        Self {
            ubigeo: ubigeo.into(),
            year,
            month,
            zone: zone.into(),
        }
    }
}

/// Renders the key as `ubigeo|year|month|zone`, leaving unknown period
/// components empty.
impl fmt::Display for MicrozoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|", self.ubigeo)?;
        if let Some(year) = self.year {
            write!(f, "{year}")?;
        }
        f.write_str("|")?;
        if let Some(month) = self.month {
            write!(f, "{month}")?;
        }
        write!(f, "|{}", self.zone)
    }
}

/// Network class reported by the length extract.
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
pub enum NetworkClass {
    /// Drinking water network.
    Agua,
    /// Sewage network.
    Desague,
}

impl NetworkClass {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Agua, Self::Desague]
    }
}

/// Tariff category of a connection.
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
pub enum Tariff {
    /// Subsidized social tariff.
    Social,
    /// Residential tariff.
    Domestico,
    /// Commercial tariff.
    Comercial,
    /// Industrial tariff.
    Industrial,
    /// Government-owned premises.
    Estatal,
    /// Anything not in the categories above.
    Otras,
}

/// Controlled vocabulary for the stage of an infrastructure project.
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
pub enum ProjectStage {
    /// Technical file / definitive study.
    #[serde(rename = "EXPEDIENTE TECNICO")]
    #[strum(serialize = "EXPEDIENTE TECNICO")]
    ExpedienteTecnico,
    /// Works under execution.
    #[serde(rename = "OBRA")]
    #[strum(serialize = "OBRA")]
    Obra,
    /// Financial settlement of finished works.
    #[serde(rename = "LIQUIDACION")]
    #[strum(serialize = "LIQUIDACION")]
    Liquidacion,
    /// Closed project.
    #[serde(rename = "CERRADO")]
    #[strum(serialize = "CERRADO")]
    Cerrado,
    /// Works halted.
    #[serde(rename = "PARALIZADO")]
    #[strum(serialize = "PARALIZADO")]
    Paralizado,
    /// Stage missing or not recognized.
    #[serde(rename = "SIN ETAPA")]
    #[strum(serialize = "SIN ETAPA")]
    SinEtapa,
}

impl ProjectStage {
    /// Whether the stage is terminal. Only closed projects are terminal;
    /// halted and unknown-stage projects still count as active.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cerrado)
    }

    /// Whether a project in this stage counts towards active projects.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// A cleaned row of the connections extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// Canonical micro-zone key.
    pub key: MicrozoneKey,
    /// Service-management unit (`gerencia de servicios`).
    pub service_unit: Option<String>,
    /// Commercial team (`equipo comercial`).
    pub commercial_team: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Province.
    pub province: Option<String>,
    /// Tariff category.
    pub tariff: Option<Tariff>,
    /// Cut-off date of the extract.
    pub cutoff_date: Option<NaiveDate>,
    /// Number of drinking water connections.
    pub water_connections: u64,
    /// Number of sewage connections.
    pub sewage_connections: u64,
}

/// A cleaned row of the network length extract.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkLengthRecord {
    /// Canonical micro-zone key.
    pub key: MicrozoneKey,
    /// Network class of this row.
    pub class: NetworkClass,
    /// Primary network length in meters.
    pub primary_length: f64,
    /// Secondary network length in meters.
    pub secondary_length: f64,
}

impl NetworkLengthRecord {
    /// Primary plus secondary length.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.primary_length + self.secondary_length
    }
}

/// A cleaned row of the projects extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    /// Canonical micro-zone key.
    pub key: MicrozoneKey,
    /// Normalized project name.
    pub name: String,
    /// Contractor or consultant.
    pub contractor: Option<String>,
    /// Project stage.
    pub stage: ProjectStage,
    /// Physical progress percentage (0-100), if reported.
    pub progress: Option<f64>,
    /// Total cost.
    pub total_cost: f64,
    /// Start date.
    pub start_date: Option<NaiveDate>,
    /// Planned end date.
    pub end_date: Option<NaiveDate>,
    /// Cut-off date of the extract.
    pub cutoff_date: Option<NaiveDate>,
}

/// Network lengths of one class after the join.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassLengths {
    /// Primary network length in meters.
    pub primary: f64,
    /// Secondary network length in meters.
    pub secondary: f64,
}

impl ClassLengths {
    /// Primary plus secondary length.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.primary + self.secondary
    }
}

/// One micro-zone-period after the outer join of the three sources.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedRow {
    /// Canonical micro-zone key.
    pub key: MicrozoneKey,
    /// Service-management unit (from connections only).
    pub service_unit: Option<String>,
    /// Commercial team (from connections only).
    pub commercial_team: Option<String>,
    /// Department (from connections only).
    pub department: Option<String>,
    /// Province (from connections only).
    pub province: Option<String>,
    /// Predominant tariff (from connections only).
    pub tariff: Option<Tariff>,
    /// Cut-off date (from connections only).
    pub cutoff_date: Option<NaiveDate>,
    /// Water connections; zero when the key has no connections row.
    pub water_connections: u64,
    /// Sewage connections; zero when the key has no connections row.
    pub sewage_connections: u64,
    /// Water network lengths, zero-filled.
    pub water: ClassLengths,
    /// Sewage network lengths, zero-filled.
    pub sewage: ClassLengths,
    /// Number of project rows matched, regardless of stage.
    pub project_count: u64,
    /// Number of projects whose stage is not terminal.
    pub active_project_count: u64,
    /// Mean progress over active projects with a reported progress.
    pub mean_active_progress: Option<f64>,
    /// Sum of the cost of all matched projects.
    pub total_project_cost: f64,
}

impl IntegratedRow {
    /// Creates an empty row for a key that no source has contributed to yet.
    #[must_use]
    pub const fn empty(key: MicrozoneKey) -> Self {
        Self {
            key,
            service_unit: None,
            commercial_team: None,
            department: None,
            province: None,
            tariff: None,
            cutoff_date: None,
            water_connections: 0,
            sewage_connections: 0,
            water: ClassLengths {
                primary: 0.0,
                secondary: 0.0,
            },
            sewage: ClassLengths {
                primary: 0.0,
                secondary: 0.0,
            },
            project_count: 0,
            active_project_count: 0,
            mean_active_progress: None,
            total_project_cost: 0.0,
        }
    }
}

/// Column order of the exported table.
pub const INDICATOR_COLUMNS: &[&str] = &[
    "ubigeo",
    "distrito",
    "anio",
    "mes",
    "gerencia_servicios",
    "equipo_comercial",
    "departamento",
    "provincia",
    "tarifa_predominante",
    "fecha_corte",
    "conexiones_agua",
    "conexiones_alcantarillado",
    "red_primaria_agua",
    "red_secundaria_agua",
    "longitud_total_agua",
    "red_primaria_desague",
    "red_secundaria_desague",
    "longitud_total_desague",
    "conteo_proyectos",
    "conteo_proyectos_activos",
    "avance_promedio_proyectos",
    "costo_total_proyectos",
    "ratio_conexiones_alcantarillado",
    "densidad_red_agua",
    "densidad_red_desague",
    "faltan_datos_proyectos",
    "faltan_datos_longitud",
    "registros_inconsistentes",
];

/// A row of the exported micro-zone table.
///
/// Field declaration order matches [`INDICATOR_COLUMNS`]; the `csv` writer
/// relies on it to emit a stable header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    /// Six-digit UBIGEO code.
    pub ubigeo: String,
    /// Normalized district name (the zone component of the key).
    #[serde(rename = "distrito")]
    pub district: String,
    /// Reporting year.
    #[serde(rename = "anio")]
    pub year: Option<i32>,
    /// Reporting month.
    #[serde(rename = "mes")]
    pub month: Option<u32>,
    /// Service-management unit.
    #[serde(rename = "gerencia_servicios")]
    pub service_unit: Option<String>,
    /// Commercial team.
    #[serde(rename = "equipo_comercial")]
    pub commercial_team: Option<String>,
    /// Department.
    #[serde(rename = "departamento")]
    pub department: Option<String>,
    /// Province.
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    /// Predominant tariff.
    #[serde(rename = "tarifa_predominante")]
    pub tariff: Option<Tariff>,
    /// Cut-off date.
    #[serde(rename = "fecha_corte")]
    pub cutoff_date: Option<NaiveDate>,
    /// Water connections.
    #[serde(rename = "conexiones_agua")]
    pub water_connections: u64,
    /// Sewage connections.
    #[serde(rename = "conexiones_alcantarillado")]
    pub sewage_connections: u64,
    /// Primary water network length, meters.
    #[serde(rename = "red_primaria_agua")]
    pub water_primary_length: f64,
    /// Secondary water network length, meters.
    #[serde(rename = "red_secundaria_agua")]
    pub water_secondary_length: f64,
    /// Primary plus secondary water network length.
    #[serde(rename = "longitud_total_agua")]
    pub water_total_length: f64,
    /// Primary sewage network length, meters.
    #[serde(rename = "red_primaria_desague")]
    pub sewage_primary_length: f64,
    /// Secondary sewage network length, meters.
    #[serde(rename = "red_secundaria_desague")]
    pub sewage_secondary_length: f64,
    /// Primary plus secondary sewage network length.
    #[serde(rename = "longitud_total_desague")]
    pub sewage_total_length: f64,
    /// Project rows matched, any stage.
    #[serde(rename = "conteo_proyectos")]
    pub project_count: u64,
    /// Projects not in a terminal stage.
    #[serde(rename = "conteo_proyectos_activos")]
    pub active_project_count: u64,
    /// Mean progress over active projects.
    #[serde(rename = "avance_promedio_proyectos")]
    pub mean_active_progress: Option<f64>,
    /// Summed cost of every matched project.
    #[serde(rename = "costo_total_proyectos")]
    pub total_project_cost: f64,
    /// Sewage connections per water connection (0 without water connections).
    #[serde(rename = "ratio_conexiones_alcantarillado")]
    pub sewage_ratio: f64,
    /// Water network meters per water connection.
    #[serde(rename = "densidad_red_agua")]
    pub water_network_density: f64,
    /// Sewage network meters per sewage connection.
    #[serde(rename = "densidad_red_desague")]
    pub sewage_network_density: f64,
    /// No project rows matched this key.
    #[serde(rename = "faltan_datos_proyectos", with = "flag")]
    pub missing_project_data: bool,
    /// Both network classes report zero length.
    #[serde(rename = "faltan_datos_longitud", with = "flag")]
    pub missing_length_data: bool,
    /// More sewage than water connections.
    #[serde(rename = "registros_inconsistentes", with = "flag")]
    pub inconsistent_records: bool,
}

impl IndicatorRow {
    /// Rebuilds the canonical key of this row.
    #[must_use]
    pub fn key(&self) -> MicrozoneKey {
        MicrozoneKey::new(
            self.ubigeo.clone(),
            self.year,
            self.month,
            self.district.clone(),
        )
    }
}

/// Persists booleans as `0`/`1`, the encoding downstream spreadsheets
/// expect. Reading also accepts `true`/`false`.
pub mod flag {
    use serde::{Deserialize as _, Deserializer, Serializer, de::Error as _};

    /// Serializes a flag as `0` or `1`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    /// Deserializes a flag from `0`/`1`/`true`/`false` (empty means false).
    ///
    /// # Errors
    ///
    /// Returns an error for any other value.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag value '{other}'"))),
        }
    }
}
