//! Infrastructure projects extract cleaner.
//!
//! Project rows may name several districts at once (`"ATE / SANTA ANITA"`,
//! `"ATE Y SANTA ANITA"`); each district becomes its own row before the key
//! is built. Rows then merge per key and normalized project name.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::LazyLock;

use microzone_models::{MicrozoneKey, ProjectRecord, ProjectStage};
use regex::Regex;

use crate::columns::{ColumnMapping, ResolvedColumns};
use crate::key::{build_key, normalize_zone};
use crate::parsing::{clean_text, parse_cost, parse_date, parse_progress};
use crate::reader::{RawRecord, RawTable};
use crate::{CleanedSource, SourceCleaner, SourceError, SourceKind, keep_last, start_report};

/// Characters removed from project names.
static NAME_PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

/// Cleaner for the infrastructure projects extract.
#[derive(Debug, Clone)]
pub struct ProjectsCleaner {
    columns: ColumnMapping,
}

impl ProjectsCleaner {
    /// Creates a cleaner using `columns` to locate fields.
    #[must_use]
    pub const fn new(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    /// Creates a cleaner with the embedded column mapping.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the embedded mapping is invalid.
    pub fn with_default_columns() -> Result<Self, SourceError> {
        Ok(Self::new(ColumnMapping::builtin(SourceKind::Proyectos)?))
    }
}

/// Maps a raw stage label to the controlled stage vocabulary.
#[must_use]
pub fn map_stage(raw: Option<&str>) -> ProjectStage {
    match clean_text(raw).as_deref() {
        Some("EXPEDIENTE TECNICO" | "ESTUDIO DEFINITIVO") => ProjectStage::ExpedienteTecnico,
        Some("OBRA" | "EJECUCION" | "EN EJECUCION") => ProjectStage::Obra,
        Some("LIQUIDACION") => ProjectStage::Liquidacion,
        Some("CERRADO") => ProjectStage::Cerrado,
        Some("PARALIZADO") => ProjectStage::Paralizado,
        _ => ProjectStage::SinEtapa,
    }
}

/// Strips punctuation from a project name and normalizes case and spacing.
#[must_use]
pub fn normalize_project_name(raw: Option<&str>) -> String {
    let without_punctuation = NAME_PUNCTUATION_RE.replace_all(raw.unwrap_or_default(), " ");
    normalize_zone(&without_punctuation)
}

/// Splits a multi-district value into its districts.
///
/// Always yields at least one entry so that rows with a blank district
/// still produce a key.
#[must_use]
pub fn split_districts(raw: Option<&str>) -> Vec<String> {
    let normalized = normalize_zone(raw.unwrap_or_default()).replace(" Y ", "/");
    let districts: Vec<String> = normalized
        .split('/')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string)
        .collect();

    if districts.is_empty() {
        vec![String::new()]
    } else {
        districts
    }
}

fn clean_record(columns: &ResolvedColumns, record: &RawRecord) -> Vec<ProjectRecord> {
    let field = |name: &str| columns.get(record, name);
    let cutoff_date = parse_date(field("fecha_corte"));
    let name = normalize_project_name(field("nombre_proyecto"));
    let contractor = clean_text(field("contratista_consultor"));
    let stage = map_stage(field("etapa"));
    let progress = parse_progress(field("avance_fisico"));
    let total_cost = parse_cost(field("costo_total"));
    let start_date = parse_date(field("fecha_inicio"));
    let end_date = parse_date(field("fecha_fin"));

    split_districts(field("distrito"))
        .into_iter()
        .map(|district| ProjectRecord {
            key: build_key(
                field("ubigeo"),
                Some(&district),
                field("anio"),
                field("mes"),
                cutoff_date,
            ),
            name: name.clone(),
            contractor: contractor.clone(),
            stage,
            progress,
            total_cost,
            start_date,
            end_date,
            cutoff_date,
        })
        .collect()
}

fn merge(current: &mut ProjectRecord, next: ProjectRecord) {
    current.total_cost += next.total_cost;
    if next.stage != ProjectStage::SinEtapa {
        current.stage = next.stage;
    }
    keep_last(&mut current.progress, next.progress);
    keep_last(&mut current.contractor, next.contractor);
    keep_last(&mut current.start_date, next.start_date);
    keep_last(&mut current.end_date, next.end_date);
    current.cutoff_date = current.cutoff_date.max(next.cutoff_date);
}

impl SourceCleaner for ProjectsCleaner {
    type Record = ProjectRecord;

    fn kind(&self) -> SourceKind {
        SourceKind::Proyectos
    }

    fn clean(&self, raw: &RawTable) -> Result<CleanedSource<ProjectRecord>, SourceError> {
        let columns = self.columns.resolve(self.kind(), &raw.headers)?;
        let mut report = start_report(self.kind(), raw);
        let mut merged: BTreeMap<(MicrozoneKey, String), ProjectRecord> = BTreeMap::new();

        for record in &raw.records {
            for cleaned in clean_record(&columns, record) {
                match merged.entry((cleaned.key.clone(), cleaned.name.clone())) {
                    Entry::Vacant(e) => {
                        e.insert(cleaned);
                    }
                    Entry::Occupied(mut e) => {
                        merge(e.get_mut(), cleaned);
                        report.duplicates_merged += 1;
                    }
                }
            }
        }

        let records: Vec<ProjectRecord> = merged.into_values().collect();
        report.records_cleaned = records.len() as u64;

        log::info!(
            "proyectos: {} row(s) read, {} project/zone pair(s), {} merged",
            report.records_read,
            report.records_cleaned,
            report.duplicates_merged
        );

        Ok(CleanedSource { records, report })
    }
}
