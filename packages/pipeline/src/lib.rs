#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Micro-zone ETL: integration, indicators, and CSV export.
//!
//! [`Pipeline::run`] cleans the three raw extracts, joins them on the
//! canonical micro-zone key, derives indicators and writes the result
//! atomically. All sources are loaded and validated before the output is
//! touched, so schema and read errors never clobber a previous table.

pub mod export;
pub mod indicators;
pub mod integrate;

use std::path::{Path, PathBuf};
use std::time::Instant;

use microzone_models::{RunReport, SourceReport};
use microzone_source::reader::Encoding;
use microzone_source::{
    ColumnOverrides, ConnectionsCleaner, NetworkLengthCleaner, ProjectsCleaner, SourceCleaner,
    SourceError, SourceKind,
};

pub use export::write_indicators;
pub use indicators::compute_indicators;
pub use integrate::enrich_microzones;

/// Errors that can occur during an ETL run.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// A source could not be read, resolved or configured.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The output table could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// Location that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Input and output locations of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlPaths {
    /// Connections extract.
    pub connections: PathBuf,
    /// Network length extract.
    pub lengths: PathBuf,
    /// Projects extract.
    pub projects: PathBuf,
    /// Output table.
    pub output: PathBuf,
}

/// The three cleaners, configured with their column mappings.
#[derive(Debug, Clone)]
pub struct Pipeline {
    connections: ConnectionsCleaner,
    lengths: NetworkLengthCleaner,
    projects: ProjectsCleaner,
}

impl Pipeline {
    /// Builds a pipeline from the embedded mappings plus `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Source`] if a mapping or override is invalid.
    pub fn new(overrides: &ColumnOverrides) -> Result<Self, EtlError> {
        Ok(Self {
            connections: ConnectionsCleaner::new(overrides.mapping(SourceKind::Conexiones)?),
            lengths: NetworkLengthCleaner::new(overrides.mapping(SourceKind::Longitudes)?),
            projects: ProjectsCleaner::new(overrides.mapping(SourceKind::Proyectos)?),
        })
    }

    /// Builds a pipeline from the embedded mappings only.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Source`] if an embedded mapping is invalid.
    pub fn with_default_columns() -> Result<Self, EtlError> {
        Self::new(&ColumnOverrides::default())
    }

    /// Runs clean, integrate, indicators and export.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Source`] on unreadable files or missing columns
    /// (before the output is touched), or [`EtlError::Write`] if the table
    /// cannot be written.
    pub fn run(&self, paths: &EtlPaths) -> Result<RunReport, EtlError> {
        let start = Instant::now();

        let connections = self.connections.load_and_clean(&paths.connections)?;
        let lengths = self.lengths.load_and_clean(&paths.lengths)?;
        let projects = self.projects.load_and_clean(&paths.projects)?;

        let integrated =
            enrich_microzones(&connections.records, &lengths.records, &projects.records);
        let indicators = compute_indicators(&integrated);
        let rows_written = write_indicators(&paths.output, &indicators)?;

        let report = RunReport {
            output_path: paths.output.clone(),
            sources: vec![connections.report, lengths.report, projects.report],
            rows_written,
            duration: start.elapsed(),
        };

        log::info!(
            "ETL finished in {:.2}s: {} row(s) written to {}",
            report.duration.as_secs_f64(),
            report.rows_written,
            report.output_path.display()
        );

        Ok(report)
    }
}

/// Runs the pipeline with the embedded column mappings.
///
/// # Errors
///
/// See [`Pipeline::run`].
pub fn run_etl(paths: &EtlPaths) -> Result<RunReport, EtlError> {
    Pipeline::with_default_columns()?.run(paths)
}

/// Result of loading and cleaning a single source without exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectReport {
    /// [`Encoding::Latin1`] when any record needed the Latin-1 fallback.
    pub encoding: Encoding,
    /// Records decoded as Latin-1.
    pub latin1_records: u64,
    /// Normalized headers found in the file.
    pub headers: Vec<String>,
    /// Counters from cleaning.
    pub report: SourceReport,
}

fn inspect_with<C: SourceCleaner>(cleaner: &C, path: &Path) -> Result<InspectReport, EtlError> {
    let raw = cleaner.load(path)?;
    let cleaned = cleaner.clean(&raw)?;
    Ok(InspectReport {
        encoding: raw.encoding,
        latin1_records: raw.latin1_records,
        headers: raw.headers,
        report: cleaned.report,
    })
}

/// Loads and cleans one source, returning its counters.
///
/// # Errors
///
/// Returns [`EtlError::Source`] if the source cannot be loaded or cleaned.
pub fn inspect_source(
    kind: SourceKind,
    path: &Path,
    overrides: &ColumnOverrides,
) -> Result<InspectReport, EtlError> {
    let mapping = overrides.mapping(kind)?;
    match kind {
        SourceKind::Conexiones => inspect_with(&ConnectionsCleaner::new(mapping), path),
        SourceKind::Longitudes => inspect_with(&NetworkLengthCleaner::new(mapping), path),
        SourceKind::Proyectos => inspect_with(&ProjectsCleaner::new(mapping), path),
    }
}

#[cfg(test)]
mod tests {
    use microzone_models::IndicatorRow;

    use super::*;

    const CONNECTIONS: &str = "\
gerencia_servicios,equipo_comercial,departamento,provincia,distrito,ubigeo,tarifa,conexiones_agua,conexiones_alcantarillado,fecha_corte
GC CENTRO,EC 1,LIMA,LIMA,ATE,150103,DOMESTICO,3,2,20241130
GC CENTRO,EC 1,LIMA,LIMA,Ate,150103.0,COMERCIAL,5,4,20241130
GC CENTRO,EC 2,LIMA,LIMA,Breña,150105,SOCIAL,10,12,20241130
GC ESTE,EC 3,LIMA,LIMA,LA MOLINA,150114,DOMESTICO,5,5,20241130
";

    const LENGTHS: &str = "\
gerencia_servicios,equipo_comercial,departamento,provincia,distrito,ubigeo,clase,red_primaria,red_secundaria,anio,mes
GC ESTE,EC 3,LIMA,LIMA,LA MOLINA,150114,AGUA,100,0,2024,11
GC CENTRO,EC 1,LIMA,LIMA,ATE,150103,AGUA,60,20,2024,11
GC CENTRO,EC 1,LIMA,LIMA,ATE,150103,DESAGUE,30,10,2024,11
GC CENTRO,EC 1,LIMA,LIMA,ATE,150103,PLUVIAL,1,1,2024,11
GC NORTE,EC 9,LIMA,LIMA,COMAS,150110,AGUA,10,0,2024,11
";

    const PROJECTS: &str = "\
departamento,provincia,distrito,ubigeo,nombre_proyecto,etapa,avance_fisico,fecha_inicio,fecha_fin,fecha_corte,costo_total,contratista_consultor
LIMA,LIMA,ATE,150103,Colector Ate,OBRA,40,2024-01-01,2024-12-31,2024-11-30,1000,CONSORCIO A
LIMA,LIMA,ATE,150103,Reservorio Ate,CERRADO,100,2023-01-01,2023-12-31,2024-11-30,500,CONSORCIO B
LIMA,LIMA,SANTA ANITA,150137,Planta,EXPEDIENTE TECNICO,,2024-05-01,2025-05-01,2024-11-30,2000,CONSORCIO C
";

    fn write_inputs(dir: &Path) -> EtlPaths {
        let paths = EtlPaths {
            connections: dir.join("conexiones.csv"),
            lengths: dir.join("longitudes.csv"),
            projects: dir.join("proyectos.csv"),
            output: dir.join("processed").join("microzonas.csv"),
        };
        std::fs::write(&paths.connections, CONNECTIONS).unwrap();
        std::fs::write(&paths.lengths, LENGTHS).unwrap();
        std::fs::write(&paths.projects, PROJECTS).unwrap();
        paths
    }

    fn read_output(path: &Path) -> Vec<IndicatorRow> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn find<'a>(rows: &'a [IndicatorRow], zone: &str) -> &'a IndicatorRow {
        rows.iter().find(|r| r.district == zone).unwrap()
    }

    #[test]
    fn end_to_end_run() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let report = run_etl(&paths).unwrap();

        assert_eq!(report.output_path, paths.output);
        assert_eq!(report.rows_written, 5);

        let rows = read_output(&paths.output);
        let zones: Vec<&str> = rows.iter().map(|r| r.district.as_str()).collect();
        assert_eq!(zones, vec!["ATE", "BRENA", "COMAS", "LA MOLINA", "SANTA ANITA"]);

        let ate = find(&rows, "ATE");
        assert_eq!(ate.water_connections, 8);
        assert_eq!(ate.sewage_connections, 6);
        assert!((ate.water_total_length - 80.0).abs() < 1e-9);
        assert!((ate.water_network_density - 10.0).abs() < 1e-9);
        assert!((ate.sewage_network_density - 40.0 / 6.0).abs() < 1e-9);
        assert_eq!(ate.project_count, 2);
        assert_eq!(ate.active_project_count, 1);
        assert_eq!(ate.mean_active_progress, Some(40.0));
        assert!(!ate.missing_project_data);

        let brena = find(&rows, "BRENA");
        assert!(brena.inconsistent_records);
        assert!(brena.missing_length_data);
        assert!(brena.missing_project_data);
        assert!(brena.water_network_density.abs() < f64::EPSILON);

        let molina = find(&rows, "LA MOLINA");
        assert!((molina.water_network_density - 20.0).abs() < f64::EPSILON);
        assert!(!molina.inconsistent_records);
        assert!(molina.missing_project_data);
        assert_eq!(molina.active_project_count, 0);
        assert_eq!(molina.mean_active_progress, None);

        let comas = find(&rows, "COMAS");
        assert_eq!(comas.service_unit, None);
        assert_eq!(comas.water_connections, 0);

        let santa_anita = find(&rows, "SANTA ANITA");
        assert_eq!(santa_anita.active_project_count, 1);
        assert_eq!(santa_anita.mean_active_progress, None);
    }

    #[test]
    fn report_counts_merges_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let report = run_etl(&paths).unwrap();

        assert_eq!(report.source("conexiones").unwrap().duplicates_merged, 1);
        assert_eq!(report.source("longitudes").unwrap().records_discarded, 1);
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn runs_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        run_etl(&paths).unwrap();
        let first = std::fs::read(&paths.output).unwrap();
        run_etl(&paths).unwrap();
        let second = std::fs::read(&paths.output).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn schema_error_leaves_previous_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        run_etl(&paths).unwrap();
        let before = std::fs::read(&paths.output).unwrap();

        std::fs::write(&paths.projects, "ubigeo,distrito\n150103,ATE\n").unwrap();
        let err = run_etl(&paths).unwrap_err();
        assert!(matches!(err, EtlError::Source(SourceError::Schema { .. })));

        assert_eq!(std::fs::read(&paths.output).unwrap(), before);
    }

    #[test]
    fn failed_write_leaves_previous_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        run_etl(&paths).unwrap();
        let before = std::fs::read(&paths.output).unwrap();

        let tmp = export::temp_path(&paths.output);
        std::fs::create_dir(&tmp).unwrap();
        std::fs::write(tmp.join("keep"), "x").unwrap();
        std::fs::write(&paths.connections, CONNECTIONS.replace(",3,2,", ",30,2,")).unwrap();

        let err = run_etl(&paths).unwrap_err();
        assert!(matches!(&err, EtlError::Write { path, .. } if *path == tmp));
        assert!(err.to_string().contains("microzonas.csv.tmp"));
        assert_eq!(std::fs::read(&paths.output).unwrap(), before);
    }

    #[test]
    fn failed_rename_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        std::fs::create_dir_all(&paths.output).unwrap();
        std::fs::write(paths.output.join("keep"), "x").unwrap();

        let err = run_etl(&paths).unwrap_err();
        assert!(matches!(&err, EtlError::Write { path, .. } if *path == paths.output));
        assert!(!export::temp_path(&paths.output).exists());
        assert!(paths.output.join("keep").exists());
    }

    #[test]
    fn missing_input_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_inputs(dir.path());
        paths.lengths = dir.path().join("absent.csv");
        let err = run_etl(&paths).unwrap_err();
        assert!(matches!(err, EtlError::Source(SourceError::SourceRead { .. })));
        assert!(!paths.output.exists());
    }

    #[test]
    fn inspect_reports_counters_and_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());
        let inspected = inspect_source(
            SourceKind::Longitudes,
            &paths.lengths,
            &ColumnOverrides::default(),
        )
        .unwrap();
        assert_eq!(inspected.encoding, Encoding::Utf8);
        assert_eq!(inspected.latin1_records, 0);
        assert_eq!(inspected.report.records_read, 5);
        assert_eq!(inspected.report.records_discarded, 1);
        assert!(inspected.headers.contains(&"clase".to_string()));
    }
}
