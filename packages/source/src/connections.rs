//! Connections extract cleaner.
//!
//! One raw row per micro-zone, period and tariff. Rows sharing a canonical
//! key are merged: counts are summed, the latest cut-off date wins, and the
//! predominant tariff is the most frequent one among the merged rows.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use microzone_models::{ConnectionRecord, MicrozoneKey, Tariff};

use crate::columns::{ColumnMapping, ResolvedColumns};
use crate::key::build_key;
use crate::parsing::{clean_text, parse_count, parse_date};
use crate::reader::{RawRecord, RawTable};
use crate::{CleanedSource, SourceCleaner, SourceError, SourceKind, keep_last, start_report};

/// Cleaner for the water and sewage connections extract.
#[derive(Debug, Clone)]
pub struct ConnectionsCleaner {
    columns: ColumnMapping,
}

impl ConnectionsCleaner {
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
        Ok(Self::new(ColumnMapping::builtin(SourceKind::Conexiones)?))
    }
}

/// Maps a raw tariff to the tariff vocabulary. Blank stays `None`; any
/// unrecognized value becomes [`Tariff::Otras`].
#[must_use]
pub fn map_tariff(raw: Option<&str>) -> Option<Tariff> {
    let value = clean_text(raw)?;
    Some(value.parse().unwrap_or(Tariff::Otras))
}

struct Merged {
    record: ConnectionRecord,
    tariffs: BTreeMap<Tariff, u64>,
}

impl Merged {
    fn new(record: ConnectionRecord) -> Self {
        let mut merged = Self {
            record,
            tariffs: BTreeMap::new(),
        };
        merged.tally(merged.record.tariff);
        merged
    }

    fn tally(&mut self, tariff: Option<Tariff>) {
        if let Some(tariff) = tariff {
            *self.tariffs.entry(tariff).or_default() += 1;
        }
    }

    fn merge(&mut self, next: ConnectionRecord) {
        let current = &mut self.record;
        current.water_connections = current
            .water_connections
            .saturating_add(next.water_connections);
        current.sewage_connections = current
            .sewage_connections
            .saturating_add(next.sewage_connections);
        current.cutoff_date = current.cutoff_date.max(next.cutoff_date);
        keep_last(&mut current.service_unit, next.service_unit);
        keep_last(&mut current.commercial_team, next.commercial_team);
        keep_last(&mut current.department, next.department);
        keep_last(&mut current.province, next.province);
        self.tally(next.tariff);
    }

    /// Most frequent tariff; ties go to the alphabetically first label.
    fn finish(mut self) -> ConnectionRecord {
        self.record.tariff = self
            .tariffs
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.as_ref().cmp(a.0.as_ref())))
            .map(|(tariff, _)| *tariff);
        self.record
    }
}

fn clean_record(columns: &ResolvedColumns, record: &RawRecord) -> ConnectionRecord {
    let field = |name: &str| columns.get(record, name);
    let cutoff_date = parse_date(field("fecha_corte"));

    ConnectionRecord {
        key: build_key(
            field("ubigeo"),
            field("distrito"),
            field("anio"),
            field("mes"),
            cutoff_date,
        ),
        service_unit: clean_text(field("gerencia_servicios")),
        commercial_team: clean_text(field("equipo_comercial")),
        department: clean_text(field("departamento")),
        province: clean_text(field("provincia")),
        tariff: map_tariff(field("tarifa")),
        cutoff_date,
        water_connections: parse_count(field("conexiones_agua")),
        sewage_connections: parse_count(field("conexiones_alcantarillado")),
    }
}

impl SourceCleaner for ConnectionsCleaner {
    type Record = ConnectionRecord;

    fn kind(&self) -> SourceKind {
        SourceKind::Conexiones
    }

    fn clean(&self, raw: &RawTable) -> Result<CleanedSource<ConnectionRecord>, SourceError> {
        let columns = self.columns.resolve(self.kind(), &raw.headers)?;
        let mut report = start_report(self.kind(), raw);
        let mut merged: BTreeMap<MicrozoneKey, Merged> = BTreeMap::new();

        for record in &raw.records {
            let cleaned = clean_record(&columns, record);
            match merged.entry(cleaned.key.clone()) {
                Entry::Vacant(e) => {
                    e.insert(Merged::new(cleaned));
                }
                Entry::Occupied(mut e) => {
                    log::debug!("conexiones: merging duplicate key {}", cleaned.key);
                    e.get_mut().merge(cleaned);
                    report.duplicates_merged += 1;
                }
            }
        }

        let records: Vec<ConnectionRecord> = merged.into_values().map(Merged::finish).collect();
        report.records_cleaned = records.len() as u64;

        log::info!(
            "conexiones: {} row(s) read, {} micro-zone(s), {} duplicate(s) merged",
            report.records_read,
            report.records_cleaned,
            report.duplicates_merged
        );

        Ok(CleanedSource { records, report })
    }
}
