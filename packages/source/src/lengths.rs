//! Network length extract cleaner.
//!
//! Each raw row reports primary and secondary network length for one class
//! (water or sewage) of a micro-zone. Rows merge per key and class by
//! summing lengths; rows with any other class are discarded and counted.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use microzone_models::{MicrozoneKey, NetworkClass, NetworkLengthRecord};

use crate::columns::{ColumnMapping, ResolvedColumns};
use crate::key::build_key;
use crate::parsing::{clean_text, parse_date, parse_length};
use crate::reader::{RawRecord, RawTable};
use crate::{CleanedSource, SourceCleaner, SourceError, SourceKind, start_report};

/// Cleaner for the network length extract.
#[derive(Debug, Clone)]
pub struct NetworkLengthCleaner {
    columns: ColumnMapping,
}

impl NetworkLengthCleaner {
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
        Ok(Self::new(ColumnMapping::builtin(SourceKind::Longitudes)?))
    }
}

/// Maps a raw class label to a [`NetworkClass`], `None` when unrecognized.
#[must_use]
pub fn map_class(raw: Option<&str>) -> Option<NetworkClass> {
    match clean_text(raw)?.as_str() {
        "AGUA" | "AGUA POTABLE" => Some(NetworkClass::Agua),
        "DESAGUE" | "ALCANTARILLADO" => Some(NetworkClass::Desague),
        _ => None,
    }
}

fn clean_record(columns: &ResolvedColumns, record: &RawRecord) -> Option<NetworkLengthRecord> {
    let field = |name: &str| columns.get(record, name);

    let Some(class) = map_class(field("clase")) else {
        log::warn!(
            "longitudes: discarding line {} with class {:?}",
            record.line,
            field("clase").unwrap_or_default()
        );
        return None;
    };

    Some(NetworkLengthRecord {
        key: build_key(
            field("ubigeo"),
            field("distrito"),
            field("anio"),
            field("mes"),
            parse_date(field("fecha_corte")),
        ),
        class,
        primary_length: parse_length(field("red_primaria")),
        secondary_length: parse_length(field("red_secundaria")),
    })
}

impl SourceCleaner for NetworkLengthCleaner {
    type Record = NetworkLengthRecord;

    fn kind(&self) -> SourceKind {
        SourceKind::Longitudes
    }

    fn clean(&self, raw: &RawTable) -> Result<CleanedSource<NetworkLengthRecord>, SourceError> {
        let columns = self.columns.resolve(self.kind(), &raw.headers)?;
        let mut report = start_report(self.kind(), raw);
        let mut merged: BTreeMap<(MicrozoneKey, NetworkClass), NetworkLengthRecord> =
            BTreeMap::new();

        for record in &raw.records {
            let Some(cleaned) = clean_record(&columns, record) else {
                report.records_discarded += 1;
                continue;
            };

            match merged.entry((cleaned.key.clone(), cleaned.class)) {
                Entry::Vacant(e) => {
                    e.insert(cleaned);
                }
                Entry::Occupied(mut e) => {
                    let current = e.get_mut();
                    current.primary_length += cleaned.primary_length;
                    current.secondary_length += cleaned.secondary_length;
                    report.duplicates_merged += 1;
                }
            }
        }

        let records: Vec<NetworkLengthRecord> = merged.into_values().collect();
        report.records_cleaned = records.len() as u64;

        log::info!(
            "longitudes: {} row(s) read, {} key/class pair(s), {} merged, {} discarded",
            report.records_read,
            report.records_cleaned,
            report.duplicates_merged,
            report.records_discarded
        );

        Ok(CleanedSource { records, report })
    }
}
