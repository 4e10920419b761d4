//! Raw CSV loading with encoding detection.
//!
//! Extracts arrive either as UTF-8 or Latin-1, sometimes mixed within one
//! file. Records are read as raw bytes and decoded one at a time: UTF-8
//! when valid, Latin-1 otherwise. Records that still look undecodable are
//! dropped and counted rather than failing the load.

use std::collections::BTreeMap;
use std::path::Path;

use strum_macros::{AsRefStr, Display};

use crate::SourceError;

/// Text encoding a record was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Encoding {
    /// Valid UTF-8 (an optional byte-order mark is removed).
    #[strum(serialize = "UTF-8")]
    Utf8,
    /// ISO-8859-1, one byte per character.
    #[strum(serialize = "Latin-1")]
    Latin1,
}

/// One untyped row of a source, keyed by normalized header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number of the record in the file (header is line 1).
    pub line: u64,
    /// Field values keyed by normalized header.
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    /// Returns the trimmed value under `header`, treating blanks as missing.
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .get(header)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A fully read source table, ready for cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Normalized headers, in file order.
    pub headers: Vec<String>,
    /// Records that decoded successfully.
    pub records: Vec<RawRecord>,
    /// Records dropped because they could not be decoded.
    pub dropped: u64,
    /// Records that were not valid UTF-8 and were decoded as Latin-1.
    pub latin1_records: u64,
    /// [`Encoding::Latin1`] when the header or any record needed the
    /// Latin-1 fallback.
    pub encoding: Encoding,
}

/// Normalizes a header name: trimmed, lower-cased, BOM removed.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decodes every field of a record with a single encoding. One invalid
/// UTF-8 field makes the whole record Latin-1.
fn decode_record(record: &csv::ByteRecord) -> (Vec<String>, Encoding) {
    match record
        .iter()
        .map(std::str::from_utf8)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(fields) => (
            fields.into_iter().map(str::to_string).collect(),
            Encoding::Utf8,
        ),
        Err(_) => (record.iter().map(latin1).collect(), Encoding::Latin1),
    }
}

/// Picks `;` when the header line has more semicolons than commas.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let commas = header.iter().filter(|&&b| b == b',').count();
    let semicolons = header.iter().filter(|&&b| b == b';').count();
    if semicolons > commas { b';' } else { b',' }
}

/// Control characters that never appear in a correctly decoded field.
fn has_control_chars(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// Reads a source file into a [`RawTable`].
///
/// # Errors
///
/// Returns [`SourceError::SourceRead`] if the file cannot be read or does
/// not contain a usable header row.
pub fn read_table(path: &Path) -> Result<RawTable, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::SourceRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_table(path, &bytes)
}

/// Parses already-loaded bytes. `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`SourceError::SourceRead`] if the content is not tabular.
pub fn parse_table(path: &Path, bytes: &[u8]) -> Result<RawTable, SourceError> {
    let not_tabular = |message: &str| SourceError::SourceRead {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(not_tabular("file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let (headers, mut encoding) = decode_record(
        reader
            .byte_headers()
            .map_err(|e| not_tabular(&format!("unreadable header row: {e}")))?,
    );
    let headers: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

    if headers.iter().all(String::is_empty) || headers.iter().any(|h| has_control_chars(h)) {
        return Err(not_tabular("no usable header row"));
    }

    let mut records = Vec::new();
    let mut dropped = 0_u64;
    let mut latin1_records = 0_u64;

    for result in reader.byte_records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}: dropping unreadable record: {e}", path.display());
                dropped += 1;
                continue;
            }
        };

        let line = record.position().map_or(0, csv::Position::line);
        let (values, record_encoding) = decode_record(&record);

        if values.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        if values.iter().any(|v| has_control_chars(v)) {
            log::warn!(
                "{}: dropping record on line {line}: control characters after decoding",
                path.display()
            );
            dropped += 1;
            continue;
        }
        if record_encoding == Encoding::Latin1 {
            log::debug!("{}: line {line} decoded as Latin-1", path.display());
            latin1_records += 1;
            encoding = Encoding::Latin1;
        }

        let mut fields = BTreeMap::new();
        for (header, value) in headers.iter().zip(values) {
            if header.is_empty() {
                continue;
            }
            fields.entry(header.clone()).or_insert(value);
        }

        records.push(RawRecord { line, fields });
    }

    log::debug!(
        "{}: {} record(s) read ({latin1_records} as Latin-1), {dropped} dropped",
        path.display(),
        records.len()
    );

    Ok(RawTable {
        headers,
        records,
        dropped,
        latin1_records,
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> RawTable {
        parse_table(Path::new("test.csv"), bytes).unwrap()
    }

    #[test]
    fn reads_utf8_with_normalized_headers() {
        let table = parse("\u{feff} UBIGEO ,Distrito\n150132,San Miguel\n".as_bytes());
        assert_eq!(table.encoding, Encoding::Utf8);
        assert_eq!(table.headers, vec!["ubigeo", "distrito"]);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].get("distrito"), Some("San Miguel"));
        assert_eq!(table.records[0].line, 2);
    }

    #[test]
    fn falls_back_to_latin1() {
        let mut bytes = b"ubigeo,distrito\n150105,BRE".to_vec();
        bytes.push(0xD1);
        bytes.extend_from_slice(b"A\n");
        let table = parse(&bytes);
        assert_eq!(table.encoding, Encoding::Latin1);
        assert_eq!(table.latin1_records, 1);
        assert_eq!(table.records[0].get("distrito"), Some("BREÑA"));
    }

    #[test]
    fn decodes_each_record_on_its_own() {
        let mut bytes = "distrito,ubigeo\nBREÑA,150105\nATE".as_bytes().to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(",150103\nCOMAS,150110\n".as_bytes());
        let table = parse(&bytes);
        assert_eq!(table.dropped, 0);
        assert_eq!(table.latin1_records, 1);
        assert_eq!(table.encoding, Encoding::Latin1);
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.records[0].get("distrito"), Some("BREÑA"));
        assert_eq!(table.records[1].get("distrito"), Some("ATEÿ"));
        assert_eq!(table.records[2].get("distrito"), Some("COMAS"));
    }

    #[test]
    fn latin1_control_bytes_drop_only_their_record() {
        let mut bytes = "distrito,ubigeo\nBREÑA,150105\nATE".as_bytes().to_vec();
        bytes.push(0x91);
        bytes.extend_from_slice(b",150103\n");
        let table = parse(&bytes);
        assert_eq!(table.dropped, 1);
        assert_eq!(table.latin1_records, 0);
        assert_eq!(table.encoding, Encoding::Utf8);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].get("distrito"), Some("BREÑA"));
    }

    #[test]
    fn sniffs_semicolon_delimiter() {
        let table = parse(b"ubigeo;distrito\n150132;SAN MIGUEL\n");
        assert_eq!(table.records[0].get("ubigeo"), Some("150132"));
    }

    #[test]
    fn drops_records_with_control_characters() {
        let table = parse(b"ubigeo,distrito\n150132,OK\n150101,BAD\x01\n");
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.dropped, 1);
    }

    #[test]
    fn short_rows_and_blank_values_are_missing() {
        let table = parse(b"ubigeo,distrito,anio\n150132,\n");
        let record = &table.records[0];
        assert_eq!(record.get("distrito"), None);
        assert_eq!(record.get("anio"), None);
    }

    #[test]
    fn blank_lines_are_skipped_not_dropped() {
        let table = parse(b"ubigeo,distrito\n150132,A\n,\n150101,B\n");
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.dropped, 0);
    }

    #[test]
    fn empty_file_is_not_tabular() {
        let err = parse_table(Path::new("empty.csv"), b"  \n").unwrap_err();
        assert!(matches!(err, SourceError::SourceRead { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
    }
}
