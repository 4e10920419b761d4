//! CSV export of the indicator table.
//!
//! The whole table is serialized in memory, written to a sibling temporary
//! file and renamed over the target, so readers never observe a partially
//! written table and a failed run leaves the previous output untouched.

use std::path::{Path, PathBuf};

use microzone_models::IndicatorRow;

use crate::EtlError;

/// Serializes rows to CSV bytes: UTF-8, comma-separated, header row.
///
/// # Errors
///
/// Returns [`csv::Error`] if a row cannot be serialized.
pub fn to_csv_bytes(rows: &[IndicatorRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(microzone_models::INDICATOR_COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Temporary path used while writing `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().to_string());
    path.with_file_name(format!("{file_name}.tmp"))
}

/// Writes the indicator table to `path` atomically and returns the number
/// of data rows written.
///
/// # Errors
///
/// Returns [`EtlError::Write`] if the parent directory, the temporary file
/// or the rename fails.
pub fn write_indicators(path: &Path, rows: &[IndicatorRow]) -> Result<u64, EtlError> {
    let write_error = |target: &Path, source: std::io::Error| EtlError::Write {
        path: target.to_path_buf(),
        source,
    };

    let bytes = to_csv_bytes(rows).map_err(|e| write_error(path, e.into()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
    }

    let tmp_path = temp_path(path);
    if let Err(e) = std::fs::write(&tmp_path, &bytes) {
        std::fs::remove_file(&tmp_path).ok();
        return Err(write_error(&tmp_path, e));
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        std::fs::remove_file(&tmp_path).ok();
        return Err(write_error(path, e));
    }

    log::info!("Wrote {} row(s) to {}", rows.len(), path.display());
    Ok(rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use microzone_models::{INDICATOR_COLUMNS, IntegratedRow, MicrozoneKey};

    use super::*;
    use crate::indicators::indicator_row;

    fn sample() -> Vec<IndicatorRow> {
        let mut row = IntegratedRow::empty(MicrozoneKey::new("150103", Some(2024), Some(11), "ATE"));
        row.water_connections = 5;
        row.sewage_connections = 5;
        row.water.primary = 100.0;
        vec![indicator_row(&row)]
    }

    #[test]
    fn header_follows_fixed_column_order() {
        let bytes = to_csv_bytes(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().next().unwrap(), INDICATOR_COLUMNS.join(","));
    }

    #[test]
    fn empty_table_still_has_a_header() {
        let text = String::from_utf8(to_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), INDICATOR_COLUMNS.join(","));
    }

    #[test]
    fn nulls_are_empty_and_flags_are_digits() {
        let text = String::from_utf8(to_csv_bytes(&sample()).unwrap()).unwrap();
        let data = text.lines().nth(1).unwrap();
        assert!(data.starts_with("150103,ATE,2024,11,,,,,,,5,5,100.0,0.0,100.0,"));
        assert!(data.ends_with(",1,0,0"));
    }

    #[test]
    fn writes_atomically_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("microzonas.csv");
        let written = write_indicators(&path, &sample()).unwrap();
        assert_eq!(written, 1);
        assert!(path.exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let path = Path::new("/data/out/microzonas.csv");
        assert_eq!(temp_path(path), Path::new("/data/out/microzonas.csv.tmp"));
    }
}
