//! Column mappings: semantic field names to raw header candidates.
//!
//! Each source ships a TOML mapping under `packages/source/columns/` that is
//! baked into the binary with [`include_str!`]. Headers are matched after
//! trimming and lower-casing; the first candidate present in the file wins.
//! Operators can prepend extra candidates per field through an override
//! file without rebuilding.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::reader::{RawRecord, normalize_header};
use crate::{SourceError, SourceKind};

/// Mappings embedded at compile time.
const COLUMN_TOMLS: &[(SourceKind, &str)] = &[
    (SourceKind::Conexiones, include_str!("../columns/conexiones.toml")),
    (SourceKind::Longitudes, include_str!("../columns/longitudes.toml")),
    (SourceKind::Proyectos, include_str!("../columns/proyectos.toml")),
];

/// How one semantic field is located in a raw file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Whether the load fails when no candidate header is present.
    #[serde(default)]
    pub required: bool,
    /// Raw header names, tried in order.
    pub candidates: Vec<String>,
}

/// Semantic field name to [`ColumnSpec`] for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Field specs keyed by semantic name.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSpec>,
}

impl ColumnMapping {
    /// Parses a mapping from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the document is not a valid
    /// mapping or a field has no candidates.
    pub fn parse(kind: SourceKind, toml_str: &str) -> Result<Self, SourceError> {
        let mapping: Self = toml::from_str(toml_str).map_err(|e| SourceError::Config {
            message: format!("{kind} column mapping: {e}"),
        })?;

        if let Some((field, _)) = mapping
            .columns
            .iter()
            .find(|(_, spec)| spec.candidates.is_empty())
        {
            return Err(SourceError::Config {
                message: format!("{kind} column mapping: field '{field}' has no candidates"),
            });
        }

        Ok(mapping)
    }

    /// Returns the embedded default mapping for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the embedded TOML is invalid.
    pub fn builtin(kind: SourceKind) -> Result<Self, SourceError> {
        let toml_str = COLUMN_TOMLS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| *s)
            .ok_or_else(|| SourceError::Config {
                message: format!("no embedded column mapping for {kind}"),
            })?;
        Self::parse(kind, toml_str)
    }

    /// Prepends operator-supplied candidates to existing fields.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if an override names a field the
    /// mapping does not define.
    pub fn apply_overrides(
        &mut self,
        kind: SourceKind,
        overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), SourceError> {
        for (field, extra) in overrides {
            let spec = self
                .columns
                .get_mut(field)
                .ok_or_else(|| SourceError::Config {
                    message: format!("{kind} override names unknown field '{field}'"),
                })?;
            let mut candidates = extra.clone();
            candidates.extend(spec.candidates.drain(..).filter(|c| !extra.contains(c)));
            spec.candidates = candidates;
        }
        Ok(())
    }

    /// Resolves every field against the headers of a file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Schema`] naming every required field with no
    /// matching header.
    pub fn resolve(
        &self,
        kind: SourceKind,
        headers: &[String],
    ) -> Result<ResolvedColumns, SourceError> {
        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();

        for (field, spec) in &self.columns {
            let found = spec
                .candidates
                .iter()
                .map(|c| normalize_header(c))
                .find(|c| headers.contains(c));

            match found {
                Some(header) => {
                    resolved.insert(field.clone(), header);
                }
                None if spec.required => missing.push(field.clone()),
                None => log::debug!("{kind}: optional column '{field}' not present"),
            }
        }

        if !missing.is_empty() {
            return Err(SourceError::Schema {
                dataset: kind.to_string(),
                missing,
            });
        }

        Ok(ResolvedColumns { headers: resolved })
    }
}

/// Field to header assignments for one concrete file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    headers: BTreeMap<String, String>,
}

impl ResolvedColumns {
    /// Returns the header a field resolved to, if any.
    #[must_use]
    pub fn header(&self, field: &str) -> Option<&str> {
        self.headers.get(field).map(String::as_str)
    }

    /// Reads a field from a record; blanks and unresolved fields are `None`.
    #[must_use]
    pub fn get<'a>(&self, record: &'a RawRecord, field: &str) -> Option<&'a str> {
        record.get(self.headers.get(field)?)
    }
}

/// Operator overrides, one optional table per source.
///
/// ```toml
/// [conexiones]
/// tarifa = ["categoria"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOverrides {
    /// Extra candidates for the connections extract.
    #[serde(default)]
    pub conexiones: BTreeMap<String, Vec<String>>,
    /// Extra candidates for the network length extract.
    #[serde(default)]
    pub longitudes: BTreeMap<String, Vec<String>>,
    /// Extra candidates for the projects extract.
    #[serde(default)]
    pub proyectos: BTreeMap<String, Vec<String>>,
}

impl ColumnOverrides {
    /// Loads an override file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|e| SourceError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        toml::from_str(&text).map_err(|e| SourceError::Config {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Overrides for one source.
    #[must_use]
    pub const fn for_kind(&self, kind: SourceKind) -> &BTreeMap<String, Vec<String>> {
        match kind {
            SourceKind::Conexiones => &self.conexiones,
            SourceKind::Longitudes => &self.longitudes,
            SourceKind::Proyectos => &self.proyectos,
        }
    }

    /// Builds the effective mapping for `kind`: the embedded default with
    /// these overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] on an invalid default or override.
    pub fn mapping(&self, kind: SourceKind) -> Result<ColumnMapping, SourceError> {
        let mut mapping = ColumnMapping::builtin(kind)?;
        mapping.apply_overrides(kind, self.for_kind(kind))?;
        Ok(mapping)
    }
}
