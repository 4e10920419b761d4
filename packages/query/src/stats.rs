//! Descriptive statistics over the scored table.

use std::collections::BTreeMap;

use microzone_query_models::{
    Category, ConnectionPercentiles, MessageCode, ScoredRow, ServiceMessage, Summary,
};

/// Linear-interpolation quantile of already sorted values. `q` is clamped
/// to `0..=1`; returns `None` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Finite values, sorted ascending.
#[must_use]
pub fn sorted_finite(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    values
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Water-connection percentiles of the given rows.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn connection_percentiles(rows: &[ScoredRow]) -> ConnectionPercentiles {
    let sorted = sorted_finite(rows.iter().map(|r| r.row.water_connections as f64));
    ConnectionPercentiles {
        p10: quantile(&sorted, 0.10),
        p25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.50),
        p75: quantile(&sorted, 0.75),
    }
}

fn all_without_water_length<'a>(rows: impl IntoIterator<Item = &'a ScoredRow>) -> bool {
    rows.into_iter().all(|r| r.row.water_total_length <= 0.0)
}

fn all_without_sewage_length<'a>(rows: impl IntoIterator<Item = &'a ScoredRow>) -> bool {
    rows.into_iter().all(|r| r.row.sewage_total_length <= 0.0)
}

/// Quality notes over a filtered set. An empty set only yields
/// [`MessageCode::SinResultados`].
#[must_use]
pub fn page_messages(rows: &[&ScoredRow]) -> Vec<ServiceMessage> {
    if rows.is_empty() {
        return vec![MessageCode::SinResultados.message()];
    }
    let mut codes = Vec::new();
    if all_without_water_length(rows.iter().copied()) {
        codes.push(MessageCode::LongitudAguaCero);
    }
    if all_without_sewage_length(rows.iter().copied()) {
        codes.push(MessageCode::LongitudDesagueCero);
    }
    if rows.iter().all(|r| r.row.active_project_count == 0) {
        codes.push(MessageCode::SinProyectosActivos);
    }
    if rows.iter().any(|r| r.row.sewage_ratio > 1.0) {
        codes.push(MessageCode::RatioSuperiorUno);
    }
    codes.into_iter().map(MessageCode::message).collect()
}

/// Limitations of the whole table.
#[must_use]
pub fn global_warnings(rows: &[ScoredRow]) -> Vec<String> {
    if rows.is_empty() {
        return vec!["El conjunto de microzonas está vacío.".to_string()];
    }
    let mut warnings = Vec::new();
    if all_without_water_length(rows) {
        warnings
            .push("Todas las microzonas reportan longitud de red de agua igual a cero.".to_string());
    }
    if all_without_sewage_length(rows) {
        warnings.push(
            "Todas las microzonas reportan longitud de red de desagüe igual a cero.".to_string(),
        );
    }
    let without_active = rows
        .iter()
        .filter(|r| r.row.active_project_count == 0)
        .count();
    if without_active + 1 >= rows.len() {
        warnings.push("Solo se registran proyectos activos en una microzona o ninguna.".to_string());
    }
    warnings
}

/// Table-wide summary.
#[must_use]
pub fn summarize(rows: &[ScoredRow]) -> Summary {
    let ratios = sorted_finite(rows.iter().map(|r| r.row.sewage_ratio));
    let water_densities = sorted_finite(rows.iter().map(|r| r.row.water_network_density));
    let sewage_densities = sorted_finite(rows.iter().map(|r| r.row.sewage_network_density));

    let mut categories: BTreeMap<Category, usize> =
        Category::all().iter().map(|c| (*c, 0)).collect();
    for row in rows {
        *categories.entry(row.category).or_default() += 1;
    }

    Summary {
        total: rows.len(),
        connection_percentiles: connection_percentiles(rows),
        median_ratio: quantile(&ratios, 0.5),
        max_ratio: ratios.last().copied(),
        mean_water_density: mean(&water_densities),
        mean_sewage_density: mean(&sewage_densities),
        missing_project_data: rows.iter().filter(|r| r.row.missing_project_data).count(),
        missing_length_data: rows.iter().filter(|r| r.row.missing_length_data).count(),
        inconsistent_records: rows.iter().filter(|r| r.row.inconsistent_records).count(),
        categories,
        warnings: global_warnings(rows),
    }
}
