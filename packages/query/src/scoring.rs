//! Criticality index and per-row data warnings.

use microzone_models::IndicatorRow;
use microzone_query_models::{Category, CriticalityCriteria, DataWarning, ScoredRow};

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Criticality index of one row against normalized criteria.
///
/// Both gaps are in `0..=1`: the sewage gap is `1 - min(ratio, 1)` and the
/// scale gap is `1 - min(water / reference, 1)`. An unusable ratio counts
/// as full coverage. Returns `None` when the weighted sum is not finite.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn criticality_index(
    row: &IndicatorRow,
    criteria: &CriticalityCriteria,
    reference: f64,
) -> Option<f64> {
    let ratio = if row.sewage_ratio.is_finite() {
        row.sewage_ratio.min(1.0)
    } else {
        1.0
    };
    let coverage = if reference > 0.0 {
        (row.water_connections as f64 / reference).min(1.0)
    } else {
        1.0
    };
    let index =
        criteria.ratio_weight * (1.0 - ratio) + criteria.connections_weight * (1.0 - coverage);
    index.is_finite().then(|| round3(index))
}

/// Data-quality warnings for one row, in a fixed order.
#[must_use]
pub fn row_warnings(row: &IndicatorRow) -> Vec<DataWarning> {
    let mut warnings = Vec::new();
    if row.water_total_length <= 0.0 {
        warnings.push(DataWarning::SinLongitudAgua);
    }
    if row.sewage_total_length <= 0.0 {
        warnings.push(DataWarning::SinLongitudDesague);
    }
    if row.active_project_count == 0 {
        warnings.push(DataWarning::SinProyectos);
    }
    if row.water_connections == 0 {
        warnings.push(DataWarning::SinConexionesAgua);
    }
    if row.sewage_ratio > 1.0 {
        warnings.push(DataWarning::RatioMayorUno);
    }
    warnings
}

/// Scores a row: index, category and warnings.
#[must_use]
pub fn score_row(row: IndicatorRow, criteria: &CriticalityCriteria, reference: f64) -> ScoredRow {
    let index = criticality_index(&row, criteria, reference);
    ScoredRow {
        index,
        category: Category::classify(index, criteria),
        warnings: row_warnings(&row),
        row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::indicator;

    #[test]
    fn full_coverage_scores_zero() {
        let row = indicator("150103", "ATE", 20_000, 20_000);
        let criteria = CriticalityCriteria::default();
        assert_eq!(criticality_index(&row, &criteria, 15_162.0), Some(0.0));
        assert_eq!(score_row(row, &criteria, 15_162.0).category, Category::Estable);
    }

    #[test]
    fn no_sewage_and_small_scale_is_critical() {
        let row = indicator("150103", "ATE", 1_000, 0);
        let criteria = CriticalityCriteria::default();
        let scored = score_row(row, &criteria, 10_000.0);
        // 0.6 * 1 + 0.4 * 0.9
        assert_eq!(scored.index, Some(0.96));
        assert_eq!(scored.category, Category::Critica);
    }

    #[test]
    fn ratio_above_one_is_capped() {
        let row = indicator("150103", "ATE", 100, 150);
        let criteria = CriticalityCriteria::default();
        let scored = score_row(row, &criteria, 100.0);
        assert_eq!(scored.index, Some(0.0));
        assert!(scored.warnings.contains(&DataWarning::RatioMayorUno));
    }

    #[test]
    fn vigilance_band() {
        let row = indicator("150103", "ATE", 100, 50);
        let criteria = CriticalityCriteria::default();
        // 0.6 * 0.5 + 0.4 * 0
        let scored = score_row(row, &criteria, 100.0);
        assert_eq!(scored.index, Some(0.3));
        assert_eq!(scored.category, Category::Vigilancia);
    }

    #[test]
    fn non_finite_ratio_counts_as_covered() {
        let mut row = indicator("150103", "ATE", 100, 0);
        row.sewage_ratio = f64::NAN;
        let criteria = CriticalityCriteria::default();
        assert_eq!(criticality_index(&row, &criteria, 100.0), Some(0.0));
    }

    #[test]
    fn warnings_for_an_empty_zone() {
        let row = indicator("150103", "ATE", 0, 0);
        assert_eq!(
            row_warnings(&row),
            vec![
                DataWarning::SinLongitudAgua,
                DataWarning::SinLongitudDesague,
                DataWarning::SinProyectos,
                DataWarning::SinConexionesAgua,
            ]
        );
    }

    #[test]
    fn complete_zone_has_no_warnings() {
        let mut row = indicator("150103", "ATE", 10, 10);
        row.water_total_length = 5.0;
        row.sewage_total_length = 5.0;
        row.active_project_count = 1;
        assert!(row_warnings(&row).is_empty());
    }
}
