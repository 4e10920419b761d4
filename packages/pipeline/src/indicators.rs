//! Derived ratios, densities and data-quality flags.

use microzone_models::{IndicatorRow, IntegratedRow};

/// `numerator / denominator`, exactly `0.0` when the denominator is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn safe_ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Computes the indicator row for one integrated row.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn indicator_row(row: &IntegratedRow) -> IndicatorRow {
    let water_total = row.water.total();
    let sewage_total = row.sewage.total();

    IndicatorRow {
        ubigeo: row.key.ubigeo.clone(),
        district: row.key.zone.clone(),
        year: row.key.year,
        month: row.key.month,
        service_unit: row.service_unit.clone(),
        commercial_team: row.commercial_team.clone(),
        department: row.department.clone(),
        province: row.province.clone(),
        tariff: row.tariff,
        cutoff_date: row.cutoff_date,
        water_connections: row.water_connections,
        sewage_connections: row.sewage_connections,
        water_primary_length: row.water.primary,
        water_secondary_length: row.water.secondary,
        water_total_length: water_total,
        sewage_primary_length: row.sewage.primary,
        sewage_secondary_length: row.sewage.secondary,
        sewage_total_length: sewage_total,
        project_count: row.project_count,
        active_project_count: row.active_project_count,
        mean_active_progress: row.mean_active_progress,
        total_project_cost: row.total_project_cost,
        sewage_ratio: safe_ratio(row.sewage_connections as f64, row.water_connections),
        water_network_density: safe_ratio(water_total, row.water_connections),
        sewage_network_density: safe_ratio(sewage_total, row.sewage_connections),
        missing_project_data: row.project_count == 0,
        missing_length_data: water_total == 0.0 && sewage_total == 0.0,
        inconsistent_records: row.sewage_connections > row.water_connections,
    }
}

/// Computes indicators for every integrated row, preserving order.
#[must_use]
pub fn compute_indicators(rows: &[IntegratedRow]) -> Vec<IndicatorRow> {
    rows.iter().map(indicator_row).collect()
}

#[cfg(test)]
mod tests {
    use microzone_models::{ClassLengths, MicrozoneKey};

    use super::*;

    fn row(water: u64, sewage: u64) -> IntegratedRow {
        let mut row = IntegratedRow::empty(MicrozoneKey::new("150103", Some(2024), Some(11), "ATE"));
        row.water_connections = water;
        row.sewage_connections = sewage;
        row
    }

    #[test]
    fn connections_without_lengths_or_projects() {
        let indicators = indicator_row(&row(10, 12));
        assert!(indicators.water_network_density.abs() < f64::EPSILON);
        assert!(indicators.sewage_network_density.abs() < f64::EPSILON);
        assert!(indicators.missing_length_data);
        assert!(indicators.missing_project_data);
        assert!(indicators.inconsistent_records);
        assert!((indicators.sewage_ratio - 1.2).abs() < 1e-12);
    }

    #[test]
    fn water_density_uses_water_connections() {
        let mut integrated = row(5, 5);
        integrated.water = ClassLengths {
            primary: 100.0,
            secondary: 0.0,
        };
        let indicators = indicator_row(&integrated);
        assert!((indicators.water_network_density - 20.0).abs() < f64::EPSILON);
        assert!(indicators.sewage_network_density.abs() < f64::EPSILON);
        assert!(!indicators.inconsistent_records);
        assert!(!indicators.missing_length_data);
    }

    #[test]
    fn densities_are_zero_without_connections() {
        let mut integrated = row(0, 0);
        integrated.water = ClassLengths {
            primary: 50.0,
            secondary: 25.0,
        };
        integrated.sewage = ClassLengths {
            primary: 10.0,
            secondary: 0.0,
        };
        let indicators = indicator_row(&integrated);
        assert!(indicators.water_network_density.abs() < f64::EPSILON);
        assert!(indicators.sewage_network_density.abs() < f64::EPSILON);
        assert!(indicators.sewage_ratio.abs() < f64::EPSILON);
        assert!((indicators.water_total_length - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equal_counts_are_consistent() {
        assert!(!indicator_row(&row(7, 7)).inconsistent_records);
        assert!(indicator_row(&row(6, 7)).inconsistent_records);
    }

    #[test]
    fn missing_project_data_follows_project_count() {
        let mut integrated = row(1, 1);
        integrated.project_count = 1;
        let indicators = indicator_row(&integrated);
        assert!(!indicators.missing_project_data);
        assert_eq!(indicators.active_project_count, 0);
        assert_eq!(indicators.mean_active_progress, None);
    }

    #[test]
    fn preserves_order() {
        let rows = vec![row(1, 0), row(2, 0)];
        let indicators = compute_indicators(&rows);
        assert_eq!(indicators[0].water_connections, 1);
        assert_eq!(indicators[1].water_connections, 2);
    }
}
