//! Full outer join of the three cleaned sources.
//!
//! Every source is first reduced to a map keyed by [`MicrozoneKey`] so the
//! join is 1:1. The union of all keys is then walked in order and each key
//! produces exactly one [`IntegratedRow`].

use std::collections::{BTreeMap, BTreeSet};

use microzone_models::{
    ClassLengths, ConnectionRecord, IntegratedRow, MicrozoneKey, NetworkClass,
    NetworkLengthRecord, ProjectRecord,
};

/// Per-key project aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectAggregate {
    /// Project rows, any stage.
    pub count: u64,
    /// Projects whose stage is not terminal.
    pub active: u64,
    /// Sum of progress over active projects that report one.
    pub active_progress_sum: f64,
    /// Active projects that report a progress.
    pub active_progress_count: u64,
    /// Total cost of all projects.
    pub total_cost: f64,
}

impl ProjectAggregate {
    fn add(&mut self, project: &ProjectRecord) {
        self.count += 1;
        self.total_cost += project.total_cost;
        if project.stage.is_active() {
            self.active += 1;
            if let Some(progress) = project.progress {
                self.active_progress_sum += progress;
                self.active_progress_count += 1;
            }
        }
    }

    /// Mean progress over active projects, `None` when no active project
    /// reports progress.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_active_progress(&self) -> Option<f64> {
        (self.active_progress_count > 0)
            .then(|| self.active_progress_sum / self.active_progress_count as f64)
    }
}

/// Partitions lengths by class and sums them per key.
#[must_use]
pub fn lengths_by_key(
    lengths: &[NetworkLengthRecord],
) -> BTreeMap<MicrozoneKey, (ClassLengths, ClassLengths)> {
    let mut by_key: BTreeMap<MicrozoneKey, (ClassLengths, ClassLengths)> = BTreeMap::new();
    for record in lengths {
        let (water, sewage) = by_key.entry(record.key.clone()).or_default();
        let target = match record.class {
            NetworkClass::Agua => water,
            NetworkClass::Desague => sewage,
        };
        target.primary += record.primary_length;
        target.secondary += record.secondary_length;
    }
    by_key
}

/// Aggregates projects per key.
#[must_use]
pub fn projects_by_key(projects: &[ProjectRecord]) -> BTreeMap<MicrozoneKey, ProjectAggregate> {
    let mut by_key: BTreeMap<MicrozoneKey, ProjectAggregate> = BTreeMap::new();
    for project in projects {
        by_key.entry(project.key.clone()).or_default().add(project);
    }
    by_key
}

/// Joins the cleaned sources into one row per key, ordered by key.
///
/// Administrative attributes come from the connections source only; keys
/// absent there keep them null. Missing lengths and project aggregates are
/// zero-filled.
#[must_use]
pub fn enrich_microzones(
    connections: &[ConnectionRecord],
    lengths: &[NetworkLengthRecord],
    projects: &[ProjectRecord],
) -> Vec<IntegratedRow> {
    let connections_by_key: BTreeMap<&MicrozoneKey, &ConnectionRecord> =
        connections.iter().map(|c| (&c.key, c)).collect();
    let lengths_by_key = lengths_by_key(lengths);
    let projects_by_key = projects_by_key(projects);

    let keys: BTreeSet<&MicrozoneKey> = connections_by_key
        .keys()
        .copied()
        .chain(lengths_by_key.keys())
        .chain(projects_by_key.keys())
        .collect();

    let rows: Vec<IntegratedRow> = keys
        .into_iter()
        .map(|key| {
            let mut row = IntegratedRow::empty(key.clone());

            if let Some(connection) = connections_by_key.get(key) {
                row.service_unit.clone_from(&connection.service_unit);
                row.commercial_team.clone_from(&connection.commercial_team);
                row.department.clone_from(&connection.department);
                row.province.clone_from(&connection.province);
                row.tariff = connection.tariff;
                row.cutoff_date = connection.cutoff_date;
                row.water_connections = connection.water_connections;
                row.sewage_connections = connection.sewage_connections;
            }

            if let Some((water, sewage)) = lengths_by_key.get(key) {
                row.water = *water;
                row.sewage = *sewage;
            }

            if let Some(aggregate) = projects_by_key.get(key) {
                row.project_count = aggregate.count;
                row.active_project_count = aggregate.active;
                row.mean_active_progress = aggregate.mean_active_progress();
                row.total_project_cost = aggregate.total_cost;
            }

            row
        })
        .collect();

    log::info!(
        "Integrated {} micro-zone(s) from {} connection, {} length and {} project record(s)",
        rows.len(),
        connections.len(),
        lengths.len(),
        projects.len()
    );

    rows
}
