//! Differences between two source columns of a base table.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AggregatesError, Result};
use crate::model::{BaseTable, Cell, DiffMode, Difference, DifferenceRow, DifferenceTable, Metric, Source};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceRequest {
    pub metrics: BTreeSet<Metric>,
    pub modes: BTreeSet<DiffMode>,
}

impl Default for DifferenceRequest {
    fn default() -> Self {
        Self {
            metrics: Metric::ALL.into_iter().collect(),
            modes: DiffMode::ALL.into_iter().collect(),
        }
    }
}

impl DifferenceRequest {
    pub fn new(metrics: impl IntoIterator<Item = Metric>, modes: impl IntoIterator<Item = DiffMode>) -> Self {
        Self {
            metrics: metrics.into_iter().collect(),
            modes: modes.into_iter().collect(),
        }
    }
}

/// `target − baseline` per metric, and that gap relative to `|baseline|`.
///
/// Missing operands and zero baselines give missing cells. The base table is
/// only read.
pub fn difference(
    base: &BaseTable,
    target: Source,
    baseline: Source,
    request: &DifferenceRequest,
) -> Result<DifferenceTable> {
    if request.metrics.is_empty() {
        return Err(AggregatesError::InvalidRequest(
            "at least one of amount, beneficiaries is required".into(),
        ));
    }
    if request.modes.is_empty() {
        return Err(AggregatesError::InvalidRequest(
            "at least one of absolute, relative is required".into(),
        ));
    }
    if target == baseline {
        return Err(AggregatesError::InvalidRequest(format!(
            "cannot compare {target} with itself"
        )));
    }
    for source in [target, baseline] {
        if !base.has_source(source) {
            return Err(AggregatesError::InvalidRequest(format!(
                "source '{source}' is not in the table"
            )));
        }
    }

    let rows = base
        .rows
        .iter()
        .map(|row| {
            let t = row.measure(target);
            let b = row.measure(baseline);
            let differences: BTreeMap<Metric, Difference> = request
                .metrics
                .iter()
                .map(|&metric| {
                    let d = gap(t.get(metric), b.get(metric));
                    let d = Difference {
                        absolute: d.absolute.filter(|_| request.modes.contains(&DiffMode::Absolute)),
                        relative: d.relative.filter(|_| request.modes.contains(&DiffMode::Relative)),
                    };
                    (metric, d)
                })
                .collect();
            DifferenceRow {
                variable: row.variable.clone(),
                label: row.label.clone(),
                entity: row.entity,
                differences,
            }
        })
        .collect();

    Ok(DifferenceTable {
        target,
        baseline,
        metrics: request.metrics.iter().copied().collect(),
        modes: request.modes.iter().copied().collect(),
        rows,
    })
}

fn gap(target: Cell, baseline: Cell) -> Difference {
    let (Some(t), Some(b)) = (target, baseline) else {
        return Difference::default();
    };
    let absolute = t - b;
    let relative = absolute / b.abs();
    Difference {
        absolute: absolute.is_finite().then_some(absolute),
        relative: relative.is_finite().then_some(relative),
    }
}
