use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{BaseTable, Metric, Source};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub variables: usize,
    /// Rows with every requested cell present.
    pub complete_rows: usize,
    pub degraded_rows: usize,
    pub missing_cells: BTreeMap<Source, usize>,
    pub warnings: usize,
}

/// Coverage statistics of a base table.
pub fn compute_summary(table: &BaseTable) -> TableSummary {
    let mut missing_cells: BTreeMap<Source, usize> =
        table.sources.iter().map(|s| (*s, 0)).collect();
    let mut complete_rows = 0;

    for row in &table.rows {
        let mut complete = true;
        for source in &table.sources {
            let m = row.measure(*source);
            let missing = Metric::ALL.iter().filter(|metric| m.get(**metric).is_none()).count();
            if missing > 0 {
                complete = false;
                *missing_cells.entry(*source).or_insert(0) += missing;
            }
        }
        if complete {
            complete_rows += 1;
        }
    }

    TableSummary {
        variables: table.rows.len(),
        complete_rows,
        degraded_rows: table.rows.len() - complete_rows,
        missing_cells,
        warnings: table.warnings.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregateRow, Measure};

    #[test]
    fn summary_counts() {
        let full = Measure {
            amount: Some(1.0),
            beneficiaries: Some(2.0),
        };
        let half = Measure {
            amount: Some(1.0),
            beneficiaries: None,
        };

        let mut a = AggregateRow::new("a");
        a.measures.insert(Source::Reference, full);
        a.measures.insert(Source::Actual, full);
        let mut b = AggregateRow::new("b");
        b.measures.insert(Source::Reference, half);
        let c = AggregateRow::new("c");

        let table = BaseTable {
            sources: vec![Source::Reference, Source::Actual],
            rows: vec![a, b, c],
            warnings: vec![],
        };
        let summary = compute_summary(&table);
        assert_eq!(summary.variables, 3);
        assert_eq!(summary.complete_rows, 1);
        assert_eq!(summary.degraded_rows, 2);
        assert_eq!(summary.missing_cells[&Source::Reference], 1 + 2);
        assert_eq!(summary.missing_cells[&Source::Actual], 2 + 2);
    }
}
