//! Administrative totals: yearly published amounts and beneficiary counts.
//!
//! Raw figures come from two wide tables (variable × year). Loading selects a
//! year, converts to the report units and then applies [`Correction`]s so the
//! figures line up with how the simulation models each line:
//!
//! - housing benefits are published per scheme, simulated as one `logt` line;
//! - the minimum income was renamed (`rmi` → `rsa`), both lines are summed;
//! - levies are published as positive receipts but simulated as negative
//!   contributions, so their amount is negated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{AggregatesError, Result};
use crate::model::{Cell, Measure};
use crate::reducer::{AMOUNT_SCALE, BENEFICIARY_SCALE};

// ---------------------------------------------------------------------------
// Raw tables + store
// ---------------------------------------------------------------------------

/// Variable × year table of raw (unscaled) figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    years: BTreeSet<i32>,
    rows: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a year column, even if it holds no values.
    pub fn add_year(&mut self, year: i32) {
        self.years.insert(year);
    }

    pub fn insert(&mut self, variable: impl Into<String>, year: i32, value: f64) {
        self.years.insert(year);
        self.rows.entry(variable.into()).or_default().insert(year, value);
    }

    /// Add a row with no values (blank cells in the source).
    pub fn add_variable(&mut self, variable: impl Into<String>) {
        self.rows.entry(variable.into()).or_default();
    }

    pub fn has_year(&self, year: i32) -> bool {
        self.years.contains(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.iter().copied()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|k| k.as_str())
    }

    /// Finite value at (variable, year).
    pub fn get(&self, variable: &str, year: i32) -> Option<f64> {
        self.rows
            .get(variable)
            .and_then(|r| r.get(&year))
            .copied()
            .filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminTables {
    pub amounts: WideTable,
    pub beneficiaries: WideTable,
}

/// Persistent home of the administrative tables.
pub trait TotalsStore {
    fn read(&self) -> Result<AdminTables>;
}

impl TotalsStore for AdminTables {
    fn read(&self) -> Result<AdminTables> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Corrections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// `target = Σ parts` for both metrics, using values before this step.
    Sum { target: String, parts: Vec<String> },
    /// Flip the sign of the amount (beneficiaries untouched).
    NegateAmount { variables: Vec<String> },
}

pub fn default_corrections() -> Vec<Correction> {
    let names = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        Correction::Sum {
            target: "logt".into(),
            parts: names(&["apl", "alf", "als"]),
        },
        Correction::Sum {
            target: "rsa".into(),
            parts: names(&["rmi", "rsa"]),
        },
        Correction::NegateAmount {
            variables: names(&["irpp", "csg", "crds", "cotsoc_noncontrib"]),
        },
    ]
}

// ---------------------------------------------------------------------------
// Totals table
// ---------------------------------------------------------------------------

/// Totals for one year, amount in millions and beneficiaries in thousands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsTable {
    pub year: i32,
    pub rows: BTreeMap<String, Measure>,
}

impl TotalsTable {
    pub fn get(&self, variable: &str) -> Option<&Measure> {
        self.rows.get(variable)
    }

    /// Missing when the variable has no published figures.
    pub fn measure(&self, variable: &str) -> Measure {
        self.get(variable).copied().unwrap_or(Measure::MISSING)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn apply(&mut self, correction: &Correction) {
        match correction {
            Correction::Sum { target, parts } => {
                let present: Vec<Measure> = parts.iter().filter_map(|p| self.get(p).copied()).collect();
                if present.is_empty() {
                    log::debug!("totals {}: no component of '{target}' published", self.year);
                    return;
                }
                let sum = |cells: Vec<Cell>| -> Cell { cells.into_iter().sum() };
                let measure = Measure {
                    amount: sum(present.iter().map(|m| m.amount).collect()),
                    beneficiaries: sum(present.iter().map(|m| m.beneficiaries).collect()),
                };
                self.rows.insert(target.clone(), measure);
            }
            Correction::NegateAmount { variables } => {
                for var in variables {
                    if let Some(m) = self.rows.get_mut(var) {
                        m.amount = m.amount.map(|a| -a);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub struct TotalsLoader {
    store: Box<dyn TotalsStore>,
    corrections: Vec<Correction>,
}

impl TotalsLoader {
    pub fn new(store: Box<dyn TotalsStore>) -> Self {
        Self {
            store,
            corrections: default_corrections(),
        }
    }

    pub fn with_corrections(mut self, corrections: Vec<Correction>) -> Self {
        self.corrections = corrections;
        self
    }

    /// Build the totals table for `year`.
    ///
    /// A store failure or a year absent from either table is reported as
    /// [`AggregatesError::DataUnavailable`].
    pub fn load(&self, year: i32) -> Result<TotalsTable> {
        let tables = self.store.read().map_err(|e| match e {
            AggregatesError::DataUnavailable { .. } => e,
            other => AggregatesError::unavailable(year, other.to_string()),
        })?;

        for (name, table) in [("amounts", &tables.amounts), ("beneficiaries", &tables.beneficiaries)] {
            if !table.has_year(year) {
                return Err(AggregatesError::unavailable(
                    year,
                    format!("no {year} column in {name}"),
                ));
            }
        }

        let variables: BTreeSet<&str> = tables
            .amounts
            .variables()
            .chain(tables.beneficiaries.variables())
            .collect();

        let mut totals = TotalsTable {
            year,
            rows: BTreeMap::new(),
        };
        for var in variables {
            totals.rows.insert(
                var.to_string(),
                Measure {
                    amount: tables.amounts.get(var, year).map(|v| v / AMOUNT_SCALE),
                    beneficiaries: tables.beneficiaries.get(var, year).map(|v| v / BENEFICIARY_SCALE),
                },
            );
        }

        for correction in &self.corrections {
            totals.apply(correction);
        }

        log::info!("loaded administrative totals for {year}: {} variables", totals.len());
        Ok(totals)
    }
}
