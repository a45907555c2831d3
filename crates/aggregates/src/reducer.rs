//! Weighted reduction of per-record series into scaled totals.

use serde::{Deserialize, Serialize};

use crate::error::{AggregatesError, Result};
use crate::model::{Measure, Metric};

/// Amounts are reported in millions.
pub const AMOUNT_SCALE: f64 = 1_000_000.0;
/// Beneficiary counts are reported in thousands.
pub const BENEFICIARY_SCALE: f64 = 1_000.0;

/// Which population the beneficiary count is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryBasis {
    /// Only records passing the filter are counted.
    #[default]
    Filtered,
    /// All weighted records are counted; the filter applies to amounts only.
    Unfiltered,
}

/// Reduced totals plus the metrics that degraded to missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub measure: Measure,
    pub degraded: Vec<Metric>,
}

/// Reduce `values` with `weights` and an optional 0/1 `filter`.
///
/// All series must be aligned on the same record index. A non-finite sum
/// (empty input, NaN term) yields a missing cell rather than an error.
pub fn reduce(
    variable: &str,
    values: &[f64],
    weights: &[f64],
    filter: Option<&[f64]>,
    basis: BeneficiaryBasis,
) -> Result<Reduction> {
    if values.len() != weights.len() {
        return Err(AggregatesError::configuration(
            variable,
            format!(
                "{} values but {} weights",
                values.len(),
                weights.len()
            ),
        ));
    }
    if let Some(filter) = filter {
        if filter.len() != weights.len() {
            return Err(AggregatesError::configuration(
                variable,
                format!("{} filter entries but {} weights", filter.len(), weights.len()),
            ));
        }
    }

    if values.is_empty() {
        return Ok(Reduction {
            measure: Measure::MISSING,
            degraded: Metric::ALL.to_vec(),
        });
    }

    let mut amount = 0.0;
    let mut count = 0.0;
    for (i, (&value, &weight)) in values.iter().zip(weights).enumerate() {
        let f = filter.map_or(1.0, |f| f[i]);
        amount += value * weight * f;

        let benef = if value.is_nan() { f64::NAN } else if value != 0.0 { 1.0 } else { 0.0 };
        count += match basis {
            BeneficiaryBasis::Filtered => benef * weight * f,
            BeneficiaryBasis::Unfiltered => benef * weight,
        };
    }

    // Both metrics of a source are present together or both missing.
    if !amount.is_finite() || !count.is_finite() {
        return Ok(Reduction {
            measure: Measure::MISSING,
            degraded: Metric::ALL.to_vec(),
        });
    }

    Ok(Reduction {
        measure: Measure {
            amount: Some(scaled(amount, AMOUNT_SCALE)),
            beneficiaries: Some(scaled(count, BENEFICIARY_SCALE)),
        },
        degraded: Vec::new(),
    })
}

/// `round(sum / scale)`, with negative zero folded into zero.
fn scaled(sum: f64, scale: f64) -> f64 {
    (sum / scale).round() + 0.0
}
