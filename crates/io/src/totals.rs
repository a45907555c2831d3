// Administrative totals stores backed by files

use std::path::{Path, PathBuf};

use microagg::config::TotalsConfig;
use microagg::{AdminTables, AggregatesError, Result, TotalsStore};

use crate::csv::{read_file_as_utf8, read_wide_table};
use crate::xlsx::XlsxTotalsStore;

/// Two wide CSV files, one for amounts and one for beneficiaries.
#[derive(Debug, Clone)]
pub struct CsvTotalsStore {
    amounts: PathBuf,
    beneficiaries: PathBuf,
}

impl CsvTotalsStore {
    pub fn new(amounts: impl Into<PathBuf>, beneficiaries: impl Into<PathBuf>) -> Self {
        Self {
            amounts: amounts.into(),
            beneficiaries: beneficiaries.into(),
        }
    }
}

impl TotalsStore for CsvTotalsStore {
    fn read(&self) -> Result<AdminTables> {
        Ok(AdminTables {
            amounts: read_wide_table(&read_file_as_utf8(&self.amounts)?)?,
            beneficiaries: read_wide_table(&read_file_as_utf8(&self.beneficiaries)?)?,
        })
    }
}

/// Store described by a `[totals]` section; paths are relative to `base_dir`.
pub fn store_from_config(config: &TotalsConfig, base_dir: &Path) -> Result<Box<dyn TotalsStore>> {
    if let Some(ref workbook) = config.workbook {
        return Ok(Box::new(XlsxTotalsStore::new(base_dir.join(workbook))));
    }
    match (&config.amounts, &config.beneficiaries) {
        (Some(amounts), Some(beneficiaries)) => Ok(Box::new(CsvTotalsStore::new(
            base_dir.join(amounts),
            base_dir.join(beneficiaries),
        ))),
        _ => Err(AggregatesError::ConfigValidation(
            "[totals] needs either workbook or both amounts and beneficiaries".into(),
        )),
    }
}
