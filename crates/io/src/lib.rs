//! File I/O for microagg: per-entity simulation tables, administrative
//! totals (CSV or workbook) and report export (CSV, XLSX, JSON).

use std::path::Path;

use chrono::NaiveDate;
use microagg::{AggregatesError, Report, Result};

pub mod csv;
pub mod json;
pub mod scenario;
pub mod totals;
pub mod xlsx;

pub use scenario::{load_scenario, load_simulation};
pub use totals::{store_from_config, CsvTotalsStore};
pub use xlsx::XlsxTotalsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ReportFormat {
    /// Format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            other => Err(AggregatesError::InvalidRequest(format!(
                "unsupported report format '{other}' (expected csv, xlsx or json)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }
}

/// `Aggregates_<dd-mm-YYYY>.<ext>`
pub fn default_report_name(format: ReportFormat, date: NaiveDate) -> String {
    format!("Aggregates_{}.{}", date.format("%d-%m-%Y"), format.extension())
}

/// Write `report` in the format implied by `path`.
pub fn save_report(report: &Report, path: &Path) -> Result<ReportFormat> {
    let format = ReportFormat::from_path(path)?;
    match format {
        ReportFormat::Csv => csv::write_report(report, path)?,
        ReportFormat::Xlsx => xlsx::export_report(report, path)?,
        ReportFormat::Json => json::export_report(report, path)?,
    }
    log::info!("report written to {}", path.display());
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("out/Report.XLSX")).unwrap(), ReportFormat::Xlsx);
        assert_eq!(ReportFormat::from_path(Path::new("a.csv")).unwrap(), ReportFormat::Csv);
        assert!(ReportFormat::from_path(Path::new("a.xls")).is_err());
        assert!(ReportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_default_report_name() {
        let date = NaiveDate::from_ymd_opt(2014, 3, 7).unwrap();
        assert_eq!(default_report_name(ReportFormat::Xlsx, date), "Aggregates_07-03-2014.xlsx");
    }
}
