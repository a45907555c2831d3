// Excel report export and administrative workbook import

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};

use microagg::model::{display_label, Field, Report, Tabular};
use microagg::{AdminTables, AggregatesError, Result, TotalsStore, WideTable};

pub const AMOUNTS_SHEET: &str = "amounts";
pub const BENEFICIARIES_SHEET: &str = "beneficiaries";

fn xlsx_error(what: &str, e: impl std::fmt::Display) -> AggregatesError {
    AggregatesError::Io(format!("{what}: {e}"))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Export a report: `aggregates`, one `diff_<target>_vs_<baseline>` sheet per
/// comparison, then `description`.
pub fn export_report(report: &Report, path: &Path) -> Result<()> {
    let mut xlsx_workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = xlsx_workbook
        .add_worksheet()
        .set_name("aggregates")
        .map_err(|e| xlsx_error("Failed to create sheet 'aggregates'", e))?;
    write_sheet(worksheet, &report.base, &header_format)?;

    for diff in &report.differences {
        let name = format!("diff_{}", diff.name());
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| xlsx_error(&format!("Failed to create sheet '{name}'"), e))?;
        write_sheet(worksheet, diff, &header_format)?;
    }

    let worksheet = xlsx_workbook
        .add_worksheet()
        .set_name("description")
        .map_err(|e| xlsx_error("Failed to create sheet 'description'", e))?;
    for (row, line) in report.description.lines().iter().enumerate() {
        worksheet
            .write_string(row as u32, 0, line)
            .map_err(|e| xlsx_error("Failed to write description", e))?;
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| xlsx_error("Failed to save XLSX file", e))?;
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, table: &dyn Tabular, header_format: &Format) -> Result<()> {
    for (col, code) in table.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, display_label(code), header_format)
            .map_err(|e| xlsx_error("Failed to write header", e))?;
    }
    worksheet
        .set_column_width(1, 40)
        .map_err(|e| xlsx_error("Failed to set column width", e))?;

    for (i, record) in table.records().iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, field) in record.iter().enumerate() {
            let col = col as u16;
            match field {
                Field::Text(s) => {
                    worksheet
                        .write_string(row, col, s)
                        .map_err(|e| xlsx_error("Failed to write cell", e))?;
                }
                Field::Number(Some(n)) => {
                    worksheet
                        .write_number(row, col, *n)
                        .map_err(|e| xlsx_error("Failed to write cell", e))?;
                }
                // missing stays blank
                Field::Number(None) => {}
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Workbook holding one `amounts` and one `beneficiaries` sheet, each laid
/// out as `variable | <year> | <year> | …`.
#[derive(Debug, Clone)]
pub struct XlsxTotalsStore {
    path: PathBuf,
}

impl XlsxTotalsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TotalsStore for XlsxTotalsStore {
    fn read(&self) -> Result<AdminTables> {
        let mut workbook: Sheets<_> = open_workbook_auto(&self.path)
            .map_err(|e| xlsx_error(&format!("Failed to open {}", self.path.display()), e))?;
        Ok(AdminTables {
            amounts: read_wide_sheet(&mut workbook, AMOUNTS_SHEET)?,
            beneficiaries: read_wide_sheet(&mut workbook, BENEFICIARIES_SHEET)?,
        })
    }
}

fn read_wide_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>, name: &str) -> Result<WideTable> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| xlsx_error(&format!("Failed to read sheet '{name}'"), e))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(WideTable::new());
    };

    let mut years = Vec::with_capacity(header.len().saturating_sub(1));
    for cell in header.iter().skip(1) {
        let year = cell_number(cell)
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i32)
            .ok_or_else(|| AggregatesError::Io(format!("sheet '{name}': column '{cell}' is not a year")))?;
        years.push(year);
    }

    let mut table = WideTable::new();
    for &year in &years {
        table.add_year(year);
    }

    for row in rows {
        let variable = match row.first() {
            Some(Data::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => continue,
        };
        table.add_variable(variable.as_str());
        for (cell, &year) in row.iter().skip(1).zip(&years) {
            if let Some(value) = cell_number(cell) {
                table.insert(variable.as_str(), year, value);
            }
        }
    }

    log::debug!("sheet '{name}': {} years", years.len());
    Ok(table)
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(n) => Some(*n),
        Data::Int(n) => Some(*n as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use microagg::model::{Entity, Source};
    use microagg::{run, AggregatesConfig, Scenario, TableSimulation};

    fn write_admin_workbook(path: &Path) {
        let mut wb = XlsxWorkbook::new();
        for (sheet, rsa) in [(AMOUNTS_SHEET, 9.5e9), (BENEFICIARIES_SHEET, 1.8e6)] {
            let ws = wb.add_worksheet().set_name(sheet).unwrap();
            ws.write_string(0, 0, "variable").unwrap();
            ws.write_number(0, 1, 2012.0).unwrap();
            ws.write_string(0, 2, "2013").unwrap();
            ws.write_string(1, 0, "rsa").unwrap();
            ws.write_number(1, 2, rsa).unwrap();
            ws.write_string(2, 0, "irpp").unwrap();
            ws.write_number(2, 1, 1.0).unwrap();
        }
        wb.save(path).unwrap();
    }

    #[test]
    fn test_read_totals_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.xlsx");
        write_admin_workbook(&path);

        let tables = XlsxTotalsStore::new(&path).read().unwrap();
        assert_eq!(tables.amounts.years().collect::<Vec<_>>(), vec![2012, 2013]);
        assert_eq!(tables.amounts.get("rsa", 2013), Some(9.5e9));
        assert_eq!(tables.amounts.get("rsa", 2012), None);
        assert_eq!(tables.beneficiaries.get("rsa", 2013), Some(1.8e6));
        assert_eq!(tables.amounts.get("irpp", 2012), Some(1.0));
    }

    #[test]
    fn test_missing_sheet_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.xlsx");
        let mut wb = XlsxWorkbook::new();
        wb.add_worksheet().set_name(AMOUNTS_SHEET).unwrap();
        wb.save(&path).unwrap();

        let err = XlsxTotalsStore::new(&path).read().unwrap_err();
        assert!(err.to_string().contains("beneficiaries"));
    }

    #[test]
    fn test_export_report_sheets() {
        let config = AggregatesConfig::from_toml(
            r#"
name = "xlsx"
year = 2013
variables = ["rsa", "af"]
sources = ["reference", "reform"]

[weights]
household = "wprm"

[[comparisons]]
target = "reform"
baseline = "reference"
"#,
        )
        .unwrap();
        let sim = |rsa: f64| {
            TableSimulation::new(2013)
                .with_column("wprm", Entity::Household, vec![1_000.0])
                .unwrap()
                .with_column("rsa", Entity::Household, vec![rsa])
                .unwrap()
        };
        let scenario = Scenario::new(2013, Box::new(sim(6_000.0))).with_reform(Box::new(sim(7_000.0)));
        let report = run(&config, scenario, None).unwrap();
        assert_eq!(report.base.cell("rsa", Source::Reference, microagg::Metric::Amount), Some(6.0));

        let dir = tempdir().unwrap();
        let path = dir.path().join("Aggregates.xlsx");
        export_report(&report, &path).unwrap();

        let mut workbook: Sheets<_> = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names().to_vec(),
            vec!["aggregates", "diff_reform_vs_reference", "description"]
        );

        let range = workbook.worksheet_range("aggregates").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Variable".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("rsa".into())));
        assert_eq!(range.get_value((1, 3)), Some(&Data::Float(6.0)));

        // af is unknown: its numeric cells stay blank
        let af = range.get_value((2, 3));
        assert!(af.is_none() || af == Some(&Data::Empty));

        let diff = workbook.worksheet_range("diff_reform_vs_reference").unwrap();
        assert_eq!(diff.get_value((1, 3)), Some(&Data::Float(1.0)));

        let desc = workbook.worksheet_range("description").unwrap();
        assert_eq!(desc.get_value((0, 0)).map(|d| d.to_string()).unwrap_or_default(), report.description.lines()[0]);
    }
}
