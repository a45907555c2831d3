// CSV import/export

use std::io::{Read, Write};
use std::path::Path;

use microagg::model::{Field, Report, Tabular};
use microagg::{AggregatesError, Entity, Result, TableSimulation, WideTable};

fn io_error(path: &Path, e: impl std::fmt::Display) -> AggregatesError {
    AggregatesError::Io(format!("{}: {e}", path.display()))
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| io_error(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel-exported CSVs are usually Windows-1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

/// Blank cells are `None`; anything else must parse as a number.
fn parse_number(field: &str) -> std::result::Result<Option<f64>, String> {
    if field.is_empty() || field.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    field
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("'{field}' is not a number"))
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Parse a `variable,<year>,<year>,…` table of raw administrative figures.
pub fn read_wide_table(content: &str) -> Result<WideTable> {
    let mut reader = reader(content);
    let headers = reader
        .headers()
        .map_err(|e| AggregatesError::Io(e.to_string()))?
        .clone();

    let mut years = Vec::with_capacity(headers.len().saturating_sub(1));
    for header in headers.iter().skip(1) {
        let year: i32 = header
            .parse()
            .map_err(|_| AggregatesError::Io(format!("column '{header}' is not a year")))?;
        years.push(year);
    }

    let mut table = WideTable::new();
    for &year in &years {
        table.add_year(year);
    }

    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AggregatesError::Io(e.to_string()))?;
        let Some(variable) = record.get(0).filter(|v| !v.is_empty()) else {
            continue;
        };
        table.add_variable(variable);
        for (field, &year) in record.iter().skip(1).zip(&years) {
            let value = parse_number(field)
                .map_err(|e| AggregatesError::Io(format!("line {}: {e}", i + 2)))?;
            if let Some(value) = value {
                table.insert(variable, year, value);
            }
        }
    }

    Ok(table)
}

/// Add every column of a per-entity record file to `simulation`.
///
/// Blank cells become NaN so the reducer degrades them instead of
/// silently counting zero.
pub fn read_entity_table(simulation: &mut TableSimulation, entity: Entity, content: &str) -> Result<()> {
    let mut reader = reader(content);
    let headers = reader
        .headers()
        .map_err(|e| AggregatesError::Io(e.to_string()))?
        .clone();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AggregatesError::Io(e.to_string()))?;
        for (col, values) in columns.iter_mut().enumerate() {
            let field = record.get(col).unwrap_or("");
            let value = parse_number(field)
                .map_err(|e| AggregatesError::Io(format!("{entity} line {}: {e}", i + 2)))?;
            values.push(value.unwrap_or(f64::NAN));
        }
    }

    for (name, values) in headers.iter().zip(columns) {
        simulation.insert(name, entity, values)?;
    }
    log::debug!("{entity}: {} columns", headers.len());
    Ok(())
}

/// `variable,label` pairs.
pub fn read_labels(content: &str) -> Result<Vec<(String, String)>> {
    let mut reader = reader(content);
    let mut labels = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AggregatesError::Io(e.to_string()))?;
        if let (Some(variable), Some(label)) = (record.get(0), record.get(1)) {
            if !variable.is_empty() {
                labels.push((variable.to_string(), label.to_string()));
            }
        }
    }
    Ok(labels)
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn field_text(field: &Field) -> String {
    match field {
        Field::Text(s) => s.clone(),
        Field::Number(Some(n)) => n.to_string(),
        Field::Number(None) => String::new(),
    }
}

/// Write a table with a header row. Missing cells are left empty.
pub fn write_table<W: Write>(writer: &mut csv::Writer<W>, table: &dyn Tabular) -> Result<()> {
    writer
        .write_record(table.headers())
        .map_err(|e| AggregatesError::Io(e.to_string()))?;
    for record in table.records() {
        let fields: Vec<String> = record.iter().map(field_text).collect();
        writer
            .write_record(&fields)
            .map_err(|e| AggregatesError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Base table, then each comparison under its name, then the description.
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| io_error(path, e))?;

    write_table(&mut writer, &report.base)?;
    for diff in &report.differences {
        write_blank(&mut writer)?;
        writer
            .write_record([diff.name()])
            .map_err(|e| io_error(path, e))?;
        write_table(&mut writer, diff)?;
    }

    write_blank(&mut writer)?;
    for line in report.description.lines() {
        writer.write_record([line]).map_err(|e| io_error(path, e))?;
    }

    writer.flush().map_err(|e| io_error(path, e))?;
    Ok(())
}

fn write_blank<W: Write>(writer: &mut csv::Writer<W>) -> Result<()> {
    writer
        .write_record([""])
        .map_err(|e| AggregatesError::Io(e.to_string()))
}
