use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AggregatesError;

/// A table cell. `None` is the missing-value marker.
pub type Cell = Option<f64>;

// ---------------------------------------------------------------------------
// Sources, metrics, entities
// ---------------------------------------------------------------------------

/// Where a column of figures comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Reference,
    Reform,
    Actual,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Reference, Source::Reform, Source::Actual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Reform => "reform",
            Self::Actual => "actual",
        }
    }

    /// Reference and reform are computed from records; actual is a lookup.
    pub fn is_simulated(&self) -> bool {
        !matches!(self, Self::Actual)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Weighted total, millions.
    Amount,
    /// Weighted count of non-zero records, thousands.
    Beneficiaries,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Amount, Metric::Beneficiaries];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Beneficiaries => "beneficiaries",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    Absolute,
    Relative,
}

impl DiffMode {
    pub const ALL: [DiffMode; 2] = [DiffMode::Absolute, DiffMode::Relative];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Absolute => "abs",
            Self::Relative => "rel",
        }
    }
}

/// Aggregation level of a variable. Each entity has exactly one weight series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Individual,
    Household,
    FiscalUnit,
    Family,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Individual,
        Entity::Household,
        Entity::FiscalUnit,
        Entity::Family,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Household => "household",
            Self::FiscalUnit => "fiscal_unit",
            Self::Family => "family",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rows + tables
// ---------------------------------------------------------------------------

/// Amount and beneficiary count for one variable from one source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    pub amount: Cell,
    pub beneficiaries: Cell,
}

impl Measure {
    pub const MISSING: Measure = Measure {
        amount: None,
        beneficiaries: None,
    };

    pub fn get(&self, metric: Metric) -> Cell {
        match metric {
            Metric::Amount => self.amount,
            Metric::Beneficiaries => self.beneficiaries,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.amount.is_none() && self.beneficiaries.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub variable: String,
    pub label: String,
    pub entity: Option<Entity>,
    pub measures: BTreeMap<Source, Measure>,
}

impl AggregateRow {
    pub fn new(variable: impl Into<String>) -> Self {
        let variable = variable.into();
        Self {
            label: variable.clone(),
            variable,
            entity: None,
            measures: BTreeMap::new(),
        }
    }

    /// Missing when the source was not computed for this row.
    pub fn measure(&self, source: Source) -> Measure {
        self.measures.get(&source).copied().unwrap_or(Measure::MISSING)
    }
}

/// Every requested variable, one row each, one column pair per source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseTable {
    pub sources: Vec<Source>,
    pub rows: Vec<AggregateRow>,
    pub warnings: Vec<Warning>,
}

impl BaseTable {
    pub fn row(&self, variable: &str) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.variable == variable)
    }

    pub fn has_source(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }

    pub fn cell(&self, variable: &str, source: Source, metric: Metric) -> Cell {
        self.row(variable).and_then(|r| r.measure(source).get(metric))
    }

    pub fn column_name(source: Source, metric: Metric) -> String {
        format!("{source}_{metric}")
    }
}

/// Absolute and relative gap for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Difference {
    pub absolute: Cell,
    pub relative: Cell,
}

impl Difference {
    pub fn get(&self, mode: DiffMode) -> Cell {
        match mode {
            DiffMode::Absolute => self.absolute,
            DiffMode::Relative => self.relative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceRow {
    pub variable: String,
    pub label: String,
    pub entity: Option<Entity>,
    pub differences: BTreeMap<Metric, Difference>,
}

impl DifferenceRow {
    pub fn get(&self, metric: Metric, mode: DiffMode) -> Cell {
        self.differences.get(&metric).and_then(|d| d.get(mode))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceTable {
    pub target: Source,
    pub baseline: Source,
    pub metrics: Vec<Metric>,
    pub modes: Vec<DiffMode>,
    pub rows: Vec<DifferenceRow>,
}

impl DifferenceTable {
    pub fn row(&self, variable: &str) -> Option<&DifferenceRow> {
        self.rows.iter().find(|r| r.variable == variable)
    }

    /// Short name used for sheet titles, e.g. `reform_vs_reference`.
    pub fn name(&self) -> String {
        format!("{}_vs_{}", self.target, self.baseline)
    }

    pub fn column_name(metric: Metric, mode: DiffMode) -> String {
        format!("{metric}_diff_{}", mode.suffix())
    }
}

// ---------------------------------------------------------------------------
// Tabular view (consumed by writers)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Number(Cell),
}

/// Row-per-variable view shared by the base and difference tables.
pub trait Tabular {
    fn headers(&self) -> Vec<String>;
    fn records(&self) -> Vec<Vec<Field>>;
}

fn key_fields(variable: &str, label: &str, entity: Option<Entity>) -> Vec<Field> {
    vec![
        Field::Text(variable.to_string()),
        Field::Text(label.to_string()),
        Field::Text(entity.map(|e| e.as_str().to_string()).unwrap_or_default()),
    ]
}

const KEY_HEADERS: [&str; 3] = ["variable", "label", "entity"];

impl Tabular for BaseTable {
    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = KEY_HEADERS.iter().map(|h| h.to_string()).collect();
        for source in &self.sources {
            for metric in Metric::ALL {
                headers.push(Self::column_name(*source, metric));
            }
        }
        headers
    }

    fn records(&self) -> Vec<Vec<Field>> {
        self.rows
            .iter()
            .map(|row| {
                let mut fields = key_fields(&row.variable, &row.label, row.entity);
                for source in &self.sources {
                    let m = row.measure(*source);
                    fields.push(Field::Number(m.amount));
                    fields.push(Field::Number(m.beneficiaries));
                }
                fields
            })
            .collect()
    }
}

impl Tabular for DifferenceTable {
    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = KEY_HEADERS.iter().map(|h| h.to_string()).collect();
        for metric in &self.metrics {
            for mode in &self.modes {
                headers.push(Self::column_name(*metric, *mode));
            }
        }
        headers
    }

    fn records(&self) -> Vec<Vec<Field>> {
        self.rows
            .iter()
            .map(|row| {
                let mut fields = key_fields(&row.variable, &row.label, row.entity);
                for metric in &self.metrics {
                    for mode in &self.modes {
                        fields.push(Field::Number(row.get(*metric, *mode)));
                    }
                }
                fields
            })
            .collect()
    }
}

/// Human-readable header for a column code produced by [`Tabular::headers`].
pub fn display_label(code: &str) -> String {
    let unit = |metric: &str| match metric {
        "amount" => "(millions)",
        _ => "(thousands)",
    };
    match code {
        "variable" => return "Variable".into(),
        "label" => return "Measure".into(),
        "entity" => return "Entity".into(),
        _ => {}
    }
    for source in Source::ALL {
        if let Some(metric) = code.strip_prefix(&format!("{source}_")) {
            let what = if metric == "amount" { "spending" } else { "beneficiaries" };
            let who = match source {
                Source::Reference => "Reference",
                Source::Reform => "Reform",
                Source::Actual => "Actual",
            };
            return format!("{who} {what} {}", unit(metric));
        }
    }
    for metric in Metric::ALL {
        for mode in DiffMode::ALL {
            if code == DifferenceTable::column_name(metric, mode) {
                let what = if metric == Metric::Amount { "spending" } else { "beneficiaries" };
                return match mode {
                    DiffMode::Absolute => format!("Abs. diff. {what} {}", unit(metric.as_str())),
                    DiffMode::Relative => format!("Rel. diff. {what}"),
                };
            }
        }
    }
    code.to_string()
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Configuration,
    DataUnavailable,
    NumericDegradation,
    MissingSimulation,
}

/// A degraded cell, row or column, recorded instead of failing the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn from_error(err: &AggregatesError, source: Option<Source>) -> Self {
        let (kind, variable) = match err {
            AggregatesError::Configuration { variable, .. } => {
                (WarningKind::Configuration, Some(variable.clone()))
            }
            AggregatesError::NumericDegradation { variable, .. } => {
                (WarningKind::NumericDegradation, Some(variable.clone()))
            }
            AggregatesError::DataUnavailable { .. } => (WarningKind::DataUnavailable, None),
            _ => (WarningKind::Configuration, None),
        };
        let message = match source {
            Some(source) => crate::error::source_context(source, err),
            None => err.to_string(),
        };
        Self {
            variable,
            source,
            kind,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Text block attached to exported reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    pub config_name: String,
    pub engine_version: String,
    pub generated_at: NaiveDateTime,
    pub period: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legislation_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey_year: Option<i32>,
}

impl Description {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("microagg {} ({})", self.engine_version, self.config_name),
            format!(
                "Computed on {} at {}",
                self.generated_at.format("%d-%m-%Y"),
                self.generated_at.format("%H:%M")
            ),
        ];
        match self.legislation_date {
            Some(date) => lines.push(format!("Tax-benefit system as of {date}")),
            None => lines.push(format!("Tax-benefit system for {}", self.period)),
        }
        if let Some(year) = self.survey_year {
            lines.push(format!("Survey data from {year}"));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub description: Description,
    pub summary: crate::summary::TableSummary,
    pub base: BaseTable,
    pub differences: Vec<DifferenceTable>,
}
