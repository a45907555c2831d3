use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::defaults::DEFAULT_VARIABLES;
use crate::error::AggregatesError;
use crate::model::{DiffMode, Entity, Metric, Source};
use crate::reconcile::DifferenceRequest;
use crate::reducer::BeneficiaryBasis;
use crate::totals::Correction;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatesConfig {
    pub name: String,
    /// Simulated period; also selects the administrative totals column.
    pub year: i32,
    #[serde(default)]
    pub survey_year: Option<i32>,
    #[serde(default)]
    pub legislation_date: Option<NaiveDate>,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default)]
    pub filter_by: Option<String>,
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub beneficiary_basis: BeneficiaryBasis,
    /// Entity name → weight variable.
    pub weights: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: Vec<FilterMapping>,
    #[serde(default)]
    pub totals: Option<TotalsConfig>,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub comparisons: Vec<ComparisonConfig>,
}

fn default_sources() -> Vec<Source> {
    vec![Source::Reference, Source::Actual]
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// `filter` expressed at `entity` lives in variable `series`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterMapping {
    pub name: String,
    pub entity: Entity,
    pub series: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterKey {
    pub filter: String,
    pub entity: Entity,
}

/// Typed weight and filter mapping of a survey scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioConfig {
    pub weights: BTreeMap<Entity, String>,
    pub filters: BTreeMap<FilterKey, String>,
}

impl ScenarioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(mut self, entity: Entity, series: impl Into<String>) -> Self {
        self.weights.insert(entity, series.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>, entity: Entity, series: impl Into<String>) -> Self {
        self.filters.insert(
            FilterKey {
                filter: filter.into(),
                entity,
            },
            series.into(),
        );
        self
    }

    pub fn has_filter(&self, filter: &str) -> bool {
        self.filters.keys().any(|k| k.filter == filter)
    }
}

// ---------------------------------------------------------------------------
// Totals + data files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TotalsConfig {
    /// Wide CSV of amounts by year.
    #[serde(default)]
    pub amounts: Option<String>,
    /// Wide CSV of beneficiaries by year.
    #[serde(default)]
    pub beneficiaries: Option<String>,
    /// Workbook with `amounts` and `beneficiaries` sheets.
    #[serde(default)]
    pub workbook: Option<String>,
    /// Replaces the default correction list when present.
    #[serde(default)]
    pub corrections: Option<Vec<Correction>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub reference: Option<SimulationFiles>,
    #[serde(default)]
    pub reform: Option<SimulationFiles>,
}

/// One record file per entity plus an optional `variable,label` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationFiles {
    #[serde(default)]
    pub individual: Option<String>,
    #[serde(default)]
    pub household: Option<String>,
    #[serde(default)]
    pub fiscal_unit: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
}

impl SimulationFiles {
    pub fn entity_files(&self) -> Vec<(Entity, &str)> {
        [
            (Entity::Individual, &self.individual),
            (Entity::Household, &self.household),
            (Entity::FiscalUnit, &self.fiscal_unit),
            (Entity::Family, &self.family),
        ]
        .into_iter()
        .filter_map(|(e, f)| f.as_deref().map(|f| (e, f)))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    pub target: Source,
    pub baseline: Source,
    #[serde(default = "all_metrics")]
    pub metrics: Vec<Metric>,
    #[serde(default = "all_modes")]
    pub modes: Vec<DiffMode>,
}

fn all_metrics() -> Vec<Metric> {
    Metric::ALL.to_vec()
}

fn all_modes() -> Vec<DiffMode> {
    DiffMode::ALL.to_vec()
}

impl ComparisonConfig {
    pub fn request(&self) -> DifferenceRequest {
        DifferenceRequest {
            metrics: self.metrics.iter().copied().collect(),
            modes: self.modes.iter().copied().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AggregatesConfig {
    pub fn from_toml(input: &str) -> Result<Self, AggregatesError> {
        let config: AggregatesConfig =
            toml::from_str(input).map_err(|e| AggregatesError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AggregatesError> {
        if self.sources.is_empty() {
            return Err(AggregatesError::ConfigValidation(
                "at least one source is required".into(),
            ));
        }

        if let Some(ref vars) = self.variables {
            if vars.is_empty() {
                return Err(AggregatesError::ConfigValidation(
                    "variables must not be empty (omit it to use the defaults)".into(),
                ));
            }
        }

        let scenario = self.scenario()?;

        if let Some(ref filter) = self.filter_by {
            if !scenario.has_filter(filter) {
                return Err(AggregatesError::ConfigValidation(format!(
                    "filter_by '{filter}' has no [[filters]] mapping"
                )));
            }
        }

        for (i, cmp) in self.comparisons.iter().enumerate() {
            if cmp.target == cmp.baseline {
                return Err(AggregatesError::ConfigValidation(format!(
                    "comparison {i}: target and baseline are both '{}'",
                    cmp.target
                )));
            }
            for source in [cmp.target, cmp.baseline] {
                if !self.sources.contains(&source) {
                    return Err(AggregatesError::ConfigValidation(format!(
                        "comparison {i}: source '{source}' is not in sources"
                    )));
                }
            }
            if cmp.metrics.is_empty() || cmp.modes.is_empty() {
                return Err(AggregatesError::ConfigValidation(format!(
                    "comparison {i}: metrics and modes must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Typed weight/filter mapping. Fails on unknown entity names, filters at
    /// an entity without weight, and duplicate (filter, entity) pairs.
    pub fn scenario(&self) -> Result<ScenarioConfig, AggregatesError> {
        if self.weights.is_empty() {
            return Err(AggregatesError::ConfigValidation(
                "at least one entity weight is required".into(),
            ));
        }

        let mut scenario = ScenarioConfig::new();
        for (name, series) in &self.weights {
            let entity = Entity::parse(name).ok_or_else(|| {
                AggregatesError::ConfigValidation(format!("weights: unknown entity '{name}'"))
            })?;
            scenario = scenario.weight(entity, series);
        }

        let mut seen = BTreeSet::new();
        for f in &self.filters {
            if !scenario.weights.contains_key(&f.entity) {
                return Err(AggregatesError::ConfigValidation(format!(
                    "filter '{}' is mapped at {} which has no weight",
                    f.name, f.entity
                )));
            }
            if !seen.insert((f.name.clone(), f.entity)) {
                return Err(AggregatesError::ConfigValidation(format!(
                    "filter '{}' is mapped twice at {}",
                    f.name, f.entity
                )));
            }
            scenario = scenario.filter(&f.name, f.entity, &f.series);
        }

        Ok(scenario)
    }

    /// Configured variables, or the built-in default list.
    pub fn variable_list(&self) -> Vec<String> {
        match self.variables {
            Some(ref vars) => vars.clone(),
            None => DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
