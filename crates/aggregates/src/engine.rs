use crate::config::{AggregatesConfig, ScenarioConfig};
use crate::entity::EntityResolver;
use crate::error::{AggregatesError, Result};
use crate::model::{
    AggregateRow, BaseTable, Description, Measure, Report, Source, Warning, WarningKind,
};
use crate::reconcile::difference;
use crate::reducer::{reduce, BeneficiaryBasis, Reduction};
use crate::simulation::Simulation;
use crate::summary::compute_summary;
use crate::totals::{TotalsLoader, TotalsStore, TotalsTable};

/// Simulations of one survey scenario for one period.
pub struct Scenario {
    pub period: i32,
    pub reference: Box<dyn Simulation>,
    pub reform: Option<Box<dyn Simulation>>,
}

impl Scenario {
    pub fn new(period: i32, reference: Box<dyn Simulation>) -> Self {
        Self {
            period,
            reference,
            reform: None,
        }
    }

    pub fn with_reform(mut self, reform: Box<dyn Simulation>) -> Self {
        self.reform = Some(reform);
        self
    }

    fn simulation(&self, source: Source) -> Option<&dyn Simulation> {
        match source {
            Source::Reference => Some(self.reference.as_ref()),
            Source::Reform => self.reform.as_deref(),
            Source::Actual => None,
        }
    }
}

/// One reporting session: a scenario, its entity mapping and the
/// administrative totals cached for the period being reported.
pub struct AggregationEngine {
    scenario: Scenario,
    resolver: EntityResolver,
    basis: BeneficiaryBasis,
    loader: Option<TotalsLoader>,
    cache: Option<TotalsTable>,
}

impl AggregationEngine {
    /// Validates `mapping` against every simulation of the scenario.
    pub fn new(scenario: Scenario, mapping: ScenarioConfig) -> Result<Self> {
        let resolver = EntityResolver::new(mapping, scenario.reference.as_ref())?;
        if let Some(ref reform) = scenario.reform {
            resolver.check(reform.as_ref())?;
        }
        Ok(Self {
            scenario,
            resolver,
            basis: BeneficiaryBasis::default(),
            loader: None,
            cache: None,
        })
    }

    pub fn from_config(
        config: &AggregatesConfig,
        scenario: Scenario,
        store: Option<Box<dyn TotalsStore>>,
    ) -> Result<Self> {
        config.validate()?;
        if scenario.period != config.year {
            return Err(AggregatesError::ConfigValidation(format!(
                "scenario is for {}, config for {}",
                scenario.period, config.year
            )));
        }

        let mut engine =
            Self::new(scenario, config.scenario()?)?.with_beneficiary_basis(config.beneficiary_basis);
        if let Some(store) = store {
            let mut loader = TotalsLoader::new(store);
            if let Some(corrections) = config.totals.as_ref().and_then(|t| t.corrections.clone()) {
                loader = loader.with_corrections(corrections);
            }
            engine = engine.with_totals(loader);
        }
        Ok(engine)
    }

    pub fn with_totals(mut self, loader: TotalsLoader) -> Self {
        self.loader = Some(loader);
        self.cache = None;
        self
    }

    pub fn with_beneficiary_basis(mut self, basis: BeneficiaryBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn period(&self) -> i32 {
        self.scenario.period
    }

    /// Administrative totals for `year`, loaded on first use and kept until
    /// the year changes or [`clear`](Self::clear) is called.
    pub fn totals(&mut self, year: i32) -> Result<&TotalsTable> {
        let Some(ref loader) = self.loader else {
            return Err(AggregatesError::unavailable(year, "no administrative data store configured"));
        };
        if self.cache.as_ref().map_or(true, |t| t.year != year) {
            self.cache = Some(loader.load(year)?);
        }
        self.cache
            .as_ref()
            .ok_or_else(|| AggregatesError::unavailable(year, "totals not loaded"))
    }

    /// Drop cached totals.
    pub fn clear(&mut self) {
        self.cache = None;
    }

    /// Build the base table: one row per variable, one measure per source.
    ///
    /// Per-variable and per-source failures degrade cells to missing and are
    /// recorded as warnings. Only an empty source list is rejected.
    pub fn aggregate(
        &mut self,
        variables: &[String],
        filter_by: Option<&str>,
        sources: &[Source],
    ) -> Result<BaseTable> {
        if sources.is_empty() {
            return Err(AggregatesError::InvalidRequest("no source requested".into()));
        }
        let sources: Vec<Source> = Source::ALL.into_iter().filter(|s| sources.contains(s)).collect();

        let mut rows: Vec<AggregateRow> = Vec::with_capacity(variables.len());
        for var in variables {
            if rows.iter().any(|r| &r.variable == var) {
                continue;
            }
            rows.push(self.describe(var));
        }

        let mut warnings = Vec::new();

        for &source in sources.iter().filter(|s| s.is_simulated()) {
            let Some(sim) = self.scenario.simulation(source) else {
                let w = Warning {
                    variable: None,
                    source: Some(source),
                    kind: WarningKind::MissingSimulation,
                    message: format!("scenario has no {source} simulation"),
                };
                log::warn!("{}", w.message);
                warnings.push(w);
                for row in &mut rows {
                    row.measures.insert(source, Measure::MISSING);
                }
                continue;
            };

            for row in &mut rows {
                let measure = match self.aggregate_one(sim, &row.variable, filter_by) {
                    Ok(reduction) => {
                        for metric in &reduction.degraded {
                            let err = AggregatesError::NumericDegradation {
                                variable: row.variable.clone(),
                                metric: *metric,
                            };
                            log::warn!("{source}: {err}");
                            warnings.push(Warning::from_error(&err, Some(source)));
                        }
                        reduction.measure
                    }
                    Err(err) if err.is_recoverable() => {
                        log::warn!("{source}: {err}");
                        warnings.push(Warning::from_error(&err, Some(source)));
                        Measure::MISSING
                    }
                    Err(err) => return Err(err),
                };
                log::debug!("{source} {}: {:?}", row.variable, measure);
                row.measures.insert(source, measure);
            }
        }

        if sources.contains(&Source::Actual) {
            let year = self.period();
            match self.totals(year) {
                Ok(totals) => {
                    for row in &mut rows {
                        row.measures.insert(Source::Actual, totals.measure(&row.variable));
                    }
                }
                Err(err) => {
                    log::warn!("{err}");
                    warnings.push(Warning::from_error(&err, Some(Source::Actual)));
                    for row in &mut rows {
                        row.measures.insert(Source::Actual, Measure::MISSING);
                    }
                }
            }
        }

        Ok(BaseTable {
            sources,
            rows,
            warnings,
        })
    }

    /// Aggregate the configured variables and compute every configured comparison.
    pub fn report(&mut self, config: &AggregatesConfig) -> Result<Report> {
        let base = self.aggregate(
            &config.variable_list(),
            config.filter_by.as_deref(),
            &config.sources,
        )?;

        let differences = config
            .comparisons
            .iter()
            .map(|c| difference(&base, c.target, c.baseline, &c.request()))
            .collect::<Result<Vec<_>>>()?;

        let description = Description {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Local::now().naive_local(),
            period: self.period(),
            legislation_date: config.legislation_date,
            survey_year: config.survey_year,
        };

        Ok(Report {
            description,
            summary: compute_summary(&base),
            base,
            differences,
        })
    }

    fn describe(&self, variable: &str) -> AggregateRow {
        let mut row = AggregateRow::new(variable);
        let sims = [Some(self.scenario.reference.as_ref()), self.scenario.reform.as_deref()];
        for sim in sims.into_iter().flatten() {
            if let Some(entity) = sim.entity_of(variable) {
                row.entity = Some(entity);
                row.label = sim.label_of(variable).unwrap_or_else(|| variable.to_string());
                break;
            }
        }
        row
    }

    fn aggregate_one(
        &self,
        sim: &dyn Simulation,
        variable: &str,
        filter_by: Option<&str>,
    ) -> Result<Reduction> {
        let period = self.period();
        let resolved = self.resolver.resolve(sim, variable, filter_by)?;
        let values = sim.calculate(variable, period)?;
        let weights = sim.calculate(&resolved.weight, period)?;
        let filter = resolved
            .filter
            .as_deref()
            .map(|f| sim.calculate(f, period))
            .transpose()?;
        reduce(variable, &values, &weights, filter.as_deref(), self.basis)
    }
}

/// Run a full report: aggregate, merge administrative totals, compare.
pub fn run(
    config: &AggregatesConfig,
    scenario: Scenario,
    store: Option<Box<dyn TotalsStore>>,
) -> Result<Report> {
    let mut engine = AggregationEngine::from_config(config, scenario, store)?;
    engine.report(config)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::model::{Entity, Metric};
    use crate::simulation::TableSimulation;
    use crate::totals::{AdminTables, WideTable};

    fn household_sim(rsa: Vec<f64>) -> TableSimulation {
        let mut sim = TableSimulation::new(2013)
            .with_column("wprm", Entity::Household, vec![2.0, 3.0, 5.0])
            .unwrap()
            .with_column("champm", Entity::Household, vec![1.0, 1.0, 0.0])
            .unwrap()
            .with_column("rsa", Entity::Household, rsa)
            .unwrap()
            .with_column("big", Entity::Household, vec![1e6, 1e6, 1e6])
            .unwrap()
            .with_column("wprm_i", Entity::Individual, vec![1_000.0; 4])
            .unwrap()
            .with_column("salaire", Entity::Individual, vec![1_000.0, 0.0, 2_000.0, 500.0])
            .unwrap()
            .with_column("af", Entity::Family, vec![1.0])
            .unwrap();
        sim.set_label("rsa", "Revenu de solidarité active");
        sim
    }

    fn mapping() -> ScenarioConfig {
        ScenarioConfig::new()
            .weight(Entity::Household, "wprm")
            .weight(Entity::Individual, "wprm_i")
            .filter("champm", Entity::Household, "champm")
    }

    fn engine() -> AggregationEngine {
        let scenario = Scenario::new(2013, Box::new(household_sim(vec![100.0, 0.0, 50.0])));
        AggregationEngine::new(scenario, mapping()).unwrap()
    }

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn admin(year: i32) -> AdminTables {
        let mut amounts = WideTable::new();
        let mut beneficiaries = WideTable::new();
        amounts.insert("rsa", year, 9_000e6);
        beneficiaries.insert("rsa", year, 1_800e3);
        AdminTables {
            amounts,
            beneficiaries,
        }
    }

    struct CountingStore {
        reads: Rc<Cell<usize>>,
        tables: AdminTables,
    }

    impl TotalsStore for CountingStore {
        fn read(&self) -> Result<AdminTables> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.tables.clone())
        }
    }

    #[test]
    fn household_scenario_with_filter() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["rsa"]), Some("champm"), &[Source::Reference])
            .unwrap();
        let row = table.row("rsa").unwrap();
        assert_eq!(row.entity, Some(Entity::Household));
        assert_eq!(row.label, "Revenu de solidarité active");
        assert_eq!(row.measure(Source::Reference).amount, Some(0.0));
        assert_eq!(row.measure(Source::Reference).beneficiaries, Some(0.0));
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn aggregates_at_each_entity() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["big", "salaire"]), None, &[Source::Reference])
            .unwrap();
        // 1e6 × (2 + 3 + 5) = 10 millions; 10 weighted records → 0 thousands
        assert_eq!(table.cell("big", Source::Reference, Metric::Amount), Some(10.0));
        assert_eq!(table.cell("big", Source::Reference, Metric::Beneficiaries), Some(0.0));
        // 3.5e6 → 4 millions (half away from zero), 3000 weighted beneficiaries → 3 thousands
        assert_eq!(table.cell("salaire", Source::Reference, Metric::Amount), Some(4.0));
        assert_eq!(table.cell("salaire", Source::Reference, Metric::Beneficiaries), Some(3.0));
    }

    #[test]
    fn failing_variable_degrades_only_its_row() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["big", "af", "nope", "salaire"]), Some("champm"), &[Source::Reference])
            .unwrap();

        assert_eq!(
            table.rows.iter().map(|r| r.variable.as_str()).collect::<Vec<_>>(),
            vec!["big", "af", "nope", "salaire"]
        );
        // only the first two households are in the field
        assert_eq!(table.cell("big", Source::Reference, Metric::Amount), Some(5.0));
        assert!(table.row("af").unwrap().measure(Source::Reference).is_missing());
        assert!(table.row("nope").unwrap().measure(Source::Reference).is_missing());
        // champm has no individual projection
        assert!(table.row("salaire").unwrap().measure(Source::Reference).is_missing());

        assert_eq!(table.warnings.len(), 3);
        assert!(table.warnings.iter().all(|w| w.kind == WarningKind::Configuration));
        assert_eq!(table.warnings[1].variable.as_deref(), Some("nope"));
        assert_eq!(table.row("nope").unwrap().entity, None);
    }

    #[test]
    fn nan_values_degrade_with_warning() {
        let scenario = Scenario::new(2013, Box::new(household_sim(vec![f64::NAN; 3])));
        let mut engine = AggregationEngine::new(scenario, mapping()).unwrap();
        let table = engine.aggregate(&vars(&["rsa"]), None, &[Source::Reference]).unwrap();
        assert!(table.row("rsa").unwrap().measure(Source::Reference).is_missing());
        assert_eq!(table.warnings.len(), 2);
        assert!(table.warnings.iter().all(|w| w.kind == WarningKind::NumericDegradation));
    }

    #[test]
    fn duplicate_variables_collapse() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["rsa", "big", "rsa"]), None, &[Source::Reference])
            .unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn reform_column_and_missing_reform() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["big"]), None, &[Source::Reform, Source::Reference])
            .unwrap();
        assert_eq!(table.sources, vec![Source::Reference, Source::Reform]);
        assert!(table.row("big").unwrap().measure(Source::Reform).is_missing());
        assert_eq!(table.warnings.len(), 1);
        assert_eq!(table.warnings[0].kind, WarningKind::MissingSimulation);

        let scenario = Scenario::new(2013, Box::new(household_sim(vec![0.0; 3])))
            .with_reform(Box::new(household_sim(vec![1e6, 1e6, 0.0])));
        let mut engine = AggregationEngine::new(scenario, mapping()).unwrap();
        let table = engine
            .aggregate(&vars(&["rsa"]), None, &[Source::Reference, Source::Reform])
            .unwrap();
        assert_eq!(table.cell("rsa", Source::Reference, Metric::Amount), Some(0.0));
        assert_eq!(table.cell("rsa", Source::Reform, Metric::Amount), Some(5.0));
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn actual_column_from_totals() {
        let mut engine = engine().with_totals(TotalsLoader::new(Box::new(admin(2013))));
        let table = engine
            .aggregate(&vars(&["rsa", "big"]), None, &[Source::Reference, Source::Actual])
            .unwrap();
        assert_eq!(table.cell("rsa", Source::Actual, Metric::Amount), Some(9_000.0));
        assert_eq!(table.cell("rsa", Source::Actual, Metric::Beneficiaries), Some(1_800.0));
        assert!(table.row("big").unwrap().measure(Source::Actual).is_missing());
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn missing_totals_year_blanks_actual_only() {
        let mut engine = engine().with_totals(TotalsLoader::new(Box::new(admin(2011))));
        let table = engine
            .aggregate(&vars(&["rsa", "big"]), None, &[Source::Reference, Source::Actual])
            .unwrap();
        for row in &table.rows {
            assert!(row.measure(Source::Actual).is_missing());
            let r = row.measure(Source::Reference);
            assert!(r.amount.is_some() && r.beneficiaries.is_some());
        }
        assert_eq!(table.warnings.len(), 1);
        assert_eq!(table.warnings[0].kind, WarningKind::DataUnavailable);
    }

    #[test]
    fn no_store_blanks_actual() {
        let mut engine = engine();
        let table = engine
            .aggregate(&vars(&["rsa"]), None, &[Source::Actual])
            .unwrap();
        assert!(table.row("rsa").unwrap().measure(Source::Actual).is_missing());
        assert_eq!(table.warnings[0].kind, WarningKind::DataUnavailable);
    }

    #[test]
    fn totals_cached_per_year() {
        let reads = Rc::new(Cell::new(0));
        let mut tables = admin(2013);
        tables.amounts.insert("rsa", 2012, 1.0);
        tables.beneficiaries.insert("rsa", 2012, 1.0);
        let store = CountingStore {
            reads: reads.clone(),
            tables,
        };
        let mut engine = engine().with_totals(TotalsLoader::new(Box::new(store)));

        engine.aggregate(&vars(&["rsa"]), None, &[Source::Actual]).unwrap();
        engine.aggregate(&vars(&["rsa"]), None, &[Source::Actual]).unwrap();
        assert_eq!(reads.get(), 1);

        engine.totals(2012).unwrap();
        assert_eq!(reads.get(), 2);
        engine.totals(2012).unwrap();
        assert_eq!(reads.get(), 2);

        engine.clear();
        engine.totals(2012).unwrap();
        assert_eq!(reads.get(), 3);
    }

    #[test]
    fn empty_sources_rejected() {
        let mut engine = engine();
        let err = engine.aggregate(&vars(&["rsa"]), None, &[]).unwrap_err();
        assert!(matches!(err, AggregatesError::InvalidRequest(_)));
    }

    #[test]
    fn construction_checks_reform_mapping() {
        let reform = TableSimulation::new(2013)
            .with_column("wprm", Entity::Household, vec![1.0])
            .unwrap();
        let scenario = Scenario::new(2013, Box::new(household_sim(vec![0.0; 3])))
            .with_reform(Box::new(reform));
        let Err(err) = AggregationEngine::new(scenario, mapping()) else {
            panic!("reform without the individual weight must be rejected");
        };
        assert!(err.to_string().contains("wprm_i"));
    }

    /// Household simulation whose `rsa` column cannot be read.
    struct UnreadableRsa(TableSimulation);

    impl Simulation for UnreadableRsa {
        fn entity_of(&self, variable: &str) -> Option<Entity> {
            self.0.entity_of(variable)
        }

        fn calculate(&self, variable: &str, period: i32) -> Result<Vec<f64>> {
            if variable == "rsa" {
                return Err(AggregatesError::Io("rsa.csv: read failed".into()));
            }
            self.0.calculate(variable, period)
        }
    }

    #[test]
    fn unrecoverable_errors_abort_aggregation() {
        let sim = UnreadableRsa(household_sim(vec![100.0, 0.0, 50.0]));
        let mut engine = AggregationEngine::new(Scenario::new(2013, Box::new(sim)), mapping()).unwrap();

        let err = engine.aggregate(&vars(&["rsa"]), None, &[Source::Reference]).unwrap_err();
        assert!(matches!(err, AggregatesError::Io(_)));

        // a configuration error on one variable still only degrades its row
        let table = engine.aggregate(&vars(&["unknown"]), None, &[Source::Reference]).unwrap();
        assert!(table.rows[0].measures[&Source::Reference].is_missing());
    }
}
