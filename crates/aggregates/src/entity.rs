//! Entity resolution: which weight and filter series apply to a variable.

use crate::config::{FilterKey, ScenarioConfig};
use crate::error::{AggregatesError, Result};
use crate::model::Entity;
use crate::simulation::Simulation;

/// Series needed to reduce one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub entity: Entity,
    pub weight: String,
    pub filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityResolver {
    scenario: ScenarioConfig,
}

impl EntityResolver {
    /// Build a resolver, checking that every mapped series exists in
    /// `simulation` at the entity it is registered for.
    pub fn new(scenario: ScenarioConfig, simulation: &dyn Simulation) -> Result<Self> {
        let resolver = Self { scenario };
        resolver.check(simulation)?;
        Ok(resolver)
    }

    /// Check the mapping against another simulation of the same scenario.
    pub fn check(&self, simulation: &dyn Simulation) -> Result<()> {
        for (entity, series) in &self.scenario.weights {
            check_series(simulation, "weight", series, *entity)?;
        }
        for (key, series) in &self.scenario.filters {
            check_series(simulation, &format!("filter '{}'", key.filter), series, key.entity)?;
        }
        Ok(())
    }

    pub fn weight_for(&self, entity: Entity) -> Option<&str> {
        self.scenario.weights.get(&entity).map(|s| s.as_str())
    }

    /// Resolve the entity of `variable`, its weight series and, when
    /// `filter_by` is set, the filter series expressed at that entity.
    pub fn resolve(
        &self,
        simulation: &dyn Simulation,
        variable: &str,
        filter_by: Option<&str>,
    ) -> Result<Resolution> {
        let entity = simulation
            .entity_of(variable)
            .ok_or_else(|| AggregatesError::configuration(variable, "unknown variable or entity"))?;

        let weight = self.weight_for(entity).ok_or_else(|| {
            AggregatesError::configuration(variable, format!("no weight registered for {entity}"))
        })?;

        let filter = match filter_by {
            None => None,
            Some(filter) => {
                let key = FilterKey {
                    filter: filter.to_string(),
                    entity,
                };
                let series = self.scenario.filters.get(&key).ok_or_else(|| {
                    AggregatesError::configuration(
                        variable,
                        format!("filter '{filter}' has no series at {entity}"),
                    )
                })?;
                Some(series.clone())
            }
        };

        Ok(Resolution {
            entity,
            weight: weight.to_string(),
            filter,
        })
    }
}

fn check_series(simulation: &dyn Simulation, what: &str, series: &str, entity: Entity) -> Result<()> {
    match simulation.entity_of(series) {
        Some(found) if found == entity => Ok(()),
        Some(found) => Err(AggregatesError::ConfigValidation(format!(
            "{what} series '{series}' is defined at {found}, expected {entity}"
        ))),
        None => Err(AggregatesError::ConfigValidation(format!(
            "{what} series '{series}' for {entity} is not in the simulation"
        ))),
    }
}
