//! The microsimulation capability consumed by the engine.

use std::collections::BTreeMap;

use crate::error::{AggregatesError, Result};
use crate::model::Entity;

/// A computed simulation: per-record values for variables at a period.
///
/// Weights and projected filters are ordinary variables of the simulation,
/// named through the scenario configuration.
pub trait Simulation {
    /// Entity at which the variable is defined, `None` if unknown.
    fn entity_of(&self, variable: &str) -> Option<Entity>;

    /// Human-readable label. Defaults to the variable name.
    fn label_of(&self, variable: &str) -> Option<String> {
        self.entity_of(variable).map(|_| variable.to_string())
    }

    /// Value series of `variable` for `period`, one entry per record of its entity.
    fn calculate(&self, variable: &str, period: i32) -> Result<Vec<f64>>;
}

/// Column of precomputed values.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableColumn {
    pub entity: Entity,
    pub label: Option<String>,
    pub values: Vec<f64>,
}

/// Simulation backed by precomputed columns for a single period.
#[derive(Debug, Clone, Default)]
pub struct TableSimulation {
    period: i32,
    columns: BTreeMap<String, VariableColumn>,
    record_counts: BTreeMap<Entity, usize>,
}

impl TableSimulation {
    pub fn new(period: i32) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn period(&self) -> i32 {
        self.period
    }

    /// Add a column. All columns of one entity must have the same length.
    pub fn insert(
        &mut self,
        variable: impl Into<String>,
        entity: Entity,
        values: Vec<f64>,
    ) -> Result<()> {
        let variable = variable.into();
        if let Some(&n) = self.record_counts.get(&entity) {
            if n != values.len() {
                return Err(AggregatesError::configuration(
                    &variable,
                    format!("{} has {n} records, column has {}", entity, values.len()),
                ));
            }
        }
        self.record_counts.insert(entity, values.len());
        self.columns.insert(
            variable,
            VariableColumn {
                entity,
                label: None,
                values,
            },
        );
        Ok(())
    }

    pub fn with_column(mut self, variable: &str, entity: Entity, values: Vec<f64>) -> Result<Self> {
        self.insert(variable, entity, values)?;
        Ok(self)
    }

    /// Attach a label. Unknown variables are ignored.
    pub fn set_label(&mut self, variable: &str, label: impl Into<String>) {
        if let Some(col) = self.columns.get_mut(variable) {
            col.label = Some(label.into());
        }
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn record_count(&self, entity: Entity) -> Option<usize> {
        self.record_counts.get(&entity).copied()
    }
}

impl Simulation for TableSimulation {
    fn entity_of(&self, variable: &str) -> Option<Entity> {
        self.columns.get(variable).map(|c| c.entity)
    }

    fn label_of(&self, variable: &str) -> Option<String> {
        self.columns
            .get(variable)
            .map(|c| c.label.clone().unwrap_or_else(|| variable.to_string()))
    }

    fn calculate(&self, variable: &str, period: i32) -> Result<Vec<f64>> {
        if period != self.period {
            return Err(AggregatesError::configuration(
                variable,
                format!("simulation covers {}, not {period}", self.period),
            ));
        }
        self.columns
            .get(variable)
            .map(|c| c.values.clone())
            .ok_or_else(|| AggregatesError::configuration(variable, "unknown variable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_entity_columns() {
        let mut sim = TableSimulation::new(2013);
        sim.insert("wprm", Entity::Household, vec![1.0, 2.0]).unwrap();
        let err = sim.insert("rsa", Entity::Household, vec![1.0]).unwrap_err();
        assert!(err.to_string().contains("household has 2 records"));
        // Other entities are independent
        sim.insert("wprm_i", Entity::Individual, vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(sim.record_count(Entity::Individual), Some(3));
    }

    #[test]
    fn labels_default_to_name() {
        let mut sim = TableSimulation::new(2013)
            .with_column("rsa", Entity::Family, vec![0.0])
            .unwrap();
        assert_eq!(sim.label_of("rsa").as_deref(), Some("rsa"));
        sim.set_label("rsa", "Revenu de solidarité active");
        assert_eq!(sim.label_of("rsa").as_deref(), Some("Revenu de solidarité active"));
        assert_eq!(sim.label_of("nope"), None);
    }

    #[test]
    fn calculate_checks_period() {
        let sim = TableSimulation::new(2013)
            .with_column("rsa", Entity::Family, vec![1.0])
            .unwrap();
        assert_eq!(sim.calculate("rsa", 2013).unwrap(), vec![1.0]);
        assert!(sim.calculate("rsa", 2014).is_err());
        assert!(sim.calculate("aah", 2013).is_err());
    }
}
