// Simulations loaded from per-entity CSV files

use std::path::Path;

use microagg::config::SimulationFiles;
use microagg::{AggregatesConfig, AggregatesError, Result, Scenario, TableSimulation};

use crate::csv::{read_entity_table, read_file_as_utf8, read_labels};

/// Build one simulation from its entity files and optional labels file.
pub fn load_simulation(files: &SimulationFiles, period: i32, base_dir: &Path) -> Result<TableSimulation> {
    let entity_files = files.entity_files();
    if entity_files.is_empty() {
        return Err(AggregatesError::ConfigValidation(
            "simulation data lists no entity file".into(),
        ));
    }

    let mut simulation = TableSimulation::new(period);
    for (entity, file) in entity_files {
        let content = read_file_as_utf8(&base_dir.join(file))?;
        read_entity_table(&mut simulation, entity, &content)?;
    }

    if let Some(ref labels) = files.labels {
        for (variable, label) in read_labels(&read_file_as_utf8(&base_dir.join(labels))?)? {
            simulation.set_label(&variable, label);
        }
    }

    log::info!("loaded simulation for {period}: {} variables", simulation.variables().count());
    Ok(simulation)
}

/// Reference (required) and reform (optional) simulations of `[data]`.
pub fn load_scenario(config: &AggregatesConfig, base_dir: &Path) -> Result<Scenario> {
    let reference = config.data.reference.as_ref().ok_or_else(|| {
        AggregatesError::ConfigValidation("[data.reference] section is required".into())
    })?;

    let mut scenario = Scenario::new(
        config.year,
        Box::new(load_simulation(reference, config.year, base_dir)?),
    );
    if let Some(ref reform) = config.data.reform {
        scenario = scenario.with_reform(Box::new(load_simulation(reform, config.year, base_dir)?));
    }
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use microagg::{Entity, Simulation};

    #[test]
    fn test_load_simulation_with_labels() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("menages.csv"), "wprm,rsa\n2,100\n3,0\n").unwrap();
        fs::write(dir.path().join("individus.csv"), "wprm_i,salaire\n1,10\n").unwrap();
        fs::write(dir.path().join("labels.csv"), "variable,label\nrsa,RSA\n").unwrap();

        let files = SimulationFiles {
            household: Some("menages.csv".into()),
            individual: Some("individus.csv".into()),
            labels: Some("labels.csv".into()),
            ..Default::default()
        };
        let sim = load_simulation(&files, 2013, dir.path()).unwrap();
        assert_eq!(sim.entity_of("rsa"), Some(Entity::Household));
        assert_eq!(sim.entity_of("salaire"), Some(Entity::Individual));
        assert_eq!(sim.label_of("rsa").as_deref(), Some("RSA"));
        assert_eq!(sim.calculate("wprm", 2013).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_no_entity_files() {
        let err = load_simulation(&SimulationFiles::default(), 2013, Path::new(".")).unwrap_err();
        assert!(matches!(err, AggregatesError::ConfigValidation(_)));
    }
}
