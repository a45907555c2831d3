//! `microagg`: aggregation and reconciliation of microsimulation output.
//!
//! Pure engine crate: reduces weighted per-record simulation series to
//! national totals, merges published administrative totals and compares
//! columns. Reading and writing files lives in `microagg-io`.

pub mod config;
pub mod defaults;
pub mod engine;
pub mod entity;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod reducer;
pub mod simulation;
pub mod summary;
pub mod totals;

pub use config::AggregatesConfig;
pub use engine::{run, AggregationEngine, Scenario};
pub use error::{AggregatesError, Result};
pub use model::{BaseTable, DifferenceTable, Entity, Metric, Report, Source};
pub use simulation::{Simulation, TableSimulation};
pub use totals::{AdminTables, TotalsLoader, TotalsStore, WideTable};
