//! Orquestador de migración: máquina de estados, corrida por par y orden
//! entre pares.

mod core;
mod order;
mod phase;

pub use self::core::{MigrationEngine, RunFailure, RunReport};
pub use order::plan_order;
pub use phase::MigrationPhase;
