//! Catálogo de pares migrables.
use merge_core::{plan_order, SourcePair};
use once_cell::sync::Lazy;

use crate::{employees, machines, DomainError};

/// Tipos legacy sin master que sólo se auditan (conteo de registros
/// restantes).
pub const OBSOLETE_ENTITY_TYPES: &[&str] = &["Maquina", "Operario", "EmpleadoV1", "TurnoLegacy", "HabilidadMaquina", "PlanificacionV1"];

static CATALOG: Lazy<Vec<SourcePair>> =
    Lazy::new(|| vec![employees::pair(), machines::machines_pair(), machines::machine_skills_pair()]);

pub fn catalog() -> Vec<SourcePair> {
    CATALOG.clone()
}

pub fn pair_names() -> Vec<&'static str> {
    CATALOG.iter().map(|p| p.name.as_str()).collect()
}

pub fn pair(name: &str) -> Result<SourcePair, DomainError> {
    CATALOG.iter()
           .find(|p| p.name == name)
           .cloned()
           .ok_or_else(|| DomainError::UnknownPair(name.to_string()))
}

/// Cada par es válido y las dependencias forman un DAG.
pub fn validate_catalog() -> Result<(), DomainError> {
    for p in CATALOG.iter() {
        p.validate().map_err(|e| DomainError::invalid(&p.name, e))?;
    }
    plan_order(&CATALOG).map_err(|e| DomainError::Dependency(e.to_string()))?;
    Ok(())
}
