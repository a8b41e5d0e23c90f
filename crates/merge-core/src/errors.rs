//! Taxonomía de errores del motor.
//!
//! Casi todo se recupera localmente y queda registrado en el reporte; sólo la
//! imposibilidad de leer las colecciones iniciales aborta una corrida.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::MigrationPhase;
use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// Registro sin los campos mínimos para el merge (p.ej. sin clave natural).
    #[error("validation: {0}")]
    Validation(String),
    /// Referencia sin resolución por mapa ni por resolución secundaria.
    #[error("unresolved reference {entity_type}/{record_id}.{field} -> {value}")]
    ReferenceResolution {
        entity_type: String,
        record_id: String,
        field: String,
        value: String,
    },
    /// Fallo de una llamada individual al store.
    #[error("store call failed: {0}")]
    TransientStore(#[from] StoreError),
    /// El store no responde al leer las colecciones iniciales.
    #[error("record store unreachable: {0}")]
    FatalConnectivity(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errores de configuración y de la máquina de estados.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("invalid phase transition {from:?} -> {to:?}")]
    InvalidTransition { from: MigrationPhase, to: MigrationPhase },
    #[error("identity map is not complete; propagation refused")]
    MappingIncomplete,
    #[error("identity conflict for {old_id}: {existing} vs {attempted}")]
    IdentityConflict {
        old_id: String,
        existing: String,
        attempted: String,
    },
    #[error("unknown pair '{0}'")]
    UnknownPair(String),
    #[error("dependency cycle among pairs: {0}")]
    DependencyCycle(String),
}

/// Clasificación gruesa, usada por el run log y por el manejador HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Validation,
    Reference,
    Transient,
    Fatal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::Reference => "reference",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }
}

pub fn classify_error(err: &MigrationError) -> ErrorClass {
    match err {
        MigrationError::Validation(_) => ErrorClass::Validation,
        MigrationError::ReferenceResolution { .. } => ErrorClass::Reference,
        MigrationError::TransientStore(e) if e.is_connectivity() => ErrorClass::Fatal,
        MigrationError::TransientStore(_) => ErrorClass::Transient,
        MigrationError::FatalConnectivity(_) | MigrationError::Engine(_) => ErrorClass::Fatal,
    }
}

impl MigrationError {
    pub fn is_fatal(&self) -> bool {
        classify_error(self) == ErrorClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_taxonomy() {
        assert_eq!(classify_error(&MigrationError::Validation("x".into())), ErrorClass::Validation);
        assert_eq!(classify_error(&MigrationError::TransientStore(StoreError::RateLimited("429".into()))),
                   ErrorClass::Transient);
        assert_eq!(classify_error(&MigrationError::TransientStore(StoreError::Unavailable("down".into()))),
                   ErrorClass::Fatal);
        assert!(MigrationError::FatalConnectivity("x".into()).is_fatal());
        assert!(!MigrationError::Validation("x".into()).is_fatal());
    }

    #[test]
    fn display_is_readable() {
        let e = MigrationError::ReferenceResolution { entity_type: "Asignacion".into(),
                                                      record_id: "A1".into(),
                                                      field: "employee_id".into(),
                                                      value: "L9".into() };
        assert_eq!(e.to_string(), "unresolved reference Asignacion/A1.employee_id -> L9");
    }
}
