use merge_core::{classify_error, EngineError, ErrorClass, MigrationError};
use thiserror::Error;

/// Errores de la capa de aplicación (manejador y binario).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No autorizado: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl CoreError {
    /// Código de estado HTTP equivalente.
    pub fn status(&self) -> u16 {
        match self {
            CoreError::Unauthorized(_) => 403,
            CoreError::Migration(MigrationError::Engine(EngineError::UnknownPair(_))) => 400,
            CoreError::Migration(e) if classify_error(e) == ErrorClass::Validation => 400,
            CoreError::Migration(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_variant_format() {
        let err = CoreError::Unauthorized("luis requiere rol admin".into());
        assert_eq!(err.to_string(), "No autorizado: luis requiere rol admin");
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(CoreError::from(MigrationError::Engine(EngineError::UnknownPair("p".into()))).status(), 400);
        assert_eq!(CoreError::from(MigrationError::Validation("sin clave".into())).status(), 400);
        assert_eq!(CoreError::from(MigrationError::FatalConnectivity("down".into())).status(), 500);
    }
}
