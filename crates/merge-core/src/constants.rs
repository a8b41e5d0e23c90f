//! Constantes del motor de consolidación.
//!
//! `ENGINE_VERSION` entra en el fingerprint de cada corrida: cambiarlo
//! invalida la comparación de fingerprints entre versiones.

/// Versión lógica del motor.
pub const ENGINE_VERSION: &str = "M1.0";

/// Campo del master con el id legacy del que proviene.
pub const DEFAULT_BACK_POINTER_FIELD: &str = "legacy_id";

/// Marca booleana de registro creado por migración.
pub const DEFAULT_MIGRATED_MARKER_FIELD: &str = "migrated_from_legacy";

/// Campos gestionados por el record store; nunca se copian.
pub const STORE_MANAGED_FIELDS: &[&str] = &["id", "created_date", "updated_date", "created_by", "created_by_id"];

pub const DEFAULT_CHUNK_SIZE: usize = 20;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;
