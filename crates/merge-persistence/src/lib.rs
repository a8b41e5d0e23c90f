//! merge-persistence
//!
//! Implementaciones Postgres (Diesel + r2d2) de `RecordStore` y `RunLog`,
//! migraciones embebidas y configuración desde `.env`.
//!
//! Módulos:
//! - `pg`: pool, reintentos y las dos implementaciones.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgPool, PgRecordStore, PgRunLog, PoolProvider};
