//! MergeFlow Rust Library
//!
//! Capa de aplicación sobre el motor de consolidación:
//! - `config`: parámetros de lotes y reintentos desde `.env`.
//! - `errors`: errores de aplicación con su código de estado.
//! - `handler`: superficie de invocación (autorización + corrida + respuesta).
//! - `demo`: datos de ejemplo del dominio para el binario y los tests.
//!
//! El motor vive en `merge-core` y el catálogo de pares en `merge-domain`.

pub mod config;
pub mod demo;
pub mod errors;
pub mod handler;

pub use config::{AppConfig, MigrationSettings, CONFIG};
pub use errors::CoreError;
pub use handler::{Authorizer, Caller, MigrationHandler, MigrationRequest, MigrationResponse, Role, StaticAuthorizer};
