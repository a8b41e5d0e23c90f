// merge-domain library entry point
pub mod catalog;
pub mod employees;
pub mod error;
pub mod machines;
pub use catalog::{catalog, pair, pair_names, validate_catalog, OBSOLETE_ENTITY_TYPES};
pub use error::DomainError;
