//! merge-core: motor de consolidación legacy → master.
//!
//! Detecta duplicados entre una colección legacy y su master, fusiona con
//! política fill-gap, construye el mapa de identidades y reescribe las
//! referencias de las entidades dependientes. Neutral respecto del dominio:
//! los pares concretos viven en `merge-domain`.
pub mod audit;
pub mod batch;
pub mod constants;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod identity;
pub mod merge;
pub mod model;
pub mod orphan;
pub mod propagate;
pub mod store;

pub use audit::{audit_obsolete, audit_pair, AuditSnapshot, BrokenReference, ObsoleteReport};
pub use batch::{BatchConfig, BatchController};
pub use engine::{plan_order, MigrationEngine, MigrationPhase, RunFailure, RunReport};
pub use errors::{classify_error, EngineError, ErrorClass, MigrationError};
pub use event::{InMemoryRunLog, RunEvent, RunEventKind, RunLog};
pub use model::{EntityType, Fields, KeyExtractor, MigrationReport, OrphanPolicy, Record, RecordId, ReferenceSpec, SourcePair};
pub use store::{EntityRegistry, InMemoryRecordStore, RecordStore, StoreError};
