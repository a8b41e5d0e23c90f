//! Modelos neutrales (Record, claves naturales, ReferenceSpec, SourcePair,
//! reportes).

pub mod key;
pub mod pair;
pub mod record;
pub mod reference;
pub mod report;

pub use key::{normalize_name, KeyExtractor, KeyKind};
pub use pair::{FieldMapping, SourcePair, Tombstone};
pub use record::{is_empty_value, value_as_text, EntityType, Fields, Record, RecordId};
pub use reference::{FieldKind, OrphanPolicy, ReferenceSpec};
pub use report::{ErrorEntry, IdentityMappingEntry, MappingAction, MigrationReport, ReferenceStats};
