pub mod memory;
pub mod registry;
pub mod types;

pub use memory::{InMemoryRecordStore, WriteCounters};
pub use registry::{EntityHandle, EntityRegistry};
pub use types::{apply_sort_limit, matches_predicate, RecordStore, SortSpec, StoreError};
