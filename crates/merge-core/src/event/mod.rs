//! Run log: eventos append-only de cada corrida.

mod store;
mod types;

pub use store::{InMemoryRunLog, RunLog};
pub use types::{RunEvent, RunEventKind};
