//! Tipos de evento de una corrida de migración.
//!
//! Cada corrida (`run_id`) emite una secuencia ordenada de eventos. Sirven
//! para auditar a posteriori qué se migró y con qué resultado; no se usan
//! para reconstruir estado.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::MigrationPhase;
use crate::model::IdentityMappingEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// Primer evento de una corrida.
    RunStarted { pair: String, engine_version: String },
    PhaseChanged { from: MigrationPhase, to: MigrationPhase },
    MappingRecorded { entry: IdentityMappingEntry },
    RecordFailed { context: String, class: String, message: String },
    ReferencesPropagated { spec: String, updated: usize, deleted: usize, failed: usize },
    /// Cierre normal. `fingerprint` resume el mapa de identidades y el reporte.
    RunCompleted { fingerprint: String, clean: bool },
    /// Cierre por error fatal.
    RunAborted { error: String },
}

impl RunEventKind {
    /// Nombre estable del evento (columna `event_type` en Postgres).
    pub fn type_name(&self) -> &'static str {
        match self {
            RunEventKind::RunStarted { .. } => "RunStarted",
            RunEventKind::PhaseChanged { .. } => "PhaseChanged",
            RunEventKind::MappingRecorded { .. } => "MappingRecorded",
            RunEventKind::RecordFailed { .. } => "RecordFailed",
            RunEventKind::ReferencesPropagated { .. } => "ReferencesPropagated",
            RunEventKind::RunCompleted { .. } => "RunCompleted",
            RunEventKind::RunAborted { .. } => "RunAborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEventKind::RunCompleted { .. } | RunEventKind::RunAborted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}
