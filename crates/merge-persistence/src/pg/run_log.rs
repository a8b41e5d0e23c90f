use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{debug, error, warn};
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

use merge_core::{RunEvent, RunEventKind, RunLog};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::migration_run_log;

#[derive(Insertable, Debug)]
#[diesel(table_name = migration_run_log)]
pub struct NewRunLogRow<'a> {
    pub run_id: &'a Uuid,
    pub event_type: &'a str,
    pub payload: &'a Value,
}

#[derive(Queryable, Debug)]
pub struct RunLogRow {
    pub seq: i64,
    pub run_id: Uuid,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
}

fn deserialize_row(row: RunLogRow) -> Option<RunEvent> {
    let kind: RunEventKind = match serde_json::from_value(row.payload) {
        Ok(k) => k,
        Err(e) => {
            warn!("run_log seq={} type={}: payload ilegible: {e}", row.seq, row.event_type);
            return None;
        }
    };
    if kind.type_name() != row.event_type {
        warn!("run_log seq={}: event_type {} no coincide con payload {}", row.seq, row.event_type, kind.type_name());
    }
    Some(RunEvent { seq: row.seq as u64,
                    run_id: row.run_id,
                    kind,
                    ts: row.ts })
}

/// Ejecuta I/O síncrono sin bloquear el reactor: dentro de un runtime
/// multi-hilo cede el worker con `block_in_place`; fuera de un runtime (o en
/// uno de un solo hilo, donde `block_in_place` no está permitido) llama
/// directo.
fn off_reactor<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(h) if h.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// `RunLog` append-only sobre `migration_run_log`.
///
/// El run log es auditoría: si una inserción falla tras los reintentos se
/// registra con `error!`, se cuenta en `failed_appends` y la corrida sigue.
/// `RunLog` es síncrono; cada acceso pasa por `off_reactor`.
pub struct PgRunLog<P: ConnectionProvider> {
    pub provider: P,
    failed: AtomicU64,
}

impl<P: ConnectionProvider> PgRunLog<P> {
    pub fn new(provider: P) -> Self {
        Self { provider,
               failed: AtomicU64::new(0) }
    }

    pub fn failed_appends(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn try_append(&self, run_id: Uuid, kind: &RunEventKind) -> Result<(i64, DateTime<Utc>), PersistenceError> {
        let payload = serde_json::to_value(kind).map_err(|e| PersistenceError::Unknown(format!("serialize run event: {e}")))?;
        let event_type = kind.type_name();
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(migration_run_log::table).values(NewRunLogRow { run_id: &run_id,
                                                                                event_type,
                                                                                payload: &payload })
                                                         .returning((migration_run_log::seq, migration_run_log::ts))
                                                         .get_result(&mut conn)
                                                         .map_err(PersistenceError::from)
        })
    }

    pub fn try_list(&self, run_id: Uuid) -> Result<Vec<RunEvent>, PersistenceError> {
        let rows: Vec<RunLogRow> = with_retry(|| {
                                       let mut conn = self.provider.connection()?;
                                       migration_run_log::table.filter(migration_run_log::run_id.eq(run_id))
                                                               .order(migration_run_log::seq.asc())
                                                               .load(&mut conn)
                                                               .map_err(PersistenceError::from)
                                   })?;
        Ok(rows.into_iter().filter_map(deserialize_row).collect())
    }
}

impl<P: ConnectionProvider> RunLog for PgRunLog<P> {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> RunEvent {
        match off_reactor(|| self.try_append(run_id, &kind)) {
            Ok((seq, ts)) => {
                debug!("run_log append run_id={run_id} seq={seq} type={}", kind.type_name());
                RunEvent { seq: seq as u64,
                           run_id,
                           kind,
                           ts }
            }
            Err(e) => {
                error!("run_log append failed run_id={run_id} type={}: {e}", kind.type_name());
                self.failed.fetch_add(1, Ordering::SeqCst);
                RunEvent { seq: 0,
                           run_id,
                           kind,
                           ts: Utc::now() }
            }
        }
    }

    fn list(&self, run_id: Uuid) -> Vec<RunEvent> {
        off_reactor(|| self.try_list(run_id)).unwrap_or_else(|e| {
                                 error!("run_log list failed run_id={run_id}: {e}");
                                 Vec::new()
                             })
    }
}
