use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{RunEvent, RunEventKind};

/// Almacenamiento append-only de eventos de corrida.
pub trait RunLog: Send {
    /// Agrega un evento y lo devuelve con `seq` y `ts` asignados.
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> RunEvent;
    /// Eventos de una corrida en orden ascendente de `seq`.
    fn list(&self, run_id: Uuid) -> Vec<RunEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunLog {
    pub inner: HashMap<Uuid, Vec<RunEvent>>,
}

impl RunLog for InMemoryRunLog {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> RunEvent {
        let events = self.inner.entry(run_id).or_default();
        let ev = RunEvent { seq: events.len() as u64,
                            run_id,
                            kind,
                            ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, run_id: Uuid) -> Vec<RunEvent> {
        self.inner.get(&run_id).cloned().unwrap_or_default()
    }
}

/// Permite compartir un log entre varias corridas (`run_all`).
impl<L: RunLog + ?Sized> RunLog for &mut L {
    fn append_kind(&mut self, run_id: Uuid, kind: RunEventKind) -> RunEvent {
        (**self).append_kind(run_id, kind)
    }

    fn list(&self, run_id: Uuid) -> Vec<RunEvent> {
        (**self).list(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_per_run_and_ordered() {
        let mut log = InMemoryRunLog::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        log.append_kind(a, RunEventKind::RunAborted { error: "x".into() });
        log.append_kind(b, RunEventKind::RunAborted { error: "y".into() });
        let ev = log.append_kind(a, RunEventKind::RunCompleted { fingerprint: "f".into(),
                                                                 clean: true });
        assert_eq!(ev.seq, 1);
        assert_eq!(log.list(a).len(), 2);
        assert_eq!(log.list(b)[0].seq, 0);
        assert!(log.list(Uuid::new_v4()).is_empty());
    }
}
