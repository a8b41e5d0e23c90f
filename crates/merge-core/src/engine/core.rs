//! Corrida de un par de entidades.
//!
//! Detecting → Merging → MappingComplete → Propagating → Verifying → Done.
//! Todo el estado en memoria (índice master, mapa de identidades) pertenece a
//! la corrida y se actualiza secuencialmente cuando un chunk termina. Sólo la
//! imposibilidad de leer colecciones lleva a `Error`; los fallos por registro
//! quedan en el reporte.
use std::collections::{HashMap, HashSet};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::{plan_order, MigrationPhase};
use crate::audit::{audit_loaded, audit_pair, load_pair, AuditSnapshot};
use crate::batch::BatchController;
use crate::constants::ENGINE_VERSION;
use crate::detect::MasterIndex;
use crate::errors::{classify_error, EngineError, MigrationError};
use crate::event::{RunEventKind, RunLog};
use crate::hashing::hash_value;
use crate::identity::IdentityMap;
use crate::merge::{MergePlan, MergeResolver};
use crate::model::{IdentityMappingEntry, MappingAction, MigrationReport, Record, RecordId, ReferenceStats, SourcePair};
use crate::orphan::{OrphanResolver, ReferenceResolver};
use crate::propagate::ReferencePropagator;
use crate::store::{EntityHandle, EntityRegistry};

/// Resultado de una corrida. En caso de abortar se devuelve parcial dentro
/// de `RunFailure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pair: String,
    pub phase: MigrationPhase,
    pub report: MigrationReport,
    pub identity: Vec<IdentityMappingEntry>,
    pub references: Vec<ReferenceStats>,
    /// Auditoría previa a la migración.
    pub baseline: Option<AuditSnapshot>,
    /// Auditoría posterior (certificación).
    pub verification: Option<AuditSnapshot>,
    pub fingerprint: Option<String>,
}

impl RunReport {
    fn new(run_id: Uuid, pair: &str) -> Self {
        Self { run_id,
               pair: pair.to_string(),
               phase: MigrationPhase::Idle,
               report: MigrationReport::default(),
               identity: Vec::new(),
               references: Vec::new(),
               baseline: None,
               verification: None,
               fingerprint: None }
    }

    /// Terminó y la verificación no encontró referencias rotas.
    pub fn is_clean(&self) -> bool {
        self.phase == MigrationPhase::Done && self.verification.as_ref().map(|v| v.is_clean()).unwrap_or(false)
    }
}

#[derive(Debug, Error)]
#[error("run of pair '{pair}' aborted: {error}", pair = .partial.pair)]
pub struct RunFailure {
    pub error: MigrationError,
    pub partial: Box<RunReport>,
    /// Pares ya terminados antes del fallo (`run_all`).
    pub completed: Vec<RunReport>,
}

impl RunFailure {
    fn config(error: EngineError) -> Self {
        Self { error: error.into(),
               partial: Box::new(RunReport::new(Uuid::nil(), "")),
               completed: Vec::new() }
    }
}

#[derive(Debug, Clone)]
struct Planned {
    legacy_id: RecordId,
    plan: MergePlan,
}

/// Estado mutable de la fase de merge.
struct MergeState {
    legacy_type: String,
    index: MasterIndex,
    /// Masters activos por id, incluidos los creados en esta corrida.
    masters: HashMap<RecordId, Record>,
    identity: IdentityMap,
    pending: Vec<Planned>,
    /// Claves naturales y masters comprometidos por el chunk pendiente.
    reserved: HashSet<String>,
    /// Legacy cuyo create/update falló en el store.
    failed: HashSet<RecordId>,
    flushed: usize,
}

impl MergeState {
    fn plan(&self, resolver: &MergeResolver<'_>, legacy: &Record) -> Result<MergePlan, MigrationError> {
        let found = self.index.find(legacy);
        let matched = found.as_ref().and_then(|m| self.masters.get(&m.master_id));
        resolver.plan(legacy, matched, self.index.primary_key(legacy))
    }

    /// Lo que un plan compromete dentro de un chunk: un create reserva sus
    /// claves naturales, un update reserva su master.
    fn claims(&self, legacy: &Record, plan: &MergePlan) -> Vec<String> {
        match plan {
            MergePlan::Create { .. } => self.index
                                            .natural_keys(legacy)
                                            .into_iter()
                                            .map(|(ex, key)| format!("{ex}\u{1f}{key}"))
                                            .collect(),
            MergePlan::Update { master_id, .. } => vec![format!("master\u{1f}{master_id}")],
            MergePlan::Skip { .. } => Vec::new(),
        }
    }

    fn apply_master(&mut self, master: Record) {
        self.index.insert(&master);
        self.masters.insert(master.id.clone(), master);
    }
}

pub struct MigrationEngine<L>
    where L: RunLog
{
    registry: EntityRegistry,
    batch: BatchController,
    run_log: L,
    phase: MigrationPhase,
}

impl<L> MigrationEngine<L> where L: RunLog
{
    pub fn new(registry: EntityRegistry, batch: BatchController, run_log: L) -> Self {
        Self { registry,
               batch,
               run_log,
               phase: MigrationPhase::Idle }
    }

    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn run_log(&self) -> &L {
        &self.run_log
    }

    pub fn into_run_log(self) -> L {
        self.run_log
    }

    /// Auditoría de sólo lectura, fuera de una corrida.
    pub async fn verify(&self, pair: &SourcePair) -> Result<AuditSnapshot, MigrationError> {
        audit_pair(&self.registry, pair).await
    }

    /// Ejecuta todos los pares en orden de dependencias. Se detiene en el
    /// primer fallo fatal; los reportes ya terminados viajan en `completed`.
    pub async fn run_all(&mut self, pairs: &[SourcePair]) -> Result<Vec<RunReport>, RunFailure> {
        let ordered = plan_order(pairs).map_err(RunFailure::config)?;
        let mut done = Vec::with_capacity(ordered.len());
        for pair in ordered {
            match self.run_pair(pair).await {
                Ok(r) => done.push(r),
                Err(mut failure) => {
                    failure.completed = done;
                    return Err(failure);
                }
            }
        }
        Ok(done)
    }

    /// Ejecuta el par de nombre `name`.
    pub async fn run_named(&mut self, pairs: &[SourcePair], name: &str) -> Result<RunReport, RunFailure> {
        match pairs.iter().find(|p| p.name == name) {
            Some(pair) => self.run_pair(pair).await,
            None => Err(RunFailure::config(EngineError::UnknownPair(name.to_string()))),
        }
    }

    pub async fn run_pair(&mut self, pair: &SourcePair) -> Result<RunReport, RunFailure> {
        let run_id = Uuid::new_v4();
        let mut out = RunReport::new(run_id, &pair.name);
        let registry = self.registry.clone();
        let batch = self.batch.clone();
        self.run_log.append_kind(run_id,
                                 RunEventKind::RunStarted { pair: pair.name.clone(),
                                                            engine_version: ENGINE_VERSION.to_string() });
        info!("run {run_id} pair={} legacy={} master={}", pair.name, pair.legacy_type, pair.master_type);

        // Detecting
        if let Err(e) = self.advance(run_id, MigrationPhase::Detecting) {
            return Err(self.fail(run_id, e.into(), out));
        }
        if let Err(e) = pair.validate() {
            return Err(self.fail(run_id, e, out));
        }
        let (legacy, masters) = match load_pair(&registry, pair).await {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.fail(run_id, e, out)),
        };
        match audit_loaded(&registry, pair, &legacy, &masters).await {
            Ok(baseline) => out.baseline = Some(baseline),
            Err(e) => return Err(self.fail(run_id, e, out)),
        }
        let active: Vec<Record> = masters.into_iter().filter(|m| pair.is_active(m)).collect();
        let master_handle = match registry.handle(&pair.master_type) {
            Ok(h) => h,
            Err(e) => return Err(self.fail(run_id, e.into(), out)),
        };
        let mut state = MergeState { legacy_type: pair.legacy_type.to_string(),
                                     index: MasterIndex::build(&pair.key_extractors, &active),
                                     masters: active.into_iter().map(|m| (m.id.clone(), m)).collect(),
                                     identity: IdentityMap::new(),
                                     pending: Vec::new(),
                                     reserved: HashSet::new(),
                                     failed: HashSet::new(),
                                     flushed: 0 };

        // Merging
        if let Err(e) = self.advance(run_id, MigrationPhase::Merging) {
            return Err(self.fail(run_id, e.into(), out));
        }
        let resolver = MergeResolver::new(pair);
        for record in &legacy {
            out.report.processed += 1;
            let context = format!("{}/{}", pair.legacy_type, record.id);
            let mut plan = match state.plan(&resolver, record) {
                Ok(p) => p,
                Err(e) => {
                    self.record_failure(run_id, &mut out.report, context, &e);
                    continue;
                }
            };
            let mut claims = state.claims(record, &plan);
            if claims.iter().any(|c| state.reserved.contains(c)) {
                // otro registro del chunk ya compromete esta clave: ejecutar
                // el chunk y volver a planificar con el id resultante
                debug!("{context}: key collision inside chunk, flushing early");
                self.flush(run_id, &batch, &master_handle, &mut state, &mut out.report).await;
                plan = match state.plan(&resolver, record) {
                    Ok(p) => p,
                    Err(e) => {
                        self.record_failure(run_id, &mut out.report, context, &e);
                        continue;
                    }
                };
                claims = state.claims(record, &plan);
            }
            state.reserved.extend(claims);
            state.pending.push(Planned { legacy_id: record.id.clone(),
                                         plan });
            if state.pending.len() >= batch.chunk_size() {
                self.flush(run_id, &batch, &master_handle, &mut state, &mut out.report).await;
            }
        }
        self.flush(run_id, &batch, &master_handle, &mut state, &mut out.report).await;
        info!("merge pair={} processed={} migrated={} updated={} skipped={} errors={}",
              pair.name,
              out.report.processed,
              out.report.migrated,
              out.report.updated,
              out.report.skipped,
              out.report.errors.len());

        // MappingComplete
        state.identity.seal();
        out.identity = state.identity.to_vec();
        if let Err(e) = self.advance(run_id, MigrationPhase::MappingComplete) {
            return Err(self.fail(run_id, e.into(), out));
        }

        // Propagating
        if let Err(e) = self.advance(run_id, MigrationPhase::Propagating) {
            return Err(self.fail(run_id, e.into(), out));
        }
        let live: HashSet<RecordId> = state.masters
                                           .values()
                                           .filter(|m| pair.is_active(m))
                                           .map(|m| m.id.clone())
                                           .collect();
        let orphans = OrphanResolver::new(&legacy, state.index.clone());
        // referencias a legacy con escritura fallida se conservan para reintentar
        let reference_resolver = ReferenceResolver::new(&state.identity, &live, &orphans).with_pending(&state.failed);
        let propagator = match ReferencePropagator::new(&registry, &batch, &state.identity, reference_resolver) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(run_id, e.into(), out)),
        };
        for spec in &pair.references {
            let errors_before = out.report.errors.len();
            match propagator.propagate(spec, &mut out.report).await {
                Ok(propagation) => {
                    for entry in &out.report.errors[errors_before..] {
                        self.run_log.append_kind(run_id,
                                                 RunEventKind::RecordFailed { context: entry.context.clone(),
                                                                              class: "transient".to_string(),
                                                                              message: entry.message.clone() });
                    }
                    let context = format!("propagate {}", spec.label());
                    for issue in &propagation.issues {
                        if issue.deferred {
                            self.record_failure(run_id, &mut out.report, context.clone(), &issue.error);
                        } else {
                            self.run_log.append_kind(run_id,
                                                     RunEventKind::RecordFailed { context: context.clone(),
                                                                                  class: classify_error(&issue.error).as_str().to_string(),
                                                                                  message: issue.error.to_string() });
                        }
                    }
                    let stats = propagation.stats;
                    self.run_log.append_kind(run_id,
                                             RunEventKind::ReferencesPropagated { spec: stats.spec.clone(),
                                                                                  updated: stats.updated,
                                                                                  deleted: stats.deleted,
                                                                                  failed: stats.failed });
                    out.references.push(stats);
                }
                Err(e) if e.is_fatal() => return Err(self.fail(run_id, e, out)),
                Err(e) => self.record_failure(run_id, &mut out.report, format!("propagate {}", spec.label()), &e),
            }
        }

        // Verifying: siempre, aunque la propagación haya registrado errores
        if let Err(e) = self.advance(run_id, MigrationPhase::Verifying) {
            return Err(self.fail(run_id, e.into(), out));
        }
        let verification = match audit_pair(&registry, pair).await {
            Ok(v) => v,
            Err(e) => return Err(self.fail(run_id, e, out)),
        };
        let clean = verification.is_clean();
        if !clean {
            warn!("run {run_id} pair={}: {} broken references remain after propagation",
                  pair.name,
                  verification.broken_keys());
            out.report.push_error(format!("verify {}", pair.name),
                                  format!("{} broken references remain in {} records",
                                          verification.broken_keys(),
                                          verification.broken_records()));
        }
        let fingerprint = hash_value(&json!({
                                         "engine_version": ENGINE_VERSION,
                                         "pair": pair.name,
                                         "identity": out.identity,
                                         "master_count": verification.master_count,
                                         "broken": verification.broken,
                                     }));
        out.verification = Some(verification);
        out.fingerprint = Some(fingerprint.clone());

        if let Err(e) = self.advance(run_id, MigrationPhase::Done) {
            return Err(self.fail(run_id, e.into(), out));
        }
        out.phase = self.phase;
        self.run_log.append_kind(run_id, RunEventKind::RunCompleted { fingerprint, clean });
        info!("run {run_id} pair={} done clean={clean}", pair.name);
        Ok(out)
    }

    /// Ejecuta el chunk pendiente y vuelca los resultados al estado.
    async fn flush(&mut self, run_id: Uuid, batch: &BatchController, handle: &EntityHandle, state: &mut MergeState, report: &mut MigrationReport) {
        if state.pending.is_empty() {
            return;
        }
        if state.flushed > 0 {
            batch.pause().await;
        }
        let chunk = std::mem::take(&mut state.pending);
        state.reserved.clear();

        let writes: Vec<Planned> = chunk.iter()
                                        .filter(|p| !matches!(p.plan, MergePlan::Skip { .. }))
                                        .cloned()
                                        .collect();
        let results = batch.run_chunk(&writes, &|p: Planned| {
                               let h = handle.clone();
                               async move {
                                   match p.plan {
                                       MergePlan::Create { fields, .. } => h.create(fields).await,
                                       MergePlan::Update { master_id, patch, .. } => h.update(&master_id, patch).await,
                                       MergePlan::Skip { master_id, .. } => h.get(&master_id).await,
                                   }
                               }
                           })
                           .await;
        let mut results = results.into_iter();

        for planned in chunk {
            let context = format!("{}/{}", state.legacy_type, planned.legacy_id);
            let natural_key = planned.plan.natural_key().map(str::to_string);
            let action = match &planned.plan {
                MergePlan::Create { .. } => MappingAction::Migrated,
                MergePlan::Update { .. } => MappingAction::Updated,
                MergePlan::Skip { .. } => MappingAction::Skipped,
            };
            let outcome = match planned.plan {
                MergePlan::Skip { master_id, .. } => Ok(master_id),
                MergePlan::Create { .. } | MergePlan::Update { .. } => match results.next() {
                    Some(Ok(master)) => {
                        let id = master.id.clone();
                        state.apply_master(master);
                        Ok(id)
                    }
                    Some(Err(e)) => {
                        state.failed.insert(planned.legacy_id.clone());
                        Err(MigrationError::from(e))
                    }
                    None => Err(MigrationError::Validation(format!("{context}: missing store result"))),
                },
            };
            match outcome {
                Ok(new_id) => {
                    let entry = IdentityMappingEntry { old_id: planned.legacy_id.clone(),
                                                       new_id,
                                                       natural_key,
                                                       action };
                    match state.identity.record(entry.clone()) {
                        Ok(()) => {
                            report.count(action);
                            self.run_log.append_kind(run_id, RunEventKind::MappingRecorded { entry });
                        }
                        Err(e) => self.record_failure(run_id, report, context, &e.into()),
                    }
                }
                Err(e) => self.record_failure(run_id, report, context, &e),
            }
        }
        state.flushed += 1;
    }

    fn record_failure(&mut self, run_id: Uuid, report: &mut MigrationReport, context: String, err: &MigrationError) {
        let class = classify_error(err);
        warn!("{context}: {} error: {err}", class.as_str());
        report.push_error(context.clone(), err.to_string());
        self.run_log.append_kind(run_id,
                                 RunEventKind::RecordFailed { context,
                                                              class: class.as_str().to_string(),
                                                              message: err.to_string() });
    }

    fn advance(&mut self, run_id: Uuid, to: MigrationPhase) -> Result<(), EngineError> {
        let from = self.phase;
        if !from.can_transition(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }
        self.phase = to;
        debug!("run {run_id}: {} -> {}", from.as_str(), to.as_str());
        self.run_log.append_kind(run_id, RunEventKind::PhaseChanged { from, to });
        Ok(())
    }

    fn fail(&mut self, run_id: Uuid, error: MigrationError, mut partial: RunReport) -> RunFailure {
        error!("run {run_id} pair={} aborted in {}: {error}", partial.pair, self.phase.as_str());
        let from = self.phase;
        if from.can_transition(MigrationPhase::Error) {
            self.phase = MigrationPhase::Error;
            self.run_log.append_kind(run_id,
                                     RunEventKind::PhaseChanged { from,
                                                                  to: MigrationPhase::Error });
        }
        self.run_log.append_kind(run_id, RunEventKind::RunAborted { error: error.to_string() });
        partial.phase = self.phase;
        RunFailure { error,
                     partial: Box::new(partial),
                     completed: Vec::new() }
    }
}
