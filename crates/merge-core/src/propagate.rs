//! Propagación de referencias.
//!
//! Con el mapa de identidades completo, recorre cada entidad dependiente y
//! reescribe los campos declarados en su `ReferenceSpec`. Sólo se emite un
//! update cuando algo cambió; las huérfanas se tratan según la política y
//! las que apuntan a un legacy con merge fallido se conservan.
use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::Value;

use crate::audit::{read_error, slot_text};
use crate::batch::BatchController;
use crate::errors::{EngineError, MigrationError};
use crate::identity::IdentityMap;
use crate::model::{FieldKind, Fields, MigrationReport, Record, RecordId, ReferenceSpec, ReferenceStats};
use crate::orphan::{OrphanAction, ReferenceResolver, Resolution};
use crate::store::EntityRegistry;

/// Cambio calculado para un registro dependiente.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    Unchanged,
    Patch(Fields),
    Delete,
}

/// Referencia sin resolver encontrada al reescribir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceIssue {
    /// Siempre `MigrationError::ReferenceResolution`.
    pub error: MigrationError,
    /// `true` si se conservó (legacy pendiente); `false` si se aplicó la
    /// política de huérfanas.
    pub deferred: bool,
}

impl ReferenceIssue {
    fn new(record: &Record, spec: &ReferenceSpec, field: &str, value: &Value, deferred: bool) -> Self {
        Self { error: MigrationError::ReferenceResolution { entity_type: spec.entity_type.to_string(),
                                                            record_id: record.id.to_string(),
                                                            field: field.to_string(),
                                                            value: slot_text(value).unwrap_or_else(|| value.to_string()) },
               deferred }
    }
}

/// Resultado de propagar una spec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    pub stats: ReferenceStats,
    pub issues: Vec<ReferenceIssue>,
}

/// Calcula el cambio de un registro para una spec. Puro: acumula contadores
/// en `stats` y referencias sin resolver en `issues`, pero no toca el store.
pub fn rewrite_record(record: &Record,
                      spec: &ReferenceSpec,
                      resolver: &ReferenceResolver<'_>,
                      stats: &mut ReferenceStats,
                      issues: &mut Vec<ReferenceIssue>)
                      -> RecordChange {
    let mut patch = Fields::new();
    for field in &spec.field_names {
        let Some(value) = record.get(field) else { continue };
        if value.is_null() {
            continue;
        }
        match spec.field_kind {
            FieldKind::Scalar | FieldKind::ScalarList => {
                if matches!(value, Value::String(s) if s.trim().is_empty()) {
                    continue;
                }
                let resolution = match value {
                    Value::String(_) | Value::Number(_) => slot_text(value).map(|t| resolver.resolve(&t)).unwrap_or(Resolution::Orphan),
                    _ => Resolution::Orphan,
                };
                match resolution {
                    Resolution::Valid => {}
                    Resolution::Remapped(id) => {
                        stats.remapped += 1;
                        patch.insert(field.clone(), Value::String(id.0));
                    }
                    Resolution::Recovered(id) => {
                        stats.recovered += 1;
                        patch.insert(field.clone(), Value::String(id.0));
                    }
                    Resolution::Deferred => {
                        stats.deferred += 1;
                        issues.push(ReferenceIssue::new(record, spec, field, value, true));
                    }
                    Resolution::Orphan => {
                        issues.push(ReferenceIssue::new(record, spec, field, value, false));
                        match OrphanAction::from(spec.orphan_policy) {
                            OrphanAction::DeleteRecord => return RecordChange::Delete,
                            OrphanAction::ClearField | OrphanAction::RemoveElement => {
                                stats.cleared += 1;
                                patch.insert(field.clone(), Value::Null);
                            }
                        }
                    }
                }
            }
            FieldKind::ArrayValue => {
                let items: Vec<Value> = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                let mut out: Vec<Value> = Vec::with_capacity(items.len());
                let mut seen: HashSet<String> = HashSet::new();
                for item in &items {
                    let resolved = match item {
                        Value::Null => None,
                        Value::String(s) if s.trim().is_empty() => None,
                        Value::String(_) | Value::Number(_) => {
                            let text = slot_text(item).unwrap_or_default();
                            match resolver.resolve(&text) {
                                Resolution::Valid => Some(text),
                                Resolution::Remapped(id) => {
                                    stats.remapped += 1;
                                    Some(id.0)
                                }
                                Resolution::Recovered(id) => {
                                    stats.recovered += 1;
                                    Some(id.0)
                                }
                                Resolution::Deferred => {
                                    stats.deferred += 1;
                                    issues.push(ReferenceIssue::new(record, spec, field, item, true));
                                    Some(text)
                                }
                                Resolution::Orphan => {
                                    issues.push(ReferenceIssue::new(record, spec, field, item, false));
                                    None
                                }
                            }
                        }
                        _ => {
                            issues.push(ReferenceIssue::new(record, spec, field, item, false));
                            None
                        }
                    };
                    match resolved {
                        Some(id) => {
                            if seen.insert(id.clone()) {
                                out.push(Value::String(id));
                            }
                        }
                        None => stats.elements_removed += 1,
                    }
                }
                let rewritten = Value::Array(out);
                if &rewritten != value {
                    patch.insert(field.clone(), rewritten);
                }
            }
        }
    }
    if patch.is_empty() {
        RecordChange::Unchanged
    } else {
        RecordChange::Patch(patch)
    }
}

pub struct ReferencePropagator<'a> {
    registry: &'a EntityRegistry,
    batch: &'a BatchController,
    resolver: ReferenceResolver<'a>,
}

impl<'a> ReferencePropagator<'a> {
    /// Falla con `MappingIncomplete` si el mapa no está sellado.
    pub fn new(registry: &'a EntityRegistry, batch: &'a BatchController, identity: &'a IdentityMap, resolver: ReferenceResolver<'a>) -> Result<Self, EngineError> {
        if !identity.is_sealed() {
            return Err(EngineError::MappingIncomplete);
        }
        Ok(Self { registry, batch, resolver })
    }

    /// Propaga una spec. Fallos de escritura quedan en `report.errors`; sólo
    /// la imposibilidad de leer la entidad dependiente se devuelve como error.
    pub async fn propagate(&self, spec: &ReferenceSpec, report: &mut MigrationReport) -> Result<Propagation, MigrationError> {
        let label = spec.label();
        let handle = self.registry.handle(&spec.entity_type)?;
        let records = handle.list_all().await.map_err(|e| read_error(&format!("list {}", spec.entity_type), e))?;

        let mut stats = ReferenceStats { spec: label.clone(),
                                         scanned: records.len(),
                                         ..Default::default() };
        let mut issues = Vec::new();
        let mut changes: Vec<(RecordId, RecordChange)> = Vec::new();
        for record in &records {
            match rewrite_record(record, spec, &self.resolver, &mut stats, &mut issues) {
                RecordChange::Unchanged => {}
                change => changes.push((record.id.clone(), change)),
            }
        }
        for issue in &issues {
            match issue.deferred {
                true => warn!("propagate {label}: kept {} (legacy merge failed)", issue.error),
                false => warn!("propagate {label}: {} -> {:?}", issue.error, spec.orphan_policy),
            }
        }
        debug!("propagate {label}: scanned={} pending_writes={}", stats.scanned, changes.len());

        let results = self.batch
                          .run(&changes, |(id, change)| {
                              let h = handle.clone();
                              async move {
                                  match change {
                                      RecordChange::Patch(patch) => h.update(&id, patch).await.map(|_| ()),
                                      RecordChange::Delete => h.delete(&id).await,
                                      RecordChange::Unchanged => Ok(()),
                                  }
                              }
                          })
                          .await;

        for ((id, change), result) in changes.iter().zip(results) {
            match (change, result) {
                (RecordChange::Delete, Ok(())) => stats.deleted += 1,
                (_, Ok(())) => stats.updated += 1,
                (_, Err(e)) => {
                    stats.failed += 1;
                    warn!("propagate {label}: {}/{id} failed: {e}", spec.entity_type);
                    report.push_error(format!("{label} {id}"), e.to_string());
                }
            }
        }
        info!("propagate {label}: scanned={} updated={} remapped={} recovered={} cleared={} removed={} deleted={} deferred={} failed={}",
              stats.scanned,
              stats.updated,
              stats.remapped,
              stats.recovered,
              stats.cleared,
              stats.elements_removed,
              stats.deleted,
              stats.deferred,
              stats.failed);
        Ok(Propagation { stats, issues })
    }
}
