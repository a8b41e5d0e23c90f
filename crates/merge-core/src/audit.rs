//! Verificación / auditoría (sólo lectura).
//!
//! Se ejecuta antes de migrar (línea base) y después (certificación). Cuenta
//! registros legacy, masters activos y, por cada `ReferenceSpec`, los
//! registros dependientes y las claves foráneas que no resuelven a un master
//! vivo. Un conteo post-corrida distinto de cero significa que la corrida no
//! terminó limpia.
use std::collections::HashSet;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MigrationError;
use crate::model::{value_as_text, FieldKind, Record, RecordId, ReferenceSpec, SourcePair};
use crate::store::{EntityRegistry, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenReference {
    pub entity_type: String,
    pub record_id: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAudit {
    pub spec: String,
    pub records: usize,
    pub broken_records: usize,
    pub broken_keys: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub pair: String,
    pub legacy_count: usize,
    /// Masters activos (sin tombstone).
    pub master_count: usize,
    pub master_total: usize,
    pub references: Vec<ReferenceAudit>,
    pub broken: Vec<BrokenReference>,
}

impl AuditSnapshot {
    pub fn broken_keys(&self) -> usize {
        self.references.iter().map(|r| r.broken_keys).sum()
    }

    pub fn broken_records(&self) -> usize {
        self.references.iter().map(|r| r.broken_records).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.broken_keys() == 0
    }
}

/// Un id referenciado dentro de un registro dependiente.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSlot {
    pub field: String,
    pub value: Value,
}

/// Valores referenciados por `spec` en `record` (no vacíos). En arrays, un
/// slot por elemento.
pub fn reference_slots(record: &Record, spec: &ReferenceSpec) -> Vec<ReferenceSlot> {
    let mut out = Vec::new();
    for field in &spec.field_names {
        let Some(v) = record.get(field) else { continue };
        match (spec.field_kind, v) {
            (_, Value::Null) => {}
            (FieldKind::ArrayValue, Value::Array(items)) => {
                out.extend(items.iter()
                                .filter(|i| !i.is_null())
                                .map(|i| ReferenceSlot { field: field.clone(),
                                                         value: i.clone() }));
            }
            (_, Value::String(s)) if s.trim().is_empty() => {}
            (_, other) => out.push(ReferenceSlot { field: field.clone(),
                                                   value: other.clone() }),
        }
    }
    out
}

/// Representación de un id referenciado; los valores no escalares nunca
/// resuelven.
pub fn slot_text(value: &Value) -> Option<String> {
    value_as_text(value)
}

/// Ids de masters vivos.
pub fn live_master_ids(pair: &SourcePair, masters: &[Record]) -> HashSet<RecordId> {
    masters.iter().filter(|m| pair.is_active(m)).map(|m| m.id.clone()).collect()
}

/// Fallo de lectura al auditar o al cargar colecciones.
pub(crate) fn read_error(context: &str, e: StoreError) -> MigrationError {
    if e.is_connectivity() {
        MigrationError::FatalConnectivity(format!("{context}: {e}"))
    } else {
        MigrationError::TransientStore(e)
    }
}

/// Audita un par contra el estado actual del store.
pub async fn audit_pair(registry: &EntityRegistry, pair: &SourcePair) -> Result<AuditSnapshot, MigrationError> {
    let (legacy, masters) = load_pair(registry, pair).await?;
    audit_loaded(registry, pair, &legacy, &masters).await
}

/// Lee las colecciones legacy y master de un par.
pub async fn load_pair(registry: &EntityRegistry, pair: &SourcePair) -> Result<(Vec<Record>, Vec<Record>), MigrationError> {
    let legacy = registry.handle(&pair.legacy_type)?
                         .list_all()
                         .await
                         .map_err(|e| read_error("list legacy", e))?;
    let masters = registry.handle(&pair.master_type)?
                          .list_all()
                          .await
                          .map_err(|e| read_error("list master", e))?;
    Ok((legacy, masters))
}

/// Auditoría con las colecciones del par ya cargadas; sólo lee las
/// entidades dependientes.
pub async fn audit_loaded(registry: &EntityRegistry, pair: &SourcePair, legacy: &[Record], masters: &[Record]) -> Result<AuditSnapshot, MigrationError> {
    let live = live_master_ids(pair, masters);

    let mut snapshot = AuditSnapshot { pair: pair.name.clone(),
                                       legacy_count: legacy.len(),
                                       master_count: live.len(),
                                       master_total: masters.len(),
                                       ..Default::default() };

    for spec in &pair.references {
        let dependents = registry.handle(&spec.entity_type)?
                                 .list_all()
                                 .await
                                 .map_err(|e| read_error(&format!("list {}", spec.entity_type), e))?;
        let mut ra = ReferenceAudit { spec: spec.label(),
                                      records: dependents.len(),
                                      ..Default::default() };
        for record in &dependents {
            let mut record_broken = false;
            for slot in reference_slots(record, spec) {
                let ok = slot_text(&slot.value).map(|t| live.contains(&RecordId::new(t))).unwrap_or(false);
                if !ok {
                    record_broken = true;
                    ra.broken_keys += 1;
                    snapshot.broken.push(BrokenReference { entity_type: spec.entity_type.to_string(),
                                                           record_id: record.id.to_string(),
                                                           field: slot.field.clone(),
                                                           value: slot_text(&slot.value).unwrap_or_else(|| slot.value.to_string()) });
                }
            }
            if record_broken {
                ra.broken_records += 1;
            }
        }
        if ra.broken_keys > 0 {
            warn!("audit {}: {} broken keys in {} records", ra.spec, ra.broken_keys, ra.broken_records);
        }
        snapshot.references.push(ra);
    }

    info!("audit pair={} legacy={} master_active={} master_total={} broken_keys={}",
          snapshot.pair,
          snapshot.legacy_count,
          snapshot.master_count,
          snapshot.master_total,
          snapshot.broken_keys());
    Ok(snapshot)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsoleteEntry {
    pub entity_type: String,
    pub count: usize,
}

/// Reporte de tipos obsoletos: cuántos registros quedan en cada uno.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsoleteReport {
    pub entries: Vec<ObsoleteEntry>,
    pub empty: Vec<String>,
    pub unreadable: Vec<String>,
}

/// Cuenta registros de cada tipo obsoleto. Un tipo ilegible se anota y no
/// detiene el reporte.
pub async fn audit_obsolete(registry: &EntityRegistry, entity_types: &[&str]) -> ObsoleteReport {
    let mut report = ObsoleteReport::default();
    for name in entity_types {
        let et = crate::model::EntityType::new(*name);
        let listed = match registry.handle(&et) {
            Ok(h) => h.list_all().await,
            Err(e) => Err(e),
        };
        match listed {
            Ok(records) => {
                if records.is_empty() {
                    report.empty.push(name.to_string());
                }
                report.entries.push(ObsoleteEntry { entity_type: name.to_string(),
                                                    count: records.len() });
            }
            Err(e) => {
                warn!("obsolete audit: cannot read {name}: {e}");
                report.unreadable.push(name.to_string());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, OrphanPolicy};
    use serde_json::json;

    fn rec(id: &str, pairs: &[(&str, Value)]) -> Record {
        let f: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Record::new(id, "T", f)
    }

    #[test]
    fn slots_skip_empty_values_and_expand_arrays() {
        let spec = ReferenceSpec::array("Turno", "operator_ids");
        let r = rec("T1", &[("operator_ids", json!(["A", null, "B"]))]);
        let slots = reference_slots(&r, &spec);
        assert_eq!(slots.len(), 2);

        let spec = ReferenceSpec::numbered("Plan", "operador", 3, OrphanPolicy::ClearField);
        let r = rec("P1", &[("operador_1", json!("A")), ("operador_2", json!("")), ("operador_3", json!(null))]);
        assert_eq!(reference_slots(&r, &spec).len(), 1);
    }

    #[test]
    fn clean_means_zero_broken_keys() {
        let mut s = AuditSnapshot::default();
        assert!(s.is_clean());
        s.references.push(ReferenceAudit { spec: "x".into(),
                                           records: 3,
                                           broken_records: 1,
                                           broken_keys: 2 });
        assert!(!s.is_clean());
        assert_eq!(s.broken_keys(), 2);
        assert_eq!(s.broken_records(), 1);
    }
}
