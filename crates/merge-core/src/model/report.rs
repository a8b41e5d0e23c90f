//! Contadores y entradas que se acumulan durante una corrida.
use serde::{Deserialize, Serialize};

use super::record::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingAction {
    Skipped,
    Migrated,
    Updated,
}

/// Entrada del mapa de identidades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMappingEntry {
    pub old_id: RecordId,
    pub new_id: RecordId,
    pub natural_key: Option<String>,
    pub action: MappingAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub context: String,
    pub message: String,
}

/// Reporte de migración. Nunca se descarta ante fallos parciales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub processed: usize,
    pub migrated: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ErrorEntry>,
}

impl MigrationReport {
    pub fn push_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ErrorEntry { context: context.into(),
                                      message: message.into() });
    }

    pub fn count(&mut self, action: MappingAction) {
        match action {
            MappingAction::Skipped => self.skipped += 1,
            MappingAction::Migrated => self.migrated += 1,
            MappingAction::Updated => self.updated += 1,
        }
    }
}

/// Resultado de propagar una `ReferenceSpec`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub spec: String,
    pub scanned: usize,
    /// Registros con al menos un campo reescrito (una llamada update).
    pub updated: usize,
    /// Claves reescritas vía mapa de identidades.
    pub remapped: usize,
    /// Claves recuperadas por resolución secundaria.
    pub recovered: usize,
    pub cleared: usize,
    pub elements_removed: usize,
    pub deleted: usize,
    /// Claves conservadas: apuntan a un legacy cuyo merge falló.
    pub deferred: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_serializes_lowercase() {
        let e = IdentityMappingEntry { old_id: "L1".into(),
                                       new_id: "M1".into(),
                                       natural_key: Some("E-1".into()),
                                       action: MappingAction::Migrated };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, json!({"oldId": "L1", "newId": "M1", "naturalKey": "E-1", "action": "migrated"}));
    }

    #[test]
    fn count_routes_by_action() {
        let mut r = MigrationReport::default();
        r.count(MappingAction::Migrated);
        r.count(MappingAction::Skipped);
        r.count(MappingAction::Skipped);
        r.push_error("create L3", "rejected");
        assert_eq!((r.migrated, r.updated, r.skipped, r.errors.len()), (1, 0, 2, 1));
    }
}
