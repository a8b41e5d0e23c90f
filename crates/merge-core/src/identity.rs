//! Mapa de identidades old-id → new-id.
//!
//! Acumulador puro. Debe estar completo (`seal`) antes de propagar: la
//! propagación no se intercala con la detección.
use indexmap::IndexMap;

use crate::errors::EngineError;
use crate::model::{IdentityMappingEntry, MappingAction, RecordId};

#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    entries: IndexMap<RecordId, IdentityMappingEntry>,
    sealed: bool,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una entrada. Un `old_id` sólo puede mapear a un `new_id`;
    /// repetir la misma correspondencia es idempotente.
    pub fn record(&mut self, entry: IdentityMappingEntry) -> Result<(), EngineError> {
        if self.sealed {
            return Err(EngineError::MappingIncomplete);
        }
        if let Some(existing) = self.entries.get(&entry.old_id) {
            if existing.new_id != entry.new_id {
                return Err(EngineError::IdentityConflict { old_id: entry.old_id.to_string(),
                                                           existing: existing.new_id.to_string(),
                                                           attempted: entry.new_id.to_string() });
            }
            return Ok(());
        }
        self.entries.insert(entry.old_id.clone(), entry);
        Ok(())
    }

    /// Marca el mapa como completo.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn resolve(&self, old_id: &RecordId) -> Option<&RecordId> {
        self.entries.get(old_id).map(|e| &e.new_id)
    }

    pub fn resolve_str(&self, old_id: &str) -> Option<&RecordId> {
        self.entries.get(&RecordId::new(old_id)).map(|e| &e.new_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &IdentityMappingEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, action: MappingAction) -> usize {
        self.entries.values().filter(|e| e.action == action).count()
    }

    /// Copia inmutable de las entradas en orden de registro.
    pub fn to_vec(&self) -> Vec<IdentityMappingEntry> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(old: &str, new: &str) -> IdentityMappingEntry {
        IdentityMappingEntry { old_id: old.into(),
                               new_id: new.into(),
                               natural_key: None,
                               action: MappingAction::Migrated }
    }

    #[test]
    fn resolve_and_conflict() {
        let mut map = IdentityMap::new();
        map.record(entry("L1", "M1")).unwrap();
        map.record(entry("L1", "M1")).unwrap();
        assert_eq!(map.len(), 1);
        assert!(matches!(map.record(entry("L1", "M2")), Err(EngineError::IdentityConflict { .. })));
        assert_eq!(map.resolve_str("L1"), Some(&RecordId::from("M1")));
        assert_eq!(map.resolve_str("L2"), None);
    }

    #[test]
    fn sealed_map_rejects_new_entries() {
        let mut map = IdentityMap::new();
        map.seal();
        assert!(map.record(entry("L1", "M1")).is_err());
        assert!(map.is_sealed());
    }
}
