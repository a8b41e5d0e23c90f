//! Detector de duplicados.
//!
//! Un índice por extractor sobre la colección master (clave → id). Para cada
//! registro legacy se prueban los extractores en el orden configurado y gana
//! la primera coincidencia; los empates no se reevalúan.
use std::collections::HashMap;

use log::debug;

use crate::model::{KeyExtractor, Record, RecordId};

/// Coincidencia encontrada para un registro legacy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub master_id: RecordId,
    pub extractor: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct MasterIndex {
    extractors: Vec<KeyExtractor>,
    /// Paralelo a `extractors`.
    indexes: Vec<HashMap<String, RecordId>>,
}

impl MasterIndex {
    pub fn new(extractors: &[KeyExtractor]) -> Self {
        Self { extractors: extractors.to_vec(),
               indexes: vec![HashMap::new(); extractors.len()] }
    }

    /// Construye los índices sobre la colección master. Si dos masters
    /// comparten clave se conserva el primero (orden del store).
    pub fn build(extractors: &[KeyExtractor], masters: &[Record]) -> Self {
        let mut idx = Self::new(extractors);
        for m in masters {
            idx.insert(m);
        }
        debug!("master index built: records={} keys={:?}",
               masters.len(),
               idx.indexes.iter().map(|i| i.len()).collect::<Vec<_>>());
        idx
    }

    /// Añade un master (p.ej. recién creado) a todos los índices.
    pub fn insert(&mut self, master: &Record) {
        for (ex, index) in self.extractors.iter().zip(self.indexes.iter_mut()) {
            if let Some(key) = ex.master_key(master) {
                index.entry(key).or_insert_with(|| master.id.clone());
            }
        }
    }

    /// Primera coincidencia en orden de extractores.
    pub fn find(&self, legacy: &Record) -> Option<Match> {
        self.extractors
            .iter()
            .zip(self.indexes.iter())
            .find_map(|(ex, index)| {
                let key = ex.legacy_key(legacy)?;
                index.get(&key).map(|id| Match { master_id: id.clone(),
                                                 extractor: ex.name.clone(),
                                                 key })
            })
    }

    /// Busca sólo con extractores naturales (sin back pointer).
    pub fn find_natural(&self, legacy: &Record) -> Option<Match> {
        self.extractors
            .iter()
            .zip(self.indexes.iter())
            .filter(|(ex, _)| ex.is_natural())
            .find_map(|(ex, index)| {
                let key = ex.legacy_key(legacy)?;
                index.get(&key).map(|id| Match { master_id: id.clone(),
                                                 extractor: ex.name.clone(),
                                                 key })
            })
    }

    /// Claves naturales `(extractor, clave)` de un legacy, en orden.
    pub fn natural_keys(&self, legacy: &Record) -> Vec<(String, String)> {
        self.extractors
            .iter()
            .filter(|ex| ex.is_natural())
            .filter_map(|ex| ex.legacy_key(legacy).map(|k| (ex.name.clone(), k)))
            .collect()
    }

    /// Clave natural preferida para reportar (primera no vacía).
    pub fn primary_key(&self, legacy: &Record) -> Option<String> {
        self.natural_keys(legacy).into_iter().next().map(|(_, k)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fields;
    use serde_json::json;

    fn rec(id: &str, pairs: &[(&str, serde_json::Value)]) -> Record {
        let f: Fields = pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Record::new(id, "T", f)
    }

    fn extractors() -> Vec<KeyExtractor> {
        vec![KeyExtractor::back_pointer("legacy_id", "legacy_id"),
             KeyExtractor::field("code", "codigo", "codigo"),
             KeyExtractor::email("email", "email", "email"),]
    }

    #[test]
    fn first_extractor_wins() {
        let masters = vec![rec("M1", &[("codigo", json!("E1"))]), rec("M2", &[("email", json!("ana@x.es"))])];
        let idx = MasterIndex::build(&extractors(), &masters);
        // coincide por código con M1 y por email con M2: gana código
        let legacy = rec("L1", &[("codigo", json!("E1")), ("email", json!("ANA@x.es"))]);
        let m = idx.find(&legacy).unwrap();
        assert_eq!(m.master_id, RecordId::from("M1"));
        assert_eq!(m.extractor, "code");
    }

    #[test]
    fn back_pointer_matches_previous_migration() {
        let masters = vec![rec("M7", &[("legacy_id", json!("L7"))])];
        let idx = MasterIndex::build(&extractors(), &masters);
        let m = idx.find(&rec("L7", &[])).unwrap();
        assert_eq!(m.master_id, RecordId::from("M7"));
        assert!(idx.find_natural(&rec("L7", &[])).is_none());
    }

    #[test]
    fn empty_keys_are_not_indexed() {
        let masters = vec![rec("M1", &[("codigo", json!(""))])];
        let idx = MasterIndex::build(&extractors(), &masters);
        assert!(idx.find(&rec("L1", &[("codigo", json!(""))])).is_none());
    }

    #[test]
    fn inserted_records_become_matchable() {
        let mut idx = MasterIndex::new(&extractors());
        assert!(idx.find(&rec("L1", &[("codigo", json!("E5"))])).is_none());
        idx.insert(&rec("NEW", &[("codigo", json!("E5"))]));
        assert_eq!(idx.find(&rec("L2", &[("codigo", json!("E5"))])).unwrap().master_id, RecordId::from("NEW"));
    }
}
