use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{apply_sort_limit, matches_predicate, RecordStore, SortSpec, StoreError};
use crate::model::{EntityType, Fields, Record, RecordId};

/// Contadores de escrituras (tests y demo).
#[derive(Debug, Default)]
pub struct WriteCounters {
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl WriteCounters {
    pub fn snapshot(&self) -> (usize, usize, usize) {
        (self.creates.load(Ordering::SeqCst), self.updates.load(Ordering::SeqCst), self.deletes.load(Ordering::SeqCst))
    }
}

/// Record store en memoria. Mantiene orden de inserción por tipo para que
/// `list` sin orden explícito sea determinista.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<HashMap<EntityType, IndexMap<RecordId, Record>>>,
    pub counters: WriteCounters,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserta registros con ids conocidos (no cuenta como escritura).
    pub async fn seed(&self, entity_type: &str, records: Vec<(&str, Fields)>) {
        let et = EntityType::new(entity_type);
        let mut guard = self.inner.write().await;
        let table = guard.entry(et.clone()).or_default();
        for (id, fields) in records {
            let rid = RecordId::new(id);
            table.insert(rid.clone(), Record { id: rid, entity_type: et.clone(), fields });
        }
    }

    pub async fn count(&self, entity_type: &str) -> usize {
        self.inner.read().await.get(&EntityType::new(entity_type)).map(|t| t.len()).unwrap_or(0)
    }

    pub async fn all(&self, entity_type: &str) -> Vec<Record> {
        self.inner
            .read()
            .await
            .get(&EntityType::new(entity_type))
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list(&self, entity_type: &EntityType, sort: Option<&SortSpec>, limit: Option<usize>) -> Result<Vec<Record>, StoreError> {
        let records = self.inner
                          .read()
                          .await
                          .get(entity_type)
                          .map(|t| t.values().cloned().collect())
                          .unwrap_or_default();
        Ok(apply_sort_limit(records, sort, limit))
    }

    async fn filter(&self, entity_type: &EntityType, predicate: &Fields) -> Result<Vec<Record>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.get(entity_type)
                .map(|t| t.values().filter(|r| matches_predicate(r, predicate)).cloned().collect())
                .unwrap_or_default())
    }

    async fn get(&self, entity_type: &EntityType, id: &RecordId) -> Result<Record, StoreError> {
        self.inner
            .read()
            .await
            .get(entity_type)
            .and_then(|t| t.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound { entity_type: entity_type.to_string(),
                                                  id: id.to_string() })
    }

    async fn create(&self, entity_type: &EntityType, mut fields: Fields) -> Result<Record, StoreError> {
        fields.remove("id");
        let id = RecordId::new(Uuid::new_v4().to_string());
        let record = Record { id: id.clone(),
                              entity_type: entity_type.clone(),
                              fields };
        self.inner.write().await.entry(entity_type.clone()).or_default().insert(id, record.clone());
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update(&self, entity_type: &EntityType, id: &RecordId, patch: Fields) -> Result<Record, StoreError> {
        let mut guard = self.inner.write().await;
        let record = guard.get_mut(entity_type)
                          .and_then(|t| t.get_mut(id))
                          .ok_or_else(|| StoreError::NotFound { entity_type: entity_type.to_string(),
                                                                id: id.to_string() })?;
        for (k, v) in patch {
            if k != "id" {
                record.fields.insert(k, v);
            }
        }
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }

    async fn delete(&self, entity_type: &EntityType, id: &RecordId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let removed = guard.get_mut(entity_type).and_then(|t| t.shift_remove(id));
        match removed {
            Some(_) => {
                self.counters.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StoreError::NotFound { entity_type: entity_type.to_string(),
                                               id: id.to_string() }),
        }
    }
}
