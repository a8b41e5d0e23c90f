//! Registro tipado de entidades: etiqueta de tipo → backend capaz de CRUD.
//!
//! Reemplaza el despacho dinámico `store[entityName]`. Cada tipo puede apuntar
//! a un backend distinto; los no registrados usan el backend por defecto si
//! existe, y si no, fallan con `StoreError::UnknownEntity`.
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{RecordStore, SortSpec, StoreError};
use crate::model::{EntityType, Fields, Record, RecordId};

#[derive(Clone, Default)]
pub struct EntityRegistry {
    handlers: HashMap<EntityType, Arc<dyn RecordStore>>,
    fallback: Option<Arc<dyn RecordStore>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro donde todos los tipos comparten el mismo backend.
    pub fn with_default(store: Arc<dyn RecordStore>) -> Self {
        Self { handlers: HashMap::new(),
               fallback: Some(store) }
    }

    pub fn register(&mut self, entity_type: &str, store: Arc<dyn RecordStore>) -> &mut Self {
        self.handlers.insert(EntityType::new(entity_type), store);
        self
    }

    pub fn is_registered(&self, entity_type: &EntityType) -> bool {
        self.fallback.is_some() || self.handlers.contains_key(entity_type)
    }

    pub fn handle(&self, entity_type: &EntityType) -> Result<EntityHandle, StoreError> {
        let store = self.handlers
                        .get(entity_type)
                        .or(self.fallback.as_ref())
                        .cloned()
                        .ok_or_else(|| StoreError::UnknownEntity(entity_type.to_string()))?;
        Ok(EntityHandle { entity_type: entity_type.clone(),
                          store })
    }
}

/// Acceso CRUD ligado a un tipo de entidad concreto.
#[derive(Clone)]
pub struct EntityHandle {
    entity_type: EntityType,
    store: Arc<dyn RecordStore>,
}

impl EntityHandle {
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub async fn list(&self, sort: Option<&SortSpec>, limit: Option<usize>) -> Result<Vec<Record>, StoreError> {
        self.store.list(&self.entity_type, sort, limit).await
    }

    pub async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        self.store.list(&self.entity_type, None, None).await
    }

    pub async fn filter(&self, predicate: &Fields) -> Result<Vec<Record>, StoreError> {
        self.store.filter(&self.entity_type, predicate).await
    }

    pub async fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.store.get(&self.entity_type, id).await
    }

    pub async fn create(&self, fields: Fields) -> Result<Record, StoreError> {
        self.store.create(&self.entity_type, fields).await
    }

    pub async fn update(&self, id: &RecordId, patch: Fields) -> Result<Record, StoreError> {
        self.store.update(&self.entity_type, id, patch).await
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.store.delete(&self.entity_type, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;

    #[tokio::test]
    async fn routes_by_type_and_falls_back() {
        let a = Arc::new(InMemoryRecordStore::new());
        let b = Arc::new(InMemoryRecordStore::new());
        let mut reg = EntityRegistry::with_default(a.clone());
        reg.register("Maquina", b.clone());

        reg.handle(&EntityType::new("Maquina")).unwrap().create(Fields::new()).await.unwrap();
        reg.handle(&EntityType::new("Employee")).unwrap().create(Fields::new()).await.unwrap();
        assert_eq!(b.count("Maquina").await, 1);
        assert_eq!(a.count("Employee").await, 1);
        assert_eq!(a.count("Maquina").await, 0);
    }

    #[test]
    fn unknown_type_without_fallback() {
        let reg = EntityRegistry::new();
        assert!(matches!(reg.handle(&EntityType::new("X")), Err(StoreError::UnknownEntity(_))));
    }
}
