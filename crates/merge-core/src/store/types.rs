//! Contrato del record store externo.
//!
//! Operaciones genéricas por tipo de entidad, sin transacciones ni
//! compare-and-swap. Los `list` pueden estar desfasados respecto a otros
//! escritores concurrentes.
use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{EntityType, Fields, Record, RecordId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {entity_type}/{id}")]
    NotFound { entity_type: String, id: String },
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("transient IO error: {0}")]
    TransientIo(String),
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unknown store error: {0}")]
    Unknown(String),
}

impl StoreError {
    /// Errores que merecen reintento con backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RateLimited(_) | StoreError::TransientIo(_))
    }

    /// El store no es alcanzable en absoluto.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Orden opcional para `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(),
               descending: false }
    }
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(),
               descending: true }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, entity_type: &EntityType, sort: Option<&SortSpec>, limit: Option<usize>) -> Result<Vec<Record>, StoreError>;
    /// Registros cuyos campos contienen todos los pares de `predicate`.
    async fn filter(&self, entity_type: &EntityType, predicate: &Fields) -> Result<Vec<Record>, StoreError>;
    async fn get(&self, entity_type: &EntityType, id: &RecordId) -> Result<Record, StoreError>;
    async fn create(&self, entity_type: &EntityType, fields: Fields) -> Result<Record, StoreError>;
    /// Merge parcial: sólo las claves de `patch` cambian.
    async fn update(&self, entity_type: &EntityType, id: &RecordId, patch: Fields) -> Result<Record, StoreError>;
    async fn delete(&self, entity_type: &EntityType, id: &RecordId) -> Result<(), StoreError>;
}

/// `true` si `record` contiene todos los pares de `predicate`.
pub fn matches_predicate(record: &Record, predicate: &Fields) -> bool {
    predicate.iter().all(|(k, v)| record.fields.get(k) == Some(v))
}

/// Aplica orden y límite en memoria (compartido por los backends).
pub fn apply_sort_limit(mut records: Vec<Record>, sort: Option<&SortSpec>, limit: Option<usize>) -> Vec<Record> {
    if let Some(s) = sort {
        records.sort_by(|a, b| {
                   let ord = compare_values(a.fields.get(&s.field), b.fields.get(&s.field));
                   if s.descending { ord.reverse() } else { ord }
               });
    }
    if let Some(n) = limit {
        records.truncate(n);
    }
    records
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, n: i64) -> Record {
        let mut f = Fields::new();
        f.insert("n".into(), json!(n));
        Record::new(id, "T", f)
    }

    #[test]
    fn sort_and_limit() {
        let out = apply_sort_limit(vec![rec("a", 3), rec("b", 1), rec("c", 2)], Some(&SortSpec::desc("n")), Some(2));
        let ids: Vec<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn retryable_classification() {
        assert!(StoreError::RateLimited("x".into()).is_retryable());
        assert!(!StoreError::Rejected("x".into()).is_retryable());
        assert!(StoreError::Unavailable("x".into()).is_connectivity());
    }
}
