use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use serde_json::Value;
use uuid::Uuid;

use merge_core::model::{EntityType, Fields, Record, RecordId};
use merge_core::store::{apply_sort_limit, matches_predicate, RecordStore, SortSpec, StoreError};

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::records;

#[derive(Queryable, Debug)]
pub struct RecordRow {
    pub seq: i64,
    pub entity_type: String,
    pub id: String,
    pub fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        let fields = match row.fields {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
        Record::new(row.id, row.entity_type, fields)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = records)]
pub struct NewRecordRow<'a> {
    pub entity_type: &'a str,
    pub id: &'a str,
    pub fields: &'a Value,
}

/// `RecordStore` sobre la tabla `records`.
///
/// Las lecturas reintentan errores transitorios con `with_retry`. Las
/// escrituras hacen un solo intento: su reintento lo decide `BatchController`
/// en el core, que conoce el chunk y el backoff configurado.
pub struct PgRecordStore<P: ConnectionProvider> {
    provider: Arc<P>,
}

impl<P: ConnectionProvider> Clone for PgRecordStore<P> {
    fn clone(&self) -> Self {
        Self { provider: self.provider.clone() }
    }
}

impl<P: ConnectionProvider> PgRecordStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider) }
    }

    /// Ejecuta `f` con una conexión en un hilo bloqueante.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
        where T: Send + 'static,
              F: FnOnce(&P) -> Result<T, StoreError> + Send + 'static
    {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || f(&provider)).await
                                                         .map_err(|e| StoreError::Unknown(format!("blocking task: {e}")))?
    }

    /// Inserta un registro con id conocido (carga inicial / tests).
    pub async fn seed(&self, entity_type: &str, id: &str, fields: Fields) -> Result<Record, StoreError> {
        let et = entity_type.to_string();
        let id = id.to_string();
        self.blocking(move |p| {
                let payload = Value::Object(fields);
                let row: RecordRow = with_retry(|| {
                                         let mut conn = p.connection()?;
                                         diesel::insert_into(records::table).values(NewRecordRow { entity_type: &et,
                                                                                                   id: &id,
                                                                                                   fields: &payload })
                                                                            .get_result(&mut conn)
                                                                            .map_err(PersistenceError::from)
                                     })?;
                Ok(row.into())
            })
            .await
    }
}

fn not_found(entity_type: &str, id: &str) -> impl Fn(PersistenceError) -> StoreError {
    let entity_type = entity_type.to_string();
    let id = id.to_string();
    move |e| match e {
        PersistenceError::NotFound => StoreError::NotFound { entity_type: entity_type.clone(),
                                                             id: id.clone() },
        other => other.into(),
    }
}

#[async_trait]
impl<P: ConnectionProvider> RecordStore for PgRecordStore<P> {
    async fn list(&self, entity_type: &EntityType, sort: Option<&SortSpec>, limit: Option<usize>) -> Result<Vec<Record>, StoreError> {
        let et = entity_type.to_string();
        let sort = sort.cloned();
        self.blocking(move |p| {
                let sql_limit = if sort.is_none() { limit } else { None };
                let rows: Vec<RecordRow> = with_retry(|| {
                                               let mut conn = p.connection()?;
                                               let mut q = records::table.filter(records::entity_type.eq(&et))
                                                                         .order(records::seq.asc())
                                                                         .into_boxed();
                                               if let Some(n) = sql_limit {
                                                   q = q.limit(n as i64);
                                               }
                                               q.load(&mut conn).map_err(PersistenceError::from)
                                           })?;
                debug!("list {et}: {} rows", rows.len());
                let records: Vec<Record> = rows.into_iter().map(Record::from).collect();
                Ok(apply_sort_limit(records, sort.as_ref(), limit))
            })
            .await
    }

    async fn filter(&self, entity_type: &EntityType, predicate: &Fields) -> Result<Vec<Record>, StoreError> {
        let all = self.list(entity_type, None, None).await?;
        Ok(all.into_iter().filter(|r| matches_predicate(r, predicate)).collect())
    }

    async fn get(&self, entity_type: &EntityType, id: &RecordId) -> Result<Record, StoreError> {
        let et = entity_type.to_string();
        let id = id.to_string();
        self.blocking(move |p| {
                let row: RecordRow = with_retry(|| {
                                         let mut conn = p.connection()?;
                                         records::table.find((&et, &id))
                                                       .first(&mut conn)
                                                       .map_err(PersistenceError::from)
                                     }).map_err(not_found(&et, &id))?;
                Ok(row.into())
            })
            .await
    }

    async fn create(&self, entity_type: &EntityType, mut fields: Fields) -> Result<Record, StoreError> {
        let et = entity_type.to_string();
        fields.remove("id");
        self.blocking(move |p| {
                let id = Uuid::new_v4().to_string();
                let payload = Value::Object(fields);
                let mut conn = p.connection()?;
                let row: RecordRow = diesel::insert_into(records::table).values(NewRecordRow { entity_type: &et,
                                                                                               id: &id,
                                                                                               fields: &payload })
                                                                        .get_result(&mut conn)
                                                                        .map_err(PersistenceError::from)?;
                debug!("create {et}/{}", row.id);
                Ok(row.into())
            })
            .await
    }

    async fn update(&self, entity_type: &EntityType, id: &RecordId, mut patch: Fields) -> Result<Record, StoreError> {
        let et = entity_type.to_string();
        let id = id.to_string();
        patch.remove("id");
        self.blocking(move |p| {
                let mut conn = p.connection()?;
                let row: RecordRow = conn.build_transaction()
                                         .read_write()
                                         .run(|tx| {
                                             let current: Value = records::table.find((&et, &id))
                                                                                .select(records::fields)
                                                                                .for_update()
                                                                                .first(tx)?;
                                             let mut merged = match current {
                                                 Value::Object(map) => map,
                                                 _ => Fields::new(),
                                             };
                                             for (k, v) in &patch {
                                                 merged.insert(k.clone(), v.clone());
                                             }
                                             diesel::update(records::table.find((&et, &id)))
                                                 .set((records::fields.eq(Value::Object(merged)), records::updated_at.eq(diesel::dsl::now)))
                                                 .get_result::<RecordRow>(tx)
                                         })
                                         .map_err(|e| not_found(&et, &id)(PersistenceError::from(e)))?;
                Ok(row.into())
            })
            .await
    }

    async fn delete(&self, entity_type: &EntityType, id: &RecordId) -> Result<(), StoreError> {
        let et = entity_type.to_string();
        let id = id.to_string();
        self.blocking(move |p| {
                let mut conn = p.connection()?;
                let deleted = diesel::delete(records::table.find((&et, &id))).execute(&mut conn)
                                                                              .map_err(PersistenceError::from)?;
                if deleted == 0 {
                    return Err(StoreError::NotFound { entity_type: et, id });
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::pg::PgPooledConnection;

    /// Proveedor cuya conexión siempre falla con un error reintentable.
    #[derive(Default)]
    struct Flapping {
        calls: AtomicUsize,
    }

    impl ConnectionProvider for Flapping {
        fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PersistenceError::TransientIo("connection reset".into()))
        }
    }

    fn calls(store: &PgRecordStore<Flapping>) -> usize {
        store.provider.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn writes_make_a_single_attempt() {
        let store = PgRecordStore::new(Flapping::default());
        let et = EntityType::from("Machine");
        let err = store.create(&et, Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::TransientIo(_)));
        assert_eq!(calls(&store), 1);
        store.update(&et, &RecordId::from("M1"), Fields::new()).await.unwrap_err();
        store.delete(&et, &RecordId::from("M1")).await.unwrap_err();
        assert_eq!(calls(&store), 3);
    }

    #[tokio::test]
    async fn reads_retry_transient_errors() {
        let store = PgRecordStore::new(Flapping::default());
        let err = store.list(&EntityType::from("Machine"), None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::TransientIo(_)));
        // intento inicial + 3 reintentos
        assert_eq!(calls(&store), 4);
    }
}
