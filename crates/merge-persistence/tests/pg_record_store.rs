//! Pruebas contra Postgres real (se omiten sin DATABASE_URL).


use std::sync::Arc;

use merge_core::model::{EntityType, Fields, KeyExtractor, RecordId};
use merge_core::store::SortSpec;
use merge_core::{BatchConfig, BatchController, EntityRegistry, InMemoryRunLog, MigrationEngine, OrphanPolicy, RecordStore, ReferenceSpec,
                 SourcePair, StoreError};
use merge_persistence::{PgRecordStore, PoolProvider};
use serde_json::{json, Value};
use test_support::{pool, unique_type};

fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn crud_roundtrip_and_partial_update() {
    let Some(pool) = pool() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = PgRecordStore::new(PoolProvider { pool });
    let et = EntityType::new(unique_type("Machine"));

    let created = store.create(&et, fields(json!({"codigo": "A", "nombre": "Torno"}))).await.unwrap();
    let updated = store.update(&et, &created.id, fields(json!({"ubicacion": "Nave 1"}))).await.unwrap();
    assert_eq!(updated.get("nombre"), Some(&json!("Torno")));
    assert_eq!(updated.get("ubicacion"), Some(&json!("Nave 1")));

    let fetched = store.get(&et, &created.id).await.unwrap();
    assert_eq!(fetched, updated);

    store.delete(&et, &created.id).await.unwrap();
    assert!(matches!(store.get(&et, &created.id).await, Err(StoreError::NotFound { .. })));
    assert!(matches!(store.delete(&et, &created.id).await, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn list_keeps_insertion_order_and_sorts() {
    let Some(pool) = pool() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = PgRecordStore::new(PoolProvider { pool });
    let et = unique_type("Employee");
    for (id, name) in [("E1", "Carla"), ("E2", "Ana"), ("E3", "Beto")] {
        store.seed(&et, id, fields(json!({"nombre": name}))).await.unwrap();
    }
    let et = EntityType::new(et);
    let ids: Vec<String> = store.list(&et, None, None).await.unwrap().into_iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec!["E1", "E2", "E3"]);

    let sorted = store.list(&et, Some(&SortSpec::asc("nombre")), Some(2)).await.unwrap();
    assert_eq!(sorted.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["E2", "E3"]);

    let ana = store.filter(&et, &fields(json!({"nombre": "Ana"}))).await.unwrap();
    assert_eq!(ana.len(), 1);
    assert_eq!(ana[0].id, RecordId::from("E2"));
}

#[tokio::test]
async fn engine_runs_against_postgres() {
    let Some(pool) = pool() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let store = Arc::new(PgRecordStore::new(PoolProvider { pool }));
    let legacy = unique_type("Machine");
    let master = unique_type("MachineMaster");
    let skill = unique_type("MachineSkill");
    store.seed(&legacy, "L1", fields(json!({"codigo": "A", "nombre": "Torno"}))).await.unwrap();
    store.seed(&legacy, "L2", fields(json!({"codigo": "B", "nombre": "Fresa"}))).await.unwrap();
    store.seed(&master, "M1", fields(json!({"codigo": "A"}))).await.unwrap();
    store.seed(&skill, "S1", fields(json!({"machine_id": "L1"}))).await.unwrap();

    let pair = SourcePair::new("machines", &legacy, &master).key(KeyExtractor::back_pointer("legacy_id", "legacy_id"))
                                                           .key(KeyExtractor::field("code", "codigo", "codigo"))
                                                           .reference(ReferenceSpec::scalar(&skill, "machine_id", OrphanPolicy::ClearField));
    let mut engine = MigrationEngine::new(EntityRegistry::with_default(store.clone()),
                                          BatchController::new(BatchConfig::immediate(10)),
                                          InMemoryRunLog::default());
    let run = engine.run_pair(&pair).await.unwrap();
    assert_eq!(run.report.updated, 1);
    assert_eq!(run.report.migrated, 1);
    assert!(run.is_clean());

    let s1 = store.get(&EntityType::new(skill), &RecordId::from("S1")).await.unwrap();
    assert_eq!(s1.get("machine_id"), Some(&json!("M1")));

    let again = engine.run_pair(&pair).await.unwrap();
    assert_eq!(again.report.skipped, 2);
}
