use std::sync::Arc;

use merge_core::{plan_order, BatchConfig, BatchController, EntityRegistry, Fields, InMemoryRecordStore, InMemoryRunLog,
                 MigrationEngine};
use merge_domain::{catalog, employees, machines, pair, pair_names, validate_catalog, DomainError};
use serde_json::{json, Value};

fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap_or_default()
}

#[test]
fn catalog_is_valid_and_ordered() {
    validate_catalog().unwrap();
    let pairs = catalog();
    let order: Vec<&str> = plan_order(&pairs).unwrap().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(order, vec!["employees", "machines", "machine_skills"]);
    assert_eq!(pair_names().len(), 3);
}

#[test]
fn unknown_pair_is_reported() {
    assert_eq!(pair("robots").unwrap_err(), DomainError::UnknownPair("robots".into()));
    assert_eq!(pair("machines").unwrap().master_type.as_str(), machines::MACHINE_MASTER_TYPE);
}

#[test]
fn planning_uses_eight_operator_slots() {
    let p = employees::pair();
    let planning = p.references.iter().find(|r| r.entity_type.as_str() == "DailyPlanning").unwrap();
    assert_eq!(planning.field_names.len(), 8);
    assert_eq!(planning.field_names[7], "operador_8");
}

#[tokio::test]
async fn employees_merge_by_email_and_name() {
    let store = Arc::new(InMemoryRecordStore::new());
    store.seed("Employee",
               vec![("E1", fields(json!({"nombre": "Ana", "apellidos": "García", "email": "ANA@planta.es", "telefono": "600"}))),
                    ("E2", fields(json!({"nombre": "José", "apellidos": "Pérez López", "telefono": "611"}))),
                    ("E3", fields(json!({"nombre": "Luis", "apellidos": "Mora", "codigo_empleado": "X-9"})))])
         .await;
    store.seed("EmployeeMasterDatabase",
               vec![("M1", fields(json!({"nombre": "Ana", "apellidos": "Garcia", "email": "ana@planta.es"}))),
                    ("M2", fields(json!({"nombre": "JOSE", "apellidos": "perez lopez"}))),
                    ("M3", fields(json!({"nombre": "Luis", "apellidos": "Mora", "codigo_empleado": "X-9", "activo": false})))])
         .await;
    store.seed("DailyPlanning", vec![("P1", fields(json!({"operador_1": "E1", "operador_2": "E2", "operador_3": "E404"})))]).await;
    store.seed("Team", vec![("T1", fields(json!({"member_ids": ["E2", "E1"]})))]).await;

    let mut engine = MigrationEngine::new(EntityRegistry::with_default(store.clone()),
                                          BatchController::new(BatchConfig::immediate(5)),
                                          InMemoryRunLog::default());
    let run = engine.run_pair(&employees::pair()).await.unwrap();
    assert_eq!(run.report.processed, 3);
    // E1 por email, E2 por nombre normalizado, E3 no casa con un master de baja
    assert_eq!(run.report.updated, 2);
    assert_eq!(run.report.migrated, 1);
    assert!(run.is_clean());

    let planning = store.all("DailyPlanning").await;
    assert_eq!(planning[0].get("operador_1"), Some(&json!("M1")));
    assert_eq!(planning[0].get("operador_2"), Some(&json!("M2")));
    assert_eq!(planning[0].get("operador_3"), Some(&Value::Null));
    let teams = store.all("Team").await;
    assert_eq!(teams[0].get("member_ids"), Some(&json!(["M2", "M1"])));
}

fn skills_store_seed() -> Vec<(&'static str, Vec<(&'static str, Fields)>)> {
    vec![("Employee", vec![("E1", fields(json!({"nombre": "Ana", "apellidos": "García", "email": "ana@planta.es"})))]),
         ("EmployeeMasterDatabase", vec![("EM1", fields(json!({"nombre": "Ana", "apellidos": "García", "email": "ana@planta.es"})))]),
         ("Machine", vec![("L1", fields(json!({"codigo": "MC-1", "nombre": "Torno"})))]),
         ("MachineMasterDatabase", vec![("MM1", fields(json!({"codigo": "MC-1", "nombre": "Torno"})))]),
         ("MachineSkill", vec![("S1", fields(json!({"machine_id": "L1", "employee_id": "E1", "nivel": 3})))]),
         // master creado a mano antes de migrar, todavía con ids legacy
         ("MachineSkillMasterDatabase", vec![("SM1", fields(json!({"machine_id": "L1", "employee_id": "E1"})))])]
}

#[tokio::test]
async fn whole_catalog_rewrites_skill_keys_and_merges_into_existing_skill() {
    let store = Arc::new(InMemoryRecordStore::new());
    for (entity_type, rows) in skills_store_seed() {
        store.seed(entity_type, rows).await;
    }
    let mut engine = MigrationEngine::new(EntityRegistry::with_default(store.clone()),
                                          BatchController::new(BatchConfig::immediate(5)),
                                          InMemoryRunLog::default());
    let runs = engine.run_all(&catalog()).await.unwrap();
    assert!(runs.iter().all(|r| r.is_clean()), "{:?}", runs.iter().map(|r| &r.verification).collect::<Vec<_>>());

    // los masters de habilidad ya apuntan a masters vivos
    let skill_masters = store.all(machines::SKILL_MASTER_TYPE).await;
    assert_eq!(skill_masters.len(), 1);
    assert_eq!(skill_masters[0].get("machine_id"), Some(&json!("MM1")));
    assert_eq!(skill_masters[0].get("employee_id"), Some(&json!("EM1")));

    // la habilidad legacy casa por clave compuesta con el master existente
    let skills = runs.iter().find(|r| r.pair == machines::SKILLS_PAIR).unwrap();
    assert_eq!(skills.report.migrated, 0);
    assert_eq!(skills.report.updated + skills.report.skipped, 1);
    assert_eq!(skills.identity[0].new_id.as_str(), "SM1");
}
