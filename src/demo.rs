//! Datos de ejemplo: empleados, máquinas y habilidades con duplicados,
//! referencias legacy y algún huérfano.
use merge_core::{Fields, InMemoryRecordStore};
use serde_json::{json, Value};

fn fields(v: Value) -> Fields {
    match v {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

pub async fn seed_demo(store: &InMemoryRecordStore) {
    store.seed("Employee",
               vec![("E1",
                     fields(json!({"codigo_empleado": "E-001", "nombre": "Ana", "apellidos": "García",
                                   "email": "ana@planta.es", "direccion": "Calle X", "password_hash": "x"}))),
                    ("E2", fields(json!({"nombre": "Luis", "apellidos": "Pérez", "email": "LUIS@planta.es"}))),
                    ("E3", fields(json!({"nombre": "Marta", "apellidos": "Ruiz", "telefono": "600000000"}))),
                    ("E4", fields(json!({"telefono": "611111111"})))])
         .await;
    store.seed("EmployeeMasterDatabase",
               vec![("EM1", fields(json!({"codigo_empleado": "E-001", "nombre": "Ana", "apellidos": "García", "direccion": ""}))),
                    ("EM2", fields(json!({"nombre": "Luis", "apellidos": "Pérez", "email": "luis@planta.es", "activo": true})))])
         .await;
    store.seed("Absence",
               vec![("A1", fields(json!({"employee_id": "E1", "motivo": "vacaciones"}))),
                    ("A2", fields(json!({"employee_id": "E99", "motivo": "baja"})))])
         .await;
    store.seed("DailyPlanning",
               vec![("P1", fields(json!({"fecha": "2025-01-15", "operador_1": "E1", "operador_2": "E2", "operador_3": "E99"})))])
         .await;
    store.seed("Team", vec![("T1", fields(json!({"nombre": "Turno A", "member_ids": ["E1", "E2", "E3", "E99"]})))])
         .await;

    store.seed("Machine",
               vec![("L1", fields(json!({"codigo": "MC-1", "nombre": "Torno CNC", "ubicacion": "Nave 1"}))),
                    ("L2", fields(json!({"codigo": "MC-2", "nombre": "Fresadora"})))])
         .await;
    store.seed("MachineMasterDatabase", vec![("MM1", fields(json!({"codigo": "MC-1", "nombre": "Torno CNC"})))])
         .await;
    store.seed("MaintenanceOrder", vec![("O1", fields(json!({"machine_id": "L2", "assigned_to": "E2"})))])
         .await;
    store.seed("ProductionLine", vec![("PL1", fields(json!({"nombre": "Línea 1", "machine_ids": ["L1", "L2"]})))])
         .await;

    store.seed("MachineSkill", vec![("MS1", fields(json!({"machine_id": "L1", "employee_id": "E1", "nivel": 3})))])
         .await;
    store.seed("SkillCertification", vec![("C1", fields(json!({"skill_id": "MS1", "vence": "2026-01-01"})))])
         .await;
}
