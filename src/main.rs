//! Demo en memoria: siembra datos del dominio, ejecuta todos los pares a
//! través del manejador y muestra la respuesta y la auditoría final.
use std::sync::Arc;

use merge_core::{audit_obsolete, BatchController, EntityRegistry, InMemoryRecordStore, InMemoryRunLog, MigrationEngine};
use mergeflow_rust::demo::seed_demo;
use mergeflow_rust::{MigrationHandler, MigrationRequest, Role, StaticAuthorizer, CONFIG};

#[tokio::main]
async fn main() {
    if let Err(e) = merge_domain::validate_catalog() {
        eprintln!("[demo] catálogo inválido: {e}");
        std::process::exit(2);
    }

    let store = Arc::new(InMemoryRecordStore::new());
    seed_demo(&store).await;
    let registry = EntityRegistry::with_default(store.clone());
    let engine = MigrationEngine::new(registry.clone(),
                                      BatchController::new(CONFIG.migration.batch_config()),
                                      InMemoryRunLog::default());
    let auth = StaticAuthorizer::new().with("demo-admin", "admin", Role::Admin);
    let handler = MigrationHandler::new(auth, merge_domain::catalog(), engine);

    let response = handler.handle(MigrationRequest { credential: Some("demo-admin".into()),
                                                     pair: None })
                          .await;
    println!("status={}", response.status);
    match serde_json::to_string_pretty(&response.body) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("[demo] serialización: {e}"),
    }

    // Segunda corrida: todo debe quedar como skipped
    let again = handler.handle(MigrationRequest { credential: Some("demo-admin".into()),
                                                  pair: None })
                       .await;
    println!("re-run: migrated={} updated={} skipped={}",
             again.body["migrated"], again.body["updated"], again.body["skipped"]);

    let obsolete = audit_obsolete(&registry, merge_domain::OBSOLETE_ENTITY_TYPES).await;
    println!("obsolete: {} tipos vacíos de {}", obsolete.empty.len(), obsolete.entries.len());
    if !response.is_success() {
        std::process::exit(1);
    }
}
