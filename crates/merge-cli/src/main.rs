use std::sync::Arc;

use merge_core::{audit_obsolete, BatchController, EntityRegistry, MigrationEngine};
use merge_persistence::{PgRecordStore, PgRunLog, PoolProvider};
use mergeflow_rust::CONFIG;
use serde::Serialize;
use uuid::Uuid;

const USAGE: &str = "Uso: merge-cli migrate --pair <NOMBRE> | migrate-all | verify --pair <NOMBRE> | obsolete | events --run <UUID>";

type PgEngine = MigrationEngine<PgRunLog<PoolProvider>>;

/// Valor de `--flag <valor>` si aparece.
fn flag(args: &[String], name: &str) -> Option<String> {
    let mut i = 2;
    while i < args.len() {
        if args[i] == name {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("[merge-cli] serialización: {e}");
            std::process::exit(5);
        }
    }
}

fn pool_provider(cmd: &str) -> PoolProvider {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("[merge {cmd}] requiere DATABASE_URL para operar contra backend persistente");
        std::process::exit(4);
    }
    match merge_persistence::build_pool_from_env() {
        Ok(pool) => PoolProvider { pool },
        Err(e) => {
            eprintln!("[merge {cmd}] pool error: {e}");
            std::process::exit(5);
        }
    }
}

fn pg_engine(cmd: &str) -> PgEngine {
    let provider = pool_provider(cmd);
    let registry = EntityRegistry::with_default(Arc::new(PgRecordStore::new(provider.clone())));
    MigrationEngine::new(registry,
                         BatchController::new(CONFIG.migration.batch_config()),
                         PgRunLog::new(provider))
}

fn pair_or_exit(cmd: &str, args: &[String]) -> merge_core::SourcePair {
    let Some(name) = flag(args, "--pair") else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    match merge_domain::pair(&name) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[merge {cmd}] {e} (disponibles: {})", merge_domain::pair_names().join(", "));
            std::process::exit(4);
        }
    }
}

#[tokio::main]
async fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }
    if let Err(e) = merge_domain::validate_catalog() {
        eprintln!("[merge-cli] catálogo inválido: {e}");
        std::process::exit(5);
    }

    match args[1].as_str() {
        "migrate" => {
            let pair = pair_or_exit("migrate", &args);
            let mut engine = pg_engine("migrate");
            let result = engine.run_pair(&pair).await;
            let failed_appends = engine.run_log().failed_appends();
            if failed_appends > 0 {
                eprintln!("[merge migrate] {failed_appends} eventos del run log no se pudieron guardar");
            }
            match result {
                Ok(report) => {
                    print_json(&report);
                    std::process::exit(if report.is_clean() { 0 } else { 3 });
                }
                Err(failure) => {
                    eprintln!("error: {failure}");
                    print_json(&failure.partial);
                    std::process::exit(5);
                }
            }
        }
        "migrate-all" => {
            let mut engine = pg_engine("migrate-all");
            match engine.run_all(&merge_domain::catalog()).await {
                Ok(reports) => {
                    print_json(&reports);
                    std::process::exit(if reports.iter().all(|r| r.is_clean()) { 0 } else { 3 });
                }
                Err(failure) => {
                    eprintln!("error: {failure} ({} pares completados)", failure.completed.len());
                    print_json(&failure.completed);
                    print_json(&failure.partial);
                    std::process::exit(5);
                }
            }
        }
        "verify" => {
            let pair = pair_or_exit("verify", &args);
            let engine = pg_engine("verify");
            match engine.verify(&pair).await {
                Ok(snapshot) => {
                    print_json(&snapshot);
                    std::process::exit(if snapshot.is_clean() { 0 } else { 3 });
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(5);
                }
            }
        }
        "obsolete" => {
            let engine = pg_engine("obsolete");
            let report = audit_obsolete(engine.registry(), merge_domain::OBSOLETE_ENTITY_TYPES).await;
            print_json(&report);
            std::process::exit(if report.unreadable.is_empty() { 0 } else { 5 });
        }
        "events" => {
            let Some(run_id) = flag(&args, "--run").and_then(|s| Uuid::parse_str(&s).ok()) else {
                eprintln!("Uso: merge-cli events --run <UUID>");
                std::process::exit(2);
            };
            let run_log = PgRunLog::new(pool_provider("events"));
            match run_log.try_list(run_id) {
                Ok(events) if events.is_empty() => {
                    eprintln!("[merge events] corrida no encontrada: {run_id}");
                    std::process::exit(4);
                }
                Ok(events) => print_json(&events),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(5);
                }
            }
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_reads_following_value() {
        let a = argv(&["merge-cli", "migrate", "--pair", "employees"]);
        assert_eq!(flag(&a, "--pair").as_deref(), Some("employees"));
        assert_eq!(flag(&a, "--run"), None);
        let dangling = argv(&["merge-cli", "verify", "--pair"]);
        assert_eq!(flag(&dangling, "--pair"), None);
    }
}
