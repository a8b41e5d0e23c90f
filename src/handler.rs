//! Superficie de invocación: una petición por migración.
//!
//! El llamante debe tener rol elevado (lo decide un `Authorizer` externo).
//! Sin par se ejecuta el catálogo completo en orden de dependencias y los
//! contadores se agregan. Respuestas:
//! - éxito: `200 { success: true, processed, migrated, updated, skipped, errors }`
//! - no autorizado: `403`, par desconocido: `400`, con `{ success: false, error }`
//! - fallo fatal: `500`, con el error y los contadores de los pares que
//!   alcanzaron a ejecutarse antes del aborto.
use async_trait::async_trait;
use log::{error, info, warn};
use merge_core::{MigrationEngine, RunLog, RunReport, SourcePair};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Identidad autenticada del llamante.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_elevated(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Colaborador externo que resuelve la credencial de una petición.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(None)` si no hay sesión válida.
    async fn authenticate(&self, credential: Option<&str>) -> Result<Option<Caller>, CoreError>;
}

/// Autorizador con un mapa fijo credencial → llamante (demo y tests).
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    callers: Vec<(String, Caller)>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential: &str, user_id: &str, role: Role) -> Self {
        self.callers.push((credential.to_string(),
                           Caller { user_id: user_id.to_string(),
                                    role }));
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authenticate(&self, credential: Option<&str>) -> Result<Option<Caller>, CoreError> {
        let Some(credential) = credential else { return Ok(None) };
        Ok(self.callers.iter().find(|(c, _)| c == credential).map(|(_, caller)| caller.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub credential: Option<String>,
    /// Nombre del par; `None` ejecuta todos.
    pub pair: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationResponse {
    pub status: u16,
    pub body: Value,
}

/// Contadores agregados, errores y resumen por corrida.
fn summarize(reports: &[RunReport]) -> Map<String, Value> {
    let mut errors = Vec::new();
    let (mut processed, mut migrated, mut updated, mut skipped) = (0usize, 0usize, 0usize, 0usize);
    for r in reports {
        processed += r.report.processed;
        migrated += r.report.migrated;
        updated += r.report.updated;
        skipped += r.report.skipped;
        errors.extend(r.report.errors.iter().map(|e| json!({"pair": r.pair, "context": e.context, "message": e.message})));
    }
    let runs: Vec<Value> = reports.iter()
                                  .map(|r| {
                                      json!({
                                          "pair": r.pair,
                                          "runId": r.run_id.to_string(),
                                          "phase": r.phase.as_str(),
                                          "clean": r.is_clean(),
                                          "fingerprint": r.fingerprint,
                                      })
                                  })
                                  .collect();
    let mut body = Map::new();
    body.insert("processed".into(), json!(processed));
    body.insert("migrated".into(), json!(migrated));
    body.insert("updated".into(), json!(updated));
    body.insert("skipped".into(), json!(skipped));
    body.insert("errors".into(), Value::Array(errors));
    body.insert("runs".into(), Value::Array(runs));
    body
}

impl MigrationResponse {
    /// Agrega los contadores de todas las corridas.
    pub fn success(reports: &[RunReport]) -> Self {
        let mut body = summarize(reports);
        body.insert("success".into(), json!(true));
        Self { status: 200,
               body: Value::Object(body) }
    }

    /// Sin corridas: sólo `{ success: false, error }`.
    pub fn failure(err: &CoreError) -> Self {
        Self::aborted(err, &[])
    }

    /// Fallo con lo que alcanzó a ejecutarse (pares completados y el parcial).
    pub fn aborted(err: &CoreError, reports: &[RunReport]) -> Self {
        let mut body = match reports.is_empty() {
            true => Map::new(),
            false => summarize(reports),
        };
        body.insert("success".into(), json!(false));
        body.insert("error".into(), json!(err.to_string()));
        Self { status: err.status(),
               body: Value::Object(body) }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Fallo de una petición junto con las corridas que llegaron a ejecutarse.
struct Rejected {
    error: CoreError,
    reports: Vec<RunReport>,
}

impl From<CoreError> for Rejected {
    fn from(error: CoreError) -> Self {
        Self { error,
               reports: Vec::new() }
    }
}

/// Manejador de peticiones de migración. Serializa las corridas: el motor
/// queda bloqueado mientras una corrida está en curso.
pub struct MigrationHandler<A, L>
    where L: RunLog
{
    authorizer: A,
    pairs: Vec<SourcePair>,
    engine: Mutex<MigrationEngine<L>>,
}

impl<A, L> MigrationHandler<A, L>
    where A: Authorizer,
          L: RunLog
{
    pub fn new(authorizer: A, pairs: Vec<SourcePair>, engine: MigrationEngine<L>) -> Self {
        Self { authorizer,
               pairs,
               engine: Mutex::new(engine) }
    }

    pub async fn handle(&self, request: MigrationRequest) -> MigrationResponse {
        match self.execute(&request).await {
            Ok(reports) => {
                info!("migration request ok: pair={:?} runs={}", request.pair, reports.len());
                MigrationResponse::success(&reports)
            }
            Err(Rejected { error: e, reports }) => {
                match e.status() {
                    500 => error!("migration request failed after {} runs: {e}", reports.len()),
                    _ => warn!("migration request rejected: {e}"),
                }
                MigrationResponse::aborted(&e, &reports)
            }
        }
    }

    async fn execute(&self, request: &MigrationRequest) -> Result<Vec<RunReport>, Rejected> {
        let caller = self.authorizer
                         .authenticate(request.credential.as_deref())
                         .await
                         .map_err(|e| CoreError::Unauthorized(e.to_string()))?
                         .ok_or_else(|| CoreError::Unauthorized("sesión requerida".into()))?;
        if !caller.is_elevated() {
            return Err(CoreError::Unauthorized(format!("{} requiere rol admin", caller.user_id)).into());
        }

        let mut engine = self.engine.lock().await;
        let result = match request.pair.as_deref() {
            Some(name) => engine.run_named(&self.pairs, name).await.map(|r| vec![r]),
            None => engine.run_all(&self.pairs).await,
        };
        result.map_err(|failure| {
                  let mut reports = failure.completed;
                  // un parcial sin par es un fallo de configuración previo a la corrida
                  if !failure.partial.pair.is_empty() {
                      reports.push(*failure.partial);
                  }
                  Rejected { error: CoreError::Migration(failure.error),
                             reports }
              })
    }
}
