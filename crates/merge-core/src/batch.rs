//! Control de lotes y ritmo.
//!
//! Parte colecciones grandes en chunks de tamaño fijo; dentro de un chunk
//! todas las llamadas al store se lanzan concurrentemente y se esperan en
//! grupo; entre chunks se duerme un retardo fijo para no superar el límite de
//! peticiones del store. Cada fallo queda aislado en su propio `Result`: un
//! error nunca aborta los chunks restantes.
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};

use crate::constants::{DEFAULT_CHUNK_DELAY_MS, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    /// Reintentos extra para errores `is_retryable`.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE,
               chunk_delay: Duration::from_millis(DEFAULT_CHUNK_DELAY_MS),
               max_retries: DEFAULT_MAX_RETRIES,
               retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS) }
    }
}

impl BatchConfig {
    /// Sin retardos ni reintentos (tests).
    pub fn immediate(chunk_size: usize) -> Self {
        Self { chunk_size,
               chunk_delay: Duration::ZERO,
               max_retries: 0,
               retry_backoff: Duration::ZERO }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchController {
    config: BatchConfig,
}

impl BatchController {
    pub fn new(mut config: BatchConfig) -> Self {
        if config.chunk_size == 0 {
            config.chunk_size = 1;
        }
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    /// Retardo entre chunks.
    pub async fn pause(&self) {
        if !self.config.chunk_delay.is_zero() {
            tokio::time::sleep(self.config.chunk_delay).await;
        }
    }

    /// Reintento con backoff lineal para errores transitorios.
    pub async fn with_retry<O, F, Fut>(&self, mut f: F) -> Result<O, StoreError>
        where F: FnMut() -> Fut,
              Fut: Future<Output = Result<O, StoreError>>
    {
        let mut attempts = 0u32;
        loop {
            match f().await {
                Err(e) if e.is_retryable() && attempts < self.config.max_retries => {
                    let delay = self.config.retry_backoff * (attempts + 1);
                    warn!("retryable store error (attempt {}): {} -> sleeping {}ms",
                          attempts + 1,
                          e,
                          delay.as_millis());
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempts += 1;
                }
                r => return r,
            }
        }
    }

    /// Ejecuta `op` para todos los elementos de un chunk concurrentemente.
    /// El orden de los resultados es el de `chunk`.
    pub async fn run_chunk<T, O, F, Fut>(&self, chunk: &[T], op: &F) -> Vec<Result<O, StoreError>>
        where T: Clone,
              F: Fn(T) -> Fut,
              Fut: Future<Output = Result<O, StoreError>>
    {
        join_all(chunk.iter().map(|item| self.with_retry(|| op(item.clone())))).await
    }

    /// Recorre `items` chunk a chunk con pausa entre chunks.
    pub async fn run<T, O, F, Fut>(&self, items: &[T], op: F) -> Vec<Result<O, StoreError>>
        where T: Clone,
              F: Fn(T) -> Fut,
              Fut: Future<Output = Result<O, StoreError>>
    {
        let mut out = Vec::with_capacity(items.len());
        let total = items.len().div_ceil(self.config.chunk_size);
        for (i, chunk) in items.chunks(self.config.chunk_size).enumerate() {
            if i > 0 {
                self.pause().await;
            }
            let results = self.run_chunk(chunk, &op).await;
            debug!("chunk {}/{} done: ok={} err={}",
                   i + 1,
                   total,
                   results.iter().filter(|r| r.is_ok()).count(),
                   results.iter().filter(|r| r.is_err()).count());
            out.extend(results);
        }
        out
    }
}
