//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone una estructura
//! inmutable (`CONFIG`) con los parámetros de ritmo del motor.
use std::env;
use std::time::Duration;

use merge_core::BatchConfig;
use once_cell::sync::Lazy;

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub migration: MigrationSettings,
}

/// Parámetros de lotes y reintentos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Registros por chunk (`MIGRATION_CHUNK_SIZE`).
    pub chunk_size: usize,
    /// Pausa entre chunks en ms (`MIGRATION_CHUNK_DELAY_MS`).
    pub chunk_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        let d = BatchConfig::default();
        Self { chunk_size: d.chunk_size,
               chunk_delay_ms: d.chunk_delay.as_millis() as u64,
               max_retries: d.max_retries,
               retry_backoff_ms: d.retry_backoff.as_millis() as u64 }
    }
}

impl MigrationSettings {
    /// Lee las variables de entorno; los valores ausentes o ilegibles usan el
    /// valor por defecto.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self { chunk_size: parse_var("MIGRATION_CHUNK_SIZE").filter(|n| *n > 0).unwrap_or(d.chunk_size),
               chunk_delay_ms: parse_var("MIGRATION_CHUNK_DELAY_MS").unwrap_or(d.chunk_delay_ms),
               max_retries: parse_var("MIGRATION_MAX_RETRIES").unwrap_or(d.max_retries),
               retry_backoff_ms: parse_var("MIGRATION_RETRY_BACKOFF_MS").unwrap_or(d.retry_backoff_ms) }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig { chunk_size: self.chunk_size,
                      chunk_delay: Duration::from_millis(self.chunk_delay_ms),
                      max_retries: self.max_retries,
                      retry_backoff: Duration::from_millis(self.retry_backoff_ms) }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
    AppConfig { migration: MigrationSettings::from_env() }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let s = MigrationSettings::default();
        assert_eq!((s.chunk_size, s.chunk_delay_ms, s.max_retries, s.retry_backoff_ms), (20, 250, 2, 50));
        assert_eq!(s.batch_config(), BatchConfig::default());
    }

    #[test]
    fn batch_config_converts_millis() {
        let s = MigrationSettings { chunk_size: 5,
                                    chunk_delay_ms: 0,
                                    max_retries: 1,
                                    retry_backoff_ms: 10 };
        let b = s.batch_config();
        assert_eq!(b.chunk_size, 5);
        assert!(b.chunk_delay.is_zero());
        assert_eq!(b.retry_backoff, Duration::from_millis(10));
    }
}
