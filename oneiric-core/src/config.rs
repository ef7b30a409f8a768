use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct OneiricConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub gamify: GamifyConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: u32,
    /// When true, embedding failures degrade to storing the dream without a
    /// vector instead of failing the request; the backfill worker fills the
    /// gap later.
    pub fallback_to_none: bool,
    pub backfill_enabled: bool,
    pub backfill_interval_minutes: u64,
    pub backfill_batch_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InterpreterConfig {
    pub model: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GamifyConfig {
    pub xp_per_dream: u64,
}

impl Default for GamifyConfig {
    fn default() -> Self {
        Self { xp_per_dream: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8790,
        }
    }
}

impl OneiricConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
