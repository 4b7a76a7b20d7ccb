//! Configuration management for triviad.
//!
//! Loads settings from /etc/triviad/config.toml or uses defaults.
//! Every field has a default so a partial (or missing) file still
//! yields a working daemon.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use trivia_common::engine::EngineConfig;
use trivia_common::generator::GeneratorConfig;
use trivia_common::resolver::ResolverConfig;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/triviad/config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub advisory_lock: AdvisoryLockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Text-generation collaborator binding
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Generation attempts per resolution
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Budget for one generation attempt, in milliseconds
    /// (sane range 1500-8000 depending on deployment profile)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Warm pool capacity per category:difficulty key
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Edge cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Stale-while-revalidate window past the TTL, in seconds
    #[serde(default = "default_cache_stale_secs")]
    pub cache_stale_secs: u64,

    /// Server-side cap on the caller's recent-history window
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            pool_capacity: default_pool_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_stale_secs: default_cache_stale_secs(),
            recent_window: default_recent_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_enabled")]
    pub enabled: bool,
    #[serde(default = "default_dedup_db_path")]
    pub db_path: String,
    #[serde(default = "default_dedup_ttl_days")]
    pub ttl_days: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: default_dedup_enabled(),
            db_path: default_dedup_db_path(),
            ttl_days: default_dedup_ttl_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisoryLockConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_lock_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for AdvisoryLockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_ms: default_lock_ttl_ms(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_temperature() -> f64 {
    0.9
}

fn default_max_tries() -> u32 {
    3
}

fn default_attempt_timeout_ms() -> u64 {
    4000
}

fn default_pool_capacity() -> usize {
    6
}

fn default_cache_ttl_secs() -> u64 {
    120
}

fn default_cache_stale_secs() -> u64 {
    300
}

fn default_recent_window() -> usize {
    50
}

fn default_dedup_enabled() -> bool {
    true
}

fn default_dedup_db_path() -> String {
    "/var/lib/triviad/dedup.db".to_string()
}

fn default_dedup_ttl_days() -> u64 {
    14
}

fn default_lock_ttl_ms() -> u64 {
    2500
}

impl Config {
    /// Load from the default path, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    /// Load from `path`; a missing or malformed file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Malformed config at {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_tries: self.pipeline.max_tries,
            attempt_budget: Duration::from_millis(self.pipeline.attempt_timeout_ms),
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            endpoint: self.generator.endpoint.clone(),
            model: self.generator.model.clone(),
            api_key: self.generator.api_key.clone(),
            temperature: self.generator.temperature,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            cache_ttl: Duration::from_secs(self.pipeline.cache_ttl_secs),
            write_cache: true,
            advisory_lock_enabled: self.advisory_lock.enabled,
            advisory_lock_ttl: Duration::from_millis(self.advisory_lock.ttl_ms),
        }
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup.ttl_days * 24 * 60 * 60)
    }
}
