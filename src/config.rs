use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStorage, FileStorage, MemoryStorage, RedisStorage, StorageError};
use crate::service::RetryConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub indexer: IndexerConfig,
    pub sdk: SdkConfig,
    pub cache: CacheConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub rust_log: String,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SdkConfig {
    pub rpc_url: String,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    File,
    Redis,
}

impl std::str::FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "file" => Ok(CacheBackend::File),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(anyhow::anyhow!("unknown CACHE_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub redis_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    pub interval_ms: u64,
    /// DAOs whose proposal and transfer views are kept warm in the background
    pub watch_daos: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("missing environment variable {}", key))
        };
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let indexer_url = required("INDEXER_URL")?;
        let sdk_rpc_url = required("SDK_RPC_URL")?;
        let port: u16 = or("PORT", "8080").parse()?;
        let host = or("HOST", "127.0.0.1");
        let rust_log = or("RUST_LOG", "dao_pending_overlay=info");
        let cors_allowed_origin = var("CORS_ALLOWED_ORIGIN");
        let network = or("NETWORK", "mainnet");
        let indexer_timeout_ms: u64 = or("INDEXER_TIMEOUT_MS", "10000").parse()?;
        let sdk_max_retries: u32 = or("SDK_MAX_RETRIES", "3").parse()?;
        let sdk_initial_delay_ms: u64 = or("SDK_INITIAL_DELAY_MS", "1000").parse()?;
        let sdk_max_delay_ms: u64 = or("SDK_MAX_DELAY_MS", "10000").parse()?;
        let cache_backend: CacheBackend = or("CACHE_BACKEND", "file").parse()?;
        let cache_dir = PathBuf::from(or("CACHE_DIR", ".pending-cache"));
        let redis_url = var("REDIS_URL");
        let poll_interval_ms: u64 = or("POLL_INTERVAL_MS", "15000").parse()?;
        let watch_daos: Vec<String> = or("WATCH_DAOS", "")
            .split(',')
            .map(str::trim)
            .filter(|dao| !dao.is_empty())
            .map(str::to_string)
            .collect();

        if poll_interval_ms == 0 {
            anyhow::bail!("POLL_INTERVAL_MS must be greater than zero");
        }
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            anyhow::bail!("CACHE_BACKEND=redis requires REDIS_URL");
        }

        Ok(Config {
            server: ServerConfig {
                port,
                host,
                rust_log,
                cors_allowed_origin,
            },
            network: NetworkConfig { name: network },
            indexer: IndexerConfig {
                url: indexer_url,
                timeout_ms: indexer_timeout_ms,
            },
            sdk: SdkConfig {
                rpc_url: sdk_rpc_url,
                max_retries: sdk_max_retries,
                initial_delay_ms: sdk_initial_delay_ms,
                max_delay_ms: sdk_max_delay_ms,
            },
            cache: CacheConfig {
                backend: cache_backend,
                dir: cache_dir,
                redis_url,
            },
            poll: PollConfig {
                interval_ms: poll_interval_ms,
                watch_daos,
            },
        })
    }
}

impl IndexerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SdkConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay_ms: self.initial_delay_ms,
            max_delay_ms: self.max_delay_ms,
            ..RetryConfig::default()
        }
    }
}

impl CacheConfig {
    /// Open the configured storage backend
    pub fn open_storage(&self) -> Result<Arc<dyn CacheStorage>, StorageError> {
        Ok(match self.backend {
            CacheBackend::Memory => Arc::new(MemoryStorage::new()),
            CacheBackend::File => Arc::new(FileStorage::new(self.dir.clone())?),
            CacheBackend::Redis => {
                let url = self.redis_url.as_deref().unwrap_or("redis://127.0.0.1/");
                Arc::new(RedisStorage::new(url, "dao-pending")?)
            }
        })
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
