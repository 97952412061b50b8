use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    env_opt(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

// ── Top-level config ──────────────────────────────────────────

/// Process configuration, assembled from environment variables.
///
/// Every required setting must be present or [`Config::from_env`] fails and
/// the process never reaches the queue or the detection core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub sink: SinkConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telemetry: TelemetryConfig::from_env()?,
            sink: SinkConfig::from_env()?,
            queue: QueueConfig::from_env()?,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  telemetry: cluster={}, api_url={}", self.telemetry.cluster_id, self.telemetry.api_url);
        tracing::info!("  sink:      account={}, url={}", self.sink.account_id, self.sink.base_url);
        tracing::info!("  queue:     name={}, redis={}", self.queue.name, self.queue.redis.describe());
    }
}

// ── Telemetry source ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Identifier of the monitored cluster.
    pub cluster_id: String,
    /// API token used to authenticate against the cluster API.
    pub api_token: String,
    /// Base URL of the cluster API.
    pub api_url: String,
}

impl TelemetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cluster_id: env_required("TELEMETRY_CLUSTER_ID")?,
            api_token: env_required("TELEMETRY_API_TOKEN")?,
            api_url: env_or("TELEMETRY_API_URL", "https://work.withpixie.ai/api"),
        })
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Account identifier on the ingestion endpoint.
    pub account_id: String,
    /// Insert key sent as `X-Insert-Key` on every submission.
    pub insert_key: String,
    /// Base URL of the ingestion endpoint.
    pub base_url: String,
}

impl SinkConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            account_id: env_required("SINK_ACCOUNT_ID")?,
            insert_key: env_required("SINK_INSERT_KEY")?,
            base_url: env_or("SINK_URL", "https://insights-collector.newrelic.com"),
        })
    }
}

// ── Queue / Redis ─────────────────────────────────────────────

/// How the queue's backing Redis is addressed.
///
/// With `REDIS_SENTINEL` set, the master address is discovered at connect
/// time from the three monitor endpoints; otherwise `REDIS_URL` is used
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RedisAddr {
    Direct {
        url: String,
    },
    Sentinel {
        hosts: Vec<String>,
        port: u16,
        master_name: String,
    },
}

impl RedisAddr {
    /// Redacted, single-line description for startup logs.
    pub fn describe(&self) -> String {
        match self {
            RedisAddr::Direct { url } => url.clone(),
            RedisAddr::Sentinel { hosts, port, master_name } => {
                format!("sentinel({} monitors, port {port}, master {master_name})", hosts.len())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name; also the prefix for every Redis key the substrate owns.
    pub name: String,
    pub redis: RedisAddr,
    pub redis_password: Option<String>,
}

impl QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let redis = if env_opt("REDIS_SENTINEL").is_some() {
            let port_raw = env_required("REDIS_SENTINEL_PORT")?;
            let port = port_raw.parse().map_err(|_| ConfigError::Invalid {
                key: "REDIS_SENTINEL_PORT".to_string(),
                reason: format!("not a port number: {port_raw}"),
            })?;
            RedisAddr::Sentinel {
                hosts: vec![
                    env_required("REDIS_SENTINEL_HOST1")?,
                    env_required("REDIS_SENTINEL_HOST2")?,
                    env_required("REDIS_SENTINEL_HOST3")?,
                ],
                port,
                master_name: env_required("REDIS_SENTINEL_MASTER")?,
            }
        } else {
            RedisAddr::Direct {
                url: env_required("REDIS_URL")?,
            }
        };

        Ok(Self {
            name: env_or("QUEUE_NAME", "wiretrap"),
            redis,
            redis_password: env_opt("REDIS_PASSWORD"),
        })
    }
}
