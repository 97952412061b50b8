//! Redis-backed job store.
//!
//! Layout, all keys under the queue-name prefix:
//! - `{name}:pending`   — list of job ids, LPUSH on enqueue, RPOP on pop
//! - `{name}:job:{id}`  — job JSON, kept until the job is removed
//! - `{name}:schedule`  — hash of schedule-entry id to entry JSON
//!
//! The master address is either taken from `REDIS_URL` directly or
//! discovered from the sentinel monitors at connect time.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wiretrap_core::config::{QueueConfig, RedisAddr};

use crate::error::QueueError;
use crate::job::Job;
use crate::schedule::ScheduleEntry;
use crate::store::{JobStore, StoreHealth};

/// Redis [`JobStore`] implementation.
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStore {
    /// Connect according to the queue configuration.
    ///
    /// With a sentinel address, the current master is resolved by asking
    /// each monitor endpoint in order; the first answer wins.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let url = match &config.redis {
            RedisAddr::Direct { url } => {
                authenticated_url(url, config.redis_password.as_deref())?
            }
            RedisAddr::Sentinel {
                hosts,
                port,
                master_name,
            } => {
                let (host, master_port) = discover_master(hosts, *port, master_name).await?;
                let base = format!("redis://{host}:{master_port}");
                authenticated_url(&base, config.redis_password.as_deref())?
            }
        };

        let client = redis::Client::open(url.as_str())
            .map_err(|e| QueueError::Connection(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Connection(format!("redis connect failed: {e}")))?;

        info!(queue = %config.name, "redis store connected");

        Ok(Self {
            conn,
            prefix: config.name.clone(),
        })
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.prefix)
    }

    fn job_key(&self, job_id: Uuid) -> String {
        format!("{}:job:{}", self.prefix, job_id)
    }

    fn schedule_key(&self) -> String {
        format!("{}:schedule", self.prefix)
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| QueueError::Parse(format!("job serialize failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.job_key(job.id), payload)
            .await
            .map_err(|e| QueueError::Provider(format!("job write failed: {e}")))?;
        let _: () = conn
            .lpush(self.pending_key(), job.id.to_string())
            .await
            .map_err(|e| QueueError::Provider(format!("enqueue failed: {e}")))?;
        debug!(job_id = %job.id, kind = %job.kind, "job enqueued");
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn.clone();
        let popped: Option<String> = conn
            .rpop(self.pending_key(), None)
            .await
            .map_err(|e| QueueError::Provider(format!("pop failed: {e}")))?;
        let Some(id) = popped else {
            return Ok(None);
        };

        let payload: Option<String> = conn
            .get(format!("{}:job:{}", self.prefix, id))
            .await
            .map_err(|e| QueueError::Provider(format!("job read failed: {e}")))?;
        let Some(payload) = payload else {
            // Pending id without a body: already removed, skip it.
            warn!(job_id = %id, "popped job id has no stored body");
            return Ok(None);
        };

        let job: Job = serde_json::from_str(&payload)
            .map_err(|e| QueueError::Parse(format!("job parse failed for {id}: {e}")))?;
        Ok(Some(job))
    }

    async fn save_meta(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| QueueError::Parse(format!("job serialize failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.job_key(job.id), payload)
            .await
            .map_err(|e| QueueError::Provider(format!("meta write failed: {e}")))?;
        Ok(())
    }

    async fn remove(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.job_key(job_id))
            .await
            .map_err(|e| QueueError::Provider(format!("job delete failed: {e}")))?;
        // In case the job is still queued (never popped), drop its id too.
        let _: i64 = conn
            .lrem(self.pending_key(), 0, job_id.to_string())
            .await
            .map_err(|e| QueueError::Provider(format!("pending cleanup failed: {e}")))?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        conn.llen(self.pending_key())
            .await
            .map_err(|e| QueueError::Provider(format!("pending count failed: {e}")))
    }

    async fn clear_pending(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(self.pending_key(), 0, -1)
            .await
            .map_err(|e| QueueError::Provider(format!("pending scan failed: {e}")))?;
        for id in &ids {
            let _: () = conn
                .del(format!("{}:job:{}", self.prefix, id))
                .await
                .map_err(|e| QueueError::Provider(format!("job delete failed: {e}")))?;
        }
        let _: () = conn
            .del(self.pending_key())
            .await
            .map_err(|e| QueueError::Provider(format!("pending clear failed: {e}")))?;
        Ok(ids.len() as u64)
    }

    async fn schedule_entries(&self) -> Result<Vec<ScheduleEntry>, QueueError> {
        let mut conn = self.conn.clone();
        let payloads: Vec<String> = conn
            .hvals(self.schedule_key())
            .await
            .map_err(|e| QueueError::Provider(format!("schedule read failed: {e}")))?;
        payloads
            .iter()
            .map(|p| {
                serde_json::from_str(p)
                    .map_err(|e| QueueError::Parse(format!("schedule entry parse failed: {e}")))
            })
            .collect()
    }

    async fn put_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), QueueError> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| QueueError::Parse(format!("schedule entry serialize failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(self.schedule_key(), &entry.id, payload)
            .await
            .map_err(|e| QueueError::Provider(format!("schedule write failed: {e}")))?;
        Ok(())
    }

    async fn clear_schedule(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn
            .hlen(self.schedule_key())
            .await
            .map_err(|e| QueueError::Provider(format!("schedule count failed: {e}")))?;
        let _: () = conn
            .del(self.schedule_key())
            .await
            .map_err(|e| QueueError::Provider(format!("schedule clear failed: {e}")))?;
        Ok(count)
    }

    async fn health_check(&self) -> Result<StoreHealth, QueueError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Connection(format!("ping failed: {e}")))?;
        let pending: Option<u64> = conn.llen(self.pending_key()).await.ok();
        Ok(StoreHealth {
            connected: pong == "PONG",
            pending_jobs: pending,
            provider: "redis".to_string(),
        })
    }
}

/// Resolve the current master address from the sentinel monitors.
///
/// Each monitor is asked in order; the first usable answer wins. Monitors
/// that are down or do not know the master are skipped with a warning.
async fn discover_master(
    hosts: &[String],
    port: u16,
    master_name: &str,
) -> Result<(String, u16), QueueError> {
    for host in hosts {
        let url = format!("redis://{host}:{port}");
        let client = match redis::Client::open(url.as_str()) {
            Ok(client) => client,
            Err(e) => {
                warn!(sentinel = %host, error = %e, "invalid sentinel address");
                continue;
            }
        };
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(sentinel = %host, error = %e, "sentinel unreachable");
                continue;
            }
        };

        let addr: Result<Vec<String>, _> = redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(master_name)
            .query_async(&mut conn)
            .await;
        match addr {
            Ok(parts) if parts.len() == 2 => {
                let master_port = parts[1].parse::<u16>().map_err(|_| {
                    QueueError::Connection(format!(
                        "sentinel returned invalid master port: {}",
                        parts[1]
                    ))
                })?;
                info!(
                    sentinel = %host,
                    master = %parts[0],
                    port = master_port,
                    "discovered redis master"
                );
                return Ok((parts[0].clone(), master_port));
            }
            Ok(_) => {
                warn!(sentinel = %host, master = master_name, "sentinel does not know the master");
            }
            Err(e) => {
                warn!(sentinel = %host, error = %e, "sentinel query failed");
            }
        }
    }
    Err(QueueError::Connection(format!(
        "no sentinel could resolve master '{master_name}'"
    )))
}

/// Splice the password into a `redis://` URL that carries no credentials.
fn authenticated_url(url: &str, password: Option<&str>) -> Result<String, QueueError> {
    let Some(password) = password else {
        return Ok(url.to_string());
    };
    if url.contains('@') {
        // Credentials already embedded; leave the URL alone.
        return Ok(url.to_string());
    }
    let rest = url.strip_prefix("redis://").ok_or_else(|| {
        QueueError::Connection(format!("unsupported redis url scheme: {url}"))
    })?;
    Ok(format!("redis://:{password}@{rest}"))
}
