//! Cluster API client returning one trailing window of telemetry.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use wiretrap_core::config::TelemetryConfig;
use wiretrap_core::TelemetryWindow;

use crate::error::TelemetryError;

/// Query script executed against the cluster on every fetch: the database
/// query table and the HTTP request table, both over the trailing
/// 1-minute window.
const WINDOW_SCRIPT: &str = "\
import px

df = px.DataFrame(table='pgsql_events', start_time='-1m')[['time_', 'req']]
px.display(df, 'psql_table')

df = px.DataFrame(table='http_events', start_time='-1m')[['time_', 'req_path', 'req_body']]
px.display(df, 'http_table')
";

/// A source of telemetry records for the trailing window.
///
/// One call returns one finite, non-restartable snapshot; the detection
/// cycle consumes it exactly once.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_window(&self) -> Result<TelemetryWindow, TelemetryError>;
}

/// HTTP implementation talking to the cluster API.
pub struct ClusterClient {
    client: reqwest::Client,
    api_url: String,
    cluster_id: String,
    api_token: String,
}

impl ClusterClient {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            cluster_id: config.cluster_id.clone(),
            api_token: config.api_token.clone(),
        }
    }
}

/// Table payloads as returned by the script-execution endpoint.
#[derive(Debug, Deserialize)]
struct WindowResponse {
    #[serde(default)]
    psql_table: Vec<wiretrap_core::QueryRecord>,
    #[serde(default)]
    http_table: Vec<wiretrap_core::RequestRecord>,
}

#[async_trait]
impl TelemetrySource for ClusterClient {
    async fn fetch_window(&self) -> Result<TelemetryWindow, TelemetryError> {
        let url = format!("{}/v1/clusters/{}/exec", self.api_url, self.cluster_id);
        debug!(url = %url, "fetching telemetry window");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({ "script": WINDOW_SCRIPT }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Api { status, body });
        }

        let tables: WindowResponse = response
            .json()
            .await
            .map_err(|e| TelemetryError::Parse(format!("window response: {e}")))?;

        debug!(
            queries = tables.psql_table.len(),
            requests = tables.http_table.len(),
            "telemetry window fetched"
        );

        Ok(TelemetryWindow {
            queries: tables.psql_table,
            requests: tables.http_table,
        })
    }
}
