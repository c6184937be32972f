//! HTTP client for communicating with deskd.

use anyhow::{anyhow, Context, Result};
use desk_common::rpc::{
    ApproveRequest, ApproveResponse, HealthResponse, IngestRequest, IngestResponse, IngestTicket,
    PendingApprovalResponse, ProcessNextResponse, QueueStatsResponse, TimelineResponse,
};
use std::time::Duration;

/// Default daemon address, matching the deskd default bind
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7890";

/// Client for communicating with deskd
pub struct DeskdClient {
    client: reqwest::Client,
    base_url: String,
}

impl DeskdClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            anyhow!(
                "Cannot reach deskd at {}: {}\nIs the daemon running?",
                self.base_url,
                e
            )
        })?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            anyhow!(
                "Cannot reach deskd at {}: {}\nIs the daemon running?",
                self.base_url,
                e
            )
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            let message = response.text().await.unwrap_or_default();
            return Err(anyhow!("{}", message));
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/v1/health").await
    }

    pub async fn ingest(&self, tickets: Vec<IngestTicket>) -> Result<IngestResponse> {
        self.post_json("/v1/tickets/ingest", &IngestRequest { tickets })
            .await
    }

    pub async fn process_next(&self) -> Result<ProcessNextResponse> {
        self.post_json("/v1/tickets/process-next", &serde_json::json!({}))
            .await
    }

    pub async fn timeline(&self) -> Result<TimelineResponse> {
        self.get_json("/v1/tickets/timeline").await
    }

    pub async fn pending_approval(&self) -> Result<PendingApprovalResponse> {
        self.get_json("/v1/tickets/pending-approval").await
    }

    pub async fn resolve(&self, ticket_id: i64, approved: bool) -> Result<ApproveResponse> {
        self.post_json(
            "/v1/tickets/approve",
            &ApproveRequest {
                ticket_id,
                approved,
            },
        )
        .await
    }

    pub async fn queues(&self) -> Result<QueueStatsResponse> {
        self.get_json("/v1/queues").await
    }
}
