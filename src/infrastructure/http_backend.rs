// HTTP backend client for alerts and threshold settings
use crate::application::backend_api::{BackendApi, BackendError};
use crate::domain::alert::Alert;
use crate::domain::thresholds::Thresholds;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const ALERTS_ACTIVE: &str = "/api/alerts/active";
const ALERTS_RESOLVE_ALL: &str = "/api/alerts/resolve-all";
const SETTINGS_THRESHOLDS: &str = "/api/settings/thresholds";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ResolveAllResponse {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    resolved: Option<u64>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Request {
                endpoint: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BackendError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| BackendError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        decode_body(endpoint, &bytes)
    }
}

fn decode_body<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(|e| BackendError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// The resolve endpoint reports its count under `count` or `resolved`, or not at all.
fn resolved_count(body: &[u8]) -> Option<u64> {
    serde_json::from_slice::<ResolveAllResponse>(body)
        .ok()
        .and_then(|r| r.count.or(r.resolved))
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, BackendError> {
        let request = self.client.get(self.url(ALERTS_ACTIVE));
        self.send(ALERTS_ACTIVE, request).await
    }

    async fn resolve_all_alerts(&self) -> Result<Option<u64>, BackendError> {
        let response = self
            .client
            .post(self.url(ALERTS_RESOLVE_ALL))
            .send()
            .await
            .map_err(|e| BackendError::Request {
                endpoint: ALERTS_RESOLVE_ALL.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: ALERTS_RESOLVE_ALL.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(resolved_count(&body))
    }

    async fn fetch_thresholds(&self) -> Result<Thresholds, BackendError> {
        let request = self.client.get(self.url(SETTINGS_THRESHOLDS));
        self.send(SETTINGS_THRESHOLDS, request).await
    }

    async fn update_thresholds(&self, thresholds: &Thresholds) -> Result<Thresholds, BackendError> {
        let request = self.client.put(self.url(SETTINGS_THRESHOLDS)).json(thresholds);
        self.send(SETTINGS_THRESHOLDS, request).await
    }
}
