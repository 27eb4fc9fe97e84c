use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::error::OfflineError;
use super::request::{OfflineRequest, OfflineResponse};

/// Outbound fetch used by every strategy, the installer and the drain.
///
/// Returns `NetworkUnavailable` when no response arrived at all. A response
/// with an error status is still `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &OfflineRequest) -> Result<OfflineResponse, OfflineError>;
}

/// `reqwest`-backed network. The response body is buffered exactly once.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self, OfflineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(OfflineError::network)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &OfflineRequest) -> Result<OfflineResponse, OfflineError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(OfflineError::network)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(OfflineError::network)?;

        debug!(
            target: "todolist::offline::network",
            method = %request.method,
            url = %request.url,
            status,
            bytes = body.len(),
            "fetched"
        );

        Ok(OfflineResponse::new(status, headers, body))
    }
}
