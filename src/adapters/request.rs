use crate::utils::error::{IntegrationError, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// 共用的 JSON 請求處理：非 2xx 或無法解析的回應都視為傳輸錯誤
#[derive(Debug, Clone)]
pub struct RequestHandler {
    client: Client,
    timeout: Option<Duration>,
}

impl RequestHandler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.timeout = seconds.map(Duration::from_secs);
        self
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        tracing::debug!("📡 GET {}", url);
        let request = self.client.get(url).query(query);
        self.send(request, url).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("📡 POST {}", url);
        let request = self.client.post(url).json(body);
        self.send(request, url).await
    }

    async fn send<T: DeserializeOwned>(&self, mut request: RequestBuilder, url: &str) -> Result<T> {
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("Response body from {}: {}", url, body);
            return Err(IntegrationError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| IntegrationError::MalformedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
