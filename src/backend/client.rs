use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::connection::ConnectionsMessage;
use crate::models::latency::DelayResponse;
use crate::utils::error::{AppError, AppResult};

/// Extra time granted on top of the probe timeout before the HTTP call gives up
const REQUEST_GRACE: Duration = Duration::from_secs(2);

/// Thin client for the proxy backend's REST API
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client for `base_url`, sending `secret` as bearer token when set
    pub fn new(base_url: &str, secret: Option<&str>) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("invalid backend URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!(
                "backend URL {} cannot be used as a base",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", secret))
                .map_err(|e| AppError::ConfigError(format!("invalid secret: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::ConfigError(format!("backend URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch the current connection snapshot
    pub async fn fetch_connections(&self) -> AppResult<ConnectionsMessage> {
        let url = self.endpoint(&["connections"])?;
        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<ConnectionsMessage>().await?)
    }

    /// Ask the backend to close one connection
    pub async fn close_connection(&self, id: &str) -> AppResult<()> {
        let url = self.endpoint(&["connections", id])?;
        let response = self.http.delete(url).send().await?;
        check_status(response).await?;
        debug!("Closed connection {}", id);
        Ok(())
    }

    /// Probe one proxy node and return its delay in milliseconds
    pub async fn proxy_delay(&self, name: &str, test_url: &str, timeout: Duration) -> AppResult<u32> {
        let mut url = self.endpoint(&["proxies", name, "delay"])?;
        url.query_pairs_mut()
            .append_pair("url", test_url)
            .append_pair("timeout", &timeout.as_millis().to_string());

        let response = self
            .http
            .get(url)
            .timeout(timeout + REQUEST_GRACE)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: DelayResponse = response.json().await?;
        Ok(body.delay)
    }

    /// Let the backend probe every node of a group; nodes that failed are absent
    pub async fn group_delay(
        &self,
        group: &str,
        test_url: &str,
        timeout: Duration,
    ) -> AppResult<HashMap<String, u32>> {
        let mut url = self.endpoint(&["group", group, "delay"])?;
        url.query_pairs_mut()
            .append_pair("url", test_url)
            .append_pair("timeout", &timeout.as_millis().to_string());

        let response = self
            .http
            .get(url)
            .timeout(timeout + REQUEST_GRACE)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<HashMap<String, u32>>().await?)
    }
}

async fn check_status(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        warn!("Backend rejected the API secret");
    }
    Err(AppError::BackendError(format!("{}: {}", status, body.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_names() {
        let client = BackendClient::new("http://127.0.0.1:9090", None).unwrap();
        let url = client.endpoint(&["proxies", "HK 01/Premium", "delay"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9090/proxies/HK%2001%2FPremium/delay");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = BackendClient::new("http://router.lan/api/", None).unwrap();
        let url = client.endpoint(&["connections"]).unwrap();
        assert_eq!(url.as_str(), "http://router.lan/api/connections");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(BackendClient::new("not a url", None).is_err());
        assert!(BackendClient::new("mailto:someone@example.com", None).is_err());
    }
}
