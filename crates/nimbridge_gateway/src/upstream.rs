//! HTTP client for the OpenAI-compatible inference endpoint.

use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use nimbridge_core::UpstreamConfig;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    retry: RetryConfig,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build upstream HTTP client")?;

        if config.api_key.is_none() {
            tracing::warn!("No upstream API key configured; requests will be sent unauthenticated");
        }

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig {
                max_attempts: config.max_attempts,
                ..RetryConfig::default()
            },
        })
    }

    /// Override the retry policy (tests use short delays).
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a chat completion body and return the raw upstream response.
    ///
    /// Non-success statuses are returned, not turned into errors, so the
    /// caller can relay them. Errors mean the endpoint was unreachable.
    pub async fn chat_completions(&self, body: &Value) -> Result<Response> {
        let url = format!("{}/chat/completions", self.base_url);
        with_retry(&self.retry, &url, || {
            let mut req = self.client.post(&url).json(body);
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", format!("Bearer {}", key));
            }
            req.send()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> UpstreamClient {
        let config = UpstreamConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            max_attempts: 2,
        };
        UpstreamClient::new(&config).unwrap().with_retry_config(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        })
    }

    #[tokio::test]
    async fn test_posts_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer nvapi-test"))
            .and(body_partial_json(json!({"model": "meta/llama-3.1-8b-instruct"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cmpl-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("nvapi-test"));
        assert!(client.base_url().ends_with("/v1"));
        let resp = client
            .chat_completions(&json!({"model": "meta/llama-3.1-8b-instruct", "messages": []}))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], "cmpl-1");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let resp = client.chat_completions(&json!({})).await.unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        assert_eq!(resp.text().await.unwrap(), "bad model");
    }
}
