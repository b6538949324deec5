use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::config::Config;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        (**self).get(url)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, api_key: Option<&str>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            match HeaderValue::from_str(key) {
                Ok(value) => {
                    headers.insert("X-API-Key", value);
                }
                Err(_) => tracing::warn!("OPENAQ_API_KEY contains invalid header characters; ignoring it"),
            }
        }
        Self { client, headers }
    }
}

impl Transport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        let request = self.client.get(url).headers(self.headers.clone());
        async move {
            let response = request
                .send()
                .await
                .map_err(|err| TransportError(err.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|err| TransportError(err.to_string()))?;
            Ok(TransportResponse { status, body })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Every failure is retried, including 4xx and undecodable bodies.
    #[default]
    AnyFailure,
    /// Only 429, 5xx and network errors are retried.
    TransientOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            retry_on: RetryOn::AnyFailure,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.fetch_max_retries,
            initial_backoff: config.fetch_initial_backoff,
            retry_on: if config.fetch_retry_transient_only {
                RetryOn::TransientOnly
            } else {
                RetryOn::AnyFailure
            },
        }
    }

    fn should_retry(&self, failure: &Failure) -> bool {
        match self.retry_on {
            RetryOn::AnyFailure => true,
            RetryOn::TransientOnly => match failure {
                Failure::Status(status) => *status == 429 || *status >= 500,
                Failure::Network(_) => true,
                Failure::Decode(_) => false,
            },
        }
    }
}

enum Failure {
    Status(u16),
    Network(String),
    Decode(String),
}

impl Failure {
    fn into_error(self, attempts: u32) -> FetchError {
        match self {
            Failure::Status(status) => FetchError::Status { status, attempts },
            Failure::Network(message) => FetchError::Network { message, attempts },
            Failure::Decode(message) => FetchError::Decode { message, attempts },
        }
    }

    fn describe(&self) -> String {
        match self {
            Failure::Status(429) => "Rate limited".to_string(),
            Failure::Status(status) => format!("HTTP error {}", status),
            Failure::Network(message) => format!("Network error ({})", message),
            Failure::Decode(message) => format!("Invalid JSON ({})", message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryingFetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let mut backoff = self.policy.initial_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let failure = match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    match serde_json::from_str(&response.body) {
                        Ok(value) => return Ok(value),
                        Err(err) => Failure::Decode(err.to_string()),
                    }
                }
                Ok(response) => Failure::Status(response.status),
                Err(err) => Failure::Network(err.0),
            };

            if attempts > self.policy.max_retries || !self.policy.should_retry(&failure) {
                return Err(failure.into_error(attempts));
            }

            tracing::warn!(
                "{}. Retrying in {}ms ({}/{})",
                failure.describe(),
                backoff.as_millis(),
                attempts,
                self.policy.max_retries
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }
}
