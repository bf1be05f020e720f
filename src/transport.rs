use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::debug;

use crate::config::RequestHeaders;
use crate::error::{ConvertError, TransportError};

/// Performs one GET and returns the body bytes.
///
/// Every request of a run goes through the same `Transport` with the same
/// header set, which lets tests swap in a recording stub.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<Vec<u8>, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvertError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs_f64(),
            }
        } else {
            TransportError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<Vec<u8>, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(url, e))?;
            body.extend_from_slice(&chunk);
        }

        debug!("GET {} -> {} bytes", url, body.len());
        Ok(body)
    }
}
