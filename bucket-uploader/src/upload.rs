#![doc = "HTTP transport for the upload controller: bridges the core `Transport` contract to `reqwest`."]
//
//! # HTTP Transport
//!
//! [`HttpTransport`] issues the PUT and DELETE requests built by the core
//! crate against a real storage endpoint.
//!
//! - Upload bodies are streamed in fixed-size chunks; every chunk handed to
//!   the connection reports a cumulative [`ProgressEvent`].
//! - Non-2xx responses become [`TransportError::Status`] carrying the body text.
//! - Connection failures and timeouts become [`TransportError::Network`].
//! - 2xx bodies are decoded as JSON; an empty body decodes to `null`.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use bucket_uploader_core::contract::{
    Method, ProgressEvent, ProgressSender, Transport, TransportError, TransportRequest,
    TransportResponse,
};

/// Size of the chunks an upload body is streamed in.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

pub struct HttpTransport {
    client: reqwest::Client,
    chunk_size: usize,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        tracing::info!(?timeout, "Initialized HTTP transport");
        Ok(Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        tracing::debug!(method = request.method.as_str(), url = %request.url, "Sending request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(content) = request.data.and_then(|d| d.content) {
            builder = builder
                .header(reqwest::header::CONTENT_LENGTH, content.len())
                .body(progress_body(content, self.chunk_size, progress));
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = ?e, url = %request.url, "Request failed to complete");
            TransportError::Network(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), url = %request.url, "Server rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                tracing::error!(error = ?e, url = %request.url, "Response body is not JSON");
                TransportError::Decode(e.to_string())
            })?
        };
        tracing::debug!(status = status.as_u16(), url = %request.url, "Request succeeded");
        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Streams `content` in chunks, reporting cumulative bytes on `progress`.
/// Only the chunk being handed to the connection is copied.
fn progress_body(
    content: Arc<[u8]>,
    chunk_size: usize,
    progress: Option<ProgressSender>,
) -> reqwest::Body {
    let total = content.len();
    let stream = futures::stream::iter((0..total).step_by(chunk_size)).map(move |start| {
        let end = (start + chunk_size).min(total);
        if let Some(tx) = &progress {
            let _ = tx.send(ProgressEvent {
                loaded: end as u64,
                total: total as u64,
            });
        }
        Ok::<_, std::io::Error>(content[start..end].to_vec())
    });
    reqwest::Body::wrap_stream(stream)
}
