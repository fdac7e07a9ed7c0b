//! # contract: collaborator interfaces consumed by the uploader
//!
//! The controller never talks to the network or to a UI directly. It goes
//! through two injected seams:
//! - [`Transport`]: issues PUT/DELETE requests and reports upload progress.
//! - [`EventSink`]: receives `loading.start`, `loading.stop` and `error` signals.
//!
//! Both traits are annotated for `mockall`, so tests (in this crate and in
//! dependents, through the default `test-export-mocks` feature) can script
//! transport outcomes and assert on emitted events.

use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::FileRecord;

/// HTTP method of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Request shape handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// The record being uploaded. Carries the key so responses can be
    /// correlated with the originating file. `None` for deletes.
    pub data: Option<FileRecord>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn key(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.key.as_str())
    }
}

/// Bytes sent so far for the request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub loaded: u64,
    pub total: u64,
}

impl ProgressEvent {
    /// `floor(100 * loaded / total)`, capped at 100. `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let percent = (self.loaded as u128 * 100) / self.total as u128;
        Some(percent.min(100) as u8)
    }
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON body; `Value::Null` when the server sent nothing.
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response payload: {0}")]
    Decode(String),
}

/// Issues requests on behalf of the controller.
///
/// Timeouts, connection reuse and TLS are entirely the implementor's concern.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. Implementors report upload progress on `progress`
    /// when a sender is given; the future resolves once the response is in.
    async fn send(
        &self,
        request: TransportRequest,
        progress: Option<ProgressSender>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Fire-and-forget lifecycle signals towards the parent.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait EventSink: Send + Sync {
    fn on_loading_start(&self);
    fn on_loading_stop(&self);
    /// Carries the failing response or transport error.
    fn on_error(&self, error: &TransportError);
}

/// Owned form of the signals, for sinks that forward them elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploaderEvent {
    LoadingStart,
    LoadingStop,
    Error(TransportError),
}

impl UploaderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UploaderEvent::LoadingStart => "loading.start",
            UploaderEvent::LoadingStop => "loading.stop",
            UploaderEvent::Error(_) => "error",
        }
    }
}

/// Forwards every signal into an unbounded channel. A closed receiver is ignored.
impl EventSink for UnboundedSender<UploaderEvent> {
    fn on_loading_start(&self) {
        let _ = self.send(UploaderEvent::LoadingStart);
    }

    fn on_loading_stop(&self) {
        let _ = self.send(UploaderEvent::LoadingStop);
    }

    fn on_error(&self, error: &TransportError) {
        let _ = self.send(UploaderEvent::Error(error.clone()));
    }
}
