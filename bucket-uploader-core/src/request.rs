//! Pure request builders for uploads and deletes.

use tracing::debug;

use crate::contract::{Method, TransportRequest};
use crate::model::FileRecord;

/// PUT `<bucket>/<key>` carrying the record itself. The record's content
/// buffer is shared with the request, not copied.
///
/// The declared MIME type is only forwarded when it looks like one
/// (contains a `/`); otherwise the content type is left empty.
pub fn prepare_upload(bucket: &str, record: &FileRecord) -> TransportRequest {
    let content_type = record
        .mime_type
        .as_deref()
        .filter(|t| t.contains('/'))
        .unwrap_or("");
    let url = format!("{}/{}", bucket, record.key);
    debug!(key = %record.key, %url, content_type, "Prepared upload request");
    TransportRequest {
        url,
        method: Method::Put,
        headers: vec![("Content-Type".to_string(), content_type.to_string())],
        data: Some(record.clone()),
    }
}

/// Bodiless JSON DELETE against `url`.
pub fn prepare_delete(url: &str) -> TransportRequest {
    TransportRequest {
        url: url.to_string(),
        method: Method::Delete,
        headers: vec![(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )],
        data: None,
    }
}
