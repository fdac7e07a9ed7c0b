//! # model: file records and the coordinator state they live in
//!
//! Plain data types shared by the synchroniser and the upload controller:
//! - [`RawFile`]: a locally selected file before it is registered.
//! - [`FileRecord`]: the tracked state of one file, local or server-backed.
//! - [`FileUpdate`]: a partial record overlaid during progress updates.
//! - [`Coordinator`]: the parent state (bucket link, loading flag, aggregate
//!   progress and the shared file list) borrowed by every controller operation.
//!
//! Server payloads deserialize straight into [`FileRecord`]; fields the model
//! does not name are kept in [`FileRecord::extra`] so a force-replace stores
//! the payload verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// A file picked by the user, not yet part of any list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// Original file name; becomes the record key.
    pub name: String,
    /// Declared MIME type, if known.
    pub mime_type: Option<String>,
    /// File contents.
    pub content: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            content: content.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Reads a file from disk, naming it after its final path component and
    /// guessing the MIME type from the extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("path {path:?} has no file name"),
                )
            })?;
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());
        Ok(Self {
            name,
            mime_type,
            content,
        })
    }

    /// Turns the raw file into a fresh local record keyed by its name.
    pub fn into_record(self) -> FileRecord {
        FileRecord {
            key: self.name,
            local: true,
            completed: false,
            progress: 0,
            mime_type: self.mime_type,
            links: None,
            extra: Map::new(),
            content: Some(Arc::from(self.content)),
        }
    }
}

/// Server-side links of a persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLinks {
    #[serde(rename = "self")]
    pub self_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl FileLinks {
    /// URL a delete request targets: the version link when present, else `self`.
    pub fn delete_target(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.self_url)
    }
}

/// Tracked state for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique within the owning list; never changes once assigned.
    pub key: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub completed: bool,
    /// Upload progress in percent, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<FileLinks>,
    /// Server fields not modelled above (checksum, size, version_id, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Raw payload of a local file, shared with in-flight requests.
    /// Never part of a server payload.
    #[serde(skip)]
    pub content: Option<Arc<[u8]>>,
}

impl FileRecord {
    /// True once the server holds a persisted representation of the file.
    pub fn is_linked(&self) -> bool {
        self.links.is_some()
    }
}

/// Partial record: only the `Some` fields are overlaid by a shallow merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    pub local: Option<bool>,
    pub completed: Option<bool>,
    pub progress: Option<u8>,
    pub mime_type: Option<String>,
    pub links: Option<FileLinks>,
}

impl FileUpdate {
    pub fn progress(percent: u8) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }

    /// Returns a copy of `record` with this update laid over it.
    pub fn overlay(&self, record: &FileRecord) -> FileRecord {
        let mut merged = record.clone();
        if let Some(local) = self.local {
            merged.local = local;
        }
        if let Some(completed) = self.completed {
            merged.completed = completed;
        }
        if let Some(progress) = self.progress {
            merged.progress = progress;
        }
        if let Some(mime_type) = &self.mime_type {
            merged.mime_type = Some(mime_type.clone());
        }
        if let Some(links) = &self.links {
            merged.links = Some(links.clone());
        }
        merged
    }
}

/// Links exposed by the parent coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLinks {
    /// Base URL uploads are PUT under, without a trailing slash.
    pub bucket: String,
}

/// Parent state the uploader reads from and writes to.
///
/// Owns the shared file list; the controller only ever borrows it.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pub links: BucketLinks,
    pub loading: bool,
    pub progress: u8,
    pub files: Vec<FileRecord>,
}

impl Coordinator {
    pub fn new(bucket: impl Into<String>) -> Self {
        let bucket: String = bucket.into();
        Self {
            links: BucketLinks {
                bucket: bucket.trim_end_matches('/').to_string(),
            },
            loading: false,
            progress: 0,
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<FileRecord>) -> Self {
        self.files = files;
        self
    }

    pub fn file(&self, key: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.key == key)
    }
}
