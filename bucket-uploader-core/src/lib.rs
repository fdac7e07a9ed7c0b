#![doc = "bucket-uploader-core: sequential upload queue and file-list synchronisation."]

//! This crate holds the upload orchestration logic: the data model, the
//! transport and event contracts, the file list synchroniser and the queue
//! controller. It has no HTTP client and no CLI; those live in the
//! `bucket-uploader` crate.
//!
//! # Usage
//! Build a [`model::Coordinator`], wrap a [`contract::Transport`] and a
//! [`contract::EventSink`] in an [`uploader::UploadController`], then
//! `add_files` and `upload`.

pub mod contract;
pub mod model;
pub mod request;
pub mod synchronise;
pub mod uploader;

pub use contract::{
    EventSink, Method, ProgressEvent, ProgressSender, Transport, TransportError,
    TransportRequest, TransportResponse, UploaderEvent,
};
pub use model::{BucketLinks, Coordinator, FileLinks, FileRecord, FileUpdate, RawFile};
pub use synchronise::LookupError;
pub use uploader::{RemoveOutcome, SessionReport, UploadController};
