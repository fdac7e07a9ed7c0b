//! # uploader: the sequential upload queue controller
//!
//! [`UploadController`] owns a FIFO queue of file keys and drains it one
//! upload at a time against an injected [`Transport`], writing progress and
//! completion back into the [`Coordinator`]'s shared file list.
//!
//! ## Session semantics
//! - [`UploadController::upload`] signals `loading.start`, raises both
//!   loading flags and drains the queue.
//! - Progress events are shallow-merged into the matching record; a
//!   completed upload force-replaces the record with the server payload.
//! - The first failed upload halts the session. Records completed before it
//!   stay completed; everything still queued stays queued.
//! - Whatever the outcome, `loading.stop` fires and both flags are cleared.
//!
//! Exactly one request is in flight at a time: the next key is only dequeued
//! after the previous request has settled and its progress has been applied.
//!
//! ## Removal
//! [`UploadController::remove`] drops local-only records from the list and
//! queue without touching the network. Server-linked records are deleted
//! remotely first and only leave the list once the delete succeeds.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::contract::{EventSink, ProgressEvent, Transport, TransportError};
use crate::model::{Coordinator, FileRecord, FileUpdate, RawFile};
use crate::request::{prepare_delete, prepare_upload};
use crate::synchronise::{find_index, force_replace, shallow_merge, LookupError};

/// Result of one [`UploadController::upload`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReport {
    /// The queue was empty; nothing was signalled.
    Idle,
    /// Every queued file was uploaded. Payloads in upload order.
    Completed(Vec<FileRecord>),
    /// The session halted on `error`; `completed` holds what made it before.
    Failed {
        completed: Vec<FileRecord>,
        error: TransportError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    /// Local-only file dropped from the list and queue.
    Removed,
    /// Server copy deleted and record dropped from the list.
    Deleted,
    /// The delete request failed; the list is unchanged.
    DeleteFailed(TransportError),
}

/// Aggregate state of one drain run.
#[derive(Debug, Default)]
struct UploadSession {
    completed: Vec<FileRecord>,
}

/// Why a drain stopped early.
enum Halt {
    Transport(TransportError),
    Lookup(LookupError),
}

impl From<TransportError> for Halt {
    fn from(e: TransportError) -> Self {
        Halt::Transport(e)
    }
}

impl From<LookupError> for Halt {
    fn from(e: LookupError) -> Self {
        Halt::Lookup(e)
    }
}

pub struct UploadController<T, E> {
    transport: T,
    events: E,
    queue: VecDeque<String>,
    loading: bool,
}

impl<T, E> UploadController<T, E>
where
    T: Transport,
    E: EventSink,
{
    pub fn new(transport: T, events: E) -> Self {
        Self {
            transport,
            events,
            queue: VecDeque::new(),
            loading: false,
        }
    }

    /// Seeds the queue with every record of the parent list that has not
    /// completed yet, in list order. Replaces the current queue.
    pub fn resume_pending(&mut self, parent: &Coordinator) {
        self.queue = parent
            .files
            .iter()
            .filter(|f| !f.completed)
            .map(|f| f.key.clone())
            .collect();
        debug!(queued = self.queue.len(), "Queue seeded from file list");
    }

    /// Keys waiting for upload, head first.
    pub fn queue_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.queue.iter().map(String::as_str)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Registers raw files as local records and queues them. No network effect.
    ///
    /// A file whose name is already a key in the list is skipped, keeping
    /// keys unique.
    pub fn add_files(&mut self, parent: &mut Coordinator, files: Vec<RawFile>) {
        for file in files {
            if parent.file(&file.name).is_some() {
                warn!(key = %file.name, "File already in list, skipping");
                continue;
            }
            let record = file.into_record();
            debug!(key = %record.key, "Queued file");
            self.queue.push_back(record.key.clone());
            parent.files.push(record);
        }
    }

    /// Drains the queue sequentially. No-op when the queue is empty.
    ///
    /// Transport failures are signalled on the event sink and reported in
    /// the returned [`SessionReport`]. A [`LookupError`] means a queued key
    /// was never registered in the list and is returned as `Err`.
    pub async fn upload(&mut self, parent: &mut Coordinator) -> Result<SessionReport, LookupError> {
        if self.queue.is_empty() {
            debug!("Upload requested with an empty queue");
            return Ok(SessionReport::Idle);
        }

        info!(queued = self.queue.len(), "Starting upload session");
        self.events.on_loading_start();
        parent.loading = true;
        self.loading = true;

        let mut session = UploadSession::default();
        let outcome = self.drain(parent, &mut session).await;

        let report = match outcome {
            Ok(()) => {
                info!(uploaded = session.completed.len(), "Upload session completed");
                Ok(SessionReport::Completed(session.completed))
            }
            Err(Halt::Transport(error)) => {
                error!(
                    error = %error,
                    uploaded = session.completed.len(),
                    remaining = self.queue.len(),
                    "Upload session halted"
                );
                self.events.on_error(&error);
                Ok(SessionReport::Failed {
                    completed: session.completed,
                    error,
                })
            }
            Err(Halt::Lookup(e)) => {
                error!(error = %e, "Upload session aborted on an unregistered file");
                Err(e)
            }
        };

        self.events.on_loading_stop();
        parent.loading = false;
        self.loading = false;
        report
    }

    async fn drain(
        &mut self,
        parent: &mut Coordinator,
        session: &mut UploadSession,
    ) -> Result<(), Halt> {
        while let Some(key) = self.queue.pop_front() {
            let payload = self.upload_one(parent, &key).await?;
            session.completed.push(payload);
        }
        Ok(())
    }

    async fn upload_one(&self, parent: &mut Coordinator, key: &str) -> Result<FileRecord, Halt> {
        let index = find_index(&parent.files, key)?;
        let request = prepare_upload(&parent.links.bucket, &parent.files[index]);
        info!(key, url = %request.url, "Uploading file");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = {
            let send = self.transport.send(request, Some(tx));
            tokio::pin!(send);
            loop {
                tokio::select! {
                    biased;
                    Some(event) = rx.recv() => apply_progress(parent, key, &event)?,
                    result = &mut send => break result,
                }
            }
        };
        // Progress that raced the response still lands before completion.
        while let Ok(event) = rx.try_recv() {
            apply_progress(parent, key, &event)?;
        }

        let response = result?;
        let mut payload: FileRecord = serde_json::from_value(response.body)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if payload.key != key {
            error!(key, returned = %payload.key, "Server stored the upload under another key");
            return Err(Halt::Transport(TransportError::Decode(format!(
                "response key `{}` does not match uploaded key `{key}`",
                payload.key
            ))));
        }
        payload.completed = true;
        payload.progress = 100;
        force_replace(&mut parent.files, key, &payload)?;
        info!(key, status = response.status, "File uploaded");
        Ok(payload)
    }

    /// Removes the file stored under `key`.
    ///
    /// Local-only files leave the list and queue immediately. Linked files
    /// are deleted remotely first; a failed delete is signalled and leaves
    /// the list untouched so the caller can retry.
    pub async fn remove(
        &mut self,
        parent: &mut Coordinator,
        key: &str,
    ) -> Result<RemoveOutcome, LookupError> {
        let index = find_index(&parent.files, key)?;
        let Some(links) = parent.files[index].links.clone() else {
            parent.files.remove(index);
            if let Some(position) = self.queue.iter().position(|k| k == key) {
                self.queue.remove(position);
            }
            info!(key, "Removed local file");
            return Ok(RemoveOutcome::Removed);
        };

        let request = prepare_delete(links.delete_target());
        info!(key, url = %request.url, "Deleting file");
        match self.transport.send(request, None).await {
            Ok(_) => {
                let index = find_index(&parent.files, key)?;
                parent.files.remove(index);
                info!(key, "File deleted");
                Ok(RemoveOutcome::Deleted)
            }
            Err(error) => {
                error!(key, error = %error, "Delete failed");
                self.events.on_error(&error);
                Ok(RemoveOutcome::DeleteFailed(error))
            }
        }
    }

    /// Cancelling in-flight uploads is not supported; this only logs the request.
    pub fn abort(&self) {
        warn!(
            loading = self.loading,
            "Abort requested but upload cancellation is not supported"
        );
    }
}

fn apply_progress(
    parent: &mut Coordinator,
    key: &str,
    event: &ProgressEvent,
) -> Result<(), LookupError> {
    let Some(percent) = event.percent() else {
        debug!(key, loaded = event.loaded, "Progress without a total, ignoring");
        return Ok(());
    };
    let index = find_index(&parent.files, key)?;
    let previous = parent.files[index].progress;
    if percent < previous {
        warn!(key, previous, percent, "Upload progress went backwards");
    }
    parent.progress = percent;
    shallow_merge(&mut parent.files, key, &FileUpdate::progress(percent))?;
    debug!(key, percent, "Upload progress");
    Ok(())
}
