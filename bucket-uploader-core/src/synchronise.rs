//! File list synchronisation: reconciles progress and server data into the
//! shared list of [`FileRecord`]s by key.
//!
//! Two merge modes:
//! - [`force_replace`] drops whatever was stored for a key and stores a copy
//!   of the new payload (used when an upload completes).
//! - [`shallow_merge`] overlays only the fields present in a [`FileUpdate`]
//!   (used for progress updates).
//!
//! Every queued or uploading file must have been registered in the list
//! first, so a missing key is a broken invariant, reported as [`LookupError`].

use tracing::{debug, error};

use crate::model::{FileRecord, FileUpdate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no file with key `{key}` in the file list")]
    NotFound { key: String },
}

/// Index of the first record whose key matches.
pub fn find_index(files: &[FileRecord], key: &str) -> Result<usize, LookupError> {
    files.iter().position(|f| f.key == key).ok_or_else(|| {
        error!(key, "File key missing from file list");
        LookupError::NotFound {
            key: key.to_string(),
        }
    })
}

/// Replaces the record stored under `key` with a copy of `payload`.
pub fn force_replace(
    files: &mut [FileRecord],
    key: &str,
    payload: &FileRecord,
) -> Result<usize, LookupError> {
    let index = find_index(files, key)?;
    files[index] = payload.clone();
    debug!(key, index, "Replaced file record");
    Ok(index)
}

/// Overlays `update` on the record stored under `key`, keeping every field
/// the update leaves unset.
pub fn shallow_merge(
    files: &mut [FileRecord],
    key: &str,
    update: &FileUpdate,
) -> Result<usize, LookupError> {
    let index = find_index(files, key)?;
    files[index] = update.overlay(&files[index]);
    Ok(index)
}
