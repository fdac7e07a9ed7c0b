//!
//! This module implements the CLI interface for bucket-uploader: command parsing,
//! argument validation and the async entrypoint shared by `main()` and the tests.
//!
//! All queueing, progress and synchronisation logic lives in `bucket-uploader-core`.
//! This module only wires config, the HTTP transport and the controller together.
//!
//! ## How To Use
//! - Command line: `bucket-uploader upload --config uploader.yaml a.txt b.txt`
//! - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::load_config::{load_config, UploaderConfig};
use crate::upload::HttpTransport;
use anyhow::{Context, Result};
use bucket_uploader_core::{
    Coordinator, FileLinks, FileRecord, RawFile, RemoveOutcome, SessionReport, UploadController,
    UploaderEvent,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// CLI for bucket-uploader: sequential uploads into a bucket storage endpoint.
#[derive(Parser)]
#[clap(
    name = "bucket-uploader",
    version,
    about = "Upload files one at a time into a bucket storage endpoint"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the given files, in order, into the configured bucket
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Files to upload; each is stored under its file name
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a stored file through its self or version link
    Delete {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Key of the stored file
        #[clap(long)]
        key: String,
        /// Link the delete request targets
        #[clap(long)]
        url: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload { config, files } => {
            let config = load_config(config)?;
            tracing::info!(command = "upload", files = files.len(), "Starting upload");
            upload_files(&config, &files).await
        }
        Commands::Delete { config, key, url } => {
            let config = load_config(config)?;
            tracing::info!(command = "delete", %key, "Starting delete");
            delete_file(&config, key, url).await
        }
    }
}

async fn upload_files(config: &UploaderConfig, paths: &[PathBuf]) -> Result<()> {
    let mut raw_files = Vec::with_capacity(paths.len());
    for path in paths {
        let mut file =
            RawFile::from_path(path).with_context(|| format!("Failed to read file {path:?}"))?;
        if file.mime_type.is_none() {
            file.mime_type = config.default_mime_type.clone();
        }
        raw_files.push(file);
    }

    let transport = HttpTransport::new(config.timeout()).context("Failed to build HTTP client")?;
    let (events, mut received) = mpsc::unbounded_channel::<UploaderEvent>();
    let mut parent = Coordinator::new(config.bucket.as_str());
    let mut controller = UploadController::new(transport, events);

    controller.add_files(&mut parent, raw_files);
    let report = controller.upload(&mut parent).await;
    log_events(&mut received);

    match report? {
        SessionReport::Idle => {
            println!("Nothing to upload.");
            Ok(())
        }
        SessionReport::Completed(uploaded) => {
            println!("Uploaded {} file(s):", uploaded.len());
            for record in &uploaded {
                println!("  {}", record.key);
            }
            Ok(())
        }
        SessionReport::Failed { completed, error } => {
            println!("Uploaded {} file(s) before failing:", completed.len());
            for record in &completed {
                println!("  {}", record.key);
            }
            let pending: Vec<&str> = controller.queue_keys().collect();
            tracing::error!(command = "upload", error = %error, ?pending, "Upload halted");
            Err(anyhow::anyhow!("Upload halted: {error}"))
        }
    }
}

async fn delete_file(config: &UploaderConfig, key: String, url: String) -> Result<()> {
    let transport = HttpTransport::new(config.timeout()).context("Failed to build HTTP client")?;
    let (events, mut received) = mpsc::unbounded_channel::<UploaderEvent>();
    let record = FileRecord {
        key: key.clone(),
        local: false,
        completed: true,
        progress: 100,
        mime_type: None,
        links: Some(FileLinks {
            self_url: url,
            version: None,
        }),
        extra: serde_json::Map::new(),
        content: None,
    };
    let mut parent = Coordinator::new(config.bucket.as_str()).with_files(vec![record]);
    let mut controller = UploadController::new(transport, events);

    let outcome = controller.remove(&mut parent, &key).await;
    log_events(&mut received);

    match outcome? {
        RemoveOutcome::Deleted | RemoveOutcome::Removed => {
            println!("Deleted {key}.");
            Ok(())
        }
        RemoveOutcome::DeleteFailed(error) => Err(anyhow::anyhow!("Delete failed: {error}")),
    }
}

fn log_events(received: &mut UnboundedReceiver<UploaderEvent>) {
    while let Ok(event) = received.try_recv() {
        match &event {
            UploaderEvent::Error(error) => {
                tracing::warn!(event = event.name(), error = %error, "Uploader event")
            }
            _ => tracing::info!(event = event.name(), "Uploader event"),
        }
    }
}
