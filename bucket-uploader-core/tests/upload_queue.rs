use std::sync::{Arc, Mutex};

use bucket_uploader_core::contract::{MockEventSink, MockTransport};
use bucket_uploader_core::{
    Coordinator, FileRecord, LookupError, Method, ProgressEvent, ProgressSender, RawFile,
    SessionReport, TransportError, TransportRequest, TransportResponse, UploadController,
};
use mockall::Sequence;
use serde_json::json;

const BUCKET: &str = "https://files.test/api/files/bucket-1";

/// Builds the payload a storage endpoint answers a successful PUT with.
fn stored(req: &TransportRequest) -> Result<TransportResponse, TransportError> {
    let key = req.key().expect("upload requests carry the record");
    Ok(TransportResponse {
        status: 200,
        body: json!({
            "key": key,
            "checksum": "md5:0000",
            "links": {
                "self": req.url,
                "version": format!("{}?versionId=1", req.url),
            }
        }),
    })
}

fn server_error() -> TransportError {
    TransportError::Status {
        status: 500,
        body: "storage unavailable".into(),
    }
}

fn quiet_session(events: &mut MockEventSink) {
    events.expect_on_loading_start().times(1).return_const(());
    events.expect_on_loading_stop().times(1).return_const(());
}

fn keys<T, E>(controller: &UploadController<T, E>) -> Vec<String>
where
    T: bucket_uploader_core::Transport,
    E: bucket_uploader_core::EventSink,
{
    controller.queue_keys().map(str::to_string).collect()
}

#[tokio::test]
async fn add_files_registers_local_records_and_queues_them() {
    let mut parent = Coordinator::new(BUCKET);
    let mut controller = UploadController::new(MockTransport::new(), MockEventSink::new());

    controller.add_files(
        &mut parent,
        vec![
            RawFile::new("a.txt", b"alpha".to_vec()).with_mime_type("text/plain"),
            RawFile::new("b.txt", b"beta".to_vec()),
            RawFile::new("c.mp4", b"gamma".to_vec()).with_mime_type("video/mp4"),
        ],
    );

    assert_eq!(keys(&controller), vec!["a.txt", "b.txt", "c.mp4"]);
    assert_eq!(parent.files.len(), 3);
    for (record, name) in parent.files.iter().zip(["a.txt", "b.txt", "c.mp4"]) {
        assert_eq!(record.key, name);
        assert!(record.local);
        assert!(!record.completed);
        assert_eq!(record.progress, 0);
        assert!(record.links.is_none());
    }
    assert_eq!(parent.files[0].content.as_deref(), Some(&b"alpha"[..]));
}

#[tokio::test]
async fn add_files_ignores_empty_input_and_duplicate_names() {
    let mut parent = Coordinator::new(BUCKET);
    let mut controller = UploadController::new(MockTransport::new(), MockEventSink::new());

    controller.add_files(&mut parent, Vec::new());
    assert!(parent.files.is_empty());
    assert_eq!(controller.queue_len(), 0);

    controller.add_files(&mut parent, vec![RawFile::new("a.txt", b"1".to_vec())]);
    controller.add_files(&mut parent, vec![RawFile::new("a.txt", b"2".to_vec())]);

    assert_eq!(parent.files.len(), 1);
    assert_eq!(parent.files[0].content.as_deref(), Some(&b"1"[..]));
    assert_eq!(keys(&controller), vec!["a.txt"]);
}

#[tokio::test]
async fn upload_with_empty_queue_is_a_no_op() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().never();
    let mut events = MockEventSink::new();
    events.expect_on_loading_start().never();
    events.expect_on_loading_stop().never();

    let mut controller = UploadController::new(transport, events);
    let report = controller.upload(&mut parent).await.unwrap();

    assert_eq!(report, SessionReport::Idle);
    assert!(!parent.loading);
}

#[tokio::test]
async fn upload_drains_queue_in_order_and_marks_files_completed() {
    let mut parent = Coordinator::new(format!("{BUCKET}/"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_transport = seen.clone();

    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(2)
        .returning(move |req: TransportRequest, _progress: Option<ProgressSender>| {
            seen_by_transport.lock().unwrap().push(req.clone());
            stored(&req)
        });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events.expect_on_error().never();

    let mut controller = UploadController::new(transport, events);
    controller.add_files(
        &mut parent,
        vec![
            RawFile::new("a.txt", b"alpha".to_vec()).with_mime_type("text/plain"),
            RawFile::new("b.txt", b"beta".to_vec()),
        ],
    );

    let report = controller.upload(&mut parent).await.unwrap();

    let SessionReport::Completed(payloads) = report else {
        panic!("expected a completed session, got {report:?}");
    };
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads, parent.files);
    assert_eq!(controller.queue_len(), 0);
    assert!(!parent.loading);
    assert!(!controller.is_loading());

    for (record, name) in parent.files.iter().zip(["a.txt", "b.txt"]) {
        assert_eq!(record.key, name);
        assert!(record.completed);
        assert_eq!(record.progress, 100);
        assert!(record.links.is_some());
        assert_eq!(record.extra["checksum"], "md5:0000");
    }

    let requests = seen.lock().unwrap();
    assert_eq!(requests[0].url, format!("{BUCKET}/a.txt"));
    assert_eq!(requests[0].method, Method::Put);
    assert_eq!(requests[0].header("Content-Type"), Some("text/plain"));
    assert_eq!(
        requests[0].data.as_ref().and_then(|d| d.content.as_deref()),
        Some(&b"alpha"[..])
    );
    assert_eq!(requests[1].url, format!("{BUCKET}/b.txt"));
    assert_eq!(requests[1].header("Content-Type"), Some(""));
}

#[tokio::test]
async fn completed_payload_replaces_stale_fields() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|req, progress| {
        if let Some(tx) = progress {
            tx.send(ProgressEvent { loaded: 3, total: 10 }).unwrap();
        }
        stored(&req)
    });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);

    let mut controller = UploadController::new(transport, events);
    controller.add_files(
        &mut parent,
        vec![RawFile::new("a.txt", b"alpha".to_vec()).with_mime_type("text/plain")],
    );
    controller.upload(&mut parent).await.unwrap();

    let record = parent.file("a.txt").unwrap();
    assert_eq!(record.mime_type, None);
    assert_eq!(record.content, None);
    assert!(!record.local);
    assert_eq!(record.progress, 100);
}

#[tokio::test]
async fn progress_events_merge_into_record_and_parent() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_req, progress| {
        let tx = progress.expect("uploads report progress");
        tx.send(ProgressEvent { loaded: 25, total: 100 }).unwrap();
        tx.send(ProgressEvent { loaded: 2, total: 5 }).unwrap();
        // unknown totals are skipped
        tx.send(ProgressEvent { loaded: 9, total: 0 }).unwrap();
        Err(server_error())
    });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events.expect_on_error().times(1).return_const(());

    let mut controller = UploadController::new(transport, events);
    controller.add_files(
        &mut parent,
        vec![RawFile::new("movie.mkv", vec![7u8; 100]).with_mime_type("video/x-matroska")],
    );
    controller.upload(&mut parent).await.unwrap();

    let record = parent.file("movie.mkv").unwrap();
    assert_eq!(record.progress, 40);
    assert_eq!(record.mime_type.as_deref(), Some("video/x-matroska"));
    assert!(record.local);
    assert!(!record.completed);
    assert_eq!(parent.progress, 40);
}

#[tokio::test]
async fn regressive_progress_is_applied_as_reported() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_req, progress| {
        let tx = progress.unwrap();
        tx.send(ProgressEvent { loaded: 60, total: 100 }).unwrap();
        tx.send(ProgressEvent { loaded: 30, total: 100 }).unwrap();
        Err(TransportError::Network("connection reset".into()))
    });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events.expect_on_error().times(1).return_const(());

    let mut controller = UploadController::new(transport, events);
    controller.add_files(&mut parent, vec![RawFile::new("a.bin", vec![0u8; 100])]);
    controller.upload(&mut parent).await.unwrap();

    assert_eq!(parent.file("a.bin").unwrap().progress, 30);
}

#[tokio::test]
async fn first_failure_halts_the_session() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(2)
        .returning(|req, _| match req.key() {
            Some("b.txt") => Err(server_error()),
            _ => stored(&req),
        });

    let mut seq = Sequence::new();
    let mut events = MockEventSink::new();
    events
        .expect_on_loading_start()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    events
        .expect_on_error()
        .withf(|e| matches!(e, TransportError::Status { status: 500, .. }))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    events
        .expect_on_loading_stop()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let mut controller = UploadController::new(transport, events);
    controller.add_files(
        &mut parent,
        vec![
            RawFile::new("a.txt", b"a".to_vec()),
            RawFile::new("b.txt", b"b".to_vec()),
            RawFile::new("c.txt", b"c".to_vec()),
        ],
    );

    let report = controller.upload(&mut parent).await.unwrap();

    match report {
        SessionReport::Failed { completed, error } => {
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].key, "a.txt");
            assert_eq!(error, server_error());
        }
        other => panic!("expected a failed session, got {other:?}"),
    }
    assert!(parent.file("a.txt").unwrap().completed);
    assert!(!parent.file("b.txt").unwrap().completed);
    assert!(!parent.file("c.txt").unwrap().completed);
    // the failed item is not re-queued; the rest waits for the next upload()
    assert_eq!(keys(&controller), vec!["c.txt"]);
    assert!(!parent.loading);
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn undecodable_success_payload_fails_the_session() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_req, _| {
        Ok(TransportResponse {
            status: 200,
            body: json!({ "unexpected": true }),
        })
    });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events
        .expect_on_error()
        .withf(|e| matches!(e, TransportError::Decode(_)))
        .times(1)
        .return_const(());

    let mut controller = UploadController::new(transport, events);
    controller.add_files(&mut parent, vec![RawFile::new("a.txt", b"a".to_vec())]);
    let report = controller.upload(&mut parent).await.unwrap();

    assert!(matches!(report, SessionReport::Failed { ref completed, .. } if completed.is_empty()));
    assert!(!parent.file("a.txt").unwrap().completed);
}

#[tokio::test]
async fn success_payload_for_another_key_fails_the_session() {
    let mut parent = Coordinator::new(BUCKET);
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_req, _| {
        Ok(TransportResponse {
            status: 200,
            body: json!({ "key": "b.txt", "links": { "self": "https://files.test/b.txt" } }),
        })
    });
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events
        .expect_on_error()
        .withf(|e| matches!(e, TransportError::Decode(msg) if msg.contains("b.txt")))
        .times(1)
        .return_const(());

    let mut controller = UploadController::new(transport, events);
    controller.add_files(
        &mut parent,
        vec![
            RawFile::new("a.txt", b"a".to_vec()),
            RawFile::new("b.txt", b"b".to_vec()),
        ],
    );
    let report = controller.upload(&mut parent).await.unwrap();

    assert!(matches!(
        report,
        SessionReport::Failed { ref completed, error: TransportError::Decode(_) } if completed.is_empty()
    ));
    let stored_keys: Vec<_> = parent.files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(stored_keys, vec!["a.txt", "b.txt"]);
    assert!(parent.files.iter().all(|f| !f.completed && !f.is_linked()));
    assert_eq!(keys(&controller), vec!["b.txt"]);
}

#[tokio::test]
async fn resume_pending_queues_only_unfinished_records() {
    let done: FileRecord = serde_json::from_value(json!({
        "key": "done.txt",
        "completed": true,
        "progress": 100,
        "links": { "self": format!("{BUCKET}/done.txt") }
    }))
    .unwrap();
    let parent = Coordinator::new(BUCKET).with_files(vec![
        RawFile::new("first.txt", Vec::new()).into_record(),
        done,
        RawFile::new("second.txt", Vec::new()).into_record(),
    ]);

    let mut controller = UploadController::new(MockTransport::new(), MockEventSink::new());
    controller.resume_pending(&parent);

    assert_eq!(keys(&controller), vec!["first.txt", "second.txt"]);
}

#[tokio::test]
async fn unregistered_queued_key_fails_loudly_and_clears_loading() {
    let mut parent = Coordinator::new(BUCKET)
        .with_files(vec![RawFile::new("ghost.txt", Vec::new()).into_record()]);
    let mut transport = MockTransport::new();
    transport.expect_send().never();
    let mut events = MockEventSink::new();
    quiet_session(&mut events);
    events.expect_on_error().never();

    let mut controller = UploadController::new(transport, events);
    controller.resume_pending(&parent);
    parent.files.clear();

    let err = controller.upload(&mut parent).await.unwrap_err();

    assert_eq!(
        err,
        LookupError::NotFound {
            key: "ghost.txt".into()
        }
    );
    assert!(!parent.loading);
    assert!(!controller.is_loading());
}
