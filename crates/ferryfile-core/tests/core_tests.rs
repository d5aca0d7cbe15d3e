use std::path::PathBuf;

use ferryfile_core::{ClipboardOperation, EngineConfig, EngineError, EngineEvent, IoOp};

#[test]
fn test_event_path_accessor() {
    let added = EngineEvent::Added {
        path: PathBuf::from("/b/dir1"),
    };
    assert_eq!(added.path(), Some(&PathBuf::from("/b/dir1")));

    let progress = EngineEvent::Progress {
        current: 1,
        total: 2,
        percent: 50,
    };
    assert!(progress.path().is_none());
    assert!(!progress.is_error());
}

#[test]
fn test_event_from_error() {
    let err = EngineError::SameLocation {
        path: PathBuf::from("/a"),
    };
    let event = EngineEvent::from(&err);

    match event {
        EngineEvent::Error { title, message } => {
            assert_eq!(title, "Cannot paste here");
            assert!(message.contains("/a"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_event_json_shape() {
    let event = EngineEvent::Removed {
        path: PathBuf::from("/tmp/x"),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(json, r#"{"event":"removed","path":"/tmp/x"}"#);

    let back: EngineEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_config_from_partial_json() {
    let config: EngineConfig = serde_json::from_str(r#"{"buffer_size": 65536}"#).unwrap();
    assert_eq!(config.buffer_size, 65536);
    assert_eq!(config.step_items, 5);
    assert!(config.check_disk_space);
}

#[test]
fn test_io_error_keeps_source() {
    let err = EngineError::io(
        IoOp::Write,
        "/full/disk",
        std::io::Error::other("no space left"),
    );
    assert!(matches!(err, EngineError::Io { op: IoOp::Write, .. }));
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.title(), "Could not copy the item");
}

#[test]
fn test_clipboard_operation_display() {
    assert_eq!(ClipboardOperation::Cut.to_string(), "Cut");
    assert_eq!(ClipboardOperation::Copy.to_string(), "Copy");
}
