//! Event emission toward the presentation layer.

use std::path::PathBuf;

use ferryfile_core::{EngineError, EngineEvent};
use tokio::sync::mpsc;

/// Sends engine events, ignoring a receiver that has gone away.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn added(&self, path: PathBuf) {
        self.emit(EngineEvent::Added { path });
    }

    pub fn removed(&self, path: PathBuf) {
        self.emit(EngineEvent::Removed { path });
    }

    pub fn changed(&self, path: PathBuf) {
        self.emit(EngineEvent::Changed { path });
    }

    pub fn progress(&self, current: usize, total: usize, percent: u8) {
        self.emit(EngineEvent::Progress {
            current,
            total,
            percent,
        });
    }

    pub fn error(&self, err: &EngineError) {
        self.emit(EngineEvent::from(err));
    }

    pub fn clipboard_changed(&self) {
        self.emit(EngineEvent::ClipboardChanged);
    }
}
