//! Notifications emitted by the engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the clipboard content was stored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

impl std::fmt::Display for ClipboardOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Cut => write!(f, "Cut"),
        }
    }
}

/// A notification for the presentation layer.
///
/// Events are emitted in the same order as the filesystem mutations they
/// describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The action being processed was aborted.
    Error { title: String, message: String },
    /// An item ceased to exist.
    Removed { path: PathBuf },
    /// A new item exists.
    Added { path: PathBuf },
    /// Metadata of an existing item changed.
    Changed { path: PathBuf },
    /// Rate-limited progress of the current action.
    Progress {
        current: usize,
        total: usize,
        percent: u8,
    },
    /// Clipboard content or kind changed.
    ClipboardChanged,
}

impl EngineEvent {
    /// Create an error event from a title and message.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            title: title.into(),
            message: message.into(),
        }
    }

    /// The path this event refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Removed { path } | Self::Added { path } | Self::Changed { path } => Some(path),
            _ => None,
        }
    }

    /// Check if this is an error notification.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<&crate::EngineError> for EngineEvent {
    fn from(err: &crate::EngineError) -> Self {
        Self::error(err.title(), err.to_string())
    }
}
