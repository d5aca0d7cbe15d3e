//! Error types for file operations.

use std::path::PathBuf;

use humansize::{DECIMAL, format_size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The filesystem call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoOp {
    Open,
    Read,
    Write,
    Rename,
    Remove,
    CreateDir,
    Symlink,
    Metadata,
    Walk,
}

impl std::fmt::Display for IoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Rename => write!(f, "rename"),
            Self::Remove => write!(f, "remove"),
            Self::CreateDir => write!(f, "create directory"),
            Self::Symlink => write!(f, "create symbolic link"),
            Self::Metadata => write!(f, "read metadata of"),
            Self::Walk => write!(f, "list"),
        }
    }
}

/// Errors that can occur while building or running an action.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A cut was pasted back into the directory it came from.
    #[error("Source and destination are the same: {path}")]
    SameLocation { path: PathBuf },

    /// A directory was pasted into itself or one of its descendants.
    #[error("Cannot paste {source_path} into itself ({destination})")]
    IntoItself {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Not enough free space on the destination filesystem.
    #[error(
        "{} required but only {} available on {path}",
        format_size(*required, DECIMAL),
        format_size(*available, DECIMAL)
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Rename across filesystems. Handled internally by the hard-move fallback.
    #[error("Cannot rename {path} across filesystems")]
    CrossDevice { path: PathBuf },

    /// The operation is not available on this platform.
    #[error("{message}")]
    Unsupported { message: String },

    /// A filesystem call failed.
    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Create an I/O error with path context.
    pub fn io(op: IoOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        if op == IoOp::Rename && is_cross_device(&source) {
            return Self::CrossDevice { path };
        }
        Self::Io { op, path, source }
    }

    /// Short user-facing title for error notifications.
    pub fn title(&self) -> String {
        match self {
            Self::SameLocation { .. } => "Cannot paste here".into(),
            Self::IntoItself { .. } => "Cannot paste a folder into itself".into(),
            Self::InsufficientSpace { .. } => "There is not enough space to paste".into(),
            Self::NotFound { .. } => "Item does not exist".into(),
            Self::CrossDevice { .. } => "Could not move the item".into(),
            Self::Unsupported { .. } => "Operation not supported".into(),
            Self::Io { op, .. } => match op {
                IoOp::Remove => "Could not remove the item".into(),
                IoOp::Rename => "Could not move the item".into(),
                IoOp::CreateDir => "Could not create the directory".into(),
                IoOp::Symlink => "Could not create the link".into(),
                IoOp::Walk | IoOp::Metadata => "Could not read the item".into(),
                IoOp::Open | IoOp::Read | IoOp::Write => "Could not copy the item".into(),
            },
        }
    }

    /// Whether this error means the hard-move fallback should take over.
    pub fn is_cross_device(&self) -> bool {
        matches!(self, Self::CrossDevice { .. })
    }
}

fn is_cross_device(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::CrossesDevices {
        return true;
    }
    #[cfg(unix)]
    {
        // EXDEV on every unix we care about.
        err.raw_os_error() == Some(18)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_not_found() {
        let err = EngineError::io(
            IoOp::Open,
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_rename_cross_device_detected() {
        let err = EngineError::io(
            IoOp::Rename,
            "/a",
            std::io::Error::new(std::io::ErrorKind::CrossesDevices, "exdev"),
        );
        assert!(err.is_cross_device());

        let err = EngineError::io(
            IoOp::Write,
            "/a",
            std::io::Error::new(std::io::ErrorKind::CrossesDevices, "exdev"),
        );
        assert!(!err.is_cross_device());
    }

    #[test]
    fn test_titles() {
        let err = EngineError::io(
            IoOp::Remove,
            "/a",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.title(), "Could not remove the item");
        assert!(err.to_string().contains("/a"));
    }

    #[test]
    fn test_insufficient_space_message() {
        let err = EngineError::InsufficientSpace {
            path: "/mnt".into(),
            required: 2_000_000,
            available: 1_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 MB"));
        assert!(msg.contains("/mnt"));
    }
}
