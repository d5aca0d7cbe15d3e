//! Collision detection and backup naming for paste operations.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{EngineError, IoOp};

use crate::expand::{ItemKind, PathRecord};

/// Highest counter tried when looking for a free backup name.
const MAX_BACKUP_ATTEMPTS: u32 = 99;

/// What already sits at a paste destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Nothing there.
    None,
    /// A file, symlink or special file.
    File,
    /// A real directory (not a symlink to one).
    Directory,
}

impl Collision {
    /// Inspect `target` without following symlinks.
    pub fn at(target: &Path) -> Self {
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => Self::Directory,
            Ok(_) => Self::File,
            Err(_) => Self::None,
        }
    }

    pub fn exists(self) -> bool {
        self != Self::None
    }
}

/// Check whether two directory paths name the same location.
pub fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Reject pasting `source` into itself or one of its descendants.
pub fn ensure_not_into_itself(source: &Path, destination: &Path) -> Result<(), EngineError> {
    let inside = destination.starts_with(source)
        || matches!(
            (source.canonicalize(), destination.canonicalize()),
            (Ok(s), Ok(d)) if d.starts_with(&s)
        );
    if inside {
        return Err(EngineError::IntoItself {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// Build the name for a duplicate of `record` pasted into its own directory.
///
/// For "notes.txt", tries "notes Copy.txt", "notes Copy(2).txt", etc.
/// Directories and dot-files keep their whole name as the stem.
pub fn backup_name(destination: &Path, record: &PathRecord) -> Result<OsString, EngineError> {
    let name = record
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (stem, extension) = match name.rfind('.') {
        Some(pos) if pos > 0 && record.kind != ItemKind::Directory => name.split_at(pos),
        _ => (name.as_str(), ""),
    };

    for counter in 1..=MAX_BACKUP_ATTEMPTS {
        let candidate = if counter == 1 {
            format!("{stem} Copy{extension}")
        } else {
            format!("{stem} Copy({counter}){extension}")
        };
        if !Collision::at(&destination.join(&candidate)).exists() {
            return Ok(candidate.into());
        }
    }

    Err(EngineError::io(
        IoOp::Rename,
        destination.join(&name),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free backup name available",
        ),
    ))
}

/// A hidden sibling of `target` that does not exist yet.
///
/// Living in the same directory keeps the rename on one filesystem.
pub fn removal_path(target: &Path) -> PathBuf {
    let parent = target.parent().unwrap_or(Path::new(""));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pid = std::process::id();

    let mut counter = 0u32;
    loop {
        let candidate = parent.join(format!(".{name}.{pid}.{counter}.removing"));
        if !Collision::at(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Move an existing directory out of the way so it can be removed later.
///
/// Returns the new location of the directory.
pub fn displace_directory(target: &Path) -> Result<PathBuf, EngineError> {
    let temp = removal_path(target);
    fs::rename(target, &temp).map_err(|e| EngineError::io(IoOp::Rename, target, e))?;
    tracing::debug!(from = %target.display(), to = %temp.display(), "displaced directory");
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_record(path: PathBuf) -> PathRecord {
        PathRecord {
            path,
            kind: ItemKind::File,
            size: 0,
        }
    }

    #[test]
    fn test_backup_name_with_extension() {
        let temp = TempDir::new().unwrap();
        let record = file_record(temp.path().join("notes.txt"));
        assert_eq!(backup_name(temp.path(), &record).unwrap(), "notes Copy.txt");

        fs::write(temp.path().join("notes Copy.txt"), b"").unwrap();
        assert_eq!(
            backup_name(temp.path(), &record).unwrap(),
            "notes Copy(2).txt"
        );
    }

    #[test]
    fn test_backup_name_directory_and_dotfile() {
        let temp = TempDir::new().unwrap();
        let dir = PathRecord {
            path: temp.path().join("v1.2"),
            kind: ItemKind::Directory,
            size: 0,
        };
        assert_eq!(backup_name(temp.path(), &dir).unwrap(), "v1.2 Copy");

        let dotfile = file_record(temp.path().join(".bashrc"));
        assert_eq!(backup_name(temp.path(), &dotfile).unwrap(), ".bashrc Copy");
    }

    #[test]
    fn test_collision_kinds() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, b"x").unwrap();

        assert_eq!(Collision::at(temp.path()), Collision::Directory);
        assert_eq!(Collision::at(&file), Collision::File);
        assert_eq!(Collision::at(&temp.path().join("none")), Collision::None);
    }

    #[test]
    fn test_into_itself() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a");
        fs::create_dir_all(dir.join("b")).unwrap();

        assert!(ensure_not_into_itself(&dir, &dir).is_err());
        assert!(ensure_not_into_itself(&dir, &dir.join("b")).is_err());
        assert!(ensure_not_into_itself(&dir, temp.path()).is_ok());
    }

    #[test]
    fn test_displace_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("target");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("inner"), b"x").unwrap();

        let moved = displace_directory(&dir).unwrap();
        assert!(!dir.exists());
        assert!(moved.join("inner").exists());
        assert_eq!(moved.parent(), dir.parent());
        assert!(moved.file_name().unwrap().to_string_lossy().starts_with('.'));
    }
}
