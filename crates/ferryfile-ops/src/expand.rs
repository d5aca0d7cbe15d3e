//! Expansion of a top-level path into the items an action works through.

use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{EngineError, IoOp};
use jwalk::{Parallelism, WalkDir};

/// What kind of filesystem object a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Directory,
    Symlink,
    /// Sockets, fifos and devices. Removable, never streamed.
    Special,
}

impl ItemKind {
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Special
        }
    }
}

/// One path discovered during expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    pub path: PathBuf,
    pub kind: ItemKind,
    /// Size in bytes; only meaningful for regular files.
    pub size: u64,
}

impl PathRecord {
    fn new(path: PathBuf, metadata: &fs::Metadata) -> Self {
        let kind = ItemKind::from_metadata(metadata);
        let size = if kind == ItemKind::File {
            metadata.len()
        } else {
            0
        };
        Self { path, kind, size }
    }

    /// Read the record for a path without following symlinks.
    pub fn stat(path: &Path) -> Result<Self, EngineError> {
        let metadata =
            fs::symlink_metadata(path).map_err(|e| EngineError::io(IoOp::Metadata, path, e))?;
        Ok(Self::new(path.to_path_buf(), &metadata))
    }
}

/// The expanded form of a top-level path.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Descendants in child-before-parent order, the top-level path last.
    pub records: Vec<PathRecord>,
    /// Sum of the sizes of every regular file in `records`.
    pub bytes: u64,
}

/// Expand `path` into its work list.
///
/// Files, symlinks and special files produce a single record. Directories
/// are walked depth-first without following symlinks; the pre-order walk is
/// reversed so every child precedes its parent, and the directory itself is
/// the final element. Reading the list tail-to-head therefore visits parents
/// first, which is the order copies need.
pub fn expand(path: &Path) -> Result<Expansion, EngineError> {
    let top = PathRecord::stat(path)?;
    let mut records = Vec::new();

    if top.kind == ItemKind::Directory {
        let walker = WalkDir::new(path)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1);

        for entry in walker {
            let entry = entry.map_err(|err| {
                let at = err.path().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf());
                EngineError::io(IoOp::Walk, at, std::io::Error::other(err.to_string()))
            })?;
            records.push(PathRecord::stat(&entry.path())?);
        }
        records.reverse();
    }

    records.push(top);
    let bytes = records
        .iter()
        .filter(|r| r.kind == ItemKind::File)
        .map(|r| r.size)
        .sum();

    Ok(Expansion { records, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn position(records: &[PathRecord], path: &Path) -> usize {
        records
            .iter()
            .position(|r| r.path == path)
            .unwrap_or_else(|| panic!("{} missing", path.display()))
    }

    fn assert_children_first(records: &[PathRecord]) {
        for (i, record) in records.iter().enumerate() {
            for (j, other) in records.iter().enumerate() {
                if other.path != record.path && other.path.starts_with(&record.path) {
                    assert!(
                        j < i,
                        "{} appears after its ancestor {}",
                        other.path.display(),
                        record.path.display()
                    );
                }
            }
        }
    }

    #[test]
    fn test_expand_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        let expansion = expand(&file).unwrap();
        assert_eq!(expansion.records.len(), 1);
        assert_eq!(expansion.records[0].kind, ItemKind::File);
        assert_eq!(expansion.bytes, 5);
    }

    #[test]
    fn test_expand_nested_children_first() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("dir1");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("f1.txt"), b"one").unwrap();
        fs::write(root.join("sub/f2.txt"), b"two!").unwrap();
        fs::write(root.join("sub/deeper/f3.txt"), b"3").unwrap();
        fs::write(root.join(".hidden"), b"").unwrap();

        let expansion = expand(&root).unwrap();
        let records = &expansion.records;

        assert_eq!(records.len(), 8);
        assert_eq!(records.last().unwrap().path, root);
        assert_eq!(expansion.bytes, 8);
        assert_children_first(records);
        assert!(position(records, &root.join("sub/deeper")) < position(records, &root.join("sub")));
        assert!(position(records, &root.join(".hidden")) < records.len() - 1);
    }

    #[test]
    fn test_expand_empty_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("empty");
        fs::create_dir(&root).unwrap();

        let expansion = expand(&root).unwrap();
        assert_eq!(expansion.records.len(), 1);
        assert_eq!(expansion.records[0].kind, ItemKind::Directory);
        assert_eq!(expansion.bytes, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_expand_does_not_follow_symlinked_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/file"), b"data").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();
        // A cycle back to the root must not loop.
        std::os::unix::fs::symlink(&root, root.join("real/up")).unwrap();

        let expansion = expand(&root).unwrap();
        let link = &expansion.records[position(&expansion.records, &root.join("link"))];
        assert_eq!(link.kind, ItemKind::Symlink);
        let under_link = expansion
            .records
            .iter()
            .filter(|r| r.path.starts_with(root.join("link")))
            .count();
        assert_eq!(under_link, 1);
        assert_eq!(expansion.records.len(), 5);
        assert_children_first(&expansion.records);
    }

    #[test]
    fn test_expand_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = expand(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
