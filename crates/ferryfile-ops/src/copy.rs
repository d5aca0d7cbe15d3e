//! Incremental single-file copy.
//!
//! A [`CopyStream`] moves a bounded number of chunks per call so a large file
//! is spread over many scheduler steps.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ferryfile_core::{EngineConfig, EngineError, IoOp};

use crate::progress::ByteThreshold;

/// What one call to [`CopyStream::advance`] achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChunkReport {
    /// Bytes written during this call.
    pub written: u64,
    /// The source reached end of file.
    pub finished: bool,
    /// The progress threshold was crossed.
    pub notify_progress: bool,
    /// The refresh threshold was crossed on a top-level item.
    pub notify_changed: bool,
}

/// Open handles and counters for the file currently being copied.
#[derive(Debug)]
pub(crate) struct CopyStream {
    source: File,
    target: File,
    source_path: PathBuf,
    target_path: PathBuf,
    bytes_written: u64,
    is_entry_item: bool,
    buffer: Vec<u8>,
    progress: ByteThreshold,
    refresh: ByteThreshold,
}

impl CopyStream {
    /// Open `source` for reading and create (or truncate) `target`.
    pub fn open(
        source_path: &Path,
        target_path: PathBuf,
        is_entry_item: bool,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let source =
            File::open(source_path).map_err(|e| EngineError::io(IoOp::Open, source_path, e))?;
        // Replace a link at the target instead of writing through it.
        if fs::symlink_metadata(&target_path).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&target_path)
                .map_err(|e| EngineError::io(IoOp::Remove, &target_path, e))?;
        }
        let target =
            File::create(&target_path).map_err(|e| EngineError::io(IoOp::Open, &target_path, e))?;

        tracing::trace!(
            source = %source_path.display(),
            dest = %target_path.display(),
            "opened copy stream"
        );

        Ok(Self {
            source,
            target,
            source_path: source_path.to_path_buf(),
            target_path,
            bytes_written: 0,
            is_entry_item,
            buffer: vec![0; config.buffer_size.max(1)],
            progress: ByteThreshold::new(config.progress_bytes),
            refresh: ByteThreshold::new(config.refresh_item_bytes),
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Copy up to `chunks` buffers from source to target.
    pub fn advance(&mut self, chunks: usize) -> Result<ChunkReport, EngineError> {
        let mut report = ChunkReport::default();

        for _ in 0..chunks.max(1) {
            let read = self
                .source
                .read(&mut self.buffer)
                .map_err(|e| EngineError::io(IoOp::Read, &self.source_path, e))?;
            if read == 0 {
                report.finished = true;
                break;
            }
            self.target
                .write_all(&self.buffer[..read])
                .map_err(|e| EngineError::io(IoOp::Write, &self.target_path, e))?;
            report.written += read as u64;
        }

        self.bytes_written += report.written;
        report.notify_progress = self.progress.record(report.written);
        report.notify_changed = self.refresh.record(report.written) && self.is_entry_item;

        tracing::trace!(
            dest = %self.target_path.display(),
            written = self.bytes_written,
            "copied chunk"
        );
        Ok(report)
    }

    /// Flush the target and carry over permissions and modification time
    /// where the target filesystem allows it.
    pub fn finish(self, preserve_metadata: bool) -> Result<PathBuf, EngineError> {
        self.target
            .sync_all()
            .map_err(|e| EngineError::io(IoOp::Write, &self.target_path, e))?;

        if preserve_metadata {
            if let Err(err) = preserve(&self.source, &self.target) {
                tracing::debug!(
                    dest = %self.target_path.display(),
                    error = %err,
                    "could not preserve metadata"
                );
            }
        }
        Ok(self.target_path)
    }

    /// Drop the handles and delete the partial target.
    pub fn abandon(self) {
        let Self {
            source,
            target,
            target_path,
            ..
        } = self;
        drop(source);
        drop(target);
        if let Err(err) = fs::remove_file(&target_path) {
            tracing::debug!(dest = %target_path.display(), error = %err, "could not remove partial copy");
        }
    }
}

fn preserve(source: &File, target: &File) -> std::io::Result<()> {
    let metadata = source.metadata()?;
    target.set_permissions(metadata.permissions())?;
    target.set_modified(metadata.modified()?)?;
    Ok(())
}

/// Recreate the symlink at `source` as `target`, pointing at the same
/// resolved location. Links are never followed.
pub(crate) fn copy_symlink(source: &Path, target: &Path) -> Result<(), EngineError> {
    let link = fs::read_link(source).map_err(|e| EngineError::io(IoOp::Metadata, source, e))?;
    let resolved = if link.is_relative() {
        source.parent().unwrap_or(Path::new("")).join(link)
    } else {
        link
    };

    if fs::symlink_metadata(target).is_ok_and(|m| !m.is_dir()) {
        fs::remove_file(target).map_err(|e| EngineError::io(IoOp::Remove, target, e))?;
    }

    make_symlink(&resolved, target)
}

#[cfg(unix)]
fn make_symlink(original: &Path, link: &Path) -> Result<(), EngineError> {
    std::os::unix::fs::symlink(original, link).map_err(|e| EngineError::io(IoOp::Symlink, link, e))
}

#[cfg(windows)]
fn make_symlink(original: &Path, link: &Path) -> Result<(), EngineError> {
    let result = if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    };
    result.map_err(|e| EngineError::io(IoOp::Symlink, link, e))
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_original: &Path, link: &Path) -> Result<(), EngineError> {
    Err(EngineError::Unsupported {
        message: format!("Symbolic links are not supported: {}", link.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_config() -> EngineConfig {
        EngineConfig::builder()
            .buffer_size(4usize)
            .step_items(2usize)
            .progress_bytes(16u64)
            .refresh_item_bytes(24u64)
            .build()
            .unwrap()
    }

    #[test]
    fn test_stream_in_bounded_chunks() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.bin");
        let data: Vec<u8> = (0..50u8).collect();
        fs::write(&source, &data).unwrap();

        let config = small_config();
        let mut stream =
            CopyStream::open(&source, temp.path().join("dst.bin"), true, &config).unwrap();

        let mut calls = 0;
        let mut progress_hits = 0;
        let mut changed_hits = 0;
        loop {
            let report = stream.advance(config.step_items).unwrap();
            assert!(report.written <= config.bytes_per_step() as u64);
            calls += 1;
            progress_hits += usize::from(report.notify_progress);
            changed_hits += usize::from(report.notify_changed);
            if report.finished {
                break;
            }
        }

        assert!(calls >= 7);
        assert_eq!(stream.bytes_written(), 50);
        assert_eq!(progress_hits, 3);
        assert_eq!(changed_hits, 2);

        let target = stream.finish(true).unwrap();
        assert_eq!(fs::read(target).unwrap(), data);
    }

    #[test]
    fn test_descendant_never_reports_changed() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.bin");
        fs::write(&source, vec![7u8; 64]).unwrap();

        let config = small_config();
        let mut stream =
            CopyStream::open(&source, temp.path().join("dst.bin"), false, &config).unwrap();
        loop {
            let report = stream.advance(1).unwrap();
            assert!(!report.notify_changed);
            if report.finished {
                break;
            }
        }
    }

    #[test]
    fn test_abandon_removes_partial_target() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src.bin");
        fs::write(&source, vec![1u8; 100]).unwrap();
        let target = temp.path().join("dst.bin");

        let mut stream = CopyStream::open(&source, target.clone(), true, &small_config()).unwrap();
        stream.advance(1).unwrap();
        assert!(target.exists());

        stream.abandon();
        assert!(!target.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_empty_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("empty");
        fs::write(&source, b"").unwrap();

        let mut stream =
            CopyStream::open(&source, temp.path().join("copy"), true, &small_config()).unwrap();
        let report = stream.advance(2).unwrap();
        assert!(report.finished);
        assert_eq!(report.written, 0);
        let target = stream.finish(false).unwrap();
        assert_eq!(fs::metadata(target).unwrap().len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_open_replaces_link_at_target() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("f.txt");
        fs::write(&source, b"precious").unwrap();
        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();
        let target = out.join("f.txt");
        std::os::unix::fs::symlink(&source, &target).unwrap();

        let mut stream = CopyStream::open(&source, target.clone(), true, &small_config()).unwrap();
        while !stream.advance(2).unwrap().finished {}
        stream.finish(true).unwrap();

        assert_eq!(fs::read(&source).unwrap(), b"precious");
        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_file());
        assert_eq!(fs::read(&target).unwrap(), b"precious");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_symlink_keeps_link() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real.txt");
        fs::write(&real, b"content").unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("real.txt", &link).unwrap();

        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();
        let copied = out.join("link");
        copy_symlink(&link, &copied).unwrap();

        let meta = fs::symlink_metadata(&copied).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(&copied).unwrap(), real);
        assert_eq!(fs::read(&copied).unwrap(), b"content");
    }
}
