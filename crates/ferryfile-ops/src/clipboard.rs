//! Clipboard state shared between the engine and other actors.
//!
//! The clipboard is a process-wide slot carrying a version counter. Every
//! write bumps the version, so the engine can tell at paste time whether the
//! content it stored is still the content on the clipboard.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use ferryfile_core::ClipboardOperation;

/// Paths on the clipboard together with what they were stored for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardContent {
    pub paths: Vec<PathBuf>,
    pub operation: ClipboardOperation,
}

impl ClipboardContent {
    pub fn new(paths: Vec<PathBuf>, operation: ClipboardOperation) -> Self {
        Self { paths, operation }
    }
}

#[derive(Debug, Default)]
struct Slot {
    content: Option<ClipboardContent>,
    version: u64,
}

/// Handle to a clipboard slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    slot: Arc<Mutex<Slot>>,
}

static GLOBAL: OnceLock<Clipboard> = OnceLock::new();

impl Clipboard {
    /// Create a private clipboard, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide clipboard, created on first use.
    pub fn global() -> Self {
        GLOBAL.get_or_init(Self::new).clone()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the content and return the new version.
    pub fn set(&self, content: Option<ClipboardContent>) -> u64 {
        let mut slot = self.lock();
        slot.content = content;
        slot.version += 1;
        slot.version
    }

    /// Drop whatever is on the clipboard.
    pub fn clear(&self) -> u64 {
        self.set(None)
    }

    pub fn content(&self) -> Option<ClipboardContent> {
        self.lock().content.clone()
    }

    /// Fingerprint of the current content.
    pub fn version(&self) -> u64 {
        self.lock().version
    }
}

/// The engine's view of the clipboard: what it stored last, and at which
/// version.
#[derive(Debug)]
pub(crate) struct ClipboardTracker {
    clipboard: Clipboard,
    stored_version: Option<u64>,
}

impl ClipboardTracker {
    pub fn new(clipboard: Clipboard) -> Self {
        Self {
            clipboard,
            stored_version: None,
        }
    }

    pub fn store(&mut self, paths: Vec<PathBuf>, operation: ClipboardOperation) {
        let version = self
            .clipboard
            .set(Some(ClipboardContent::new(paths, operation)));
        self.stored_version = Some(version);
    }

    pub fn content(&self) -> Option<ClipboardContent> {
        self.clipboard.content()
    }

    /// True when someone other than this engine wrote the clipboard since
    /// the engine last stored to it.
    pub fn modified_by_other(&self) -> bool {
        self.stored_version != Some(self.clipboard.version())
    }

    /// Number of absolute paths on the clipboard; zero once another actor
    /// has replaced the engine's content.
    pub fn local_urls_counter(&self) -> usize {
        if self.modified_by_other() {
            return 0;
        }
        self.content()
            .map(|c| c.paths.iter().filter(|p| p.is_absolute()).count())
            .unwrap_or(0)
    }

    /// After a cut has been pasted, point the clipboard at the new location
    /// as a copy. Returns false, leaving the clipboard alone, when another
    /// actor changed it meanwhile.
    pub fn convert_cut_to_copy(&mut self, destinations: Vec<PathBuf>) -> bool {
        if self.modified_by_other() || destinations.is_empty() {
            return false;
        }
        let still_cut = self
            .content()
            .is_some_and(|c| c.operation == ClipboardOperation::Cut);
        if !still_cut {
            return false;
        }
        self.store(destinations, ClipboardOperation::Copy);
        true
    }
}
