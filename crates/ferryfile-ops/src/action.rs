//! Actions and their entries.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ferryfile_core::{ClipboardOperation, EngineError};

use crate::copy::CopyStream;
use crate::expand::{PathRecord, expand};

/// The kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Remove,
    Copy,
    Move,
    /// Copy half of a move that could not be done by rename.
    HardMoveCopy,
    /// Remove half of a move that could not be done by rename.
    HardMoveRemove,
}

impl ActionKind {
    /// Whether progress is measured in bytes.
    pub fn streams_bytes(self) -> bool {
        matches!(self, Self::Copy | Self::HardMoveCopy)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remove => write!(f, "Remove"),
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::HardMoveCopy => write!(f, "Move (copy)"),
            Self::HardMoveRemove => write!(f, "Move (remove)"),
        }
    }
}

/// One top-level item of an action.
#[derive(Debug)]
pub(crate) struct ActionEntry {
    /// Child-before-parent order; the top-level item is last.
    pub records: Vec<PathRecord>,
    /// Number of records already handled.
    pub cursor: usize,
    /// Sum of regular file sizes in `records`.
    pub bytes: u64,
    /// Something already existed at the destination when the action was built.
    pub already_exists: bool,
    /// Destination name replacing the top-level name.
    pub new_name: Option<OsString>,
    /// `added` has been emitted for the top-level target.
    pub added: bool,
}

impl ActionEntry {
    pub fn expand(path: &Path) -> Result<Self, EngineError> {
        let expansion = expand(path)?;
        Ok(Self {
            records: expansion.records,
            cursor: 0,
            bytes: expansion.bytes,
            already_exists: false,
            new_name: None,
            added: false,
        })
    }

    pub fn top(&self) -> &PathRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.records.len()
    }

    /// Next record when consuming head-to-tail (removal order).
    pub fn next_to_remove(&self) -> &PathRecord {
        &self.records[self.cursor]
    }

    /// Next record when consuming tail-to-head (creation order).
    pub fn next_to_create(&self) -> &PathRecord {
        &self.records[self.records.len() - 1 - self.cursor]
    }

    /// Whether the next record in creation order is the top-level item.
    pub fn creating_top(&self) -> bool {
        self.cursor == 0
    }

    /// Where `path`, which lies under this entry's top-level item, lands
    /// inside `destination`.
    pub fn target_for(&self, path: &Path, destination: &Path) -> PathBuf {
        let top = &self.top().path;
        let name = match &self.new_name {
            Some(name) => name.clone(),
            None => top.file_name().map(OsString::from).unwrap_or_default(),
        };
        let base = destination.join(name);
        match path.strip_prefix(top) {
            Ok(rel) if !rel.as_os_str().is_empty() => base.join(rel),
            _ => base,
        }
    }

    pub fn top_target(&self, destination: &Path) -> PathBuf {
        self.target_for(&self.top().path, destination)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// One user-level request.
#[derive(Debug)]
pub(crate) struct Action {
    pub kind: ActionKind,
    pub entries: Vec<ActionEntry>,
    pub entry_index: usize,
    pub total_items: usize,
    pub current_item: usize,
    /// `current_item` at the last item-count progress report.
    pub reported_items: usize,
    pub total_bytes: u64,
    pub bytes_written: u64,
    /// Directory the items came from.
    pub origin: PathBuf,
    /// Directory the items go to; empty for removals.
    pub destination: PathBuf,
    pub operation: Option<ClipboardOperation>,
    pub done: bool,
    /// Deferred removal to run right after this action.
    pub aux: Option<Box<Action>>,
    pub is_aux: bool,
    /// File being streamed, if any.
    pub copy: Option<CopyStream>,
    /// Top-level targets of finished entries.
    pub finished_targets: Vec<PathBuf>,
}

impl Action {
    pub fn new(
        kind: ActionKind,
        origin: PathBuf,
        destination: PathBuf,
        operation: Option<ClipboardOperation>,
    ) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            entry_index: 0,
            total_items: 0,
            current_item: 0,
            reported_items: 0,
            total_bytes: 0,
            bytes_written: 0,
            origin,
            destination,
            operation,
            done: false,
            aux: None,
            is_aux: false,
            copy: None,
            finished_targets: Vec::new(),
        }
    }

    /// A removal chained behind another action.
    pub fn auxiliary_remove() -> Self {
        let mut action = Self::new(ActionKind::Remove, PathBuf::new(), PathBuf::new(), None);
        action.is_aux = true;
        action
    }

    pub fn push_entry(&mut self, entry: ActionEntry) {
        self.total_items += entry.len();
        self.total_bytes += entry.bytes;
        self.entries.push(entry);
    }

    /// Queue `entry` for removal once this action is over.
    pub fn defer_removal(&mut self, entry: ActionEntry) {
        self.aux
            .get_or_insert_with(|| Box::new(Self::auxiliary_remove()))
            .push_entry(entry);
    }

    pub fn percent(&self) -> u8 {
        crate::progress::percent_done(
            self.kind.streams_bytes(),
            self.current_item,
            self.total_items,
            self.bytes_written,
            self.total_bytes,
        )
    }

    /// Restart from the first entry under a new kind, dropping entries that
    /// already finished.
    pub fn restart_as(&mut self, kind: ActionKind) {
        self.entries.drain(..self.entry_index.min(self.entries.len()));
        self.kind = kind;
        self.entry_index = 0;
        self.current_item = 0;
        self.reported_items = 0;
        self.bytes_written = 0;
        self.total_items = self.entries.iter().map(ActionEntry::len).sum();
        self.total_bytes = self.entries.iter().map(|e| e.bytes).sum();
        for entry in &mut self.entries {
            entry.rewind();
        }
    }

    /// Second half of a hard move: walk the same entries again, removing
    /// the originals.
    pub fn begin_removal_phase(&mut self) {
        self.kind = ActionKind::HardMoveRemove;
        self.entry_index = 0;
        self.current_item = 0;
        self.reported_items = 0;
        for entry in &mut self.entries {
            entry.rewind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ItemKind;

    fn entry(paths: &[&str]) -> ActionEntry {
        ActionEntry {
            records: paths
                .iter()
                .map(|p| PathRecord {
                    path: PathBuf::from(p),
                    kind: ItemKind::File,
                    size: 10,
                })
                .collect(),
            cursor: 0,
            bytes: 10 * paths.len() as u64,
            already_exists: false,
            new_name: None,
            added: false,
        }
    }

    #[test]
    fn test_target_for() {
        let e = entry(&["/a/dir1/sub/f2.txt", "/a/dir1/sub", "/a/dir1"]);
        let dest = Path::new("/b");
        assert_eq!(e.top_target(dest), PathBuf::from("/b/dir1"));
        assert_eq!(
            e.target_for(Path::new("/a/dir1/sub/f2.txt"), dest),
            PathBuf::from("/b/dir1/sub/f2.txt")
        );
    }

    #[test]
    fn test_target_for_renamed() {
        let mut e = entry(&["/a/dir1/f.txt", "/a/dir1"]);
        e.new_name = Some("dir1 Copy".into());
        assert_eq!(
            e.target_for(Path::new("/a/dir1/f.txt"), Path::new("/a")),
            PathBuf::from("/a/dir1 Copy/f.txt")
        );
    }

    #[test]
    fn test_cursor_orders() {
        let mut e = entry(&["/a/d/x", "/a/d"]);
        assert!(e.creating_top());
        assert_eq!(e.next_to_create().path, PathBuf::from("/a/d"));
        assert_eq!(e.next_to_remove().path, PathBuf::from("/a/d/x"));
        e.cursor = 1;
        assert_eq!(e.next_to_create().path, PathBuf::from("/a/d/x"));
        e.cursor = 2;
        assert!(e.is_done());
    }

    #[test]
    fn test_restart_drops_finished_entries() {
        let mut action = Action::new(ActionKind::Move, "/a".into(), "/b".into(), None);
        action.push_entry(entry(&["/a/one"]));
        action.push_entry(entry(&["/a/two/x", "/a/two"]));
        assert_eq!(action.total_items, 3);

        action.entries[0].cursor = 1;
        action.entry_index = 1;
        action.current_item = 1;
        action.entries[1].cursor = 2;

        action.restart_as(ActionKind::HardMoveCopy);
        assert_eq!(action.entries.len(), 1);
        assert_eq!(action.total_items, 2);
        assert_eq!(action.total_bytes, 20);
        assert_eq!(action.current_item, 0);
        assert_eq!(action.entries[0].cursor, 0);
    }

    #[test]
    fn test_defer_removal_builds_single_aux() {
        let mut action = Action::new(ActionKind::Move, "/a".into(), "/b".into(), None);
        action.defer_removal(entry(&["/b/.x.removing"]));
        action.defer_removal(entry(&["/b/.y.removing"]));

        let aux = action.aux.as_ref().unwrap();
        assert!(aux.is_aux);
        assert_eq!(aux.kind, ActionKind::Remove);
        assert_eq!(aux.entries.len(), 2);
    }
}
