//! The action scheduler.
//!
//! [`FileOperationEngine`] owns a FIFO queue of actions and works through the
//! one at its head in small steps. Each call to [`FileOperationEngine::step`]
//! does a bounded amount of filesystem work and returns, so the caller's loop
//! decides when the next step runs.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use ferryfile_core::{ClipboardOperation, EngineConfig, EngineError, EngineEvent, IoOp};
use tokio::sync::mpsc;

use crate::action::{Action, ActionEntry, ActionKind};
use crate::clipboard::{Clipboard, ClipboardContent, ClipboardTracker};
use crate::conflict::{self, Collision};
use crate::copy::{CopyStream, copy_symlink};
use crate::expand::{ItemKind, PathRecord};
use crate::notify::Notifier;
use crate::space;

/// Result of a call to [`FileOperationEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work is queued; call `step` again.
    Pending,
    /// Nothing left to do.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Running,
    Finished,
}

enum MoveOutcome {
    Moved,
    CrossDevice,
}

struct StepContext<'a> {
    config: &'a EngineConfig,
    notifier: &'a Notifier,
    simulate_cross_device: bool,
    space_limit: Option<u64>,
}

/// Cooperative copy/cut/paste/remove engine.
#[derive(Debug)]
pub struct FileOperationEngine {
    config: EngineConfig,
    queue: VecDeque<Action>,
    current: Option<Action>,
    cancel_requested: bool,
    path: PathBuf,
    clipboard: ClipboardTracker,
    notifier: Notifier,
    simulate_cross_device: bool,
    space_limit: Option<u64>,
}

impl FileOperationEngine {
    /// Create an engine that reports through `events`.
    pub fn new(
        config: EngineConfig,
        clipboard: Clipboard,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            current: None,
            cancel_requested: false,
            path: PathBuf::new(),
            clipboard: ClipboardTracker::new(clipboard),
            notifier: Notifier::new(events),
            simulate_cross_device: false,
            space_limit: None,
        }
    }

    /// Set the directory subsequent pastes go to.
    pub fn path_changed(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Queue removal of `paths`.
    pub fn remove(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        match build_removal(&paths) {
            Ok(action) => self.enqueue(action),
            Err(err) => self.report(&err),
        }
    }

    /// Put `paths` on the clipboard to be moved by the next paste.
    pub fn cut(&mut self, paths: Vec<PathBuf>) {
        self.store_on_clipboard(paths, ClipboardOperation::Cut);
    }

    /// Put `paths` on the clipboard to be duplicated by the next paste.
    pub fn copy(&mut self, paths: Vec<PathBuf>) {
        self.store_on_clipboard(paths, ClipboardOperation::Copy);
    }

    /// Paste the clipboard content into the current path.
    pub fn paste(&mut self) {
        let Some(content) = self.clipboard.content().filter(|c| !c.paths.is_empty()) else {
            tracing::debug!("paste with empty clipboard");
            return;
        };
        if self.clipboard.modified_by_other() {
            tracing::debug!("pasting clipboard content stored by another actor");
        }
        match self.build_paste(content) {
            Ok(action) => self.enqueue(action),
            Err(err) => self.report(&err),
        }
    }

    /// Stop all work. Queued actions are dropped now; the action in flight
    /// is torn down at the next step without further notifications.
    pub fn cancel(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!(dropped = self.queue.len(), "dropping queued actions");
            self.queue.clear();
        }
        if self.current.is_some() {
            self.cancel_requested = true;
        }
    }

    /// True while any action is queued or active.
    pub fn is_busy(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }

    /// Items processed so far by the active action.
    pub fn progress_counter(&self) -> usize {
        self.current.as_ref().map_or(0, |a| a.current_item)
    }

    /// Local paths currently on the clipboard.
    pub fn clipboard_local_urls_counter(&self) -> usize {
        self.clipboard.local_urls_counter()
    }

    /// Run one bounded unit of work.
    pub fn step(&mut self) -> Step {
        if self.cancel_requested {
            self.abort_current();
        } else if self.current.is_none() {
            self.start_next_action();
        } else {
            self.process_current();
        }

        if self.is_busy() {
            Step::Pending
        } else {
            Step::Idle
        }
    }

    /// Step until there is nothing left to do.
    pub fn run_until_idle(&mut self) {
        while self.step() == Step::Pending {}
    }

    #[cfg(test)]
    pub(crate) fn simulate_cross_device(&mut self) {
        self.simulate_cross_device = true;
    }

    #[cfg(test)]
    pub(crate) fn limit_available_space(&mut self, bytes: u64) {
        self.space_limit = Some(bytes);
    }

    fn store_on_clipboard(&mut self, paths: Vec<PathBuf>, operation: ClipboardOperation) {
        if paths.is_empty() {
            return;
        }
        self.clipboard.store(paths, operation);
        self.notifier.clipboard_changed();
    }

    fn report(&self, err: &EngineError) {
        tracing::warn!(error = %err, "request rejected");
        self.notifier.error(err);
    }

    fn enqueue(&mut self, action: Action) {
        tracing::debug!(
            kind = %action.kind,
            entries = action.entries.len(),
            items = action.total_items,
            bytes = action.total_bytes,
            "queued action"
        );
        self.queue.push_back(action);
    }

    fn build_paste(&self, content: ClipboardContent) -> Result<Action, EngineError> {
        let destination = self.path.clone();
        if !destination.is_dir() {
            return Err(EngineError::NotFound { path: destination });
        }

        let kind = match content.operation {
            ClipboardOperation::Copy => ActionKind::Copy,
            ClipboardOperation::Cut => ActionKind::Move,
        };

        for source in &content.paths {
            if kind == ActionKind::Move && conflict::same_location(parent_of(source), &destination)
            {
                return Err(EngineError::SameLocation { path: destination });
            }
            conflict::ensure_not_into_itself(source, &destination)?;
        }

        let origin = parent_of(&content.paths[0]).to_path_buf();
        let mut action = Action::new(kind, origin, destination.clone(), Some(content.operation));

        for source in &content.paths {
            let mut entry = ActionEntry::expand(source)?;
            if kind == ActionKind::Copy && conflict::same_location(parent_of(source), &destination)
            {
                entry.new_name = Some(conflict::backup_name(&destination, entry.top())?);
            }
            entry.already_exists = Collision::at(&entry.top_target(&destination)).exists();
            action.push_entry(entry);
        }

        if kind == ActionKind::Copy {
            ensure_space(
                &self.config,
                self.space_limit,
                &destination,
                action.total_bytes,
            )?;
        }
        Ok(action)
    }

    fn start_next_action(&mut self) {
        let Some(action) = self.queue.pop_front() else {
            return;
        };
        tracing::debug!(
            kind = %action.kind,
            from = %action.origin.display(),
            to = %action.destination.display(),
            aux = action.is_aux,
            "starting action"
        );
        if !action.is_aux && action.kind != ActionKind::Remove {
            self.notifier.progress(0, action.total_items, 0);
        }
        self.current = Some(action);
    }

    fn process_current(&mut self) {
        let ctx = StepContext {
            config: &self.config,
            notifier: &self.notifier,
            simulate_cross_device: self.simulate_cross_device,
            space_limit: self.space_limit,
        };
        let Some(action) = self.current.as_mut() else {
            return;
        };

        let result = match action.kind {
            ActionKind::Remove | ActionKind::HardMoveRemove => remove_step(action, &ctx),
            ActionKind::Copy | ActionKind::HardMoveCopy => copy_step(action, &ctx),
            ActionKind::Move => match move_step(action, &ctx) {
                Ok(MoveOutcome::Moved) => Ok(EntryState::Finished),
                Ok(MoveOutcome::CrossDevice) => {
                    switch_to_hard_move(action, &ctx).map(|()| EntryState::Running)
                }
                Err(err) => Err(err),
            },
        };

        let finished = match result {
            Ok(EntryState::Running) => false,
            Ok(EntryState::Finished) => end_action_entry(action, &ctx),
            Err(err) => {
                self.fail_current(err);
                return;
            }
        };
        if finished {
            self.end_current_action();
        }
    }

    fn end_current_action(&mut self) {
        let Some(mut action) = self.current.take() else {
            return;
        };

        if action.kind == ActionKind::HardMoveCopy {
            tracing::debug!("copy phase of move finished, removing originals");
            action.begin_removal_phase();
            self.current = Some(action);
            return;
        }

        action.done = true;
        if !action.is_aux {
            self.notifier
                .progress(action.total_items, action.total_items, 100);
        }

        if action.operation == Some(ClipboardOperation::Cut)
            && self
                .clipboard
                .convert_cut_to_copy(std::mem::take(&mut action.finished_targets))
        {
            self.notifier.clipboard_changed();
        }

        if let Some(aux) = action.aux.take() {
            self.queue.push_front(*aux);
        }
        tracing::debug!(kind = %action.kind, done = action.done, "action finished");
    }

    fn fail_current(&mut self, err: EngineError) {
        tracing::warn!(error = %err, "action aborted");
        self.notifier.error(&err);

        if let Some(mut action) = self.current.take() {
            if let Some(stream) = action.copy.take() {
                stream.abandon();
            }
            // Directories already moved aside still have to go.
            if let Some(aux) = action.aux.take() {
                self.queue.push_front(*aux);
            }
        }
    }

    fn abort_current(&mut self) {
        self.cancel_requested = false;
        if let Some(mut action) = self.current.take() {
            tracing::debug!(kind = %action.kind, "action cancelled");
            if let Some(stream) = action.copy.take() {
                stream.abandon();
            }
        }
    }
}

fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}

fn build_removal(paths: &[PathBuf]) -> Result<Action, EngineError> {
    let origin = parent_of(&paths[0]).to_path_buf();
    let mut action = Action::new(ActionKind::Remove, origin, PathBuf::new(), None);
    for path in paths {
        action.push_entry(ActionEntry::expand(path)?);
    }
    Ok(action)
}

fn remove_record(record: &PathRecord) -> Result<(), EngineError> {
    let result = if record.kind == ItemKind::Directory {
        fs::remove_dir(&record.path)
    } else {
        fs::remove_file(&record.path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %record.path.display(), "already gone");
            Ok(())
        }
        Err(e) => Err(EngineError::io(IoOp::Remove, &record.path, e)),
    }
}

/// Remove up to `step_items` records of the current entry, children first.
fn remove_step(action: &mut Action, ctx: &StepContext<'_>) -> Result<EntryState, EngineError> {
    let entry = &mut action.entries[action.entry_index];
    let mut handled = 0;
    while handled < ctx.config.step_items && !entry.is_done() {
        remove_record(entry.next_to_remove())?;
        entry.cursor += 1;
        action.current_item += 1;
        handled += 1;
    }
    if entry.is_done() {
        return Ok(EntryState::Finished);
    }

    if !action.is_aux && action.kind == ActionKind::Remove {
        report_items(action, ctx);
    }
    Ok(EntryState::Running)
}

/// Item-count progress, at most once per `step_items` processed items.
fn report_items(action: &mut Action, ctx: &StepContext<'_>) {
    if action.current_item - action.reported_items < ctx.config.step_items {
        return;
    }
    action.reported_items = action.current_item;
    ctx.notifier
        .progress(action.current_item, action.total_items, action.percent());
}

fn ensure_space(
    config: &EngineConfig,
    space_limit: Option<u64>,
    destination: &Path,
    required: u64,
) -> Result<(), EngineError> {
    if !config.check_disk_space {
        return Ok(());
    }
    match space_limit {
        Some(available) if required > available => Err(EngineError::InsufficientSpace {
            path: destination.to_path_buf(),
            required,
            available,
        }),
        Some(_) => Ok(()),
        None => space::ensure_space(destination, required),
    }
}

/// Get whatever sits at `target` out of the way of a moved item. A directory
/// is moved aside and removed after the action; anything else goes now.
fn clear_destination(action: &mut Action, target: &Path) -> Result<(), EngineError> {
    match Collision::at(target) {
        Collision::Directory => {
            let displaced = conflict::displace_directory(target)?;
            action.defer_removal(ActionEntry::expand(&displaced)?);
        }
        Collision::File => {
            fs::remove_file(target).map_err(|e| EngineError::io(IoOp::Remove, target, e))?;
        }
        Collision::None => {}
    }
    Ok(())
}

/// Rename the current entry into place, clearing whatever is in the way.
fn move_step(action: &mut Action, ctx: &StepContext<'_>) -> Result<MoveOutcome, EngineError> {
    let index = action.entry_index;
    let (source, target, already_exists) = {
        let entry = &action.entries[index];
        (
            entry.top().path.clone(),
            entry.top_target(&action.destination),
            entry.already_exists,
        )
    };

    if already_exists {
        clear_destination(action, &target)?;
    }

    let renamed = if ctx.simulate_cross_device {
        Err(EngineError::CrossDevice {
            path: source.clone(),
        })
    } else {
        fs::rename(&source, &target).map_err(|e| EngineError::io(IoOp::Rename, &source, e))
    };
    match renamed {
        Ok(()) => {}
        Err(err) if err.is_cross_device() => return Ok(MoveOutcome::CrossDevice),
        Err(err) => return Err(err),
    }

    let entry = &mut action.entries[index];
    entry.cursor = entry.len();
    action.current_item += entry.len();
    Ok(MoveOutcome::Moved)
}

/// Turn the rest of a move into a copy followed by a removal.
fn switch_to_hard_move(action: &mut Action, ctx: &StepContext<'_>) -> Result<(), EngineError> {
    tracing::debug!(
        to = %action.destination.display(),
        "rename crossed filesystems, falling back to copy and remove"
    );
    // Entries renamed before the failure are dropped, which changes the totals.
    let totals_changed = action.entry_index > 0;
    action.restart_as(ActionKind::HardMoveCopy);
    ensure_space(
        ctx.config,
        ctx.space_limit,
        &action.destination,
        action.total_bytes,
    )?;
    if totals_changed && !action.is_aux {
        ctx.notifier.progress(0, action.total_items, 0);
    }
    Ok(())
}

/// Create the next item of the current entry, or stream more of the file
/// in progress.
fn copy_step(action: &mut Action, ctx: &StepContext<'_>) -> Result<EntryState, EngineError> {
    let index = action.entry_index;

    if let Some(stream) = action.copy.as_mut() {
        let report = stream.advance(ctx.config.step_items)?;
        action.bytes_written += report.written;
        if report.notify_changed {
            ctx.notifier.changed(stream.target_path().to_path_buf());
        }

        if report.finished {
            if let Some(stream) = action.copy.take() {
                let bytes = stream.bytes_written();
                let target = stream.finish(ctx.config.preserve_metadata)?;
                tracing::trace!(dest = %target.display(), bytes, "copied file");
            }
            action.entries[index].cursor += 1;
            action.current_item += 1;
        } else if report.notify_progress && !action.is_aux {
            ctx.notifier
                .progress(action.current_item, action.total_items, action.percent());
        }
        return Ok(entry_state(&action.entries[index]));
    }

    let kind = action.kind;
    if kind == ActionKind::HardMoveCopy {
        let entry = &action.entries[index];
        if entry.creating_top() && entry.already_exists {
            let target = entry.top_target(&action.destination);
            clear_destination(action, &target)?;
        }
    }

    let entry = &mut action.entries[index];
    let record = entry.next_to_create().clone();
    let target = entry.target_for(&record.path, &action.destination);
    let is_top = entry.creating_top();

    // Inside a directory that already existed, items already present win.
    if kind == ActionKind::Copy
        && !is_top
        && entry.already_exists
        && record.kind != ItemKind::Directory
        && Collision::at(&target).exists()
    {
        tracing::debug!(dest = %target.display(), "keeping existing item");
        entry.cursor += 1;
        action.current_item += 1;
        return Ok(entry_state(entry));
    }

    match record.kind {
        ItemKind::File => {
            action.copy = Some(CopyStream::open(&record.path, target, is_top, ctx.config)?);
            return Ok(EntryState::Running);
        }
        ItemKind::Directory => {
            if Collision::at(&target) != Collision::Directory {
                fs::create_dir(&target)
                    .map_err(|e| EngineError::io(IoOp::CreateDir, &target, e))?;
                if is_top && !entry.already_exists {
                    ctx.notifier.added(target);
                    entry.added = true;
                }
            }
        }
        ItemKind::Symlink => copy_symlink(&record.path, &target)?,
        ItemKind::Special => {
            tracing::warn!(path = %record.path.display(), "skipping special file");
        }
    }

    entry.cursor += 1;
    action.current_item += 1;
    Ok(entry_state(entry))
}

fn entry_state(entry: &ActionEntry) -> EntryState {
    if entry.is_done() {
        EntryState::Finished
    } else {
        EntryState::Running
    }
}

/// Emit the notifications for a finished entry and move to the next one.
/// Returns true when that was the last entry.
fn end_action_entry(action: &mut Action, ctx: &StepContext<'_>) -> bool {
    let notifier = ctx.notifier;
    let kind = action.kind;
    let entry = &mut action.entries[action.entry_index];
    let source = entry.top().path.clone();
    let top_is_dir = entry.top().kind == ItemKind::Directory;
    let target = entry.top_target(&action.destination);

    match kind {
        ActionKind::Remove | ActionKind::HardMoveRemove => {
            if !action.is_aux {
                notifier.removed(source);
            }
        }
        ActionKind::Move => {
            notifier.removed(source);
            if entry.already_exists {
                notifier.removed(target.clone());
            }
            notifier.added(target.clone());
        }
        ActionKind::Copy | ActionKind::HardMoveCopy => {
            let replaced =
                entry.already_exists && (kind == ActionKind::HardMoveCopy || !top_is_dir);
            if replaced {
                notifier.removed(target.clone());
                notifier.added(target.clone());
            } else if entry.already_exists {
                notifier.changed(target.clone());
            } else if !entry.added {
                notifier.added(target.clone());
            }
            entry.added = true;
        }
    }

    if matches!(
        kind,
        ActionKind::Copy | ActionKind::Move | ActionKind::HardMoveCopy
    ) {
        action.finished_targets.push(target);
    }

    action.entry_index += 1;
    let last = action.entry_index >= action.entries.len();
    if last || action.is_aux {
        return last;
    }
    match kind {
        ActionKind::Remove | ActionKind::Move => report_items(action, ctx),
        ActionKind::Copy | ActionKind::HardMoveCopy => {
            notifier.progress(action.current_item, action.total_items, action.percent());
        }
        ActionKind::HardMoveRemove => {}
    }
    last
}
