//! Async driver for [`FileOperationEngine`].
//!
//! The engine runs on a tokio task that interleaves command handling with
//! engine steps, yielding to the runtime after every step.

use std::path::PathBuf;

use ferryfile_core::{EngineConfig, EngineEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clipboard::Clipboard;
use crate::engine::{FileOperationEngine, Step};

/// Snapshot of the engine's queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub busy: bool,
    pub progress_counter: usize,
    pub clipboard_local_urls: usize,
}

#[derive(Debug)]
enum Command {
    PathChanged(PathBuf),
    Remove(Vec<PathBuf>),
    Cut(Vec<PathBuf>),
    Copy(Vec<PathBuf>),
    Paste,
    Cancel,
    Status(oneshot::Sender<EngineStatus>),
    WhenIdle(oneshot::Sender<()>),
}

/// Handle to a spawned engine task.
#[derive(Debug)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Spawn an engine on the current tokio runtime.
///
/// Returns the handle used to drive it and the receiver for its events.
pub fn spawn(
    config: EngineConfig,
    clipboard: Clipboard,
) -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let engine = FileOperationEngine::new(config, clipboard, event_tx);
    let task = tokio::spawn(run(engine, command_rx, shutdown.clone()));

    let handle = EngineHandle {
        commands: command_tx,
        shutdown,
        task,
    };
    (handle, event_rx)
}

impl EngineHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("engine task is gone, command dropped");
        }
    }

    pub fn path_changed(&self, path: impl Into<PathBuf>) {
        self.send(Command::PathChanged(path.into()));
    }

    pub fn remove(&self, paths: Vec<PathBuf>) {
        self.send(Command::Remove(paths));
    }

    pub fn cut(&self, paths: Vec<PathBuf>) {
        self.send(Command::Cut(paths));
    }

    pub fn copy(&self, paths: Vec<PathBuf>) {
        self.send(Command::Copy(paths));
    }

    pub fn paste(&self) {
        self.send(Command::Paste);
    }

    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    /// Query the engine. Returns the default status if the task has stopped.
    pub async fn status(&self) -> EngineStatus {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx));
        rx.await.unwrap_or_default()
    }

    /// Wait until every command sent so far has been handled and the queue
    /// has drained.
    pub async fn wait_idle(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::WhenIdle(tx));
        let _ = rx.await;
    }

    /// Stop the task, abandoning any work in flight.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "engine task ended abnormally");
        }
    }
}

async fn run(
    mut engine: FileOperationEngine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
) {
    let mut idle_waiters: Vec<oneshot::Sender<()>> = Vec::new();

    loop {
        while let Ok(command) = commands.try_recv() {
            apply(&mut engine, command, &mut idle_waiters);
        }

        if engine.is_busy() {
            if engine.step() == Step::Idle {
                notify_idle(&mut idle_waiters);
            }
            tokio::task::yield_now().await;
            if shutdown.is_cancelled() {
                break;
            }
            continue;
        }
        notify_idle(&mut idle_waiters);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => apply(&mut engine, command, &mut idle_waiters),
                None => break,
            },
        }
    }

    if engine.is_busy() {
        tracing::debug!("engine stopping with work in flight");
        engine.cancel();
        engine.step();
    }
}

fn apply(
    engine: &mut FileOperationEngine,
    command: Command,
    idle_waiters: &mut Vec<oneshot::Sender<()>>,
) {
    match command {
        Command::PathChanged(path) => engine.path_changed(path),
        Command::Remove(paths) => engine.remove(paths),
        Command::Cut(paths) => engine.cut(paths),
        Command::Copy(paths) => engine.copy(paths),
        Command::Paste => engine.paste(),
        Command::Cancel => engine.cancel(),
        Command::Status(reply) => {
            let _ = reply.send(EngineStatus {
                busy: engine.is_busy(),
                progress_counter: engine.progress_counter(),
                clipboard_local_urls: engine.clipboard_local_urls_counter(),
            });
        }
        Command::WhenIdle(reply) => idle_waiters.push(reply),
    }
}

fn notify_idle(waiters: &mut Vec<oneshot::Sender<()>>) {
    for waiter in waiters.drain(..) {
        let _ = waiter.send(());
    }
}
