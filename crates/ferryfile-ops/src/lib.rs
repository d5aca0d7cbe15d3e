//! Cooperative file operations engine for ferryfile.
//!
//! Copy, move and remove requests are queued as actions and executed in
//! small steps, so a single-threaded caller stays responsive while large
//! trees are transferred. Results are reported as [`EngineEvent`]s over a
//! channel.
//!
//! [`EngineEvent`]: ferryfile_core::EngineEvent

mod action;
mod clipboard;
mod conflict;
mod copy;
mod engine;
mod expand;
mod notify;
mod progress;
pub mod service;
mod space;

pub use action::ActionKind;
pub use clipboard::{Clipboard, ClipboardContent};
pub use engine::{FileOperationEngine, Step};
pub use expand::{expand, Expansion, ItemKind, PathRecord};
pub use service::{spawn, EngineHandle, EngineStatus};
pub use space::available_space;
