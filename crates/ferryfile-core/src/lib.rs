//! Core types for ferryfile.
//!
//! This crate provides the vocabulary shared by the operation engine and its
//! front ends: errors, configuration and the notifications the engine emits.

mod config;
mod error;
mod event;

pub use config::{EngineConfig, EngineConfigBuilder, REFRESH_ITEM_BYTES};
pub use error::{EngineError, IoOp};
pub use event::{ClipboardOperation, EngineEvent};
