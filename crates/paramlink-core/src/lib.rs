//! paramlink-core: Core types, traits, and error definitions for paramlink.
//!
//! This crate defines the device-agnostic pieces every other paramlink crate
//! builds on. Applications that only need to describe parameters, commands,
//! or decoded events depend on this crate without pulling in a serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel to the device
//! - [`Event`] -- one decoded inbound status line
//! - [`Command`] -- one outbound instruction, prior to encoding
//! - [`Parameter`] -- a named index/min/max/current record
//! - [`Notification`] -- what observers receive as the engine works
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use paramlink_core::*`.
pub use error::{Error, Result};
pub use events::{Event, Notification};
pub use transport::Transport;
pub use types::*;
