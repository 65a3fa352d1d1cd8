//! # paramlink -- parameter control for microcontroller boards
//!
//! `paramlink` talks to a board running the parameter firmware over a
//! serial link. The board keeps a list of named parameters (index, min,
//! max, current), reports pin reads, and announces changes made on its own
//! controls. This crate keeps a local registry of those parameters in step
//! with the board and sends commands to it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use paramlink::{Command, EngineBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = EngineBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .build()
//!         .await?;
//!
//!     engine.submit(&Command::ListAllParams).await?;
//!     tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!
//!     for p in engine.store().snapshot() {
//!         println!("{} = {:?}", p.name, p.current);
//!     }
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |---|---|
//! | `paramlink-core` | Types, events, the [`Transport`] trait, errors |
//! | `paramlink-transport` | Serial port transport |
//! | `paramlink-text-io` | Framing, line decoder, command encoder, IO task |
//! | **`paramlink`** | Registry, event applier, engine, API handlers |
//!
//! Inside an [`Engine`], one IO task owns the transport. It writes the
//! commands queued by every [`Dispatcher`] clone, one whole line at a time,
//! and hands each inbound line to the [`Applier`], which updates the
//! [`ParameterStore`] and [`DeviceStatus`] and publishes a
//! [`Notification`]. Notifications feed the operator [`LogBuffer`], any
//! registered [`Observer`]s, and [`Engine::subscribe`] receivers.
//!
//! Commands are fire-and-forget. A reply, if the board sends one, arrives
//! as an ordinary inbound line and lands in the registry.

pub mod api;
pub mod applier;
pub mod builder;
pub mod engine;
pub mod observer;
pub mod status;
pub mod store;

pub use api::{Api, ApiError};
pub use applier::Applier;
pub use builder::EngineBuilder;
pub use engine::Engine;
pub use observer::{LogBuffer, Observer};
pub use status::DeviceStatus;
pub use store::ParameterStore;

pub use paramlink_core::*;
pub use paramlink_text_io::io::{Dispatch, Dispatcher};
pub use paramlink_transport::{SerialConfig, SerialTransport};
