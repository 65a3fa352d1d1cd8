//! Protocol engine for the CSV-over-serial parameter protocol.
//!
//! The board speaks newline-terminated ASCII in both directions. Outbound
//! commands look like `update:paramsCurval,gain,7`; inbound status lines
//! are comma-separated with a one-letter opcode, such as `U,gain,7`.
//!
//! One tokio task owns the transport exclusively. It writes commands queued
//! by any number of [`Dispatcher`](io::Dispatcher) handles, one whole command
//! at a time, and between writes it reads inbound lines and hands them to a
//! [`LineHandler`](io::LineHandler).
//!
//! # Architecture
//!
//! - [`protocol`] -- newline framing and the inbound line decoder
//! - [`commands`] -- the outbound command encoder
//! - [`reader`] -- the line reader used by the IO task
//! - [`io`] -- IO task types, spawn, and the select loop

pub mod commands;
pub mod io;
pub mod protocol;
pub mod reader;
