//! paramlink-test-harness: Mock transports for paramlink.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the protocol engine without a board attached, and [`SlowTransport`] for
//! exercising write serialization under contention.

pub mod mock_serial;
pub mod slow;

pub use mock_serial::MockTransport;
pub use slow::SlowTransport;
