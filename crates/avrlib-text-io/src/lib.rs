//! The command engine shared by line-oriented receiver backends.
//!
//! One tokio task owns the session to the receiver and serialises every
//! command through a FIFO queue. Responses are reassembled into lines and
//! matched back to the waiting command, skipping the status broadcasts a
//! receiver sends for unrelated state.
//!
//! # Architecture
//!
//! - [`protocol`] -- `\r` line framing and the per-attempt response buffer
//! - [`correlate`] -- commands, expectations, and matching lines to them
//! - [`io`] -- the dispatcher task, its handle, and its timing config

pub mod correlate;
pub mod io;
pub mod protocol;

pub use correlate::{Command, Expectation, Match, Reply, ResponsePattern, correlate};
pub use io::{AvrIo, IoConfig, spawn_io_task};
