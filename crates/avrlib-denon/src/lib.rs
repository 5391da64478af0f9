//! Denon/Marantz telnet protocol backend for avrlib.
//!
//! Network-connected Denon and Marantz receivers accept a line-oriented ASCII
//! control protocol on TCP port 23. This crate provides:
//!
//! - **Command builders** ([`commands`]) -- the commands for power, volume,
//!   mute, input selection, and zone enumeration, with the response patterns
//!   that pick their answers out of the receiver's status broadcasts.
//! - **Receiver driver** ([`receiver`]) -- the
//!   [`AvReceiver`](avrlib_core::AvReceiver) implementation on top of the
//!   shared command dispatcher.
//! - **Builder** ([`builder`]) -- fluent builder API for constructing
//!   [`DenonReceiver`] instances with sensible defaults.
//!
//! # Example
//!
//! ```
//! use avrlib_core::ZoneId;
//! use avrlib_denon::commands::{cmd_get_volume, cmd_set_volume, parse_volume};
//! use avrlib_text_io::correlate;
//!
//! let set = cmd_set_volume(ZoneId::MAIN, 45.5).unwrap();
//! assert_eq!(set.text(), "MV455");
//!
//! // A receiver answers MV? with its volume and its volume limit.
//! let get = cmd_get_volume(ZoneId::MAIN).unwrap();
//! let lines = vec!["MV455".to_string(), "MVMAX 98".to_string()];
//! let reply = correlate(&lines, get.expectation()).unwrap();
//! assert_eq!(parse_volume(reply).unwrap(), 45.5);
//! ```

pub mod builder;
pub mod commands;
pub mod receiver;

pub use builder::DenonBuilder;
pub use receiver::DenonReceiver;
