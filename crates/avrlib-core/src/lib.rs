//! avrlib-core: Core traits, types, and error definitions for avrlib.
//!
//! This crate defines the backend-agnostic abstractions shared by the
//! transport, the command dispatcher, and the receiver backends.
//!
//! # Key types
//!
//! - [`AvReceiver`] -- the unified trait for controlling a receiver
//! - [`Transport`] / [`Connector`] -- byte-level sessions and how to open them
//! - [`ZoneId`] -- main zone and secondary zones
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod helpers;
pub mod receiver;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use avrlib_core::*`.
pub use error::{Error, Result};
pub use helpers::{MAX_VOLUME, volume_from_device, volume_to_device};
pub use receiver::AvReceiver;
pub use transport::{Connector, Transport};
pub use types::{InputInfo, ParseZoneError, ZoneId, ZoneMap};
