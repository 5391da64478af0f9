//! # avrlib -- Network Control for Denon and Marantz AV Receivers
//!
//! `avrlib` is an asynchronous Rust library for controlling network-connected
//! AV receivers over their telnet control port. It is designed for
//! home-automation bridges and command-line tools that need to read and set
//! power, volume, mute, and input selection per zone.
//!
//! ## Quick Start
//!
//! Add `avrlib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! avrlib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a receiver and read its volume:
//!
//! ```no_run
//! use avrlib::{AvReceiver, ZoneId};
//! use avrlib::denon::DenonBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let receiver = DenonBuilder::new("192.168.1.20").build().await?;
//!
//!     let volume = receiver.get_volume(ZoneId::MAIN).await?;
//!     println!("Main zone volume: {volume}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate              | Purpose                                            |
//! |--------------------|----------------------------------------------------|
//! | `avrlib-core`      | Traits ([`AvReceiver`], [`Transport`]), types, errors |
//! | `avrlib-transport` | TCP transport and connector                        |
//! | `avrlib-text-io`   | Command queue, response buffer, and correlator     |
//! | `avrlib-denon`     | Denon/Marantz command set and receiver driver      |
//! | **`avrlib`**       | This facade crate -- re-exports everything         |
//!
//! ## Connection model
//!
//! Receivers accept only a few simultaneous telnet clients, so avrlib holds
//! a session only while it has work. Commands from any number of tasks are
//! queued and sent one at a time; the session is opened when the first
//! command arrives and closed once the queue is empty.
//!
//! ## Feature Flags
//!
//! | Feature | Enables                                  | Default |
//! |---------|------------------------------------------|---------|
//! | `denon` | [`denon`] module (Denon/Marantz telnet)  | yes     |

pub use avrlib_core::*;

/// Line-oriented command engine: [`AvrIo`](text_io::AvrIo), commands,
/// and response correlation.
pub mod text_io {
    pub use avrlib_text_io::*;
}

/// Transport implementations.
pub mod transport {
    pub use avrlib_transport::*;
}

/// Denon/Marantz telnet protocol backend.
///
/// Provides [`DenonReceiver`](denon::DenonReceiver) and
/// [`DenonBuilder`](denon::DenonBuilder) for controlling Denon and Marantz
/// receivers over TCP port 23.
#[cfg(feature = "denon")]
pub mod denon {
    pub use avrlib_denon::*;
}
