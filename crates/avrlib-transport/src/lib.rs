//! Transport implementations for avrlib.
//!
//! This crate provides the concrete [`Transport`](avrlib_core::Transport)
//! and [`Connector`](avrlib_core::Connector) used to reach receivers on the
//! network:
//!
//! - [`TcpTransport`]: one open TCP session to a receiver's control port
//! - [`TcpConnector`]: opens a new `TcpTransport` whenever the command
//!   dispatcher needs a session
//!
//! # Example
//!
//! ```no_run
//! use avrlib_transport::TcpConnector;
//! use avrlib_core::{Connector, Transport};
//! use std::time::Duration;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let connector = TcpConnector::new("192.168.1.20", 23)
//!     .with_connect_timeout(Duration::from_secs(2));
//! let mut session = connector.connect().await?;
//! session.send(b"PW?\r").await?;
//! # Ok(())
//! # }
//! ```

pub mod tcp;

pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, TcpConnector, TcpTransport};
