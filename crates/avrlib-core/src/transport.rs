//! Transport and connector traits for receiver communication.
//!
//! The [`Transport`] trait abstracts over one open byte stream to a
//! receiver. The [`Connector`] trait knows how to open a fresh one. The
//! command dispatcher in `avrlib-text-io` opens sessions lazily and closes
//! them when its queue drains, so it holds a `Connector` rather than a
//! single long-lived `Transport`.
//!
//! Real sessions come from `TcpConnector` in `avrlib-transport`; tests use
//! `MockConnector` from `avrlib-test-harness`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a receiver.
///
/// Implementations handle buffering and error mapping at the socket layer.
/// Line framing and response correlation belong to the dispatcher that
/// consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the receiver.
    ///
    /// Implementations should not return until all bytes have been written
    /// and flushed to the underlying socket.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the receiver into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within the deadline. A closed peer is reported
    /// as [`Error::ConnectionLost`](crate::error::Error::ConnectionLost).
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Opens new [`Transport`] sessions to one receiver.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new session.
    ///
    /// Failures are reported as
    /// [`Error::ConnectionFailed`](crate::error::Error::ConnectionFailed)
    /// and must not take longer than the connector's configured timeout.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// A human-readable label for the endpoint, used in log fields.
    fn address(&self) -> &str;
}
