//! avrlib-test-harness: Mock sessions and a scripted receiver for avrlib
//! tests.
//!
//! - [`MockTransport`] replays scripted responses for one session, chunked
//!   the way TCP delivers them, so the dispatcher can be tested without a
//!   socket.
//! - [`MockConnector`] hands out a sequence of `MockTransport` sessions and
//!   connection failures, and records connects, closes, and sent lines in a
//!   shared [`MockLog`].
//! - [`MockTcpServer`] plays the receiver end of a real TCP connection.

pub mod mock_connector;
pub mod mock_tcp;
pub mod mock_transport;

pub use mock_connector::MockConnector;
pub use mock_tcp::MockTcpServer;
pub use mock_transport::{MockLog, MockTransport};
