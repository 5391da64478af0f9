//! DenonBuilder -- fluent builder for constructing [`DenonReceiver`]
//! instances.
//!
//! Separates configuration from construction so that callers can set the
//! port and the dispatcher's timings before the dispatcher task is started.
//!
//! # Example
//!
//! ```no_run
//! use avrlib_denon::builder::DenonBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let receiver = DenonBuilder::new("192.168.1.20")
//!     .query_timeout(Duration::from_millis(1500))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Connector;
use avrlib_text_io::{IoConfig, spawn_io_task};
use avrlib_transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, TcpConnector};

use crate::receiver::DenonReceiver;

/// Fluent builder for [`DenonReceiver`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let receiver = DenonBuilder::new("avr.local").build().await?;
/// ```
pub struct DenonBuilder {
    host: String,
    port: u16,
    connect_timeout: Duration,
    io: IoConfig,
}

impl DenonBuilder {
    /// Create a new builder for the receiver at `host`.
    pub fn new(host: &str) -> Self {
        DenonBuilder {
            host: host.trim().to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io: IoConfig::default(),
        }
    }

    /// Set the control port (default: 23).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set how long opening a session may take (default: 3s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long a query waits for its answer (default: 1000ms).
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.io.query_timeout = timeout;
        self
    }

    /// Set how long a set command waits before counting as accepted
    /// (default: 50ms).
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.io.ack_timeout = timeout;
        self
    }

    /// Set the pause between consecutive commands (default: 50ms).
    pub fn command_spacing(mut self, spacing: Duration) -> Self {
        self.io.command_spacing = spacing;
        self
    }

    /// Set the quiet period that ends a multi-line answer (default: 100ms).
    pub fn table_settle(mut self, settle: Duration) -> Self {
        self.io.table_settle = settle;
        self
    }

    /// Build a receiver that reaches the device over TCP.
    ///
    /// Starts the dispatcher task; the first connection is made when the
    /// first command is issued.
    pub async fn build(self) -> Result<DenonReceiver> {
        if self.host.is_empty() {
            return Err(Error::InvalidParameter("host must not be empty".into()));
        }
        let connector =
            TcpConnector::new(&self.host, self.port).with_connect_timeout(self.connect_timeout);
        self.build_with_connector(Box::new(connector)).await
    }

    /// Build a receiver on a caller-supplied [`Connector`].
    ///
    /// This is primarily useful for testing with a mock connector.
    pub async fn build_with_connector(self, connector: Box<dyn Connector>) -> Result<DenonReceiver> {
        tracing::debug!(
            addr = connector.address(),
            query_timeout_ms = self.io.query_timeout.as_millis() as u64,
            ack_timeout_ms = self.io.ack_timeout.as_millis() as u64,
            "starting receiver dispatcher"
        );
        Ok(DenonReceiver::new(spawn_io_task(connector, self.io)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrlib_core::AvReceiver;
    use avrlib_test_harness::{MockConnector, MockTcpServer, MockTransport};

    #[tokio::test]
    async fn build_opens_no_connection() {
        let connector = MockConnector::new();
        let log = connector.log();
        let rx = DenonBuilder::new("avr.local")
            .build_with_connector(Box::new(connector))
            .await
            .unwrap();

        tokio::task::yield_now().await;
        assert_eq!(log.connects(), 0);
        assert_eq!(rx.address(), "mock:23");
        rx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn empty_host_is_rejected() {
        let result = DenonBuilder::new("  ").build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_timings_reach_the_dispatcher() {
        let mut mock = MockTransport::new();
        mock.expect_silence("PW?");
        let rx = DenonBuilder::new("avr.local")
            .query_timeout(Duration::from_millis(250))
            .build_with_connector(Box::new(MockConnector::new().session(mock)))
            .await
            .unwrap();

        let start = tokio::time::Instant::now();
        let err = rx.get_power().await.unwrap_err();
        assert!(matches!(err, Error::ResponseTimeout { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(1000));
        rx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn end_to_end_over_tcp() {
        let mut server = MockTcpServer::new().await.unwrap();
        server.expect("PW?", "PWON\rZ2ON\r");
        server.expect("MV?", "MVMAX 98\rMV455\r");
        server.expect("MV460", "");
        let ready = server.start_with_ready();
        ready.await.unwrap();

        let (host, port) = server.addr().rsplit_once(':').unwrap();
        let rx = DenonBuilder::new(host)
            .port(port.parse().unwrap())
            .command_spacing(Duration::from_millis(10))
            .build()
            .await
            .unwrap();
        assert_eq!(rx.address(), server.addr());

        assert!(rx.get_power().await.unwrap());
        assert_eq!(rx.get_volume(avrlib_core::ZoneId::MAIN).await.unwrap(), 45.5);
        rx.set_volume(avrlib_core::ZoneId::MAIN, 46.0).await.unwrap();

        rx.shutdown().await.unwrap();
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_receiver_fails_to_connect() {
        // TEST-NET-1 is unroutable, so the connect can only time out.
        let rx = DenonBuilder::new("192.0.2.1")
            .connect_timeout(Duration::from_millis(200))
            .build()
            .await
            .unwrap();

        let start = std::time::Instant::now();
        let err = rx.get_power().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        assert!(start.elapsed() < Duration::from_secs(2));
        rx.shutdown().await.unwrap();
    }
}
