//! Mock connector that hands out scripted sessions.
//!
//! The command dispatcher opens a session when its queue becomes non-empty
//! and closes it when the queue drains, so a single test can span several
//! sessions. [`MockConnector`] returns pre-built [`MockTransport`]s (or
//! connection failures) in order, and shares one [`MockLog`] across all of
//! them.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::{Connector, Transport};

use crate::mock_transport::{MockLog, MockTransport};

#[derive(Debug)]
enum Script {
    Session(MockTransport),
    Refuse(String),
}

/// A [`Connector`] that plays back a fixed sequence of connect outcomes.
///
/// Once the script is exhausted every further attempt fails with
/// [`Error::ConnectionFailed`].
#[derive(Debug)]
pub struct MockConnector {
    script: Mutex<VecDeque<Script>>,
    log: MockLog,
    addr: String,
}

impl MockConnector {
    /// Create a connector with an empty script.
    pub fn new() -> Self {
        MockConnector {
            script: Mutex::new(VecDeque::new()),
            log: MockLog::new(),
            addr: "mock:23".to_string(),
        }
    }

    /// Append a successful connect that yields `transport`.
    ///
    /// The transport's log is replaced by the connector's, so every session
    /// records into [`MockConnector::log`].
    pub fn session(self, mut transport: MockTransport) -> Self {
        transport.attach_log(self.log.clone());
        self.push(Script::Session(transport))
    }

    /// Append a failed connect with the given reason.
    pub fn refuse(self, reason: &str) -> Self {
        self.push(Script::Refuse(reason.to_string()))
    }

    /// Return a handle to the log shared by all scripted sessions.
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn push(self, entry: Script) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
        self
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Script::Session(transport)) => {
                self.log.record_connect();
                Ok(Box::new(transport))
            }
            Some(Script::Refuse(reason)) => {
                Err(Error::ConnectionFailed(format!("{}: {reason}", self.addr)))
            }
            None => Err(Error::ConnectionFailed(format!(
                "{}: no more scripted sessions",
                self.addr
            ))),
        }
    }

    fn address(&self) -> &str {
        &self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_and_refusals_play_in_order() {
        let mut first = MockTransport::new();
        first.expect("PW?", "PWON\r");

        let connector = MockConnector::new()
            .refuse("connection refused")
            .session(first);
        let log = connector.log();

        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, Error::ConnectionFailed(ref m) if m.contains("refused")));

        let mut session = connector.connect().await.unwrap();
        session.send(b"PW?\r").await.unwrap();
        assert_eq!(log.sent(), ["PW?"]);
        assert_eq!(log.connects(), 1);

        assert!(matches!(
            connector.connect().await,
            Err(Error::ConnectionFailed(_))
        ));
    }
}
