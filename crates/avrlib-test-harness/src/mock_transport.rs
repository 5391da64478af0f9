//! Mock transport for deterministic testing of the command dispatcher.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Each request is one command line; each response
//! is delivered as one or more receive chunks, so tests can reproduce the
//! way a receiver splits its output across TCP segments.
//!
//! # Example
//!
//! ```
//! use avrlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the dispatcher writes "PW?\r", deliver these two chunks.
//! mock.expect_chunks("PW?", &["PWON\rZ2", "ON\r"]);
//! // A set command the receiver does not acknowledge.
//! mock.expect_silence("MV455");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Transport;

/// Line terminator the mock expects after every command.
const TERMINATOR: &str = "\r";

/// What the mock does after a matching request.
#[derive(Debug, Clone)]
enum Reply {
    /// Deliver these chunks, one per `receive()` call.
    Chunks(Vec<Vec<u8>>),
    /// Report the peer as gone on the next `receive()`.
    Disconnect,
}

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent, terminator included.
    request: Vec<u8>,
    reply: Reply,
}

#[derive(Debug, Default)]
struct LogInner {
    sent: Vec<String>,
    connects: usize,
    closes: usize,
}

/// Shared record of what happened on one or more mock sessions.
///
/// Cloning the log yields another handle to the same record, so a test can
/// keep one while the transport itself is moved into the dispatcher task.
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    inner: Arc<Mutex<LogInner>>,
}

impl MockLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every command line written, in order, without the terminator.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of sessions handed out by a [`MockConnector`](crate::MockConnector).
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Number of sessions closed with [`Transport::close`].
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    pub(crate) fn record_connect(&self) {
        self.lock().connects += 1;
    }

    fn record_sent(&self, data: &[u8]) {
        let line = String::from_utf8_lossy(data);
        let line = line.strip_suffix(TERMINATOR).unwrap_or(&line).to_string();
        self.lock().sent.push(line);
    }

    fn record_close(&self) {
        self.lock().closes += 1;
    }
}

/// A mock [`Transport`] for testing without a receiver.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation, and the
/// expectation's chunks are queued behind anything not yet received. Once
/// the queue is empty, `receive()` reports [`Error::Timeout`].
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    /// Chunks waiting to be returned by `receive()`.
    pending: VecDeque<Vec<u8>>,
    /// Whether the next `receive()` after `pending` drains reports a dropped peer.
    disconnect_pending: bool,
    connected: bool,
    log: MockLog,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending: VecDeque::new(),
            disconnect_pending: false,
            connected: true,
            log: MockLog::new(),
        }
    }

    /// Expect `request` (a command line without terminator) and answer
    /// with `response` as a single chunk. An empty `response` means silence.
    pub fn expect(&mut self, request: &str, response: &str) {
        let chunks = if response.is_empty() {
            Vec::new()
        } else {
            vec![response.as_bytes().to_vec()]
        };
        self.push(request, Reply::Chunks(chunks));
    }

    /// Expect `request` and answer with `chunks`, one per `receive()` call.
    pub fn expect_chunks(&mut self, request: &str, chunks: &[&str]) {
        let chunks = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        self.push(request, Reply::Chunks(chunks));
    }

    /// Expect `request` and send nothing back.
    pub fn expect_silence(&mut self, request: &str) {
        self.push(request, Reply::Chunks(Vec::new()));
    }

    /// Expect `request`, then behave as if the receiver dropped the session.
    pub fn expect_disconnect(&mut self, request: &str) {
        self.push(request, Reply::Disconnect);
    }

    /// Queue data that arrives without being asked for, such as a status
    /// broadcast after a front-panel change.
    pub fn push_unsolicited(&mut self, data: &str) {
        self.pending.push_back(data.as_bytes().to_vec());
    }

    /// Return a handle to this transport's log.
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub(crate) fn attach_log(&mut self, log: MockLog) {
        self.log = log;
    }

    fn push(&mut self, request: &str, reply: Reply) {
        let mut bytes = request.as_bytes().to_vec();
        bytes.extend_from_slice(TERMINATOR.as_bytes());
        self.expectations.push_back(Expectation {
            request: bytes,
            reply,
        });
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.log.record_sent(data);

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        match expectation.reply {
            Reply::Chunks(chunks) => self.pending.extend(chunks),
            Reply::Disconnect => self.disconnect_pending = true,
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Some(mut chunk) = self.pending.pop_front() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.pending.push_front(chunk);
            }
            return Ok(n);
        }

        if self.disconnect_pending {
            self.disconnect_pending = false;
            self.connected = false;
            return Err(Error::ConnectionLost);
        }

        Err(Error::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        if self.connected {
            self.log.record_close();
        }
        self.connected = false;
        self.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
