//! Mock TCP server for end-to-end testing over real sockets.
//!
//! [`MockTcpServer`] is a localhost listener pre-loaded with scripted
//! command/response pairs. It plays the receiver side of the telnet control
//! protocol: every request is one `\r`-terminated command line, and each
//! response is written back verbatim.
//!
//! The command dispatcher closes its session whenever its queue drains, so
//! the server follows the client across connections: when a client hangs up
//! between requests, the server accepts the next connection and carries on
//! with the remaining expectations.
//!
//! # Example
//!
//! ```
//! use avrlib_test_harness::MockTcpServer;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//!
//! // When the client sends "PW?\r", respond with "PWON\rZ2ON\r".
//! server.expect("PW?", "PWON\rZ2ON\r");
//!
//! let ready = server.start_with_ready();
//! let _ = ready.await;
//! let addr = server.addr();
//! // ... connect and test ...
//! # Ok(())
//! # }
//! ```

use avrlib_core::error::{Error, Result};
use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A pre-loaded request/response pair for the mock TCP server.
#[derive(Debug, Clone)]
struct TcpExpectation {
    /// The exact bytes we expect the client to send, terminator included.
    request: Vec<u8>,
    /// The bytes to send back when the matching request is received.
    response: Vec<u8>,
    /// Close the connection after writing the response.
    hang_up: bool,
}

/// A mock receiver listening on a random localhost port.
///
/// Expectations are consumed in order across however many connections the
/// client opens. After the last one the server keeps the connection open
/// until the client closes it. If the client sends data that does not match the next
/// expectation, the server task ends with an error describing the mismatch.
pub struct MockTcpServer {
    /// The address the server is listening on (e.g., "127.0.0.1:54321").
    addr: String,
    listener: Option<TcpListener>,
    expectations: VecDeque<TcpExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Create a new mock TCP server listening on a random port.
    ///
    /// Connections are not served until [`start_with_ready`](Self::start_with_ready)
    /// is called, allowing expectations to be loaded first.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected command line (without terminator) and its response.
    ///
    /// An empty `response` leaves the command unanswered.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.push(request, response, false);
    }

    /// Like [`expect`](Self::expect), but drop the connection after the
    /// response has been written.
    pub fn expect_then_hang_up(&mut self, request: &str, response: &str) {
        self.push(request, response, true);
    }

    /// Get the address the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start serving in a background task and return a channel that
    /// signals once the task owns the listener.
    ///
    /// Call [`wait`](Self::wait) to block until all expectations have been
    /// processed and check for errors.
    pub fn start_with_ready(&mut self) -> oneshot::Receiver<()> {
        let listener = self.listener.take();
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let listener = listener.ok_or_else(|| "mock TCP server already started".to_string())?;
            let _ = ready_tx.send(());
            serve(listener, expectations).await
        });

        self.server_handle = Some(handle);
        ready_rx
    }

    /// Wait for the server task to complete and return any errors.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?
        } else {
            Ok(())
        }
    }

    fn push(&mut self, request: &str, response: &str, hang_up: bool) {
        let mut bytes = request.as_bytes().to_vec();
        bytes.push(b'\r');
        self.expectations.push_back(TcpExpectation {
            request: bytes,
            response: response.as_bytes().to_vec(),
            hang_up,
        });
    }
}

async fn serve(
    listener: TcpListener,
    expectations: Vec<TcpExpectation>,
) -> std::result::Result<(), String> {
    let mut stream: Option<TcpStream> = None;

    for (i, expectation) in expectations.iter().enumerate() {
        let buf = loop {
            let mut conn = match stream.take() {
                Some(conn) => conn,
                None => {
                    let (conn, _) = listener
                        .accept()
                        .await
                        .map_err(|e| format!("expectation {i}: accept error: {e}"))?;
                    conn
                }
            };
            match read_request(&mut conn, expectation.request.len()).await {
                Ok(Some(buf)) => {
                    stream = Some(conn);
                    break buf;
                }
                // Client hung up between commands; wait for it to come back.
                Ok(None) => continue,
                Err(e) => return Err(format!("expectation {i}: {e}")),
            }
        };

        if buf != expectation.request {
            return Err(format!(
                "expectation {i}: request mismatch: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(&buf)
            ));
        }

        let Some(conn) = stream.as_mut() else {
            return Err(format!("expectation {i}: no open connection"));
        };
        conn.write_all(&expectation.response)
            .await
            .map_err(|e| format!("expectation {i}: write error: {e}"))?;
        conn.flush()
            .await
            .map_err(|e| format!("expectation {i}: flush error: {e}"))?;

        if expectation.hang_up {
            stream = None;
        }
    }

    // Hold the last session open until the client is done with it.
    if let Some(mut conn) = stream {
        let mut buf = [0u8; 64];
        while let Ok(n) = conn.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    }

    Ok(())
}

/// Read exactly `len` bytes. Returns `None` if the peer closed before
/// sending anything.
async fn read_request(
    stream: &mut TcpStream,
    len: usize,
) -> std::result::Result<Option<Vec<u8>>, String> {
    let mut buf = vec![0u8; len];
    let mut total_read = 0;

    while total_read < len {
        let n = stream
            .read(&mut buf[total_read..])
            .await
            .map_err(|e| format!("read error: {e}"))?;
        if n == 0 {
            if total_read == 0 {
                return Ok(None);
            }
            return Err(format!(
                "client disconnected after {total_read} bytes (expected {len})"
            ));
        }
        total_read += n;
    }

    Ok(Some(buf))
}
