//! The command dispatcher.
//!
//! One tokio task owns the session to the receiver and a FIFO of pending
//! commands. It dispatches strictly one command at a time: write the line,
//! collect the response, resolve the caller, pause, then move on to the next
//! command. Sessions are opened lazily when work arrives and closed as soon
//! as the queue drains, since receivers accept only a handful of telnet
//! clients and other controllers need their turn.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::{Connector, Transport};

use crate::correlate::{self, Command, Expectation, Reply};
use crate::protocol::{self, ResponseBuffer};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Timing configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// How long a query (`...?`) waits for its answer (default 1000ms).
    ///
    /// Receivers answer within 200ms; the rest is network margin.
    pub query_timeout: Duration,
    /// How long a state-changing command waits before it counts as
    /// accepted (default 50ms).
    pub ack_timeout: Duration,
    /// Pause after each exchange before the next command (default 50ms).
    pub command_spacing: Duration,
    /// Quiet period that ends a multi-line answer (default 100ms).
    pub table_settle: Duration,
    /// Capacity of the pending-command queue.
    pub queue_depth: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_millis(1000),
            ack_timeout: Duration::from_millis(50),
            command_spacing: Duration::from_millis(50),
            table_settle: Duration::from_millis(100),
            queue_depth: 64,
        }
    }
}

impl IoConfig {
    /// The response deadline for `command`.
    pub fn timeout_for(&self, command: &Command) -> Duration {
        if command.is_query() {
            self.query_timeout
        } else {
            self.ack_timeout
        }
    }
}

/// A queued command and the sink its result goes to.
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Result<Reply>>,
}

/// Handle to the dispatcher task. Stored inside the receiver struct.
pub struct AvrIo {
    tx: mpsc::Sender<Request>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    addr: String,
}

impl AvrIo {
    /// Queue `command` and wait for its result.
    ///
    /// Commands from concurrent callers are dispatched in the order they
    /// were queued. Dropping the returned future does not withdraw the
    /// command; it is still sent and its result discarded.
    pub async fn execute(&self, command: Command) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Address of the receiver this dispatcher talks to.
    pub fn address(&self) -> &str {
        &self.addr
    }

    /// Stop the dispatcher.
    ///
    /// A command already in flight is allowed to finish. Commands still
    /// queued are dropped and their callers see [`Error::NotConnected`].
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        let _ = self.task.await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the dispatcher task. Returns the handle for queueing commands.
///
/// No connection is made until the first command is queued.
pub fn spawn_io_task(connector: Box<dyn Connector>, config: IoConfig) -> AvrIo {
    let (tx, rx) = mpsc::channel::<Request>(config.queue_depth.max(1));
    let cancel = CancellationToken::new();
    let addr = connector.address().to_string();

    let task = tokio::spawn(io_loop(connector, config, rx, cancel.clone()));

    AvrIo {
        tx,
        cancel,
        task,
        addr,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// The main dispatch loop. Runs as a spawned Tokio task.
///
/// While idle it waits for either cancellation or the next request. Once a
/// request arrives it works through the queue on one session until the
/// queue is empty, then closes the session and goes idle again.
async fn io_loop(
    connector: Box<dyn Connector>,
    config: IoConfig,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let addr = connector.address().to_string();
    let mut session: Option<Box<dyn Transport>> = None;

    loop {
        let first = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(addr = %addr, "dispatcher cancelled");
                break;
            }

            req = rx.recv() => match req {
                Some(req) => req,
                None => {
                    debug!(addr = %addr, "command channel closed, exiting dispatcher");
                    break;
                }
            },
        };

        let mut next = Some(first);
        while let Some(req) = next.take() {
            let exchanged = dispatch(req, &mut session, &*connector, &config).await;
            if exchanged && !config.command_spacing.is_zero() {
                tokio::time::sleep(config.command_spacing).await;
            }
            if cancel.is_cancelled() {
                break;
            }
            next = rx.try_recv().ok();
        }

        close_session(&mut session, &addr).await;
    }

    close_session(&mut session, &addr).await;
}

/// Run one request to completion and resolve its sink.
///
/// Returns `true` if the command was written to a session, which is when
/// the receiver needs its breathing space afterwards.
async fn dispatch(
    req: Request,
    session: &mut Option<Box<dyn Transport>>,
    connector: &dyn Connector,
    config: &IoConfig,
) -> bool {
    let Request { command, reply } = req;

    if session.is_none() {
        match open_session(connector).await {
            Ok(transport) => *session = Some(transport),
            Err(e) => {
                let _ = reply.send(Err(e));
                return false;
            }
        }
    }
    let Some(transport) = session.as_mut() else {
        let _ = reply.send(Err(Error::NotConnected));
        return false;
    };

    let result = exchange(&mut **transport, &command, config).await;

    match &result {
        Ok(r) => debug!(command = command.text(), reply = ?r, "command resolved"),
        Err(e) => debug!(command = command.text(), error = %e, "command failed"),
    }

    if result.as_ref().is_err_and(Error::is_connection_fatal) {
        if let Some(mut dead) = session.take() {
            warn!(addr = connector.address(), "session lost, will reconnect on next command");
            let _ = dead.close().await;
        }
    }

    let _ = reply.send(result);
    true
}

async fn open_session(connector: &dyn Connector) -> Result<Box<dyn Transport>> {
    debug!(addr = connector.address(), "opening session");
    match connector.connect().await {
        Ok(transport) => {
            info!(addr = connector.address(), "session opened");
            Ok(transport)
        }
        Err(e) => {
            warn!(addr = connector.address(), error = %e, "connect failed");
            Err(match e {
                Error::ConnectionFailed(_) => e,
                other => Error::ConnectionFailed(other.to_string()),
            })
        }
    }
}

async fn close_session(session: &mut Option<Box<dyn Transport>>, addr: &str) {
    if let Some(mut transport) = session.take() {
        match transport.close().await {
            Ok(()) => info!(addr = %addr, "session closed, queue drained"),
            Err(e) => warn!(addr = %addr, error = %e, "failed to close session"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Write one command and collect its answer.
///
/// Every chunk received is appended to a fresh [`ResponseBuffer`] and the
/// whole attempt is correlated again. A pattern command resolves on its
/// first match. A table command keeps listening until no data has arrived
/// for `table_settle`. When the deadline passes, any unterminated tail is
/// flushed as a final line and correlated once more; fire-and-forget
/// commands then resolve as [`Reply::Silent`].
async fn exchange(
    transport: &mut dyn Transport,
    command: &Command,
    config: &IoConfig,
) -> Result<Reply> {
    let timeout = config.timeout_for(command);
    let expectation = command.expectation();
    debug!(
        command = command.text(),
        timeout_ms = timeout.as_millis() as u64,
        "dispatching command"
    );

    transport.send(&protocol::encode_line(command.text())).await?;

    let deadline = Instant::now() + timeout;
    let mut buffer = ResponseBuffer::new();
    let mut recv_buf = [0u8; 256];
    // End of the quiet window once a table command has seen its first match.
    let mut settle: Option<Instant> = None;

    loop {
        let until = settle.map_or(deadline, |s| s.min(deadline));
        let now = Instant::now();
        if now >= until {
            break;
        }

        match transport.receive(&mut recv_buf, until - now).await {
            Ok(0) => {}
            Ok(n) => {
                let before = buffer.lines().len();
                buffer.append(&recv_buf[..n]);

                match expectation {
                    Expectation::Pattern(_) => {
                        if let Some(reply) = correlate::correlate(buffer.lines(), expectation) {
                            return Ok(reply);
                        }
                        for line in &buffer.lines()[before..] {
                            debug!(line = %line, command = command.text(), "skipping unrelated line");
                        }
                    }
                    Expectation::Table(_) => {
                        // Any chunk re-arms the window once the first row is in.
                        if settle.is_some()
                            || correlate::correlate(buffer.lines(), expectation).is_some()
                        {
                            settle = Some(Instant::now() + config.table_settle);
                        }
                    }
                    Expectation::FireAndForget => {
                        for line in &buffer.lines()[before..] {
                            trace!(line = %line, command = command.text(), "ignored after set");
                        }
                    }
                }
            }
            // Nothing more arrived in the window.
            Err(Error::Timeout) => tokio::time::sleep_until(until).await,
            Err(e) => return Err(e),
        }
    }

    buffer.flush_partial();
    match correlate::correlate(buffer.lines(), expectation) {
        Some(reply) => Ok(reply),
        None => match expectation {
            Expectation::FireAndForget => Ok(Reply::Silent),
            _ => Err(Error::ResponseTimeout {
                command: command.text().to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::ResponsePattern;
    use avrlib_test_harness::{MockConnector, MockTransport};
    use std::sync::Arc;

    fn power_query() -> Command {
        Command::query("PW?", ResponsePattern::new(r"PW(ON|STANDBY|OFF)").unwrap())
    }

    fn volume_query() -> Command {
        Command::query("MV?", ResponsePattern::new(r"MV(\d{1,4})").unwrap())
    }

    fn payload(reply: Reply) -> String {
        reply.into_line().unwrap().payload().to_string()
    }

    // -----------------------------------------------------------------------
    // Correlation through the dispatcher
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn power_query_skips_zone_broadcasts() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\rZ2ON\rZ2NET\rZ240\r");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        let reply = io.execute(power_query()).await.unwrap();
        assert_eq!(payload(reply), "ON");

        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn noisy_stream_finds_match_at_end() {
        let mut mock = MockTransport::new();
        mock.expect_chunks("PW?", &["Z2ON\r", "SVOFF\r", "PWON\r"]);
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        assert_eq!(payload(io.execute(power_query()).await.unwrap()), "ON");
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_waiting_before_send_is_skipped() {
        let mut mock = MockTransport::new();
        // A front-panel change was announced before the query went out.
        mock.push_unsolicited("Z2MUON\rSVDVD\r");
        mock.expect("PW?", "PWSTANDBY\r");
        mock.expect_silence("MUON");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        assert_eq!(payload(io.execute(power_query()).await.unwrap()), "STANDBY");
        let reply = io.execute(Command::fire_and_forget("MUON")).await.unwrap();
        assert_eq!(reply, Reply::Silent);
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn volume_query_ignores_max_volume_line() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", "MVMAX 999\rMV455\r");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        assert_eq!(payload(io.execute(volume_query()).await.unwrap()), "455");
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_tail_is_flushed_at_deadline() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", "MVMAX 98\rMV45");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        let start = Instant::now();
        assert_eq!(payload(io.execute(volume_query()).await.unwrap()), "45");
        assert!(start.elapsed() >= Duration::from_millis(1000));
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn query_without_answer_times_out() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "Z2ON\r");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        let err = io.execute(power_query()).await.unwrap_err();
        assert!(matches!(err, Error::ResponseTimeout { ref command } if command == "PW?"));
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget_silence_is_success() {
        let mut mock = MockTransport::new();
        mock.expect_silence("PWON");
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        let start = Instant::now();
        let reply = io.execute(Command::fire_and_forget("PWON")).await.unwrap();
        assert_eq!(reply, Reply::Silent);
        assert!(start.elapsed() < Duration::from_millis(100));
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn table_collects_until_quiet() {
        let mut mock = MockTransport::new();
        mock.expect_chunks("RR?", &["R1MAIN ZONE\rR2", "Kitchen\r", "MV45\r"]);
        let io = spawn_io_task(
            Box::new(MockConnector::new().session(mock)),
            IoConfig::default(),
        );

        let cmd = Command::table("RR?", ResponsePattern::new(r"R([1-9])(.*)").unwrap());
        let start = Instant::now();
        let lines = io.execute(cmd).await.unwrap().into_lines();
        let names: Vec<&str> = lines.iter().map(|m| m.group(2).unwrap()).collect();
        assert_eq!(names, ["MAIN ZONE", "Kitchen"]);

        // Resolved by the quiet window, well before the query deadline.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(1000));
        let _ = io.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Queue ordering and session lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn concurrent_commands_resolve_in_fifo_order() {
        let mut mock = MockTransport::new();
        mock.expect_chunks("PW?", &["PW", "ON\rMV4"]);
        mock.expect_chunks("MV?", &["55\rMV50\r"]);
        mock.expect_silence("MUON");
        let connector = MockConnector::new().session(mock);
        let log = connector.log();
        let io = Arc::new(spawn_io_task(Box::new(connector), IoConfig::default()));

        let a = tokio::spawn({
            let io = Arc::clone(&io);
            async move { io.execute(power_query()).await }
        });
        tokio::task::yield_now().await;
        let b = tokio::spawn({
            let io = Arc::clone(&io);
            async move { io.execute(volume_query()).await }
        });
        tokio::task::yield_now().await;
        let c = tokio::spawn({
            let io = Arc::clone(&io);
            async move { io.execute(Command::fire_and_forget("MUON")).await }
        });

        assert_eq!(payload(a.await.unwrap().unwrap()), "ON");
        // The stray "MV4" from the first attempt does not leak into the second.
        assert_eq!(payload(b.await.unwrap().unwrap()), "50");
        assert_eq!(c.await.unwrap().unwrap(), Reply::Silent);

        assert_eq!(log.sent(), ["PW?", "MV?", "MUON"]);
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_lazy_reused_and_closed_on_drain() {
        let mut first = MockTransport::new();
        first.expect("PW?", "PWON\r");
        first.expect("MV?", "MV45\r");
        let mut second = MockTransport::new();
        second.expect("PW?", "PWSTANDBY\r");

        let connector = MockConnector::new().session(first).session(second);
        let log = connector.log();
        let io = Arc::new(spawn_io_task(Box::new(connector), IoConfig::default()));

        tokio::task::yield_now().await;
        assert_eq!(log.connects(), 0);

        // A burst shares one session.
        let (a, b) = tokio::join!(io.execute(power_query()), io.execute(volume_query()));
        assert_eq!(payload(a.unwrap()), "ON");
        assert_eq!(payload(b.unwrap()), "45");

        // Let the dispatcher finish spacing and notice the empty queue.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(log.connects(), 1);
        assert_eq!(log.closes(), 1);

        // The next command opens a fresh session.
        assert_eq!(payload(io.execute(power_query()).await.unwrap()), "STANDBY");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(log.connects(), 2);
        assert_eq!(log.closes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_spaced() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\r");
        mock.expect("MV?", "MV45\r");
        let config = IoConfig {
            command_spacing: Duration::from_millis(300),
            ..IoConfig::default()
        };
        let io = spawn_io_task(Box::new(MockConnector::new().session(mock)), config);

        let start = Instant::now();
        let (a, b) = tokio::join!(io.execute(power_query()), io.execute(volume_query()));
        a.unwrap();
        b.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
        let _ = io.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn connect_failure_resolves_head_and_next_command_retries() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", "PWON\r");
        let connector = MockConnector::new().refuse("connection refused").session(mock);
        let log = connector.log();
        let io = spawn_io_task(Box::new(connector), IoConfig::default());

        let err = io.execute(power_query()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        assert!(log.sent().is_empty());

        assert_eq!(payload(io.execute(power_query()).await.unwrap()), "ON");
        assert_eq!(log.connects(), 1);
        let _ = io.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lost_session_is_discarded_and_reopened() {
        let mut first = MockTransport::new();
        first.expect_disconnect("PW?");
        first.expect("MV?", "MV45\r");
        let mut second = MockTransport::new();
        second.expect("MV?", "MV50\r");

        let connector = MockConnector::new().session(first).session(second);
        let log = connector.log();
        let io = Arc::new(spawn_io_task(Box::new(connector), IoConfig::default()));

        let (a, b) = tokio::join!(io.execute(power_query()), io.execute(volume_query()));
        assert!(matches!(a, Err(Error::ConnectionLost)));
        // The queued command reconnects instead of using the dead session.
        assert_eq!(payload(b.unwrap()), "50");
        assert_eq!(log.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_fatal_error_keeps_session() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", "MV45\r");
        mock.expect("PW?", "PWON\r");
        let connector = MockConnector::new().session(mock);
        let log = connector.log();
        let io = Arc::new(spawn_io_task(Box::new(connector), IoConfig::default()));

        // The mock rejects the out-of-script line with a protocol error.
        let (a, b) = tokio::join!(io.execute(power_query()), io.execute(power_query()));
        assert!(matches!(a, Err(Error::Protocol(_))));
        assert_eq!(payload(b.unwrap()), "ON");
        assert_eq!(log.connects(), 1);
    }

    #[tokio::test]
    async fn execute_after_shutdown_is_not_connected() {
        let io = spawn_io_task(Box::new(MockConnector::new()), IoConfig::default());
        let tx = io.tx.clone();
        io.shutdown().await.unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = tx
            .send(Request {
                command: power_query(),
                reply: reply_tx,
            })
            .await;
        assert!(sent.is_err());
        drop(reply_rx);
    }

    #[test]
    fn timeout_depends_on_command_kind() {
        let config = IoConfig::default();
        assert_eq!(config.timeout_for(&power_query()), Duration::from_millis(1000));
        assert_eq!(
            config.timeout_for(&Command::fire_and_forget("PWON")),
            Duration::from_millis(50)
        );
    }
}
