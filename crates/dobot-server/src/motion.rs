//! [`MotionServer`] – the text motion-command channel.
//!
//! Every received command runs through the same sequence, and the client
//! always gets exactly one reply before the next read:
//!
//! 1. **Reset** the shared hardware and the dispatch target: clear error,
//!    motion queue and wait flag, switch to [`RobotMode::Enable`]. A new
//!    command therefore replaces any motion still pending from an earlier
//!    one, whichever client sent it.
//! 2. **Dispatch** the text against the dispatch target, a private facade
//!    that never drives the arm.
//! 3. **Resolve** the error id: parse failure → `-1` with reply code `"-"`;
//!    nothing to queue and no fault → `-1`; otherwise the target's id.
//! 4. **Enqueue** the raw text on the shared hardware facade only when the
//!    resolved id is `0`.
//! 5. **Reply** `"<code><command>;"`.
//!
//! Steps 1–4 run under the dispatch-target lock, so concurrent clients never
//! interleave their reset, resolution and enqueue phases.
//!
//! The command text is echoed and queued exactly as received, line
//! terminators included.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use dobot_command::{PARSE_FAILURE_CODE, ParseError, dispatch, format_return_code};
use dobot_hal::{DobotHardware, SimHardware, fault};
use dobot_types::{Channel, DobotError, NO_ERROR, NOT_QUEUED, RobotMode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::registry::{ConnectionGuard, ConnectionRegistry};

/// Default upper bound on bytes taken from the socket per read.
pub const DEFAULT_MAX_RECEIVE_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// How a single command was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Accepted and appended to the shared motion queue.
    Queued,
    /// Valid, but nothing needed queueing (queries, `Sync`).
    NotQueued,
    /// The dispatch target reported this fault id.
    Fault(i32),
    /// The text is outside the command language.
    Rejected(ParseError),
}

/// One reply on the motion channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    code: String,
    command: String,
    error_id: i32,
    outcome: CommandOutcome,
}

impl Reply {
    /// Leading reply code (`"0"`, `"-1"`, `"-"` or a fault id).
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Command text echoed back to the client.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Resolved error id; `-1` for both rejected and non-queued commands.
    pub fn error_id(&self) -> i32 {
        self.error_id
    }

    pub fn outcome(&self) -> &CommandOutcome {
        &self.outcome
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{};", self.code, self.command)
    }
}

// ---------------------------------------------------------------------------
// MotionServer
// ---------------------------------------------------------------------------

/// TCP server for the motion-command channel.
pub struct MotionServer {
    addr: SocketAddr,
    hardware: Arc<dyn DobotHardware>,
    dispatch_target: Mutex<Box<dyn DobotHardware>>,
    registry: Arc<ConnectionRegistry>,
    max_receive_bytes: usize,
}

impl MotionServer {
    /// Server bound to `addr` that queues accepted motions on `hardware`.
    ///
    /// Commands are resolved against a fresh [`SimHardware`] unless a
    /// different target is supplied with
    /// [`with_dispatch_target`][Self::with_dispatch_target].
    pub fn new(addr: SocketAddr, hardware: Arc<dyn DobotHardware>) -> Self {
        Self {
            addr,
            hardware,
            dispatch_target: Mutex::new(Box::new(SimHardware::new())),
            registry: Arc::new(ConnectionRegistry::new()),
            max_receive_bytes: DEFAULT_MAX_RECEIVE_BYTES,
        }
    }

    /// Resolve commands against `target` instead of the default simulator.
    pub fn with_dispatch_target(mut self, target: Box<dyn DobotHardware>) -> Self {
        self.dispatch_target = Mutex::new(target);
        self
    }

    /// Share a registry with other servers (builder-style).
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_max_receive_bytes(mut self, max_receive_bytes: usize) -> Self {
        self.max_receive_bytes = max_receive_bytes.max(1);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind the configured address and serve forever.
    ///
    /// # Errors
    ///
    /// Returns [`DobotError::Bind`] if the listener cannot bind.
    pub async fn run(self) -> Result<(), DobotError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| DobotError::Bind {
            addr: self.addr.to_string(),
            details: e.to_string(),
        })?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` forever, one task per connection.
    pub async fn serve(self, listener: TcpListener) -> Result<(), DobotError> {
        let local = listener.local_addr()?;
        info!(addr = %local, "motion channel listening");
        let server = Arc::new(self);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let guard = server.registry.register(Channel::Motion, peer);
                    info!(%peer, id = %guard.id(), "motion client connected");
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer, guard).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "motion channel accept error");
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr, mut guard: ConnectionGuard) {
        let mut buf = vec![0u8; self.max_receive_bytes];

        loop {
            let n = tokio::select! {
                _ = guard.shutdown_signal() => {
                    debug!(%peer, "motion connection shut down by registry");
                    break;
                }
                read = stream.read(&mut buf) => match read {
                    Ok(0) => {
                        info!(%peer, "motion client disconnected");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!(%peer, error = %e, "motion read failed");
                        break;
                    }
                },
            };

            let raw = decode_command(&buf[..n]);
            info!(%peer, command = %raw, "received");

            let reply = self.execute(&raw).to_string();
            if let Err(e) = stream.write_all(reply.as_bytes()).await {
                warn!(%peer, error = %e, "motion send failed");
                break;
            }
            info!(%peer, reply = %reply, "RETURN");
        }
    }

    /// Resolve one command and, if accepted, queue it on the shared hardware.
    pub fn execute(&self, raw: &str) -> Reply {
        let target = self.dispatch_target.lock().unwrap_or_else(PoisonError::into_inner);

        for facade in [self.hardware.as_ref(), target.as_ref()] {
            facade.clear_error();
            facade.clear_motion_queue();
            facade.clear_wait();
            facade.set_robot_mode(RobotMode::Enable);
        }

        let (code, error_id, outcome) = match dispatch(target.as_ref(), raw) {
            Err(e) => {
                error!(command = %raw, error = %e, "command rejected");
                (PARSE_FAILURE_CODE.to_string(), NOT_QUEUED, CommandOutcome::Rejected(e))
            }
            Ok(needs_queue) => {
                let mut error_id = target.error_id();
                if !needs_queue && error_id == NO_ERROR {
                    error_id = NOT_QUEUED;
                }
                let outcome = match error_id {
                    NO_ERROR => CommandOutcome::Queued,
                    NOT_QUEUED => CommandOutcome::NotQueued,
                    id => CommandOutcome::Fault(id),
                };
                (format_return_code(error_id), error_id, outcome)
            }
        };

        match &outcome {
            CommandOutcome::Queued => self.hardware.motion_stack(raw),
            CommandOutcome::NotQueued => debug!(command = %raw, "nothing to queue"),
            CommandOutcome::Fault(id) => {
                let err = DobotError::HardwareFault {
                    code: *id,
                    details: fault::describe(*id).to_string(),
                };
                warn!(command = %raw, error = %err, "command not queued")
            }
            CommandOutcome::Rejected(_) => {}
        }

        Reply {
            code,
            command: raw.to_string(),
            error_id,
            outcome,
        }
    }
}

/// Decode one received chunk. Invalid UTF-8 is replaced, nothing is trimmed;
/// the parser ignores surrounding whitespace on its own.
fn decode_command(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;
    use tracing::Level;

    /// In-memory sink for formatted log lines.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn execute_logged(server: &MotionServer, raw: &str) -> (Reply, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::ERROR)
            .finish();
        let reply = tracing::subscriber::with_default(subscriber, || server.execute(raw));
        (reply, logs.contents())
    }

    fn server() -> (MotionServer, Arc<SimHardware>) {
        let hardware = Arc::new(SimHardware::new());
        let shared: Arc<dyn DobotHardware> = hardware.clone();
        let server = MotionServer::new(SocketAddr::from(([127, 0, 0, 1], 0)), shared);
        (server, hardware)
    }

    async fn spawn_server(server: MotionServer) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));
        addr
    }

    async fn roundtrip(stream: &mut TcpStream, command: &str) -> String {
        stream.write_all(command.as_bytes()).await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("reply within timeout")
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    // ── Resolution rules ────────────────────────────────────────────────────

    #[test]
    fn queued_motion_replies_zero_and_enqueues_once() {
        let (server, hw) = server();
        let reply = server.execute("MovJ(0,0,0,0,0,0)");
        assert_eq!(reply.to_string(), "0MovJ(0,0,0,0,0,0);");
        assert_eq!(reply.outcome(), &CommandOutcome::Queued);
        assert_eq!(hw.queued_motions(), vec!["MovJ(0,0,0,0,0,0)"]);
    }

    #[test]
    fn query_replies_sentinel_and_queues_nothing() {
        let (server, hw) = server();
        let reply = server.execute("GetPose()");
        assert_eq!(reply.to_string(), "-1GetPose();");
        assert_eq!(reply.error_id(), NOT_QUEUED);
        assert_eq!(reply.outcome(), &CommandOutcome::NotQueued);
        assert!(hw.queued_motions().is_empty());
    }

    #[test]
    fn garbage_replies_dash_and_queues_nothing() {
        let (server, hw) = server();
        let (reply, logs) = execute_logged(&server, "???");
        assert_eq!(reply.to_string(), "-???;");
        assert_eq!(reply.code(), "-");
        assert_eq!(reply.error_id(), NOT_QUEUED);
        assert_eq!(
            reply.outcome(),
            &CommandOutcome::Rejected(ParseError::UnknownCommand("???".to_string()))
        );
        assert!(hw.queued_motions().is_empty());

        assert!(logs.contains("ERROR"), "no error logged: {logs:?}");
        assert!(logs.contains("command rejected"));
        assert!(logs.contains("???"));
    }

    #[test]
    fn valid_commands_log_no_errors() {
        let (server, _hw) = server();
        for cmd in ["MovJ(0,0,0,0,0,0)", "GetPose()", "MovJ(5000,0,0,0,0,0)"] {
            let (_, logs) = execute_logged(&server, cmd);
            assert!(logs.is_empty(), "unexpected error log for {cmd:?}: {logs:?}");
        }
    }

    #[test]
    fn hardware_fault_is_surfaced_verbatim() {
        let (server, hw) = server();
        let reply = server.execute("MovL(5000,0,0,0,0,0)");
        assert_eq!(reply.code(), fault::INVERSE_KINEMATICS.to_string());
        assert_eq!(reply.outcome(), &CommandOutcome::Fault(fault::INVERSE_KINEMATICS));
        assert_eq!(reply.to_string(), "22MovL(5000,0,0,0,0,0);");
        assert!(hw.queued_motions().is_empty());

        let reply = server.execute("JointMovJ(0,0,999,0,0,0)");
        assert_eq!(reply.error_id(), fault::JOINT_LIMIT);
        assert!(hw.queued_motions().is_empty());
    }

    #[test]
    fn reset_clears_shared_hardware_state() {
        let (server, hw) = server();
        hw.set_error(fault::INVERSE_KINEMATICS);
        hw.set_wait();
        hw.motion_stack("MovJ(1,1,1,0,0,0)");
        assert_eq!(hw.robot_mode(), RobotMode::Error);

        let reply = server.execute("GetPose()");
        assert_eq!(reply.error_id(), NOT_QUEUED);
        assert_eq!(hw.error_id(), NO_ERROR);
        assert!(!hw.is_waiting());
        assert!(hw.queued_motions().is_empty());
        assert_eq!(hw.robot_mode(), RobotMode::Enable);
    }

    #[test]
    fn reset_runs_even_for_rejected_text() {
        let (server, hw) = server();
        hw.motion_stack("MovJ(1,1,1,0,0,0)");
        hw.set_error(fault::JOINT_LIMIT);
        server.execute("???");
        assert!(hw.queued_motions().is_empty());
        assert_eq!(hw.error_id(), NO_ERROR);
        assert_eq!(hw.robot_mode(), RobotMode::Enable);
    }

    #[test]
    fn fault_does_not_leak_into_next_command() {
        let (server, hw) = server();
        assert_eq!(server.execute("MovJ(5000,0,0,0,0,0)").error_id(), fault::INVERSE_KINEMATICS);
        // The reset phase clears the previous fault before dispatch.
        assert_eq!(server.execute("MovJ(100,0,100,0,0,0)").error_id(), NO_ERROR);
        assert_eq!(hw.queued_motions().len(), 1);
    }

    #[test]
    fn dispatch_side_effects_stay_on_dispatch_target() {
        let (server, hw) = server();
        server.execute("Sync()");
        server.execute("MovJ(5000,0,0,0,0,0)");
        // Neither the wait flag nor the fault reach the shared facade.
        assert!(!hw.is_waiting());
        assert_eq!(hw.error_id(), NO_ERROR);
    }

    #[test]
    fn reply_always_ends_with_command_and_semicolon() {
        let (server, _hw) = server();
        for cmd in [
            "MovJ(0,0,0,0,0,0)",
            "GetAngle()",
            "Sync()",
            "MovL(1e9,0,0,0,0,0)",
            "Arc(1,0,0,0,0,0,1,0,0,0,0,0)",
            "MovJ(1,2",
            "",
            "héllo",
            "MovJ(0,0,0,0,0,0)\n",
            "GetPose()\r\n",
        ] {
            let reply = server.execute(cmd).to_string();
            assert!(reply.ends_with(&format!("{cmd};")), "reply {reply:?} for {cmd:?}");
        }
    }

    #[test]
    fn each_command_replaces_pending_motion() {
        let (server, hw) = server();
        server.execute("MovJ(10,0,0,0,0,0)");
        server.execute("MovL(20,0,0,0,0,0)");
        assert_eq!(hw.queued_motions(), vec!["MovL(20,0,0,0,0,0)"]);

        // Queries also run the reset phase.
        server.execute("GetPose()");
        assert!(hw.queued_motions().is_empty());

        server.execute("MoveJog(J1+)");
        assert_eq!(hw.queued_motions(), vec!["MoveJog(J1+)"]);
    }

    #[test]
    fn line_terminators_are_echoed_and_queued_verbatim() {
        let (server, hw) = server();
        let raw = decode_command(b"MovJ(0,0,0,0,0,0)\n");
        assert_eq!(raw, "MovJ(0,0,0,0,0,0)\n");

        let reply = server.execute(&raw);
        assert_eq!(reply.to_string(), "0MovJ(0,0,0,0,0,0)\n;");
        assert_eq!(reply.command(), "MovJ(0,0,0,0,0,0)\n");
        assert_eq!(hw.queued_motions(), vec!["MovJ(0,0,0,0,0,0)\n"]);
    }

    #[test]
    fn decode_replaces_invalid_utf8_without_trimming() {
        assert_eq!(decode_command(b" GetPose()\r\n"), " GetPose()\r\n");
        assert_eq!(decode_command(b"Get\xffPose()"), "Get\u{fffd}Pose()");
    }

    #[test]
    fn builder_options() {
        let (server, _hw) = server();
        let registry = Arc::new(ConnectionRegistry::new());
        let server = server
            .with_registry(Arc::clone(&registry))
            .with_max_receive_bytes(0)
            .with_dispatch_target(Box::new(SimHardware::new()));
        assert!(Arc::ptr_eq(server.registry(), &registry));
        assert_eq!(server.max_receive_bytes, 1);
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    // ── Over TCP ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tcp_round_trip_scenarios() {
        let (server, hw) = server();
        let addr = spawn_server(server).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(roundtrip(&mut stream, "MovJ(0,0,0,0,0,0)").await, "0MovJ(0,0,0,0,0,0);");
        assert_eq!(roundtrip(&mut stream, "GetPose()").await, "-1GetPose();");
        assert_eq!(roundtrip(&mut stream, "???").await, "-???;");
        // `GetPose()` and `???` both reset the shared queue.
        assert!(hw.queued_motions().is_empty());

        assert_eq!(
            roundtrip(&mut stream, "MovL(10,0,300,0,0,0)\r\n").await,
            "0MovL(10,0,300,0,0,0)\r\n;"
        );
        assert_eq!(hw.queued_motions(), vec!["MovL(10,0,300,0,0,0)\r\n"]);
    }

    #[tokio::test]
    async fn later_client_command_replaces_earlier_client_motion() {
        let (server, hw) = server();
        let addr = spawn_server(server).await;
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        assert_eq!(roundtrip(&mut first, "MovJ(100,0,300,0,0,0)").await, "0MovJ(100,0,300,0,0,0);");
        assert_eq!(hw.queued_motions(), vec!["MovJ(100,0,300,0,0,0)"]);

        assert_eq!(roundtrip(&mut second, "MovL(200,0,300,0,0,0)").await, "0MovL(200,0,300,0,0,0);");
        assert_eq!(hw.queued_motions(), vec!["MovL(200,0,300,0,0,0)"]);

        // A rejected command from the first client still clears the queue.
        assert_eq!(roundtrip(&mut first, "MovJ(5000,0,0,0,0,0)").await, "22MovJ(5000,0,0,0,0,0);");
        assert!(hw.queued_motions().is_empty());
    }

    #[tokio::test]
    async fn disconnect_releases_registry_entry() {
        let (server, _hw) = server();
        let registry = Arc::clone(server.registry());
        let addr = spawn_server(server).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        roundtrip(&mut stream, "GetPose()").await;
        assert_eq!(registry.count(Channel::Motion), 1);

        drop(stream);
        timeout(Duration::from_secs(2), async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry entry released after disconnect");
    }

    #[tokio::test]
    async fn concurrent_clients_are_serialized() {
        let (server, hw) = server();
        let addr = spawn_server(server).await;

        let mut tasks = Vec::new();
        for client in 0..4 {
            tasks.push(tokio::spawn(async move {
                let mut stream = TcpStream::connect(addr).await.unwrap();
                for i in 0..10 {
                    let ok = format!("MovJ({client},{i},0,0,0,0)");
                    assert_eq!(roundtrip(&mut stream, &ok).await, format!("0{ok};"));
                    let bad = format!("MovJ(5{client}00,{i},0,0,0,0)");
                    assert_eq!(roundtrip(&mut stream, &bad).await, format!("22{bad};"));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        // Every client finishes with a faulting command, and each command
        // resets the shared queue, so nothing survives the last one.
        assert!(hw.queued_motions().is_empty());
        assert_eq!(hw.error_id(), NO_ERROR);
        assert_eq!(hw.robot_mode(), RobotMode::Enable);
    }

    #[tokio::test]
    async fn shutdown_all_closes_idle_connection() {
        let (server, _hw) = server();
        let registry = Arc::clone(server.registry());
        let addr = spawn_server(server).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        roundtrip(&mut stream, "GetPose()").await;
        assert_eq!(registry.shutdown_all(), 1);

        let mut buf = [0u8; 16];
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("server closes the socket")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }
}
