//! [`FeedbackServer`] – the realtime status stream.
//!
//! Clients never send anything on this channel. Each connection gets the
//! hardware's binary status snapshot once per feedback period until it
//! disconnects or the registry shuts it down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dobot_hal::DobotHardware;
use dobot_types::{Channel, DobotError};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::registry::{ConnectionGuard, ConnectionRegistry};

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// Fixed-period loop timer with drift correction.
///
/// The anchor for the next iteration is recorded before sleeping, but it
/// points at the instant the sleep should end rather than at the moment it
/// is taken. Anchoring to the current instant would count the whole sleep
/// as elapsed work on the next pass, so budgets would alternate between a
/// full period and zero. With the scheduled-end anchor, oversleeping and
/// send time are charged against the following budget and the interval
/// between sends settles at the period.
#[derive(Debug, Clone)]
pub struct Cadence {
    period: Duration,
    loop_start: Instant,
}

impl Cadence {
    /// Start a cadence whose first iteration begins now.
    pub fn start(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    fn starting_at(period: Duration, loop_start: Instant) -> Self {
        Self { period, loop_start }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep budget for the iteration that just finished its work.
    ///
    /// Zero when the work overran the period.
    pub fn next_sleep(&mut self) -> Duration {
        self.next_sleep_at(Instant::now())
    }

    fn next_sleep_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.loop_start);
        let budget = self.period.saturating_sub(elapsed);
        self.loop_start = now + budget;
        budget
    }
}

// ---------------------------------------------------------------------------
// FeedbackServer
// ---------------------------------------------------------------------------

/// TCP server for the realtime feedback channel.
pub struct FeedbackServer {
    addr: SocketAddr,
    hardware: Arc<dyn DobotHardware>,
    registry: Arc<ConnectionRegistry>,
    period: Duration,
}

impl FeedbackServer {
    /// Server bound to `addr` streaming `hardware`'s status.
    ///
    /// The feedback period is read from `hardware` once, here.
    pub fn new(addr: SocketAddr, hardware: Arc<dyn DobotHardware>) -> Self {
        let period = hardware.feedback_period();
        Self {
            addr,
            hardware,
            registry: Arc::new(ConnectionRegistry::new()),
            period,
        }
    }

    /// Share a registry with other servers (builder-style).
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn period(&self) -> Duration {
        self.period
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

    /// Accept connections on `listener` forever, one streaming task each.
    pub async fn serve(self, listener: TcpListener) -> Result<(), DobotError> {
        let local = listener.local_addr()?;
        info!(addr = %local, period_ms = self.period.as_millis() as u64, "feedback channel listening");
        let server = Arc::new(self);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let guard = server.registry.register(Channel::Feedback, peer);
                    info!(%peer, id = %guard.id(), "feedback client connected");
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        server.stream_status(stream, peer, guard).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "feedback channel accept error");
                }
            }
        }
    }

    async fn stream_status(&self, mut stream: TcpStream, peer: SocketAddr, mut guard: ConnectionGuard) {
        let mut cadence = Cadence::start(self.period);

        loop {
            let packet = self.hardware.status();
            tokio::select! {
                _ = guard.shutdown_signal() => {
                    debug!(%peer, "feedback connection shut down by registry");
                    break;
                }
                sent = stream.write_all(&packet) => {
                    if let Err(e) = sent {
                        info!(%peer, error = %e, "feedback client disconnected");
                        break;
                    }
                }
            }

            let budget = cadence.next_sleep();
            tokio::select! {
                _ = guard.shutdown_signal() => {
                    debug!(%peer, "feedback connection shut down by registry");
                    break;
                }
                _ = sleep(budget) => {}
            }
        }
    }
}
