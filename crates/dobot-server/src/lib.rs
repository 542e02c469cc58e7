//! `dobot-server` – the two TCP channels of the Dobot front-end.
//!
//! # Modules
//!
//! - [`motion`] – [`MotionServer`]: accepts text motion commands, resolves
//!   each one against a private dispatch target, queues accepted motions on
//!   the shared hardware facade and answers every command with exactly one
//!   `"<code><command>;"` reply.
//! - [`feedback`] – [`FeedbackServer`]: pushes the hardware's binary status
//!   snapshot to every connected client at a fixed, drift-corrected cadence.
//! - [`registry`] – [`ConnectionRegistry`]: bookkeeping for live
//!   connections on both channels, with an explicit
//!   [`shutdown_all`][ConnectionRegistry::shutdown_all].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dobot_hal::{DobotHardware, SimHardware};
//! use dobot_server::{ConnectionRegistry, FeedbackServer, MotionServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hardware: Arc<dyn DobotHardware> = Arc::new(SimHardware::new());
//!     let registry = Arc::new(ConnectionRegistry::new());
//!
//!     let motion = MotionServer::new("0.0.0.0:30003".parse().unwrap(), Arc::clone(&hardware))
//!         .with_registry(Arc::clone(&registry));
//!     let feedback = FeedbackServer::new("0.0.0.0:30004".parse().unwrap(), hardware)
//!         .with_registry(registry);
//!
//!     let _ = tokio::try_join!(motion.run(), feedback.run());
//! }
//! ```

pub mod feedback;
pub mod motion;
pub mod registry;

pub use feedback::{Cadence, FeedbackServer};
pub use motion::{CommandOutcome, DEFAULT_MAX_RECEIVE_BYTES, MotionServer, Reply};
pub use registry::{ConnectionGuard, ConnectionInfo, ConnectionRegistry};
