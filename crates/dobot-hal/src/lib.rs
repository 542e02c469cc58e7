//! `dobot-hal` – the hardware state facade.
//!
//! # Modules
//!
//! - [`hardware`] – [`DobotHardware`][hardware::DobotHardware]: the contract
//!   every controller backend implements. The TCP channels only ever talk to
//!   this trait, so a real driver can replace the simulator without touching
//!   protocol code.
//! - [`sim`] – [`SimHardware`][sim::SimHardware]: an in-process controller
//!   used both as the dispatch target for command resolution and as the
//!   execution backend when no arm is attached.
//! - [`fault`] – numeric fault codes reported through `error_id`.
//! - [`feedback`] – [`FeedbackPacket`][feedback::FeedbackPacket]: the
//!   fixed-size binary status snapshot streamed on the feedback channel.

pub mod fault;
pub mod feedback;
pub mod hardware;
pub mod sim;

pub use feedback::{FeedbackPacket, PACKET_SIZE, PacketError};
pub use hardware::DobotHardware;
pub use sim::{SimHardware, SimLimits};
