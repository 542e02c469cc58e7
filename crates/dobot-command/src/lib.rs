//! `dobot-command` – motion command language.
//!
//! Turns raw command text into a typed [`MotionCommand`] and resolves it
//! against a [`DobotHardware`][dobot_hal::DobotHardware] dispatch target.
//!
//! # Modules
//!
//! - [`command`] – the closed [`MotionCommand`] set and its jog axes.
//! - [`parser`] – `Name(arg, ...)` text → [`MotionCommand`], with
//!   [`ParseError`] for anything outside the language.
//! - [`dispatch`] – [`dispatch`][dispatch::dispatch]: parse, then validate the
//!   command against the target's kinematic limits and report whether it
//!   needs to be queued.
//! - [`reply`] – the reply-code formatting rule shared by every channel.

pub mod command;
pub mod dispatch;
pub mod parser;
pub mod reply;

pub use command::{CartesianAxis, Direction, JogAxis, MotionCommand, MotionTarget};
pub use dispatch::{dispatch, execute};
pub use parser::ParseError;
pub use reply::{PARSE_FAILURE_CODE, format_return_code};
