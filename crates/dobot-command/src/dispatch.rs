//! Command dispatch against a [`DobotHardware`] target.
//!
//! [`dispatch`] parses the text and hands the typed command to [`execute`],
//! which validates it against the target and reports whether the command
//! needs to go on the motion queue:
//!
//! | Command | Result | Side effect on target |
//! |---|---|---|
//! | Cartesian moves (`MovJ`, `MovL`, `ServoP`, `RelMov*`) | `true` if reachable | fault id on failure |
//! | Joint moves (`JointMovJ`, `ServoJ`) | `true` if within limits | fault id on failure |
//! | `Arc`, `Circle` | `true` if both points valid and distinct | fault id on failure |
//! | `MoveJog` | `true` | – |
//! | `Sync` | `false` | wait flag set |
//! | `GetPose`, `GetAngle` | `false` | – |

use dobot_hal::{DobotHardware, fault};
use dobot_types::CartesianPose;
use tracing::debug;

use crate::command::MotionCommand;
use crate::parser::{ParseError, parse};

/// Parse `text` and execute it against `target`.
///
/// Returns `Ok(true)` when the command must be queued for execution,
/// `Ok(false)` when nothing further is needed (queries, `Sync`, or a
/// rejected target whose fault id is now set on `target`).
///
/// # Errors
///
/// Returns [`ParseError`] for text outside the command language; `target`
/// is left untouched in that case.
pub fn dispatch(target: &dyn DobotHardware, text: &str) -> Result<bool, ParseError> {
    let command = parse(text)?;
    Ok(execute(target, &command))
}

/// Execute an already-parsed command against `target`.
pub fn execute(target: &dyn DobotHardware, command: &MotionCommand) -> bool {
    debug!(command = command.name(), "dispatching");
    match command {
        MotionCommand::MovJ(pose) | MotionCommand::MovL(pose) | MotionCommand::ServoP(pose) => {
            accept(target, target.check_cartesian(pose))
        }
        MotionCommand::RelMovJ(delta) | MotionCommand::RelMovL(delta) => {
            let destination = target.cartesian_pose().offset_by(*delta);
            accept(target, target.check_cartesian(&destination))
        }
        MotionCommand::JointMovJ(joints) | MotionCommand::ServoJ(joints) => {
            accept(target, target.check_joints(joints))
        }
        MotionCommand::Arc { via, end } | MotionCommand::Circle { via, end, .. } => {
            accept(target, check_arc(target, via, end))
        }
        MotionCommand::MoveJog(_) => true,
        MotionCommand::Sync => {
            target.set_wait();
            false
        }
        MotionCommand::GetPose | MotionCommand::GetAngle => false,
    }
}

fn accept(target: &dyn DobotHardware, check: Result<(), i32>) -> bool {
    match check {
        Ok(()) => true,
        Err(code) => {
            debug!(code, fault = fault::describe(code), "command rejected by target");
            target.set_error(code);
            false
        }
    }
}

fn check_arc(target: &dyn DobotHardware, via: &CartesianPose, end: &CartesianPose) -> Result<(), i32> {
    if (via.x, via.y, via.z) == (end.x, end.y, end.z) {
        return Err(fault::DEGENERATE_ARC);
    }
    target.check_cartesian(via)?;
    target.check_cartesian(end)
}
