//! Simulated motion executor.
//!
//! Consumes the shared motion queue one command per step and moves the
//! simulator to each command's target, so the feedback stream shows the arm
//! working through accepted motions.

use std::sync::Arc;
use std::time::Duration;

use dobot_command::{MotionCommand, MotionTarget};
use dobot_hal::{DobotHardware, SimHardware};
use dobot_types::RobotMode;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Execute queued motions on `hardware` forever, one every `step`.
pub async fn run(hardware: Arc<SimHardware>, step: Duration) {
    info!(step_ms = step.as_millis() as u64, "simulated driver started");
    let mut ticker = interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        step_once(&hardware);
    }
}

/// Execute the oldest queued motion, if any.
///
/// Returns the command that was executed.
pub fn step_once(hardware: &SimHardware) -> Option<MotionCommand> {
    let Some(raw) = hardware.pop_motion() else {
        if hardware.robot_mode() == RobotMode::Running {
            hardware.set_robot_mode(RobotMode::Enable);
            debug!("motion queue drained");
        }
        return None;
    };

    let command = match raw.parse::<MotionCommand>() {
        Ok(command) => command,
        Err(e) => {
            warn!(command = %raw, error = %e, "dropping unparsable queued motion");
            return None;
        }
    };

    hardware.set_robot_mode(RobotMode::Running);
    match command.target(hardware.cartesian_pose()) {
        Some(MotionTarget::Pose(pose)) => hardware.move_to_pose(pose),
        Some(MotionTarget::Joints(joints)) => hardware.move_to_joints(joints),
        None => {}
    }
    debug!(command = %raw, "motion executed");
    Some(command)
}
