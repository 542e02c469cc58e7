//! In-process simulated controller for running the front-end without an arm
//! attached, and for resolving commands without side effects on the real
//! backend.
//!
//! [`SimHardware`] keeps its whole state behind one [`Mutex`], so every
//! [`DobotHardware`] call is atomic with respect to the others.
//!
//! # Example
//!
//! ```rust
//! use dobot_hal::{DobotHardware, SimHardware};
//! use dobot_types::CartesianPose;
//!
//! let sim = SimHardware::new();
//! let far = CartesianPose::from_array([5000.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//! assert!(sim.check_cartesian(&far).is_err());
//!
//! sim.motion_stack("MovJ(300,0,400,0,0,0)");
//! assert_eq!(sim.pop_motion().as_deref(), Some("MovJ(300,0,400,0,0,0)"));
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dobot_types::{CartesianPose, JointAngles, NO_ERROR, RobotMode};
use tracing::debug;

use crate::fault;
use crate::feedback::FeedbackPacket;
use crate::hardware::DobotHardware;

/// Default realtime feedback period (125 Hz).
pub const DEFAULT_FEEDBACK_PERIOD: Duration = Duration::from_millis(8);

/// Pose the simulator starts in.
pub const HOME_POSE: CartesianPose = CartesianPose {
    x: 300.0,
    y: 0.0,
    z: 400.0,
    rx: 180.0,
    ry: 0.0,
    rz: 0.0,
};

/// Kinematic envelope enforced by [`SimHardware::check_cartesian`] and
/// [`SimHardware::check_joints`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimLimits {
    /// Maximum distance of the tool point from the base origin (mm).
    pub reach_mm: f64,
    /// Inclusive `(min, max)` travel per joint (deg), J1 first.
    pub joint_limits: [(f64, f64); 6],
}

impl Default for SimLimits {
    fn default() -> Self {
        Self {
            reach_mm: 900.0,
            joint_limits: [
                (-360.0, 360.0),
                (-360.0, 360.0),
                (-160.0, 160.0),
                (-360.0, 360.0),
                (-360.0, 360.0),
                (-360.0, 360.0),
            ],
        }
    }
}

struct SimState {
    error_id: i32,
    motion_queue: VecDeque<String>,
    waiting: bool,
    mode: RobotMode,
    pose: CartesianPose,
    joints: JointAngles,
}

/// Simulated controller implementing [`DobotHardware`].
pub struct SimHardware {
    state: Mutex<SimState>,
    limits: SimLimits,
    feedback_period: Duration,
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHardware {
    /// Fresh controller at [`HOME_POSE`], disabled, no fault, empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                error_id: NO_ERROR,
                motion_queue: VecDeque::new(),
                waiting: false,
                mode: RobotMode::Disabled,
                pose: HOME_POSE,
                joints: JointAngles::default(),
            }),
            limits: SimLimits::default(),
            feedback_period: DEFAULT_FEEDBACK_PERIOD,
        }
    }

    /// Override the kinematic envelope (builder-style).
    pub fn with_limits(mut self, limits: SimLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override the feedback period (builder-style).
    pub fn with_feedback_period(mut self, period: Duration) -> Self {
        self.feedback_period = period;
        self
    }

    pub fn limits(&self) -> &SimLimits {
        &self.limits
    }

    /// Remove and return the oldest queued motion.
    pub fn pop_motion(&self) -> Option<String> {
        self.state().motion_queue.pop_front()
    }

    /// Teleport the tool to `pose`.
    pub fn move_to_pose(&self, pose: CartesianPose) {
        self.state().pose = pose;
    }

    /// Teleport the joints to `joints`.
    pub fn move_to_joints(&self, joints: JointAngles) {
        self.state().joints = joints;
    }

    /// Current state as a decoded packet.
    pub fn snapshot(&self) -> FeedbackPacket {
        let state = self.state();
        FeedbackPacket {
            robot_mode: state.mode,
            error_id: state.error_id,
            queued_motions: u32::try_from(state.motion_queue.len()).unwrap_or(u32::MAX),
            waiting: state.waiting,
            joints: state.joints,
            pose: state.pose,
        }
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DobotHardware for SimHardware {
    fn error_id(&self) -> i32 {
        self.state().error_id
    }

    fn set_error(&self, error_id: i32) {
        let mut state = self.state();
        state.error_id = error_id;
        if error_id != NO_ERROR {
            state.mode = RobotMode::Error;
        }
    }

    fn clear_error(&self) {
        self.state().error_id = NO_ERROR;
    }

    fn clear_motion_queue(&self) {
        self.state().motion_queue.clear();
    }

    fn motion_stack(&self, command: &str) {
        self.state().motion_queue.push_back(command.to_string());
    }

    fn queued_motions(&self) -> Vec<String> {
        self.state().motion_queue.iter().cloned().collect()
    }

    fn clear_wait(&self) {
        self.state().waiting = false;
    }

    fn set_wait(&self) {
        self.state().waiting = true;
    }

    fn is_waiting(&self) -> bool {
        self.state().waiting
    }

    fn set_robot_mode(&self, mode: RobotMode) {
        self.state().mode = mode;
    }

    fn robot_mode(&self) -> RobotMode {
        self.state().mode
    }

    fn cartesian_pose(&self) -> CartesianPose {
        self.state().pose
    }

    fn joint_angles(&self) -> JointAngles {
        self.state().joints
    }

    fn check_cartesian(&self, pose: &CartesianPose) -> Result<(), i32> {
        let finite = pose.to_array().iter().all(|v| v.is_finite());
        if !finite || pose.reach() > self.limits.reach_mm {
            debug!(?pose, reach_mm = self.limits.reach_mm, "pose outside work envelope");
            return Err(fault::INVERSE_KINEMATICS);
        }
        Ok(())
    }

    fn check_joints(&self, joints: &JointAngles) -> Result<(), i32> {
        for (i, (angle, (min, max))) in joints.0.iter().zip(self.limits.joint_limits).enumerate() {
            if !angle.is_finite() || *angle < min || *angle > max {
                debug!(joint = i + 1, angle, min, max, "joint target outside travel range");
                return Err(fault::JOINT_LIMIT);
            }
        }
        Ok(())
    }

    fn status(&self) -> Vec<u8> {
        self.snapshot().encode()
    }

    fn feedback_period(&self) -> Duration {
        self.feedback_period
    }
}
