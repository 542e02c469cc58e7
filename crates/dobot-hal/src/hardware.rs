//! [`DobotHardware`] – the controller state contract consumed by the TCP
//! channels.
//!
//! Every method takes `&self`: implementations own their synchronisation so
//! one instance can be shared across connection tasks behind an `Arc`.

use std::time::Duration;

use dobot_types::{CartesianPose, JointAngles, RobotMode};

/// Controller state: error flag, motion queue, wait flag, operating mode,
/// current kinematic state, and the realtime status snapshot.
pub trait DobotHardware: Send + Sync {
    /// Current error id. `0` means no fault is outstanding.
    fn error_id(&self) -> i32;

    /// Record a fault.
    fn set_error(&self, error_id: i32);

    /// Reset the error id to `0`.
    fn clear_error(&self);

    /// Drop every pending motion.
    fn clear_motion_queue(&self);

    /// Append a raw motion command to the back of the queue.
    fn motion_stack(&self, command: &str);

    /// Pending motions, oldest first.
    fn queued_motions(&self) -> Vec<String>;

    fn clear_wait(&self);

    fn set_wait(&self);

    fn is_waiting(&self) -> bool;

    fn set_robot_mode(&self, mode: RobotMode);

    fn robot_mode(&self) -> RobotMode;

    /// Most recently known tool pose.
    fn cartesian_pose(&self) -> CartesianPose;

    /// Most recently known joint angles.
    fn joint_angles(&self) -> JointAngles;

    /// Check that `pose` is reachable.
    ///
    /// # Errors
    ///
    /// Returns the fault code describing why the pose is rejected.
    fn check_cartesian(&self, pose: &CartesianPose) -> Result<(), i32>;

    /// Check that every joint of `joints` is inside its travel range.
    ///
    /// # Errors
    ///
    /// Returns the fault code describing why the target is rejected.
    fn check_joints(&self, joints: &JointAngles) -> Result<(), i32>;

    /// Encoded realtime status snapshot (see [`FeedbackPacket`]).
    ///
    /// [`FeedbackPacket`]: crate::feedback::FeedbackPacket
    fn status(&self) -> Vec<u8>;

    /// Interval at which the feedback channel pushes [`status`][Self::status].
    fn feedback_period(&self) -> Duration;
}
