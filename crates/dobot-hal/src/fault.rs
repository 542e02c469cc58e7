//! Fault codes surfaced through [`DobotHardware::error_id`].
//!
//! Any nonzero id other than [`NOT_QUEUED`][dobot_types::NOT_QUEUED] is sent
//! back to motion clients verbatim.
//!
//! [`DobotHardware::error_id`]: crate::hardware::DobotHardware::error_id

/// A joint target lies outside its configured travel range.
pub const JOINT_LIMIT: i32 = 18;

/// A Cartesian target is unreachable (outside the work envelope or not
/// finite).
pub const INVERSE_KINEMATICS: i32 = 22;

/// An arc or circle was given coincident via/end points.
pub const DEGENERATE_ARC: i32 = 23;

/// Human-readable description for log lines.
pub fn describe(code: i32) -> &'static str {
    match code {
        0 => "no error",
        JOINT_LIMIT => "joint limit exceeded",
        INVERSE_KINEMATICS => "inverse kinematics failed",
        DEGENERATE_ARC => "degenerate arc",
        _ => "unknown fault",
    }
}
