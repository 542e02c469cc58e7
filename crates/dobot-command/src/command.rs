//! The closed set of commands accepted on the motion channel.

use std::fmt;

use dobot_types::{CartesianPose, JointAngles};

/// Every command the motion channel understands.
///
/// Cartesian arguments are `x, y, z` in millimetres and `rx, ry, rz` in
/// degrees; joint arguments are J1..J6 in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Joint-interpolated move to a Cartesian pose.
    MovJ(CartesianPose),
    /// Linear move to a Cartesian pose.
    MovL(CartesianPose),
    /// Joint-interpolated move to joint angles.
    JointMovJ(JointAngles),
    /// Joint move by an offset from the current pose.
    RelMovJ(CartesianPose),
    /// Linear move by an offset from the current pose.
    RelMovL(CartesianPose),
    /// Arc through `via` ending at `end`.
    Arc { via: CartesianPose, end: CartesianPose },
    /// `count` full circles through `via` and `end`.
    Circle {
        count: u32,
        via: CartesianPose,
        end: CartesianPose,
    },
    /// Streaming joint servo target.
    ServoJ(JointAngles),
    /// Streaming Cartesian servo target.
    ServoP(CartesianPose),
    /// Start jogging along an axis, or stop jogging when `None`.
    MoveJog(Option<JogAxis>),
    /// Block until the queue drains. Never queued itself.
    Sync,
    /// Query the tool pose. Never queued.
    GetPose,
    /// Query the joint angles. Never queued.
    GetAngle,
}

/// Where a queued command leaves the arm once executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionTarget {
    Pose(CartesianPose),
    Joints(JointAngles),
}

impl MotionCommand {
    /// Every command name, as written on the wire.
    pub const NAMES: &'static [&'static str] = &[
        "MovJ", "MovL", "JointMovJ", "RelMovJ", "RelMovL", "Arc", "Circle", "ServoJ", "ServoP",
        "MoveJog", "Sync", "GetPose", "GetAngle",
    ];

    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            MotionCommand::MovJ(_) => "MovJ",
            MotionCommand::MovL(_) => "MovL",
            MotionCommand::JointMovJ(_) => "JointMovJ",
            MotionCommand::RelMovJ(_) => "RelMovJ",
            MotionCommand::RelMovL(_) => "RelMovL",
            MotionCommand::Arc { .. } => "Arc",
            MotionCommand::Circle { .. } => "Circle",
            MotionCommand::ServoJ(_) => "ServoJ",
            MotionCommand::ServoP(_) => "ServoP",
            MotionCommand::MoveJog(_) => "MoveJog",
            MotionCommand::Sync => "Sync",
            MotionCommand::GetPose => "GetPose",
            MotionCommand::GetAngle => "GetAngle",
        }
    }

    /// Final resting target of the command when started from `current`.
    ///
    /// `None` for commands that end where they began (circles, jog, queries).
    pub fn target(&self, current: CartesianPose) -> Option<MotionTarget> {
        match self {
            MotionCommand::MovJ(p) | MotionCommand::MovL(p) | MotionCommand::ServoP(p) => {
                Some(MotionTarget::Pose(*p))
            }
            MotionCommand::RelMovJ(d) | MotionCommand::RelMovL(d) => {
                Some(MotionTarget::Pose(current.offset_by(*d)))
            }
            MotionCommand::Arc { end, .. } => Some(MotionTarget::Pose(*end)),
            MotionCommand::JointMovJ(j) | MotionCommand::ServoJ(j) => Some(MotionTarget::Joints(*j)),
            MotionCommand::Circle { .. }
            | MotionCommand::MoveJog(_)
            | MotionCommand::Sync
            | MotionCommand::GetPose
            | MotionCommand::GetAngle => None,
        }
    }
}

/// Jog direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

/// Cartesian jog axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartesianAxis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

/// A jog axis such as `J3-` or `Rz+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogAxis {
    /// Joint number 1..=6.
    Joint(u8, Direction),
    Cartesian(CartesianAxis, Direction),
}

impl JogAxis {
    /// Parse the textual axis form. Returns `None` for anything else.
    pub fn from_text(text: &str) -> Option<Self> {
        let sign = text.chars().last()?;
        let axis = &text[..text.len() - sign.len_utf8()];
        let direction = match sign {
            '+' => Direction::Positive,
            '-' => Direction::Negative,
            _ => return None,
        };
        let cartesian = match axis {
            "X" => Some(CartesianAxis::X),
            "Y" => Some(CartesianAxis::Y),
            "Z" => Some(CartesianAxis::Z),
            "Rx" => Some(CartesianAxis::Rx),
            "Ry" => Some(CartesianAxis::Ry),
            "Rz" => Some(CartesianAxis::Rz),
            _ => None,
        };
        if let Some(c) = cartesian {
            return Some(JogAxis::Cartesian(c, direction));
        }
        let joint: u8 = axis.strip_prefix('J')?.parse().ok()?;
        (1..=6).contains(&joint).then_some(JogAxis::Joint(joint, direction))
    }
}

impl fmt::Display for JogAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (axis, direction) = match self {
            JogAxis::Joint(n, d) => (format!("J{n}"), d),
            JogAxis::Cartesian(c, d) => (format!("{c:?}"), d),
        };
        let sign = match direction {
            Direction::Positive => '+',
            Direction::Negative => '-',
        };
        write!(f, "{axis}{sign}")
    }
}
