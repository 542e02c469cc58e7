//! `dobot-types` – shared vocabulary for the Dobot TCP front-end.
//!
//! Every other crate in the workspace speaks in these types: the operating
//! [`RobotMode`], Cartesian and joint-space targets, the [`Channel`] a
//! connection belongs to, the reserved error-id values, and the workspace
//! error type [`DobotError`].

use std::fmt;

use thiserror::Error;

/// Error id meaning "no fault outstanding".
pub const NO_ERROR: i32 = 0;

/// Sentinel error id meaning "nothing was sent to the motion queue".
///
/// Shared by malformed commands and by valid commands that never queue a
/// motion (queries, `Sync()`). Clients cannot tell the two apart.
pub const NOT_QUEUED: i32 = -1;

/// Controller operating mode as reported in the realtime feedback packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RobotMode {
    Init = 1,
    BrakeOpen = 2,
    #[default]
    Disabled = 4,
    Enable = 5,
    Backdrive = 6,
    Running = 7,
    Recording = 8,
    Error = 9,
    Pause = 10,
    Jog = 11,
}

impl RobotMode {
    /// Numeric mode code used on the wire.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Inverse of [`code`][Self::code]. Unknown codes yield `None`.
    pub fn from_code(code: u64) -> Option<Self> {
        let mode = match code {
            1 => Self::Init,
            2 => Self::BrakeOpen,
            4 => Self::Disabled,
            5 => Self::Enable,
            6 => Self::Backdrive,
            7 => Self::Running,
            8 => Self::Recording,
            9 => Self::Error,
            10 => Self::Pause,
            11 => Self::Jog,
            _ => return None,
        };
        Some(mode)
    }
}

/// Tool pose in the base frame: translation in millimetres, rotation in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartesianPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl CartesianPose {
    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
            rx: v[3],
            ry: v[4],
            rz: v[5],
        }
    }

    pub fn to_array(self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rx, self.ry, self.rz]
    }

    /// Component-wise sum, used for relative moves.
    pub fn offset_by(self, delta: CartesianPose) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            z: self.z + delta.z,
            rx: self.rx + delta.rx,
            ry: self.ry + delta.ry,
            rz: self.rz + delta.rz,
        }
    }

    /// Straight-line distance of the tool point from the base origin (mm).
    pub fn reach(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Six joint angles in degrees, J1 first.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointAngles(pub [f64; 6]);

/// The TCP endpoint a connection was accepted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Text motion commands, one reply per command.
    Motion,
    /// Unsolicited binary status stream.
    Feedback,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Motion => write!(f, "motion"),
            Channel::Feedback => write!(f, "feedback"),
        }
    }
}

/// Workspace error type spanning socket setup, transport and configuration
/// failures.
#[derive(Error, Debug)]
pub enum DobotError {
    #[error("Bind error on {addr}: {details}")]
    Bind { addr: String, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hardware Fault {code}: {details}")]
    HardwareFault { code: i32, details: String },
}
