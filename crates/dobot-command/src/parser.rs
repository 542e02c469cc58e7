//! Text → [`MotionCommand`] parser.
//!
//! Grammar: `Name(arg, arg, ...)`. Names are case-sensitive, whitespace
//! around the name and arguments is ignored, and arity is strict.

use std::str::FromStr;

use dobot_types::{CartesianPose, JointAngles};
use thiserror::Error;

use crate::command::{JogAxis, MotionCommand};

/// Reasons a command string is rejected before reaching the hardware.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("malformed command '{0}'")]
    Malformed(String),

    #[error("{command} expects {expected} argument(s), got {got}")]
    WrongArity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{command}: '{value}' is not a number")]
    InvalidNumber { command: &'static str, value: String },

    #[error("{command}: {details}")]
    InvalidArgument { command: &'static str, details: String },
}

impl FromStr for MotionCommand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse one command line.
///
/// # Errors
///
/// See [`ParseError`].
pub fn parse(text: &str) -> Result<MotionCommand, ParseError> {
    let text = text.trim();
    let Some((name, rest)) = text.split_once('(') else {
        return Err(if MotionCommand::NAMES.contains(&text) {
            ParseError::Malformed(text.to_string())
        } else {
            ParseError::UnknownCommand(text.to_string())
        });
    };
    let name = name.trim();

    let Some(name) = MotionCommand::NAMES.iter().copied().find(|n| *n == name) else {
        return Err(ParseError::UnknownCommand(name.to_string()));
    };

    let body = rest
        .strip_suffix(')')
        .filter(|b| !b.contains(['(', ')']))
        .ok_or_else(|| ParseError::Malformed(text.to_string()))?;

    let args: Vec<&str> = if body.trim().is_empty() {
        Vec::new()
    } else {
        body.split(',').map(str::trim).collect()
    };

    build(name, &args)
}

fn build(name: &'static str, args: &[&str]) -> Result<MotionCommand, ParseError> {
    let command = match name {
        "MovJ" => MotionCommand::MovJ(pose(name, args)?),
        "MovL" => MotionCommand::MovL(pose(name, args)?),
        "JointMovJ" => MotionCommand::JointMovJ(joints(name, args)?),
        "RelMovJ" => MotionCommand::RelMovJ(pose(name, args)?),
        "RelMovL" => MotionCommand::RelMovL(pose(name, args)?),
        "ServoJ" => MotionCommand::ServoJ(joints(name, args)?),
        "ServoP" => MotionCommand::ServoP(pose(name, args)?),
        "Arc" => {
            let v = numbers::<12>(name, args)?;
            MotionCommand::Arc {
                via: pose_from(&v[..6]),
                end: pose_from(&v[6..]),
            }
        }
        "Circle" => {
            arity(name, args, 13)?;
            let count: u32 = args[0].parse().map_err(|_| ParseError::InvalidNumber {
                command: name,
                value: args[0].to_string(),
            })?;
            if count == 0 {
                return Err(ParseError::InvalidArgument {
                    command: name,
                    details: "count must be at least 1".to_string(),
                });
            }
            let v = numbers::<12>(name, &args[1..])?;
            MotionCommand::Circle {
                count,
                via: pose_from(&v[..6]),
                end: pose_from(&v[6..]),
            }
        }
        "MoveJog" => match args {
            [] => MotionCommand::MoveJog(None),
            [axis] => {
                let axis = JogAxis::from_text(axis).ok_or_else(|| ParseError::InvalidArgument {
                    command: name,
                    details: format!("unknown jog axis '{axis}'"),
                })?;
                MotionCommand::MoveJog(Some(axis))
            }
            _ => {
                return Err(ParseError::WrongArity {
                    command: name,
                    expected: 1,
                    got: args.len(),
                });
            }
        },
        "Sync" => {
            arity(name, args, 0)?;
            MotionCommand::Sync
        }
        "GetPose" => {
            arity(name, args, 0)?;
            MotionCommand::GetPose
        }
        "GetAngle" => {
            arity(name, args, 0)?;
            MotionCommand::GetAngle
        }
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

fn arity(command: &'static str, args: &[&str], expected: usize) -> Result<(), ParseError> {
    if args.len() != expected {
        return Err(ParseError::WrongArity {
            command,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn numbers<const N: usize>(command: &'static str, args: &[&str]) -> Result<[f64; N], ParseError> {
    arity(command, args, N)?;
    let mut out = [0.0; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        *slot = raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::InvalidNumber {
                command,
                value: raw.to_string(),
            })?;
    }
    Ok(out)
}

fn pose(command: &'static str, args: &[&str]) -> Result<CartesianPose, ParseError> {
    numbers::<6>(command, args).map(CartesianPose::from_array)
}

fn joints(command: &'static str, args: &[&str]) -> Result<JointAngles, ParseError> {
    numbers::<6>(command, args).map(JointAngles)
}

fn pose_from(v: &[f64]) -> CartesianPose {
    CartesianPose {
        x: v[0],
        y: v[1],
        z: v[2],
        rx: v[3],
        ry: v[4],
        rz: v[5],
    }
}
