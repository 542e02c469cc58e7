//! [`FeedbackPacket`] – fixed-size binary status snapshot.
//!
//! Every packet is exactly [`PACKET_SIZE`] bytes, little-endian, zero-filled
//! outside the fields below:
//!
//! | Offset | Type | Field |
//! |---|---|---|
//! | 0 | `u16` | message size |
//! | 24 | `u64` | robot mode code |
//! | 32 | `i64` | error id |
//! | 40 | `u32` | queued motion count |
//! | 44 | `u8` | wait flag |
//! | 432 | `6 × f64` | joint angles (deg) |
//! | 624 | `6 × f64` | tool pose (mm, deg) |

use dobot_types::{CartesianPose, JointAngles, RobotMode};
use thiserror::Error;

/// Size in bytes of one encoded packet.
pub const PACKET_SIZE: usize = 1440;

const OFFSET_SIZE: usize = 0;
const OFFSET_MODE: usize = 24;
const OFFSET_ERROR: usize = 32;
const OFFSET_QUEUE: usize = 40;
const OFFSET_WAIT: usize = 44;
const OFFSET_JOINTS: usize = 432;
const OFFSET_POSE: usize = 624;

/// Reasons a byte buffer cannot be decoded into a [`FeedbackPacket`].
#[derive(Error, Debug, PartialEq)]
pub enum PacketError {
    #[error("feedback packet must be {expected} bytes, got {got}")]
    WrongSize { expected: usize, got: usize },

    #[error("unknown robot mode code {0}")]
    UnknownMode(u64),
}

/// Decoded view of one realtime status snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPacket {
    pub robot_mode: RobotMode,
    pub error_id: i32,
    pub queued_motions: u32,
    pub waiting: bool,
    pub joints: JointAngles,
    pub pose: CartesianPose,
}

impl FeedbackPacket {
    /// Encode into a [`PACKET_SIZE`]-byte buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PACKET_SIZE];
        buf[OFFSET_SIZE..OFFSET_SIZE + 2].copy_from_slice(&(PACKET_SIZE as u16).to_le_bytes());
        buf[OFFSET_MODE..OFFSET_MODE + 8].copy_from_slice(&self.robot_mode.code().to_le_bytes());
        buf[OFFSET_ERROR..OFFSET_ERROR + 8].copy_from_slice(&i64::from(self.error_id).to_le_bytes());
        buf[OFFSET_QUEUE..OFFSET_QUEUE + 4].copy_from_slice(&self.queued_motions.to_le_bytes());
        buf[OFFSET_WAIT] = u8::from(self.waiting);
        write_f64s(&mut buf[OFFSET_JOINTS..], &self.joints.0);
        write_f64s(&mut buf[OFFSET_POSE..], &self.pose.to_array());
        buf
    }

    /// Decode a buffer produced by [`encode`][Self::encode].
    ///
    /// # Errors
    ///
    /// [`PacketError::WrongSize`] when `buf` is not exactly [`PACKET_SIZE`]
    /// bytes, [`PacketError::UnknownMode`] for an unrecognised mode code.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() != PACKET_SIZE {
            return Err(PacketError::WrongSize {
                expected: PACKET_SIZE,
                got: buf.len(),
            });
        }
        let mode_code = u64::from_le_bytes(le_bytes(buf, OFFSET_MODE));
        let robot_mode = RobotMode::from_code(mode_code).ok_or(PacketError::UnknownMode(mode_code))?;
        let error_id = i64::from_le_bytes(le_bytes(buf, OFFSET_ERROR)) as i32;
        let queued_motions = u32::from_le_bytes(le_bytes(buf, OFFSET_QUEUE));

        Ok(Self {
            robot_mode,
            error_id,
            queued_motions,
            waiting: buf[OFFSET_WAIT] != 0,
            joints: JointAngles(read_f64s(buf, OFFSET_JOINTS)),
            pose: CartesianPose::from_array(read_f64s(buf, OFFSET_POSE)),
        })
    }
}

fn write_f64s(dst: &mut [u8], values: &[f64; 6]) {
    for (chunk, v) in dst.chunks_exact_mut(8).zip(values) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
}

fn read_f64s(buf: &[u8], offset: usize) -> [f64; 6] {
    let mut out = [0.0; 6];
    for (i, v) in out.iter_mut().enumerate() {
        *v = f64::from_le_bytes(le_bytes(buf, offset + i * 8));
    }
    out
}

// Caller guarantees `buf` is PACKET_SIZE long and `offset + N` is in range.
fn le_bytes<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}
