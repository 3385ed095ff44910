//! MAVLink v2 framing for outbound `OBSTACLE_DISTANCE` messages.

use crate::interface::message::{ObstacleDistanceMessage, OBSTACLE_DISTANCE_MSG_ID};
use byteorder::{ByteOrder, LittleEndian};

pub const MAVLINK_V2_MAGIC: u8 = 0xFD;
pub const MAVLINK_V2_HEADER_LEN: usize = 10;
/// Seed folded into the checksum so both ends agree on the message layout.
pub const OBSTACLE_DISTANCE_CRC_EXTRA: u8 = 23;

/// One step of the X.25 / CRC-16-MCRF4XX checksum used by MAVLink.
pub fn crc_accumulate(byte: u8, crc: u16) -> u16 {
    let mut tmp = byte ^ (crc & 0xFF) as u8;
    tmp ^= tmp << 4;
    let tmp = tmp as u16;
    (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
}

pub fn crc_calculate(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0xFFFF, |crc, &byte| crc_accumulate(byte, crc))
}

/// Builds MAVLink v2 frames with a rolling sequence number.
#[derive(Debug, Clone)]
pub struct MavlinkFramer {
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl MavlinkFramer {
    pub fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn frame(&mut self, message: &ObstacleDistanceMessage) -> Vec<u8> {
        let payload = message.encode_payload();
        // v2 drops trailing zero bytes but always keeps the first one
        let len = payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(1, |last| last + 1);

        let mut frame = Vec::with_capacity(MAVLINK_V2_HEADER_LEN + len + 2);
        frame.push(MAVLINK_V2_MAGIC);
        frame.push(len as u8);
        frame.push(0); // incompat flags
        frame.push(0); // compat flags
        frame.push(self.sequence);
        frame.push(self.system_id);
        frame.push(self.component_id);
        let mut msg_id = [0u8; 4];
        LittleEndian::write_u32(&mut msg_id, OBSTACLE_DISTANCE_MSG_ID);
        frame.extend_from_slice(&msg_id[..3]);
        frame.extend_from_slice(&payload[..len]);

        let crc = crc_accumulate(OBSTACLE_DISTANCE_CRC_EXTRA, crc_calculate(&frame[1..]));
        let mut crc_bytes = [0u8; 2];
        LittleEndian::write_u16(&mut crc_bytes, crc);
        frame.extend_from_slice(&crc_bytes);

        self.sequence = self.sequence.wrapping_add(1);
        frame
    }
}
