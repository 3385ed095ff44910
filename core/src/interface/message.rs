use crate::config::PipelineConfig;
use crate::prelude::{MAX_WIRE_BINS, NO_OBSTACLE};
use crate::processing::DistanceProfile;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// MAVLink message id of `OBSTACLE_DISTANCE`.
pub const OBSTACLE_DISTANCE_MSG_ID: u32 = 330;
/// Full payload length including extension fields.
pub const OBSTACLE_DISTANCE_PAYLOAD_LEN: usize = 167;
pub const MAV_DISTANCE_SENSOR_LASER: u8 = 0;
pub const MAV_FRAME_BODY_FRD: u8 = 12;

// Payload offsets in MAVLink wire order (largest type first, extensions last).
const TIME_USEC: usize = 0;
const DISTANCES: usize = 8;
const MIN_DISTANCE: usize = DISTANCES + 2 * MAX_WIRE_BINS;
const MAX_DISTANCE: usize = MIN_DISTANCE + 2;
const SENSOR_TYPE: usize = MAX_DISTANCE + 2;
const INCREMENT: usize = SENSOR_TYPE + 1;
const INCREMENT_F: usize = INCREMENT + 1;
const ANGLE_OFFSET: usize = INCREMENT_F + 4;
const FRAME: usize = ANGLE_OFFSET + 4;

/// One obstacle-distance report for the autopilot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleDistanceMessage {
    pub time_usec: u64,
    pub sensor_type: u8,
    /// Always [`MAX_WIRE_BINS`] entries; unused slots hold [`NO_OBSTACLE`].
    pub distances: Vec<u16>,
    /// Legacy integer increment, zero when `increment_f` is used.
    pub increment: u8,
    pub min_distance: u16,
    pub max_distance: u16,
    pub increment_f: f32,
    pub angle_offset: f32,
    pub frame: u8,
}

impl ObstacleDistanceMessage {
    pub fn from_profile(profile: &DistanceProfile, config: &PipelineConfig, time_usec: u64) -> Self {
        let mut distances = vec![NO_OBSTACLE; MAX_WIRE_BINS];
        for (slot, &bin) in distances.iter_mut().zip(profile.bins()) {
            *slot = bin;
        }
        Self {
            time_usec,
            sensor_type: config.sensor_type,
            distances,
            increment: 0,
            min_distance: config.min_distance_cm,
            max_distance: config.max_distance_cm,
            increment_f: config.bin_width_deg(),
            angle_offset: config.start_angle_deg(),
            frame: config.frame,
        }
    }

    /// Untruncated little-endian MAVLink payload.
    pub fn encode_payload(&self) -> [u8; OBSTACLE_DISTANCE_PAYLOAD_LEN] {
        let mut buf = [0u8; OBSTACLE_DISTANCE_PAYLOAD_LEN];
        LittleEndian::write_u64(&mut buf[TIME_USEC..DISTANCES], self.time_usec);
        for slot in 0..MAX_WIRE_BINS {
            let value = self.distances.get(slot).copied().unwrap_or(NO_OBSTACLE);
            let at = DISTANCES + 2 * slot;
            LittleEndian::write_u16(&mut buf[at..at + 2], value);
        }
        LittleEndian::write_u16(&mut buf[MIN_DISTANCE..MAX_DISTANCE], self.min_distance);
        LittleEndian::write_u16(&mut buf[MAX_DISTANCE..SENSOR_TYPE], self.max_distance);
        buf[SENSOR_TYPE] = self.sensor_type;
        buf[INCREMENT] = self.increment;
        LittleEndian::write_f32(&mut buf[INCREMENT_F..ANGLE_OFFSET], self.increment_f);
        LittleEndian::write_f32(&mut buf[ANGLE_OFFSET..FRAME], self.angle_offset);
        buf[FRAME] = self.frame;
        buf
    }

    /// Parses a payload that may have had trailing zero bytes truncated.
    pub fn decode_payload(payload: &[u8]) -> Option<Self> {
        if payload.is_empty() || payload.len() > OBSTACLE_DISTANCE_PAYLOAD_LEN {
            return None;
        }
        let mut buf = [0u8; OBSTACLE_DISTANCE_PAYLOAD_LEN];
        buf[..payload.len()].copy_from_slice(payload);
        let distances = (0..MAX_WIRE_BINS)
            .map(|slot| {
                let at = DISTANCES + 2 * slot;
                LittleEndian::read_u16(&buf[at..at + 2])
            })
            .collect();
        Some(Self {
            time_usec: LittleEndian::read_u64(&buf[TIME_USEC..DISTANCES]),
            sensor_type: buf[SENSOR_TYPE],
            distances,
            increment: buf[INCREMENT],
            min_distance: LittleEndian::read_u16(&buf[MIN_DISTANCE..MAX_DISTANCE]),
            max_distance: LittleEndian::read_u16(&buf[MAX_DISTANCE..SENSOR_TYPE]),
            increment_f: LittleEndian::read_f32(&buf[INCREMENT_F..ANGLE_OFFSET]),
            angle_offset: LittleEndian::read_f32(&buf[ANGLE_OFFSET..FRAME]),
            frame: buf[FRAME],
        })
    }
}
