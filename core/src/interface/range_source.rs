use crate::prelude::SourceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A single polar range measurement relative to vehicle forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSample {
    pub angle_deg: f32,
    pub distance_cm: u16,
}

impl RangeSample {
    pub fn new(angle_deg: f32, distance_cm: u16) -> Self {
        Self {
            angle_deg,
            distance_cm,
        }
    }
}

/// Metadata of the most recently received scan packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanPacketMeta {
    pub start_angle_deg: f32,
    pub end_angle_deg: f32,
    /// Rotation speed in degrees per second.
    pub rotation_speed_dps: f32,
    /// Sensor timestamp in milliseconds, wrapping.
    pub timestamp_ms: u32,
    pub confidence: Vec<u8>,
    pub angles_deg: Vec<f32>,
    pub distances_cm: Vec<u16>,
}

impl ScanPacketMeta {
    /// Points of the packet that carry a usable return.
    pub fn valid_points(&self) -> impl Iterator<Item = RangeSample> + '_ {
        self.angles_deg
            .iter()
            .zip(&self.distances_cm)
            .zip(&self.confidence)
            .filter(|&((_, &distance), &confidence)| distance > 0 && confidence > 0)
            .map(|((&angle, &distance), _)| RangeSample::new(angle, distance))
    }
}

#[derive(Default)]
struct LiveScanState {
    // keyed on hundredths of a degree; values keep the unrounded angle
    distances: BTreeMap<i32, (f32, u16)>,
    last_packet: Option<ScanPacketMeta>,
    packets: u64,
}

/// Continuously refreshed angle → distance view written by a range source.
///
/// Holds at most one distance per distinct angle key; a newer reading for the
/// same angle replaces the older one. Angles are normalised into `[-180, 180)`
/// so a sensor reporting `0..360` clockwise still feeds the forward sectors.
pub struct LiveScan {
    state: RwLock<LiveScanState>,
    live: AtomicBool,
}

impl LiveScan {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LiveScanState::default()),
            live: AtomicBool::new(true),
        }
    }

    pub fn insert(&self, angle_deg: f32, distance_cm: u16) {
        let Some((key, normalized)) = angle_key(angle_deg) else {
            return;
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.distances.insert(key, (normalized, distance_cm));
    }

    /// Applies every valid point of `packet` and keeps it as the latest metadata.
    pub fn ingest_packet(&self, packet: ScanPacketMeta) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for sample in packet.valid_points() {
            if let Some((key, normalized)) = angle_key(sample.angle_deg) {
                state.distances.insert(key, (normalized, sample.distance_cm));
            }
        }
        state.last_packet = Some(packet);
        state.packets += 1;
    }

    /// Copy of the current mapping, ordered by angle.
    pub fn samples(&self) -> Vec<RangeSample> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .distances
            .values()
            .map(|&(angle, distance)| RangeSample::new(angle, distance))
            .collect()
    }

    pub fn last_packet(&self) -> Option<ScanPacketMeta> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.last_packet.clone()
    }

    pub fn packet_count(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .packets
    }

    /// Marks the view as no longer refreshed. The last mapping stays readable.
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl Default for LiveScan {
    fn default() -> Self {
        Self::new()
    }
}

/// Map key plus the angle normalised into `[-180, 180)`.
fn angle_key(angle_deg: f32) -> Option<(i32, f32)> {
    if !angle_deg.is_finite() {
        return None;
    }
    let mut normalized = (angle_deg + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360
    if normalized >= 180.0 {
        normalized -= 360.0;
    }
    let key = (normalized * 100.0).round() as i32;
    Some((if key >= 18_000 { key - 36_000 } else { key }, normalized))
}

/// Producer of live range samples.
pub trait RangeSource: Send {
    /// Starts delivery. The returned subscription stops the source when
    /// stopped or dropped.
    fn subscribe(&mut self) -> Result<Subscription, SourceError>;
}

/// Live view plus the handle that ends delivery.
pub struct Subscription {
    view: Arc<LiveScan>,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(view: Arc<LiveScan>, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            view,
            stop: Some(Box::new(stop)),
        }
    }

    pub fn view(&self) -> &Arc<LiveScan> {
        &self.view
    }

    /// Signals the source to stop producing. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
            self.view.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn live_scan_overwrites_same_angle() {
        let scan = LiveScan::new();
        scan.insert(10.0, 400);
        scan.insert(10.0, 350);
        scan.insert(-45.5, 90);
        let samples = scan.samples();
        assert_eq!(
            samples,
            vec![RangeSample::new(-45.5, 90), RangeSample::new(10.0, 350)]
        );
    }

    #[test]
    fn live_scan_normalizes_full_rotation_angles() {
        let scan = LiveScan::new();
        scan.insert(270.0, 120);
        scan.insert(359.5, 80);
        scan.insert(180.0, 30);
        let angles: Vec<f32> = scan.samples().iter().map(|s| s.angle_deg).collect();
        assert_eq!(angles, vec![-180.0, -90.0, -0.5]);
    }

    #[test]
    fn ingest_packet_skips_empty_returns() {
        let scan = LiveScan::new();
        let packet = ScanPacketMeta {
            start_angle_deg: 0.0,
            end_angle_deg: 2.0,
            rotation_speed_dps: 3600.0,
            timestamp_ms: 42,
            confidence: vec![200, 0, 180],
            angles_deg: vec![0.0, 1.0, 2.0],
            distances_cm: vec![150, 160, 0],
        };
        scan.ingest_packet(packet.clone());
        assert_eq!(scan.samples(), vec![RangeSample::new(0.0, 150)]);
        assert_eq!(scan.last_packet(), Some(packet));
        assert_eq!(scan.packet_count(), 1);
    }

    #[test]
    fn subscription_stops_once_and_closes_view() {
        let calls = Arc::new(AtomicUsize::new(0));
        let view = Arc::new(LiveScan::new());
        let counter = calls.clone();
        let mut sub = Subscription::new(view.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.stop();
        sub.stop();
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!view.is_live());
    }
}
