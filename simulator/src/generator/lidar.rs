use crate::generator::scene::SceneConfig;
use log::{info, warn};
use obstaclecore::interface::{LiveScan, RangeSource, ScanPacketMeta, Subscription};
use obstaclecore::SourceError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// LD06-style sensors wrap their packet timestamp at 30 s.
const TIMESTAMP_WRAP_MS: u128 = 30_000;
const HIT_CONFIDENCE: u8 = 200;

/// Spinning LiDAR that ray-casts a [`SceneConfig`] and streams packets from
/// its own thread, angles in `0..360` clockwise from forward.
#[derive(Debug, Clone)]
pub struct SimulatedLidar {
    scene: SceneConfig,
}

impl SimulatedLidar {
    pub fn new(scene: SceneConfig) -> Self {
        Self { scene }
    }

    /// One full revolution, split into packets.
    pub fn capture_scan(&self, rng: &mut StdRng, timestamp_ms: u32) -> Vec<ScanPacketMeta> {
        let step = self.scene.normalized_step();
        let per_packet = self.scene.normalized_packet_len();
        let rotation_speed_dps = self.scene.normalized_scan_rate() * 360.0;
        let scan_period_ms = 1000.0 / self.scene.normalized_scan_rate();
        let points = ((360.0 / step).round() as usize).max(1);

        let mut packets = Vec::with_capacity(points.div_ceil(per_packet));
        let mut index = 0;
        while index < points {
            let end = (index + per_packet).min(points);
            let angles_deg: Vec<f32> = (index..end).map(|i| i as f32 * step).collect();
            let mut distances_cm = Vec::with_capacity(angles_deg.len());
            let mut confidence = Vec::with_capacity(angles_deg.len());
            for &angle in &angles_deg {
                match self.scene.range_at(angle) {
                    Some(range) => {
                        let noisy = range + self.noise(rng);
                        distances_cm.push(noisy.round().clamp(1.0, (u16::MAX - 1) as f32) as u16);
                        confidence.push(HIT_CONFIDENCE);
                    }
                    None => {
                        distances_cm.push(0);
                        confidence.push(0);
                    }
                }
            }
            let offset_ms = (index as f32 / points as f32 * scan_period_ms) as u32;
            packets.push(ScanPacketMeta {
                start_angle_deg: angles_deg.first().copied().unwrap_or_default(),
                end_angle_deg: angles_deg.last().copied().unwrap_or_default(),
                rotation_speed_dps,
                timestamp_ms: timestamp_ms.wrapping_add(offset_ms),
                confidence,
                angles_deg,
                distances_cm,
            });
            index = end;
        }
        packets
    }

    fn noise(&self, rng: &mut StdRng) -> f32 {
        let spread = self.scene.noise_cm;
        if spread > 0.0 {
            rng.gen_range(-spread..spread)
        } else {
            0.0
        }
    }

    fn stream(self, view: Arc<LiveScan>, running: Arc<AtomicBool>) {
        let mut rng = StdRng::seed_from_u64(self.scene.seed);
        let started = Instant::now();
        let scan_period = Duration::from_secs_f32(1.0 / self.scene.normalized_scan_rate());
        let mut scans = 0u64;

        while running.load(Ordering::Acquire) {
            let timestamp_ms = (started.elapsed().as_millis() % TIMESTAMP_WRAP_MS) as u32;
            let packets = self.capture_scan(&mut rng, timestamp_ms);
            let pause = scan_period / packets.len().max(1) as u32;
            for packet in packets {
                if !running.load(Ordering::Acquire) {
                    return;
                }
                view.ingest_packet(packet);
                thread::sleep(pause);
            }

            scans += 1;
            if self.scene.dropout_after_scans == Some(scans) {
                warn!("simulated LiDAR dropped out after {} scans", scans);
                view.close();
                return;
            }
        }
    }
}

impl RangeSource for SimulatedLidar {
    fn subscribe(&mut self) -> Result<Subscription, SourceError> {
        if self.scene.unavailable {
            return Err(SourceError::Unavailable(
                "simulated LiDAR is not connected".into(),
            ));
        }

        let view = Arc::new(LiveScan::new());
        let running = Arc::new(AtomicBool::new(true));
        let worker = self.clone();
        let (worker_view, worker_running) = (view.clone(), running.clone());
        let handle = thread::Builder::new()
            .name("lidar-sim".into())
            .spawn(move || worker.stream(worker_view, worker_running))
            .map_err(|err| SourceError::Unavailable(err.to_string()))?;

        info!(
            "simulated LiDAR spinning at {:.1} Hz with {} obstacles",
            self.scene.normalized_scan_rate(),
            self.scene.obstacles.len()
        );
        Ok(Subscription::new(view, move || {
            running.store(false, Ordering::Release);
            if handle.join().is_err() {
                warn!("simulated LiDAR thread panicked");
            }
        }))
    }
}
