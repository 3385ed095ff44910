use crate::generator::lidar::SimulatedLidar;
use crate::vehicle::sim::SimVehicle;
use crate::vehicle::udp::{parse_udp_target, UdpMirror};
use crate::workflow::config::{MissionPlan, WorkflowConfig};
use anyhow::Context;
use log::{info, warn};
use obstaclecore::interface::{
    wait_until, GlobalPosition, LiveScan, ObstacleDistanceMessage, VehicleCommand, VehicleLink,
    VehicleMode, VehicleState,
};
use obstaclecore::processing::{DistanceProfile, ProfileAggregator, SharedProfile};
use obstaclecore::telemetry::{MetricsRecorder, PipelineStats};
use obstaclecore::{SourceStatus, TelemetryPipeline};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub struct MissionReport {
    pub stats: PipelineStats,
    pub messages_sent: u64,
    pub source_status: SourceStatus,
    pub final_state: VehicleState,
    pub nearest: Option<(usize, u16)>,
}

pub struct OfflineReport {
    pub packets: usize,
    pub samples_applied: usize,
    pub profile: DistanceProfile,
    pub message: ObstacleDistanceMessage,
}

/// Flies the configured mission on the calling thread while the telemetry
/// pipeline publishes on its own.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    vehicle: Arc<SimVehicle>,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        let vehicle = Arc::new(SimVehicle::new(config.vehicle.clone()));
        Self {
            config,
            vehicle,
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    pub fn vehicle(&self) -> Arc<SimVehicle> {
        self.vehicle.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    fn telemetry_link(&self) -> anyhow::Result<Arc<dyn VehicleLink>> {
        let Some(target) = self.config.mavlink_mirror.as_deref() else {
            return Ok(self.vehicle.clone());
        };
        let address = parse_udp_target(target)?;
        let mirror = UdpMirror::connect(self.vehicle.clone(), address)
            .with_context(|| format!("opening MAVLink mirror to {}", address))?;
        info!("mirroring OBSTACLE_DISTANCE frames to {}", mirror.target());
        Ok(Arc::new(mirror))
    }

    pub fn execute(&self) -> anyhow::Result<MissionReport> {
        let lidar = SimulatedLidar::new(self.config.lidar.clone());
        let mut pipeline =
            TelemetryPipeline::new(self.config.pipeline.clone(), lidar, self.telemetry_link()?)
                .context("building telemetry pipeline")?
                .with_metrics(self.metrics.clone());

        let status = pipeline.start().context("starting telemetry pipeline")?;
        if status != SourceStatus::Live {
            warn!("range source is {:?}; flying without obstacle data", status);
        }

        let mission = fly_mission(self.vehicle.as_ref(), &self.config.mission);
        let source_status = pipeline.source_status();
        let nearest = pipeline.profile().nearest();
        pipeline.stop().context("stopping telemetry pipeline")?;
        let final_state = mission.context("flying mission")?;

        Ok(MissionReport {
            stats: pipeline.stats(),
            messages_sent: self.vehicle.sent_count(),
            source_status,
            final_state,
            nearest,
        })
    }

    /// Single revolution through the aggregator, no threads involved.
    pub fn offline(&self) -> anyhow::Result<OfflineReport> {
        let pipeline_config = &self.config.pipeline;
        pipeline_config
            .validate()
            .context("validating pipeline config")?;

        let lidar = SimulatedLidar::new(self.config.lidar.clone());
        let mut rng = StdRng::seed_from_u64(self.config.lidar.seed);
        let packets = lidar.capture_scan(&mut rng, 0);
        let packet_count = packets.len();

        let view = LiveScan::new();
        for packet in packets {
            view.ingest_packet(packet);
        }

        let shared = SharedProfile::new(pipeline_config.bin_count);
        let aggregator = ProfileAggregator::new(pipeline_config, shared.clone());
        let samples_applied = aggregator.update(&view.samples());
        let profile = shared.snapshot();
        let message = ObstacleDistanceMessage::from_profile(&profile, pipeline_config, now_usec());

        Ok(OfflineReport {
            packets: packet_count,
            samples_applied,
            profile,
            message,
        })
    }
}

/// Negative and NaN become zero, anything too large to represent waits forever.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::MAX)
}

fn arm_and_takeoff<L: VehicleLink + ?Sized>(link: &L, plan: &MissionPlan) -> anyhow::Result<()> {
    let poll = Duration::from_millis(plan.poll_interval_ms.max(1));
    info!("arming motors");
    link.command(VehicleCommand::SetMode(VehicleMode::Guided))
        .context("switching to GUIDED")?;
    link.command(VehicleCommand::Arm).context("requesting arm")?;
    wait_until(link, "arming", seconds(plan.arm_timeout_s), poll, |s| s.armed)
        .context("vehicle failed to arm")?;

    info!("taking off to {:.1} m", plan.takeoff_altitude_m);
    link.command(VehicleCommand::Takeoff {
        altitude_m: plan.takeoff_altitude_m,
    })
    .context("requesting takeoff")?;
    let target = plan.takeoff_altitude_m * 0.95;
    let state = wait_until(link, "takeoff altitude", seconds(plan.climb_timeout_s), poll, |s| {
        s.position.relative_alt_m >= target
    })
    .context("vehicle failed to reach takeoff altitude")?;
    info!("reached {:.1} m", state.position.relative_alt_m);
    Ok(())
}

fn fly_mission<L: VehicleLink + ?Sized>(link: &L, plan: &MissionPlan) -> anyhow::Result<VehicleState> {
    arm_and_takeoff(link, plan)?;
    link.command(VehicleCommand::SetAirspeed(plan.airspeed_mps))
        .context("setting airspeed")?;

    for (index, waypoint) in plan.waypoints.iter().enumerate() {
        info!(
            "waypoint {}: ({:.6}, {:.6}) at {:.1} m for {:.0} s",
            index + 1,
            waypoint.lat_deg,
            waypoint.lon_deg,
            waypoint.alt_m,
            waypoint.dwell_s
        );
        link.command(VehicleCommand::Goto {
            target: GlobalPosition::new(waypoint.lat_deg, waypoint.lon_deg, waypoint.alt_m),
            groundspeed_mps: waypoint.groundspeed_mps,
        })
        .with_context(|| format!("sending waypoint {}", index + 1))?;
        thread::sleep(seconds(waypoint.dwell_s));
    }

    info!("returning to launch");
    link.command(VehicleCommand::SetMode(VehicleMode::Rtl))
        .context("switching to RTL")?;
    let poll = Duration::from_millis(plan.poll_interval_ms.max(1));
    let landed = wait_until(link, "landing", seconds(plan.landing_timeout_s), poll, |s| !s.armed)
        .context("vehicle did not land")?;
    Ok(landed)
}

fn now_usec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}
