use crate::generator::scene::SceneConfig;
use crate::vehicle::sim::SimVehicleConfig;
use anyhow::Context;
use obstaclecore::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f32,
    #[serde(default)]
    pub groundspeed_mps: Option<f32>,
    /// Time spent flying towards the waypoint before the next command.
    #[serde(default)]
    pub dwell_s: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionPlan {
    pub takeoff_altitude_m: f32,
    pub airspeed_mps: f32,
    pub waypoints: Vec<Waypoint>,
    pub arm_timeout_s: f32,
    pub climb_timeout_s: f32,
    pub landing_timeout_s: f32,
    pub poll_interval_ms: u64,
}

impl Default for MissionPlan {
    fn default() -> Self {
        Self {
            takeoff_altitude_m: 10.0,
            airspeed_mps: 3.0,
            waypoints: vec![
                Waypoint {
                    lat_deg: 53.281707,
                    lon_deg: -9.031534,
                    alt_m: 20.0,
                    groundspeed_mps: None,
                    dwell_s: 30.0,
                },
                Waypoint {
                    lat_deg: 53.282707,
                    lon_deg: -9.031534,
                    alt_m: 20.0,
                    groundspeed_mps: Some(10.0),
                    dwell_s: 30.0,
                },
            ],
            arm_timeout_s: 60.0,
            climb_timeout_s: 60.0,
            landing_timeout_s: 120.0,
            poll_interval_ms: 500,
        }
    }
}

/// Everything one simulated flight needs, loadable from YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub pipeline: PipelineConfig,
    pub lidar: SceneConfig,
    pub vehicle: SimVehicleConfig,
    pub mission: MissionPlan,
    /// Ground station that receives MAVLink copies, e.g. `udp:127.0.0.1:14550`.
    pub mavlink_mirror: Option<String>,
    pub monitor_port: u16,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            lidar: SceneConfig::default(),
            vehicle: SimVehicleConfig::default(),
            mission: MissionPlan::default(),
            mavlink_mirror: None,
            monitor_port: 9000,
        }
    }
}

/// Command-line overrides for the telemetry pipeline.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct PipelineOverrides {
    #[arg(long)]
    pub bin_count: Option<usize>,
    #[arg(long)]
    pub fov_deg: Option<f32>,
    #[arg(long)]
    pub min_distance_cm: Option<u16>,
    #[arg(long)]
    pub max_distance_cm: Option<u16>,
    #[arg(long)]
    pub publish_rate_hz: Option<f64>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &PipelineOverrides) {
        let pipeline = &mut self.pipeline;
        if let Some(bin_count) = overrides.bin_count {
            pipeline.bin_count = bin_count;
        }
        if let Some(fov_deg) = overrides.fov_deg {
            pipeline.fov_deg = fov_deg;
        }
        if let Some(min) = overrides.min_distance_cm {
            pipeline.min_distance_cm = min;
        }
        if let Some(max) = overrides.max_distance_cm {
            pipeline.max_distance_cm = max;
        }
        if let Some(rate) = overrides.publish_rate_hz {
            pipeline.publish_rate_hz = rate;
        }
    }
}
