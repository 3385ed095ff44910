use obstaclecore::interface::{ObstacleDistanceMessage, VehicleState};
use obstaclecore::telemetry::PipelineStats;
use serde::Serialize;

/// What the monitor endpoint reports about the running mission.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorModel {
    pub messages_sent: u64,
    pub link_down: bool,
    pub stats: PipelineStats,
    pub vehicle: Option<VehicleState>,
    pub last_message: Option<ObstacleDistanceMessage>,
}
