use crate::monitor::model::MonitorModel;
use crate::vehicle::sim::SimVehicle;
use log::{info, warn};
use obstaclecore::interface::VehicleLink;
use obstaclecore::telemetry::MetricsRecorder;
use serde::Deserialize;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

pub fn monitor_bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[derive(Debug, Deserialize)]
struct LinkToggle {
    down: bool,
}

/// HTTP view onto the simulated vehicle and the pipeline counters.
#[derive(Clone)]
pub struct MonitorBridge {
    vehicle: Arc<SimVehicle>,
    metrics: Arc<MetricsRecorder>,
}

impl MonitorBridge {
    pub fn new(vehicle: Arc<SimVehicle>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { vehicle, metrics }
    }

    pub fn snapshot(&self) -> MonitorModel {
        MonitorModel {
            messages_sent: self.vehicle.sent_count(),
            link_down: self.vehicle.is_link_down(),
            stats: self.metrics.snapshot(),
            vehicle: self.vehicle.read_state().ok(),
            last_message: self.vehicle.last_message(),
        }
    }

    /// Serves `/obstacle`, `/stats` and `/link` on a background thread.
    pub fn serve(&self, address: SocketAddr) -> JoinHandle<()> {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let obstacle_route = warp::path("obstacle")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: MonitorBridge| match bridge.vehicle.last_message() {
                Some(message) => {
                    warp::reply::with_status(warp::reply::json(&message), StatusCode::OK)
                }
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"status": "no message published yet"})),
                    StatusCode::NOT_FOUND,
                ),
            });

        let stats_route = warp::path("stats")
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: MonitorBridge| warp::reply::json(&bridge.snapshot()));

        let link_route = warp::path("link")
            .and(warp::post())
            .and(warp::body::json())
            .and(bridge_filter)
            .map(|toggle: LinkToggle, bridge: MonitorBridge| {
                bridge.vehicle.set_link_down(toggle.down);
                warn!(
                    "monitor forced vehicle link {}",
                    if toggle.down { "down" } else { "up" }
                );
                warp::reply::json(&json!({"status": "ok", "link_down": toggle.down}))
            });

        thread::spawn(move || {
            let routes = obstacle_route.or(stats_route).or(link_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!("monitor runtime failed to start: {}", err);
                    return;
                }
            };
            info!("monitor listening on http://{}", address);
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::sim::SimVehicleConfig;
    use obstaclecore::interface::ObstacleDistanceMessage;
    use obstaclecore::processing::DistanceProfile;
    use obstaclecore::PipelineConfig;

    #[test]
    fn snapshot_reflects_vehicle_and_counters() {
        let vehicle = Arc::new(SimVehicle::new(SimVehicleConfig::default()));
        let metrics = Arc::new(MetricsRecorder::new());
        let bridge = MonitorBridge::new(vehicle.clone(), metrics.clone());

        let empty = bridge.snapshot();
        assert_eq!(empty.messages_sent, 0);
        assert!(empty.last_message.is_none());
        assert!(!empty.vehicle.unwrap().armed);

        let config = PipelineConfig::default();
        let message = ObstacleDistanceMessage::from_profile(&DistanceProfile::new(72), &config, 7);
        vehicle.send(&message).unwrap();
        metrics.record_published();
        vehicle.set_link_down(true);

        let model = bridge.snapshot();
        assert_eq!(model.messages_sent, 1);
        assert_eq!(model.stats.published, 1);
        assert!(model.link_down);
        assert_eq!(model.last_message.unwrap().time_usec, 7);
    }

    #[test]
    fn binds_loopback() {
        assert_eq!(monitor_bind_address(9000).to_string(), "127.0.0.1:9000");
    }
}
