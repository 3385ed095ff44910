use crate::interface::message::ObstacleDistanceMessage;
use crate::prelude::LinkError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Autopilot flight modes used by the mission flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VehicleMode {
    Stabilize,
    Guided,
    Loiter,
    Rtl,
    Land,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    /// Altitude above home in metres.
    pub relative_alt_m: f32,
}

impl GlobalPosition {
    pub fn new(lat_deg: f64, lon_deg: f64, relative_alt_m: f32) -> Self {
        Self {
            lat_deg,
            lon_deg,
            relative_alt_m,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleState {
    pub armed: bool,
    pub mode: VehicleMode,
    pub position: GlobalPosition,
    pub airspeed_mps: f32,
}

/// Commands issued by the mission flow.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    SetMode(VehicleMode),
    Arm,
    Disarm,
    Takeoff { altitude_m: f32 },
    Goto {
        target: GlobalPosition,
        groundspeed_mps: Option<f32>,
    },
    SetAirspeed(f32),
}

/// Outbound telemetry and vehicle control channel to the autopilot.
///
/// `send` may block on I/O; callers must not hold locks across it.
pub trait VehicleLink: Send + Sync {
    fn send(&self, message: &ObstacleDistanceMessage) -> Result<(), LinkError>;
    fn read_state(&self) -> Result<VehicleState, LinkError>;
    fn command(&self, command: VehicleCommand) -> Result<(), LinkError>;
}

impl<L: VehicleLink + ?Sized> VehicleLink for Arc<L> {
    fn send(&self, message: &ObstacleDistanceMessage) -> Result<(), LinkError> {
        (**self).send(message)
    }

    fn read_state(&self) -> Result<VehicleState, LinkError> {
        (**self).read_state()
    }

    fn command(&self, command: VehicleCommand) -> Result<(), LinkError> {
        (**self).command(command)
    }
}

/// Polls the vehicle until `predicate` holds or `timeout` elapses.
///
/// Read failures are retried until the deadline, then [`LinkError::Timeout`]
/// is returned.
pub fn wait_until<L, F>(
    link: &L,
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut predicate: F,
) -> Result<VehicleState, LinkError>
where
    L: VehicleLink + ?Sized,
    F: FnMut(&VehicleState) -> bool,
{
    let started = Instant::now();
    loop {
        match link.read_state() {
            Ok(state) if predicate(&state) => return Ok(state),
            Ok(_) => debug!("waiting for {what}"),
            Err(err) => debug!("state read failed while waiting for {what}: {err}"),
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(LinkError::Timeout {
                what: what.to_string(),
                waited,
            });
        }
        thread::sleep(poll.min(timeout - waited));
    }
}
