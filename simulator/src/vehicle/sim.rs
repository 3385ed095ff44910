use obstaclecore::interface::{
    GlobalPosition, ObstacleDistanceMessage, VehicleCommand, VehicleLink, VehicleMode, VehicleState,
};
use obstaclecore::LinkError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Kinematics of the simulated copter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimVehicleConfig {
    pub arm_delay_ms: u64,
    pub climb_rate_mps: f32,
    pub home_lat_deg: f64,
    pub home_lon_deg: f64,
}

impl Default for SimVehicleConfig {
    fn default() -> Self {
        Self {
            arm_delay_ms: 1500,
            climb_rate_mps: 2.5,
            home_lat_deg: 53.280707,
            home_lon_deg: -9.031534,
        }
    }
}

struct Flight {
    mode: VehicleMode,
    armed: bool,
    arm_requested: Option<Instant>,
    altitude_m: f32,
    target_altitude_m: f32,
    lat_deg: f64,
    lon_deg: f64,
    airspeed_mps: f32,
    last_step: Instant,
}

/// In-process stand-in for the autopilot: records telemetry, accepts mission
/// commands and integrates arming and altitude over wall-clock time.
pub struct SimVehicle {
    config: SimVehicleConfig,
    flight: Mutex<Flight>,
    last_message: Mutex<Option<ObstacleDistanceMessage>>,
    sent: AtomicU64,
    link_down: AtomicBool,
}

impl SimVehicle {
    pub fn new(config: SimVehicleConfig) -> Self {
        let flight = Flight {
            mode: VehicleMode::Stabilize,
            armed: false,
            arm_requested: None,
            altitude_m: 0.0,
            target_altitude_m: 0.0,
            lat_deg: config.home_lat_deg,
            lon_deg: config.home_lon_deg,
            airspeed_mps: 0.0,
            last_step: Instant::now(),
        };
        Self {
            config,
            flight: Mutex::new(flight),
            last_message: Mutex::new(None),
            sent: AtomicU64::new(0),
            link_down: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `send` fail until cleared.
    pub fn set_link_down(&self, down: bool) {
        self.link_down.store(down, Ordering::SeqCst);
    }

    pub fn is_link_down(&self) -> bool {
        self.link_down.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn last_message(&self) -> Option<ObstacleDistanceMessage> {
        self.last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn step(&self, flight: &mut Flight, now: Instant) {
        let dt = now.saturating_duration_since(flight.last_step).as_secs_f32();
        flight.last_step = now;

        if let Some(requested) = flight.arm_requested {
            let waited = now.saturating_duration_since(requested);
            if waited >= Duration::from_millis(self.config.arm_delay_ms) {
                flight.armed = true;
                flight.arm_requested = None;
            }
        }

        let climb = self.config.climb_rate_mps * dt;
        let error = flight.target_altitude_m - flight.altitude_m;
        flight.altitude_m += error.clamp(-climb, climb);

        let landing = matches!(flight.mode, VehicleMode::Rtl | VehicleMode::Land);
        if landing && flight.armed && flight.altitude_m <= 0.0 {
            flight.altitude_m = 0.0;
            flight.armed = false;
        }
    }

    fn apply(&self, flight: &mut Flight, command: VehicleCommand) -> Result<(), LinkError> {
        match command {
            VehicleCommand::SetMode(mode) => {
                flight.mode = mode;
                match mode {
                    VehicleMode::Rtl => {
                        flight.lat_deg = self.config.home_lat_deg;
                        flight.lon_deg = self.config.home_lon_deg;
                        flight.target_altitude_m = 0.0;
                    }
                    VehicleMode::Land => flight.target_altitude_m = 0.0,
                    _ => {}
                }
                Ok(())
            }
            VehicleCommand::Arm => {
                if flight.mode != VehicleMode::Guided {
                    return Err(LinkError::Rejected("arming requires GUIDED mode".into()));
                }
                if !flight.armed && flight.arm_requested.is_none() {
                    flight.arm_requested = Some(flight.last_step);
                }
                Ok(())
            }
            VehicleCommand::Disarm => {
                if flight.altitude_m > 0.1 {
                    return Err(LinkError::Rejected("cannot disarm in flight".into()));
                }
                flight.armed = false;
                flight.arm_requested = None;
                Ok(())
            }
            VehicleCommand::Takeoff { altitude_m } => {
                Self::require_guided_and_armed(flight, "takeoff")?;
                flight.target_altitude_m = altitude_m.max(0.0);
                Ok(())
            }
            VehicleCommand::Goto {
                target,
                groundspeed_mps,
            } => {
                Self::require_guided_and_armed(flight, "goto")?;
                flight.lat_deg = target.lat_deg;
                flight.lon_deg = target.lon_deg;
                flight.target_altitude_m = target.relative_alt_m.max(0.0);
                if let Some(speed) = groundspeed_mps {
                    flight.airspeed_mps = speed;
                }
                Ok(())
            }
            VehicleCommand::SetAirspeed(speed) => {
                flight.airspeed_mps = speed.max(0.0);
                Ok(())
            }
        }
    }

    fn require_guided_and_armed(flight: &Flight, what: &str) -> Result<(), LinkError> {
        if flight.mode != VehicleMode::Guided || !flight.armed {
            return Err(LinkError::Rejected(format!(
                "{} requires an armed vehicle in GUIDED mode",
                what
            )));
        }
        Ok(())
    }
}

impl VehicleLink for SimVehicle {
    fn send(&self, message: &ObstacleDistanceMessage) -> Result<(), LinkError> {
        if self.is_link_down() {
            return Err(LinkError::Disconnected);
        }
        *self
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_state(&self) -> Result<VehicleState, LinkError> {
        let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.step(&mut flight, Instant::now());
        Ok(VehicleState {
            armed: flight.armed,
            mode: flight.mode,
            position: GlobalPosition::new(flight.lat_deg, flight.lon_deg, flight.altitude_m),
            airspeed_mps: flight.airspeed_mps,
        })
    }

    fn command(&self, command: VehicleCommand) -> Result<(), LinkError> {
        let mut flight = self.flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.step(&mut flight, Instant::now());
        self.apply(&mut flight, command)
    }
}
