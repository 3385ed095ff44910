//! In-memory range source and vehicle link doubles for unit tests.

use crate::interface::message::ObstacleDistanceMessage;
use crate::interface::range_source::{LiveScan, RangeSample, RangeSource, Subscription};
use crate::interface::vehicle::{
    GlobalPosition, VehicleCommand, VehicleLink, VehicleMode, VehicleState,
};
use crate::prelude::{LinkError, SourceError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct RecordingLink {
    sent: Mutex<Vec<ObstacleDistanceMessage>>,
    down: AtomicBool,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<ObstacleDistanceMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl VehicleLink for RecordingLink {
    fn send(&self, message: &ObstacleDistanceMessage) -> Result<(), LinkError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LinkError::Disconnected);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn read_state(&self) -> Result<VehicleState, LinkError> {
        Ok(VehicleState {
            armed: false,
            mode: VehicleMode::Stabilize,
            position: GlobalPosition::default(),
            airspeed_mps: 0.0,
        })
    }

    fn command(&self, _command: VehicleCommand) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Source whose live view is pre-filled and then left untouched.
pub struct ScriptedSource {
    samples: Vec<RangeSample>,
    fail: bool,
    view: Arc<LiveScan>,
    stops: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(samples: Vec<RangeSample>) -> Self {
        Self {
            samples,
            fail: false,
            view: Arc::new(LiveScan::new()),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn view(&self) -> Arc<LiveScan> {
        self.view.clone()
    }

    pub fn stop_counter(&self) -> Arc<AtomicUsize> {
        self.stops.clone()
    }
}

impl RangeSource for ScriptedSource {
    fn subscribe(&mut self) -> Result<Subscription, SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable("scripted failure".into()));
        }
        if !self.view.is_live() {
            self.view = Arc::new(LiveScan::new());
        }
        for sample in &self.samples {
            self.view.insert(sample.angle_deg, sample.distance_cm);
        }
        let stops = self.stops.clone();
        Ok(Subscription::new(self.view.clone(), move || {
            stops.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
