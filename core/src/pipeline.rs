//! Owner of the telemetry pipeline: source subscription, shared profile,
//! publisher and the fixed-rate scheduler tying them together.

use crate::config::PipelineConfig;
use crate::interface::range_source::{LiveScan, RangeSource, Subscription};
use crate::interface::vehicle::VehicleLink;
use crate::prelude::{ConfigError, PipelineResult, SchedulerError, SourceError};
use crate::processing::{DistanceProfile, ProfileAggregator, SharedProfile};
use crate::scheduler::Scheduler;
use crate::telemetry::{LogManager, MetricsRecorder, PipelineStats, TelemetryPublisher};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// Health of the range sample source as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SourceStatus {
    /// Pipeline not started.
    Idle,
    Live,
    /// Subscription ended while running; the last profile is still published.
    Dropped,
    /// Subscription could not be established; sentinel profile is published.
    Unavailable(String),
}

/// Aggregates range samples and publishes them at a fixed rate on its own
/// thread, independent of whatever the caller's thread is doing.
pub struct TelemetryPipeline<S, L> {
    config: PipelineConfig,
    source: S,
    link: L,
    profile: SharedProfile,
    metrics: Arc<MetricsRecorder>,
    status: Arc<Mutex<SourceStatus>>,
    scheduler: Scheduler,
    subscription: Option<Subscription>,
    logger: LogManager,
}

impl<S, L> TelemetryPipeline<S, L>
where
    S: RangeSource,
    L: VehicleLink + Clone + 'static,
{
    /// Validates `config` and allocates the profile. No thread is started.
    pub fn new(config: PipelineConfig, source: S, link: L) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(MetricsRecorder::new());
        Ok(Self {
            profile: SharedProfile::new(config.bin_count),
            scheduler: Scheduler::new("telemetry", metrics.clone()),
            metrics,
            status: Arc::new(Mutex::new(SourceStatus::Idle)),
            subscription: None,
            logger: LogManager::new("obstaclecore::pipeline"),
            config,
            source,
            link,
        })
    }

    /// Shares an externally owned recorder, e.g. with a monitoring endpoint.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        if !self.scheduler.is_running() {
            self.scheduler = Scheduler::new("telemetry", metrics.clone());
            self.metrics = metrics;
        }
        self
    }

    /// Subscribes to the source and starts the publish timer.
    ///
    /// A source that cannot be subscribed does not prevent the start; the
    /// returned status reports it and the sentinel profile keeps flowing.
    pub fn start(&mut self) -> PipelineResult<SourceStatus> {
        if self.scheduler.is_running() {
            return Err(SchedulerError::AlreadyRunning.into());
        }

        let view = match self.source.subscribe() {
            Ok(subscription) => {
                let view = subscription.view().clone();
                self.subscription = Some(subscription);
                self.set_status(SourceStatus::Live);
                Some(view)
            }
            Err(err) => {
                self.logger
                    .warn(&format!("{}; publishing without range data", err));
                self.metrics.record_source_dropout();
                self.set_status(SourceStatus::Unavailable(err.to_string()));
                None
            }
        };

        let tick = self.tick(view);
        if let Err(err) = self.scheduler.start(self.config.publish_period(), tick) {
            if let Some(mut subscription) = self.subscription.take() {
                subscription.stop();
            }
            self.set_status(SourceStatus::Idle);
            return Err(err.into());
        }

        self.logger.record(&format!(
            "publishing {} bins over {:.1} deg at {:.1} Hz",
            self.config.bin_count, self.config.fov_deg, self.config.publish_rate_hz
        ));
        Ok(self.source_status())
    }

    /// Stops the timer, then the source subscription.
    ///
    /// No tick starts after this returns; a tick already running completes.
    pub fn stop(&mut self) -> PipelineResult<()> {
        if !self.scheduler.is_running() {
            return Err(SchedulerError::NotRunning.into());
        }
        let stopped = self.scheduler.stop();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.stop();
        }
        self.set_status(SourceStatus::Idle);

        let stats = self.metrics.snapshot();
        self.logger.record(&format!(
            "stopped after {} ticks: {} published, {} failed, {} skipped",
            stats.ticks, stats.published, stats.publish_errors, stats.skipped_ticks
        ));
        stopped.map_err(Into::into)
    }

    fn tick(&self, view: Option<Arc<LiveScan>>) -> impl FnMut() + Send + 'static {
        let aggregator = ProfileAggregator::new(&self.config, self.profile.clone());
        let mut publisher = TelemetryPublisher::new(self.link.clone(), self.config.clone());
        let profile = self.profile.clone();
        let metrics = self.metrics.clone();
        let status = self.status.clone();
        let logger = self.logger;
        let mut view = view;

        move || {
            if let Some(live) = view.as_ref() {
                if live.is_live() {
                    let applied = aggregator.update(&live.samples());
                    metrics.record_samples(applied);
                } else {
                    logger.warn(&format!(
                        "{}; publishing last known profile",
                        SourceError::Dropped
                    ));
                    metrics.record_source_dropout();
                    *status.lock().unwrap_or_else(PoisonError::into_inner) =
                        SourceStatus::Dropped;
                    view = None;
                }
            }

            let snapshot = profile.snapshot();
            match publisher.publish(&snapshot) {
                Ok(()) => metrics.record_published(),
                Err(_) => metrics.record_publish_error(),
            }
        }
    }

    fn set_status(&self, next: SourceStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl<S, L> TelemetryPipeline<S, L> {
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn profile(&self) -> DistanceProfile {
        self.profile.snapshot()
    }

    pub fn stats(&self) -> PipelineStats {
        self.metrics.snapshot()
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn source_status(&self) -> SourceStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<S, L> Drop for TelemetryPipeline<S, L> {
    fn drop(&mut self) {
        if self.scheduler.is_running() {
            if let Err(err) = self.scheduler.stop() {
                self.logger.warn(&format!("shutdown: {}", err));
            }
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::range_source::RangeSample;
    use crate::prelude::{PipelineError, NO_OBSTACLE};
    use crate::testing::{RecordingLink, ScriptedSource};
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::{Duration, Instant};

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            publish_rate_hz: 100.0,
            ..Default::default()
        }
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn forward_arc() -> ScriptedSource {
        ScriptedSource::new(vec![
            RangeSample::new(-90.0, 50),
            RangeSample::new(0.0, 300),
            RangeSample::new(89.0, 1000),
        ])
    }

    #[test]
    fn invalid_config_fails_before_start() {
        let config = PipelineConfig {
            min_distance_cm: 500,
            max_distance_cm: 100,
            ..Default::default()
        };
        let result = TelemetryPipeline::new(config, forward_arc(), Arc::new(RecordingLink::new()));
        assert!(matches!(result, Err(ConfigError::DistanceRange { .. })));
    }

    #[test]
    fn publishes_aggregated_profile() {
        let link = Arc::new(RecordingLink::new());
        let mut pipeline = TelemetryPipeline::new(fast_config(), forward_arc(), link.clone()).unwrap();

        assert_eq!(pipeline.start().unwrap(), SourceStatus::Live);
        assert!(wait_for(Duration::from_secs(2), || link.sent_count() >= 2));
        pipeline.stop().unwrap();

        let sent = link.sent();
        let last = sent.last().unwrap();
        for (index, &distance) in last.distances.iter().enumerate() {
            match index {
                0 => assert_eq!(distance, 50),
                36 => assert_eq!(distance, 300),
                71 => assert_eq!(distance, 1000),
                _ => assert_eq!(distance, NO_OBSTACLE),
            }
        }
        assert_eq!(pipeline.profile().bins(), &last.distances[..]);
    }

    #[test]
    fn live_samples_reach_later_messages() {
        let source = forward_arc();
        let view = source.view();
        let link = Arc::new(RecordingLink::new());
        let mut pipeline = TelemetryPipeline::new(fast_config(), source, link.clone()).unwrap();
        pipeline.start().unwrap();

        view.insert(-45.0, 5);
        assert!(wait_for(Duration::from_secs(2), || {
            link.sent().last().map(|m| m.distances[18]) == Some(20)
        }));
        pipeline.stop().unwrap();
    }

    #[test]
    fn no_sends_after_stop_returns() {
        let source = forward_arc();
        let stops = source.stop_counter();
        let link = Arc::new(RecordingLink::new());
        let mut pipeline = TelemetryPipeline::new(fast_config(), source, link.clone()).unwrap();
        pipeline.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || link.sent_count() >= 3));

        pipeline.stop().unwrap();
        let sent_at_stop = link.sent_count();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(link.sent_count(), sent_at_stop);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.source_status(), SourceStatus::Idle);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn lifecycle_misuse_is_reported() {
        let link = Arc::new(RecordingLink::new());
        let mut pipeline = TelemetryPipeline::new(fast_config(), forward_arc(), link).unwrap();
        assert!(matches!(
            pipeline.stop(),
            Err(PipelineError::Scheduler(SchedulerError::NotRunning))
        ));
        pipeline.start().unwrap();
        assert!(matches!(
            pipeline.start(),
            Err(PipelineError::Scheduler(SchedulerError::AlreadyRunning))
        ));
        pipeline.stop().unwrap();
        // a stopped pipeline can be started again
        pipeline.start().unwrap();
        pipeline.stop().unwrap();
    }

    #[test]
    fn publish_failures_do_not_halt_ticks() {
        let link = Arc::new(RecordingLink::new());
        link.set_down(true);
        let mut pipeline = TelemetryPipeline::new(fast_config(), forward_arc(), link.clone()).unwrap();
        pipeline.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || pipeline.stats().publish_errors >= 3));

        link.set_down(false);
        assert!(wait_for(Duration::from_secs(2), || link.sent_count() >= 1));
        pipeline.stop().unwrap();

        let stats = pipeline.stats();
        assert!(stats.published >= 1);
        assert_eq!(stats.ticks, stats.published + stats.publish_errors);
    }

    #[test]
    fn unavailable_source_still_publishes_sentinel_profile() {
        let link = Arc::new(RecordingLink::new());
        let mut pipeline =
            TelemetryPipeline::new(fast_config(), ScriptedSource::failing(), link.clone()).unwrap();
        let status = pipeline.start().unwrap();
        assert!(matches!(status, SourceStatus::Unavailable(_)));

        assert!(wait_for(Duration::from_secs(2), || link.sent_count() >= 1));
        pipeline.stop().unwrap();
        assert!(link.sent()[0].distances.iter().all(|&d| d == NO_OBSTACLE));
        assert_eq!(pipeline.stats().source_dropouts, 1);
    }

    #[test]
    fn dropped_source_keeps_last_profile() {
        let source = forward_arc();
        let view = source.view();
        let link = Arc::new(RecordingLink::new());
        let mut pipeline = TelemetryPipeline::new(fast_config(), source, link.clone()).unwrap();
        pipeline.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || link.sent_count() >= 1));

        view.close();
        assert!(wait_for(Duration::from_secs(2), || {
            pipeline.source_status() == SourceStatus::Dropped
        }));
        let sent_before = link.sent_count();
        assert!(wait_for(Duration::from_secs(2), || link.sent_count() > sent_before));
        pipeline.stop().unwrap();

        assert_eq!(link.sent().last().unwrap().distances[36], 300);
        assert_eq!(pipeline.stats().source_dropouts, 1);
    }
}
