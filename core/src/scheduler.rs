//! Fixed-rate timer driving the telemetry tick on its own thread.

use crate::prelude::SchedulerError;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};

struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs a tick callback every `period` until stopped.
///
/// Overrunning ticks are not caught up: the timer skips to the next period
/// boundary and the skipped boundaries are counted in the metrics. `stop`
/// lets an in-flight tick finish and returns once the timer thread has exited.
pub struct Scheduler {
    name: String,
    metrics: Arc<MetricsRecorder>,
    worker: Option<Worker>,
    logger: LogManager,
}

impl Scheduler {
    pub fn new(name: impl Into<String>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            name: name.into(),
            metrics,
            worker: None,
            logger: LogManager::new("obstaclecore::scheduler"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn start<F>(&mut self, period: Duration, mut on_tick: F) -> Result<(), SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }

        let runtime = TokioBuilder::new_current_thread()
            .enable_time()
            .build()
            .map_err(SchedulerError::Runtime)?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let metrics = self.metrics.clone();

        let handle = thread::Builder::new()
            .name(format!("{}-timer", self.name))
            .spawn(move || {
                runtime.block_on(async move {
                    let mut interval = time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    let mut previous: Option<time::Instant> = None;
                    let mut idle_since: Option<time::Instant> = None;
                    loop {
                        tokio::select! {
                            biased;
                            _ = &mut shutdown_rx => break,
                            deadline = interval.tick() => {
                                let skipped = previous
                                    .map(|prev| boundaries_between(prev, deadline, period))
                                    .unwrap_or(0);
                                previous = Some(deadline);
                                // Skip hands back the overdue deadline once before realigning
                                if idle_since.is_some_and(|done| deadline < done) {
                                    metrics.record_skipped(skipped + 1);
                                } else {
                                    metrics.record_tick(skipped);
                                    on_tick();
                                    idle_since = Some(time::Instant::now());
                                }
                            }
                        }
                    }
                });
            })
            .map_err(SchedulerError::Spawn)?;

        self.logger.record(&format!(
            "{} started at {:.1} Hz",
            self.name,
            1.0 / period.as_secs_f64()
        ));
        self.worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        let worker = self.worker.take().ok_or(SchedulerError::NotRunning)?;
        // the receiver is gone only if the thread already exited
        let _ = worker.shutdown.send(());
        let joined = worker.handle.join();
        self.logger.record(&format!("{} stopped", self.name));
        joined.map_err(|_| SchedulerError::TickPanicked)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.stop() {
                self.logger.warn(&format!("{} shutdown: {}", self.name, err));
            }
        }
    }
}

fn boundaries_between(prev: time::Instant, next: time::Instant, period: Duration) -> u64 {
    let gap = next.saturating_duration_since(prev).as_nanos();
    let boundaries = gap / period.as_nanos().max(1);
    boundaries.saturating_sub(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    fn scheduler() -> (Scheduler, Arc<MetricsRecorder>) {
        let metrics = Arc::new(MetricsRecorder::new());
        (Scheduler::new("test", metrics.clone()), metrics)
    }

    #[test]
    fn ticks_at_fixed_period() {
        let (mut sched, metrics) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        sched
            .start(Duration::from_millis(10), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        thread::sleep(Duration::from_millis(120));
        sched.stop().unwrap();

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 3, "only {} ticks", ticks);
        assert!(ticks <= 20, "{} ticks in 120ms", ticks);
        assert_eq!(metrics.snapshot().ticks, ticks as u64);
    }

    #[test]
    fn start_twice_and_stop_twice_are_misuse() {
        let (mut sched, _) = scheduler();
        assert!(matches!(sched.stop(), Err(SchedulerError::NotRunning)));
        sched.start(Duration::from_millis(50), || {}).unwrap();
        assert!(matches!(
            sched.start(Duration::from_millis(50), || {}),
            Err(SchedulerError::AlreadyRunning)
        ));
        sched.stop().unwrap();
        assert!(matches!(sched.stop(), Err(SchedulerError::NotRunning)));
        assert!(!sched.is_running());
    }

    #[test]
    fn zero_period_is_rejected() {
        let (mut sched, _) = scheduler();
        assert!(matches!(
            sched.start(Duration::ZERO, || {}),
            Err(SchedulerError::ZeroPeriod)
        ));
        assert!(!sched.is_running());
    }

    #[test]
    fn overrun_skips_instead_of_bursting() {
        let (mut sched, metrics) = scheduler();
        let period = Duration::from_millis(100);
        let starts = Arc::new(Mutex::new(Vec::<Instant>::new()));
        let recorded = starts.clone();
        sched
            .start(period, move || {
                let mut starts = recorded.lock().unwrap();
                starts.push(Instant::now());
                let first = starts.len() == 1;
                drop(starts);
                // ends just before the second boundary
                if first {
                    thread::sleep(Duration::from_millis(190));
                }
            })
            .unwrap();
        thread::sleep(Duration::from_millis(560));
        sched.stop().unwrap();

        let starts = starts.lock().unwrap();
        assert!(starts.len() >= 3, "only {} ticks", starts.len());
        let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
        for gap in &gaps {
            assert!(
                *gap + Duration::from_millis(3) >= period,
                "two ticks within one period: {:?}",
                gaps
            );
        }
        let stats = metrics.snapshot();
        assert!(stats.skipped_ticks >= 1);
        assert_eq!(stats.ticks, starts.len() as u64);
    }

    #[test]
    fn stop_waits_for_in_flight_tick_and_silences_timer() {
        let (mut sched, _) = scheduler();
        let finished = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let (f, s) = (finished.clone(), started.clone());
        sched
            .start(Duration::from_millis(10), move || {
                s.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                f.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        thread::sleep(Duration::from_millis(15));
        sched.stop().unwrap();

        let after_stop = started.load(Ordering::SeqCst);
        assert_eq!(after_stop, finished.load(Ordering::SeqCst));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(started.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn drop_stops_running_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let (mut sched, _) = scheduler();
            let counter = count.clone();
            sched
                .start(Duration::from_millis(5), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
