//! # Poller
//!
//! Drives the two polling loops against a [`TelemetrySource`]:
//!
//! - **fast** loop: instantaneous angle, default every 1 s
//! - **slow** loop: today's timeline, default every 10 s
//!
//! Each loop is a single tokio task. The next tick is only awaited after the
//! current request has finished, so a loop never has more than one request in
//! flight; ticks missed while a request stalls are delayed rather than burst.
//!
//! Failed ticks are logged, counted and skipped. There is no retry, no backoff
//! and no failure cap; the store keeps its previous state until a tick
//! succeeds.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::TelemetrySource;
use super::store::TelemetryStore;
use super::types::AngleReading;
use crate::error::{PostureError, Result};

#[derive(Debug, Default)]
struct LoopCounters {
    ticks: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Default)]
struct PollCounters {
    fast: LoopCounters,
    slow: LoopCounters,
}

/// Tick and failure counts since the poller was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollerStats {
    pub fast_ticks: u64,
    pub fast_failures: u64,
    pub slow_ticks: u64,
    pub slow_failures: u64,
}

/// Shortest loop period; zero periods are raised to this
const MIN_PERIOD: Duration = Duration::from_millis(1);

struct LoopHandle {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl LoopHandle {
    fn stop(self) {
        self.cancel.cancel();
    }
}

pub struct Poller {
    source: Arc<dyn TelemetrySource>,
    store: Arc<TelemetryStore>,
    counters: Arc<PollCounters>,
    fast: Option<LoopHandle>,
    slow: Option<LoopHandle>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("fast_running", &self.fast.is_some())
            .field("slow_running", &self.slow.is_some())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Poller {
    pub fn new(source: Arc<dyn TelemetrySource>, store: Arc<TelemetryStore>) -> Self {
        Self {
            source,
            store,
            counters: Arc::new(PollCounters::default()),
            fast: None,
            slow: None,
        }
    }

    /// Start (or restart) the angle loop. Must be called inside a tokio runtime.
    pub fn start_fast_poll(&mut self, period: Duration) {
        if let Some(previous) = self.fast.take() {
            debug!("Restarting fast poll loop");
            previous.stop();
        }

        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let tick = move |seq: u64| {
            let source = Arc::clone(&source);
            let store = Arc::clone(&store);
            async move {
                let angle = source.current_angle().await?;
                store.apply_angle_reading(seq, AngleReading::now(angle));
                Ok::<_, PostureError>(())
            }
        };

        self.fast = Some(self.spawn_loop(Axis::Fast, period, tick));
        info!("Fast poll started ({} ms)", period.as_millis());
    }

    /// Start (or restart) the daily aggregate loop. Must be called inside a
    /// tokio runtime.
    pub fn start_slow_poll(&mut self, period: Duration) {
        if let Some(previous) = self.slow.take() {
            debug!("Restarting slow poll loop");
            previous.stop();
        }

        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let tick = move |seq: u64| {
            let source = Arc::clone(&source);
            let store = Arc::clone(&store);
            async move {
                let aggregate = source.today().await?;
                store.apply_daily_aggregate(seq, aggregate);
                Ok::<_, PostureError>(())
            }
        };

        self.slow = Some(self.spawn_loop(Axis::Slow, period, tick));
        info!("Slow poll started ({} ms)", period.as_millis());
    }

    /// Cancel both loops. Safe to call any number of times.
    ///
    /// Requests still in flight are dropped and never reach the store.
    pub fn stop(&mut self) {
        let mut stopped = false;
        for handle in [self.fast.take(), self.slow.take()].into_iter().flatten() {
            handle.stop();
            stopped = true;
        }
        if stopped {
            info!("Poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.fast.is_some() || self.slow.is_some()
    }

    pub fn stats(&self) -> PollerStats {
        let c = &self.counters;
        PollerStats {
            fast_ticks: c.fast.ticks.load(Ordering::Relaxed),
            fast_failures: c.fast.failures.load(Ordering::Relaxed),
            slow_ticks: c.slow.ticks.load(Ordering::Relaxed),
            slow_failures: c.slow.failures.load(Ordering::Relaxed),
        }
    }

    fn spawn_loop<F, Fut>(&self, axis: Axis, period: Duration, tick: F) -> LoopHandle
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let period = if period.is_zero() {
            warn!("{} poll period is zero, using {:?}", axis.label(), MIN_PERIOD);
            MIN_PERIOD
        } else {
            period
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            axis,
            period,
            cancel.clone(),
            Arc::clone(&self.counters),
            tick,
        ));

        LoopHandle {
            cancel,
            _task: task,
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Fast,
    Slow,
}

impl Axis {
    fn label(self) -> &'static str {
        match self {
            Axis::Fast => "angle",
            Axis::Slow => "daily",
        }
    }

    fn counters(self, counters: &PollCounters) -> &LoopCounters {
        match self {
            Axis::Fast => &counters.fast,
            Axis::Slow => &counters.slow,
        }
    }
}

/// Tick until cancelled; `tick` receives the issuance sequence number.
///
/// Sequence numbers are drawn from the axis tick counter, which outlives the
/// loop, so a restarted loop keeps issuing numbers above everything the store
/// has already applied.
async fn poll_loop<F, Fut>(
    axis: Axis,
    period: Duration,
    cancel: CancellationToken,
    counters: Arc<PollCounters>,
    mut tick: F,
) where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let counters = axis.counters(&counters);
    let mut issued: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let seq = counters.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        issued += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tick(seq) => result,
        };

        if let Err(e) = result {
            let failures = counters.failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!("{} poll #{} skipped ({} failures so far): {}", axis.label(), seq, failures, e);
        }
    }

    debug!("{} poll loop exited after {} ticks", axis.label(), issued);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UserProfile;
    use crate::telemetry::source::MockTelemetrySource;
    use crate::telemetry::timeline::TimelineAggregator;
    use crate::telemetry::types::{DailyAggregate, Sample};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::SeqCst;
    use tokio::sync::Semaphore;
    use tokio::time::sleep;

    fn store() -> Arc<TelemetryStore> {
        Arc::new(TelemetryStore::new(100.0, TimelineAggregator::default()))
    }

    /// Source whose angle requests block until the test hands out permits
    struct GatedSource {
        gate: Semaphore,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl GatedSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TelemetrySource for GatedSource {
        async fn current_angle(&self) -> Result<f64> {
            self.calls.fetch_add(1, SeqCst);
            let now = self.in_flight.fetch_add(1, SeqCst) + 1;
            self.max_in_flight.fetch_max(now, SeqCst);

            let permit = self.gate.acquire().await;
            self.in_flight.fetch_sub(1, SeqCst);

            match permit {
                Ok(permit) => {
                    permit.forget();
                    Ok(77.0)
                }
                Err(_) => Err(PostureError::Network("gate closed".to_string())),
            }
        }

        async fn today(&self) -> Result<DailyAggregate> {
            Ok(DailyAggregate::default())
        }

        async fn user_profile(&self, _user_id: &str) -> Result<UserProfile> {
            Err(PostureError::Network("not used".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ticks_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockTelemetrySource::new();
        mock.expect_current_angle().returning(move || {
            if counter.fetch_add(1, SeqCst) % 2 == 0 {
                Err(PostureError::Network("connection refused".to_string()))
            } else {
                Ok(120.0)
            }
        });

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_fast_poll(Duration::from_millis(1000));

        // Ticks at 0, 1000, 2000, 3000 ms
        sleep(Duration::from_millis(3500)).await;

        let stats = poller.stats();
        assert_eq!(stats.fast_ticks, 4);
        assert_eq!(stats.fast_failures, 2);
        assert_eq!(store.snapshot().current_angle_degrees, 120.0);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_overlapping_requests() {
        let source = GatedSource::new();
        let store = store();
        let mut poller = Poller::new(source.clone(), Arc::clone(&store));
        poller.start_fast_poll(Duration::from_millis(1000));

        // First request stalls across several scheduled ticks
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(source.calls.load(SeqCst), 1);
        assert_eq!(store.snapshot().observed_at, None);

        // Releasing it lets the delayed tick issue exactly one more request
        source.gate.add_permits(1);
        sleep(Duration::from_millis(100)).await;

        assert_eq!(store.snapshot().current_angle_degrees, 77.0);
        assert_eq!(source.calls.load(SeqCst), 2);
        assert_eq!(source.max_in_flight.load(SeqCst), 1);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let mut mock = MockTelemetrySource::new();
        mock.expect_current_angle().returning(|| Ok(90.0));

        let mut poller = Poller::new(Arc::new(mock), store());
        poller.start_fast_poll(Duration::from_millis(1000));
        sleep(Duration::from_millis(1500)).await;
        assert!(poller.is_running());

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());

        let ticks = poller.stats().fast_ticks;
        assert_eq!(ticks, 2);

        sleep(Duration::from_millis(5000)).await;
        assert_eq!(poller.stats().fast_ticks, ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_response_discarded_after_stop() {
        let source = GatedSource::new();
        let store = store();
        let mut poller = Poller::new(source.clone(), Arc::clone(&store));
        poller.start_fast_poll(Duration::from_millis(1000));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(SeqCst), 1);

        poller.stop();
        source.gate.add_permits(5);
        sleep(Duration::from_millis(2000)).await;

        assert_eq!(store.snapshot().observed_at, None);
        assert_eq!(source.calls.load(SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_applying_readings() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockTelemetrySource::new();
        mock.expect_current_angle()
            .returning(move || Ok(counter.fetch_add(1, SeqCst) as f64));

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_fast_poll(Duration::from_millis(1000));
        sleep(Duration::from_millis(5500)).await;
        assert_eq!(store.snapshot().current_angle_degrees, 5.0);

        poller.stop();
        poller.start_fast_poll(Duration::from_millis(1000));
        sleep(Duration::from_millis(3500)).await;

        assert_eq!(calls.load(SeqCst), 10);
        assert_eq!(store.snapshot().current_angle_degrees, 9.0);
        assert_eq!(poller.stats().fast_ticks, 10);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarted_slow_poll_replaces_aggregate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockTelemetrySource::new();
        mock.expect_today().returning(move || {
            let slouched = counter.fetch_add(1, SeqCst) > 0;
            Ok(DailyAggregate::from_samples(vec![Sample::new("08:00", slouched)]))
        });

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_slow_poll(Duration::from_millis(10000));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(store.snapshot().bad_percent, 0.0);

        poller.start_slow_poll(Duration::from_millis(10000));
        sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(SeqCst), 2);
        assert_eq!(store.snapshot().bad_percent, 100.0);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_does_not_kill_loop() {
        let mut mock = MockTelemetrySource::new();
        mock.expect_current_angle().returning(|| Ok(88.0));

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_fast_poll(Duration::ZERO);
        sleep(Duration::from_millis(10)).await;

        assert!(poller.is_running());
        assert!(poller.stats().fast_ticks >= 5);
        assert_eq!(store.snapshot().current_angle_degrees, 88.0);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_applies_aggregate() {
        let aggregate = DailyAggregate::from_samples(vec![
            Sample::new("09:15", true),
            Sample::new("bad", false),
            Sample::new("14:00", false),
        ]);

        let mut mock = MockTelemetrySource::new();
        mock.expect_today().returning(move || Ok(aggregate.clone()));

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_slow_poll(Duration::from_millis(10000));
        sleep(Duration::from_millis(100)).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.timeline.buckets.len(), 2);
        assert_eq!(snapshot.excluded_samples, 1);
        assert_eq!(snapshot.good_percent, 50.0);
        assert_eq!(poller.stats().slow_ticks, 1);

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_failure_keeps_previous_aggregate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut mock = MockTelemetrySource::new();
        mock.expect_today().returning(move || {
            if counter.fetch_add(1, SeqCst) == 0 {
                Ok(DailyAggregate::from_samples(vec![Sample::new("08:00", true)]))
            } else {
                Err(PostureError::MalformedResponse("missing field `timeline`".to_string()))
            }
        });

        let store = store();
        let mut poller = Poller::new(Arc::new(mock), Arc::clone(&store));
        poller.start_slow_poll(Duration::from_millis(10000));
        sleep(Duration::from_millis(10500)).await;

        let stats = poller.stats();
        assert_eq!(stats.slow_ticks, 2);
        assert_eq!(stats.slow_failures, 1);
        assert_eq!(store.snapshot().bad_percent, 100.0);

        poller.stop();
    }
}
