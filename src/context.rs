//! # Telemetry Context
//!
//! Explicitly constructed owner of the telemetry core. One context is shared
//! by every screen: it polls once, keeps one store and one alert state, and is
//! torn down with [`TelemetryContext::stop`] (or by dropping it).

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::gesture::{GestureNavigator, GesturePolicy};
use crate::profile::{ProfileCache, UserProfile};
use crate::telemetry::{
    AlertEvent, HttpTelemetrySource, Poller, PollerStats, TelemetrySnapshot, TelemetrySource,
    TelemetryStore, TimelineAggregator,
};

pub struct TelemetryContext {
    config: Config,
    source: Arc<dyn TelemetrySource>,
    store: Arc<TelemetryStore>,
    poller: Poller,
    profiles: ProfileCache,
}

impl std::fmt::Debug for TelemetryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryContext")
            .field("store", &self.store)
            .field("poller", &self.poller)
            .field("profile", &self.profiles.current())
            .finish_non_exhaustive()
    }
}

impl TelemetryContext {
    /// Build a context around an arbitrary source
    pub fn new(config: Config, source: Arc<dyn TelemetrySource>) -> Self {
        let aggregator = TimelineAggregator::from_config(&config.timeline);
        let store = Arc::new(TelemetryStore::new(config.alert.threshold_degrees, aggregator));
        let poller = Poller::new(Arc::clone(&source), Arc::clone(&store));

        Self {
            config,
            source,
            store,
            poller,
            profiles: ProfileCache::new(),
        }
    }

    /// Build a context talking HTTP to `config.server.base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let source = HttpTelemetrySource::new(&config.server)?;
        Ok(Self::new(config, Arc::new(source)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start both poll loops with the configured periods.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        info!(
            "Starting telemetry against {} (threshold {:.1}°)",
            self.config.server.base_url, self.config.alert.threshold_degrees
        );
        self.poller.start_fast_poll(self.config.polling.fast_interval());
        self.poller.start_slow_poll(self.config.polling.slow_interval());
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        self.poller.stop();
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_running()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.store.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertEvent> {
        self.store.subscribe_alerts()
    }

    pub fn poller_stats(&self) -> PollerStats {
        self.poller.stats()
    }

    /// Navigator using the configured swipe policy
    pub fn gesture_navigator(&self) -> GestureNavigator {
        GestureNavigator::new(GesturePolicy::from_config(&self.config.gesture))
    }

    /// Fetch the profile for `user_id`; on failure the last loaded profile is kept.
    pub async fn load_profile(&mut self, user_id: &str) -> Option<&UserProfile> {
        let result = self.source.user_profile(user_id).await;
        self.profiles.update(result)
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profiles.current()
    }
}
