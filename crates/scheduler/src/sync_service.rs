use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use promptdock_dispatch::{log_refresh_failure, Dispatcher};
use promptdock_selectors::SelectorCache;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Periodic and startup-delayed sync triggers. Refresh work goes through
/// the dispatcher's idempotent refresh operations, so a tick overlapping
/// its predecessor's unfinished work is safe; the only gate is time-based.
pub struct SyncService {
    dispatcher: Arc<Dispatcher>,
    selectors: Arc<SelectorCache>,
    tick_interval: Duration,
    startup_delay: Duration,
    /// Unix seconds of the last fully successful scheduled sync.
    last_sync: RwLock<Option<i64>>,
}

impl SyncService {
    pub fn new(dispatcher: Arc<Dispatcher>, selectors: Arc<SelectorCache>) -> Self {
        Self {
            dispatcher,
            selectors,
            tick_interval: Duration::from_secs(60),
            startup_delay: Duration::from_secs(5),
            last_sync: RwLock::new(None),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Due when strictly more than `interval_secs` have elapsed since the
    /// last successful sync. Elapsed == interval is not due.
    pub async fn needs_sync(&self, now: i64, interval_secs: u64) -> bool {
        match *self.last_sync.read().await {
            Some(last) => now - last > interval_secs as i64,
            None => true,
        }
    }

    /// One scheduler tick. Directly callable; failures leave `last_sync`
    /// untouched so the next tick retries.
    pub async fn run_tick(&self) {
        let now = Utc::now().timestamp();
        let interval = self.dispatcher.settings().await.sync_interval_secs;
        if !self.needs_sync(now, interval).await {
            return;
        }
        if !self.dispatcher.is_authenticated().await {
            debug!("Skipping scheduled sync, not authenticated");
            return;
        }

        let mut all_ok = true;
        if let Err(e) = self.dispatcher.refresh_prompts().await {
            all_ok = false;
            log_refresh_failure("prompts", &e);
        }
        if let Err(e) = self.dispatcher.refresh_custom_instructions().await {
            all_ok = false;
            log_refresh_failure("customInstructions", &e);
        }

        if all_ok {
            *self.last_sync.write().await = Some(now);
            debug!("Scheduled sync completed");
        }
    }

    /// One-shot startup refresh. Selector configs load regardless of auth
    /// state; everything else requires a session.
    pub async fn run_startup(&self) {
        if self.dispatcher.is_authenticated().await {
            if let Err(e) = self.dispatcher.refresh_prompts().await {
                log_refresh_failure("prompts", &e);
            }
            if let Err(e) = self.dispatcher.refresh_custom_instructions().await {
                log_refresh_failure("customInstructions", &e);
            }
            if let Err(e) = self.dispatcher.refresh_theme().await {
                log_refresh_failure("theme", &e);
            }
        } else {
            debug!("Startup sync skipped account data, not authenticated");
        }

        if let Err(e) = self.selectors.initialize().await {
            log_refresh_failure("selectors", &e);
        }
    }

    pub async fn last_sync(&self) -> Option<i64> {
        *self.last_sync.read().await
    }

    pub async fn run_loop(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            tick_secs = self.tick_interval.as_secs(),
            startup_delay_secs = self.startup_delay.as_secs(),
            "SyncService started"
        );

        let startup = tokio::time::sleep(self.startup_delay);
        tokio::pin!(startup);
        let mut startup_done = false;
        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = &mut startup, if !startup_done => {
                    startup_done = true;
                    self.run_startup().await;
                }
                _ = interval.tick() => {
                    self.run_tick().await;
                }
                _ = shutdown.recv() => {
                    info!("SyncService shutting down");
                    break;
                }
            }
        }
    }

    #[cfg(test)]
    async fn set_last_sync(&self, at: Option<i64>) {
        *self.last_sync.write().await = at;
    }
}
