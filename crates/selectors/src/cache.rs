use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use promptdock_api::PromptApi;
use promptdock_core::{Error, Result, SelectorConfig};
use promptdock_storage::{keys, StateStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::fallback::builtin_selectors;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What `get_configs` does when no fetched data is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Fail closed: error when neither the network nor the persisted cache
    /// can supply a config set.
    Strict,
    /// Fail open: fall back to the last cached set, then to the built-in
    /// table. `get_configs` never errors.
    Lenient,
}

/// Persisted as a single blob so configs, version, and fetch time can only
/// ever be observed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectorCacheBlob {
    configs: Vec<SelectorConfig>,
    #[serde(default)]
    version: u32,
    fetched_at: i64,
}

#[derive(Default)]
struct CacheState {
    configs: Option<Vec<SelectorConfig>>,
    version: u32,
    /// Unix seconds of the last successful fetch; 0 when never fetched.
    fetched_at: i64,
    initialized: bool,
}

/// Read-through cache over the per-site selector configurations.
///
/// Construct once at process start and share via `Arc`; the `flight` mutex
/// guarantees that concurrent callers racing the first load trigger exactly
/// one network fetch and observe the same resolved state.
pub struct SelectorCache {
    api: Arc<dyn PromptApi>,
    store: Arc<StateStore>,
    policy: FallbackPolicy,
    ttl_secs: i64,
    state: RwLock<CacheState>,
    flight: Mutex<()>,
}

impl SelectorCache {
    pub fn new(api: Arc<dyn PromptApi>, store: Arc<StateStore>, policy: FallbackPolicy) -> Self {
        Self {
            api,
            store,
            policy,
            ttl_secs: DEFAULT_TTL.as_secs() as i64,
            state: RwLock::new(CacheState::default()),
            flight: Mutex::new(()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Load persisted configs and, if they are stale or absent, attempt one
    /// network refresh. Idempotent: a second call while initialized is a
    /// no-op, and callers racing the first load share a single fetch.
    pub async fn initialize(&self) -> Result<()> {
        if self.state.read().await.initialized {
            return Ok(());
        }

        let _flight = self.flight.lock().await;
        // A concurrent caller may have finished while we waited on the lock.
        if self.state.read().await.initialized {
            return Ok(());
        }

        let blob = match self.store.get::<SelectorCacheBlob>(keys::SELECTOR_CACHE).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted selector cache");
                None
            }
        };

        if let Some(blob) = blob {
            let fresh = !self.is_expired(blob.fetched_at);
            let mut state = self.state.write().await;
            state.version = blob.version;
            state.fetched_at = blob.fetched_at;
            state.configs = Some(blob.configs);
            if fresh {
                state.initialized = true;
                debug!(version = state.version, "Selector cache loaded from store");
                return Ok(());
            }
            debug!(version = state.version, "Persisted selector cache is stale");
        }

        if let Err(e) = self.fetch_and_persist().await {
            warn!(error = %e, "Selector refresh failed during initialization");
        }
        self.state.write().await.initialized = true;
        Ok(())
    }

    /// Force a network fetch regardless of TTL.
    pub async fn refresh(&self) -> Result<()> {
        let _flight = self.flight.lock().await;
        self.fetch_and_persist().await
    }

    /// Current config set under this cache's fallback policy. Never returns
    /// an empty set: absent data resolves through the policy instead.
    pub async fn get_configs(&self) -> Result<Vec<SelectorConfig>> {
        self.initialize().await?;
        self.refresh_if_expired().await;

        {
            let state = self.state.read().await;
            if let Some(configs) = &state.configs {
                if !configs.is_empty() {
                    return Ok(configs.clone());
                }
            }
        }

        match self.policy {
            FallbackPolicy::Lenient => {
                debug!("Serving built-in selector fallback table");
                Ok(builtin_selectors().to_vec())
            }
            FallbackPolicy::Strict => Err(Error::ServerUnavailable(
                "no selector configurations cached and the server could not be reached".to_string(),
            )),
        }
    }

    /// Exact-name lookup against the current config set.
    pub async fn get_config(&self, name: &str) -> Result<Option<SelectorConfig>> {
        let configs = self.get_configs().await?;
        Ok(configs.into_iter().find(|c| c.name == name))
    }

    /// Reset to the uninitialized state and purge the persisted blob.
    pub async fn clear(&self) -> Result<()> {
        let _flight = self.flight.lock().await;
        *self.state.write().await = CacheState::default();
        self.store.remove(keys::SELECTOR_CACHE).await
    }

    pub async fn version(&self) -> u32 {
        self.state.read().await.version
    }

    pub async fn fetched_at(&self) -> i64 {
        self.state.read().await.fetched_at
    }

    /// Refresh data that expired while the process kept running. Failures
    /// leave the stale set in place for the policy to resolve.
    async fn refresh_if_expired(&self) {
        let expired = {
            let state = self.state.read().await;
            state.fetched_at > 0 && self.is_expired(state.fetched_at)
        };
        if !expired {
            return;
        }

        let _flight = self.flight.lock().await;
        let still_expired = {
            let state = self.state.read().await;
            state.fetched_at > 0 && self.is_expired(state.fetched_at)
        };
        if still_expired {
            if let Err(e) = self.fetch_and_persist().await {
                warn!(error = %e, "Selector refresh failed, keeping stale set");
            }
        }
    }

    /// Callers must hold `flight`.
    async fn fetch_and_persist(&self) -> Result<()> {
        let payload = self.api.get_selectors().await?;
        if payload.configs.is_empty() {
            return Err(Error::Api(
                "selector payload contained no configurations".to_string(),
            ));
        }

        let count = payload.configs.len();
        let blob = SelectorCacheBlob {
            configs: payload.configs,
            version: payload.version,
            fetched_at: Utc::now().timestamp(),
        };
        if let Err(e) = self.store.set(keys::SELECTOR_CACHE, &blob).await {
            warn!(error = %e, "Failed to persist selector cache");
        }

        let mut state = self.state.write().await;
        state.version = blob.version;
        state.fetched_at = blob.fetched_at;
        state.configs = Some(blob.configs);
        state.initialized = true;
        info!(version = state.version, count, "Selector configurations refreshed");
        Ok(())
    }

    fn is_expired(&self, fetched_at: i64) -> bool {
        Utc::now().timestamp() - fetched_at > self.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use promptdock_core::{
        AuthState, Paths, Prompt, PromptDraft, PromptFilter, SelectorPayload, UsageRecord, User,
        UserSettings,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockApi {
        selector_calls: AtomicUsize,
        payload: Option<SelectorPayload>,
        delay: Option<Duration>,
    }

    impl MockApi {
        fn serving(configs: Vec<SelectorConfig>, version: u32) -> Self {
            Self {
                selector_calls: AtomicUsize::new(0),
                payload: Some(SelectorPayload { configs, version }),
                delay: None,
            }
        }

        fn offline() -> Self {
            Self {
                selector_calls: AtomicUsize::new(0),
                payload: None,
                delay: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> usize {
            self.selector_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PromptApi for MockApi {
        fn set_token(&self, _token: Option<&str>) {}

        async fn validate_token(&self, _token: &str) -> Result<AuthState> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn logout(&self) -> Result<()> {
            Ok(())
        }

        async fn get_prompts(&self, _filter: &PromptFilter) -> Result<Vec<Prompt>> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn get_prompt(&self, _id: &str) -> Result<Prompt> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn create_prompt(&self, _draft: &PromptDraft) -> Result<Prompt> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn record_usage(&self, _usage: &UsageRecord) -> Result<()> {
            Ok(())
        }

        async fn improve_prompt(&self, _content: &str, _target: Option<&str>) -> Result<String> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn get_user_settings(&self) -> Result<UserSettings> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn get_user_profile(&self) -> Result<User> {
            Err(Error::Other("not under test".to_string()))
        }

        async fn get_selectors(&self) -> Result<SelectorPayload> {
            self.selector_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.payload
                .clone()
                .ok_or_else(|| Error::Api("connection refused".to_string()))
        }
    }

    fn sample_configs() -> Vec<SelectorConfig> {
        vec![
            SelectorConfig {
                name: "chatgpt".to_string(),
                input_selector: "#input".to_string(),
                button_insert_selector: ".toolbar".to_string(),
                send_button_selector: "#send".to_string(),
            },
            SelectorConfig {
                name: "claude".to_string(),
                input_selector: ".editor".to_string(),
                button_insert_selector: ".actions".to_string(),
                send_button_selector: ".send".to_string(),
            },
        ]
    }

    fn cache_with(
        api: Arc<MockApi>,
        dir: &std::path::Path,
        policy: FallbackPolicy,
    ) -> (SelectorCache, Arc<StateStore>) {
        let store = Arc::new(StateStore::new(Paths::with_base(dir.to_path_buf())));
        let cache = SelectorCache::new(api, store.clone(), policy);
        (cache, store)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let api = Arc::new(
            MockApi::serving(sample_configs(), 3).with_delay(Duration::from_millis(50)),
        );
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);

        let (a, b) = tokio::join!(cache.get_configs(), cache.get_configs());
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(api.calls(), 1);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let api = Arc::new(MockApi::serving(sample_configs(), 1));
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);

        cache.initialize().await.unwrap();
        cache.initialize().await.unwrap();
        cache.get_configs().await.unwrap();

        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn restart_serves_persisted_configs_without_network() {
        let dir = tempfile::tempdir().unwrap();
        {
            let api = Arc::new(MockApi::serving(sample_configs(), 7));
            let (cache, _store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);
            cache.get_configs().await.unwrap();
            assert_eq!(api.calls(), 1);
        }

        // Fresh process over the same store: persisted data, no fetch.
        let api = Arc::new(MockApi::serving(sample_configs(), 8));
        let (cache, _store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);
        let configs = cache.get_configs().await.unwrap();

        assert_eq!(api.calls(), 0);
        assert_eq!(configs, sample_configs());
        assert_eq!(cache.version().await, 7);
    }

    #[tokio::test]
    async fn expired_persisted_configs_trigger_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockApi::serving(sample_configs(), 9));
        let (cache, store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);

        let twenty_five_hours_ago = Utc::now().timestamp() - 25 * 3600;
        store
            .set(
                keys::SELECTOR_CACHE,
                &json!({
                    "configs": [{
                        "name": "old",
                        "inputSelector": "#old",
                        "buttonInsertSelector": ".old",
                        "sendButtonSelector": "#old-send",
                    }],
                    "version": 2,
                    "fetchedAt": twenty_five_hours_ago,
                }),
            )
            .await
            .unwrap();

        let configs = cache.get_configs().await.unwrap();
        assert_eq!(api.calls(), 1);
        assert_eq!(configs, sample_configs());
        assert_eq!(cache.version().await, 9);
    }

    #[tokio::test]
    async fn expired_refresh_failure_keeps_stale_set() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockApi::offline());
        let (cache, store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Lenient);

        let stale = Utc::now().timestamp() - 25 * 3600;
        store
            .set(
                keys::SELECTOR_CACHE,
                &json!({
                    "configs": [{
                        "name": "old",
                        "inputSelector": "#old",
                        "buttonInsertSelector": ".old",
                        "sendButtonSelector": "#old-send",
                    }],
                    "version": 2,
                    "fetchedAt": stale,
                }),
            )
            .await
            .unwrap();

        let configs = cache.get_configs().await.unwrap();
        assert!(api.calls() >= 1);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "old");
    }

    #[tokio::test]
    async fn lenient_falls_back_to_builtin_table() {
        let api = Arc::new(MockApi::offline());
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api, dir.path(), FallbackPolicy::Lenient);

        let configs = cache.get_configs().await.unwrap();
        assert_eq!(configs, builtin_selectors().to_vec());
    }

    #[tokio::test]
    async fn strict_errors_when_nothing_available() {
        let api = Arc::new(MockApi::offline());
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api, dir.path(), FallbackPolicy::Strict);

        let err = cache.get_configs().await.unwrap_err();
        assert!(matches!(err, Error::ServerUnavailable(_)));
        assert!(err.to_string().contains("unavailable"));
    }

    #[tokio::test]
    async fn empty_payload_is_not_served() {
        let api = Arc::new(MockApi::serving(Vec::new(), 1));
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api, dir.path(), FallbackPolicy::Lenient);

        let configs = cache.get_configs().await.unwrap();
        assert_eq!(configs, builtin_selectors().to_vec());
    }

    #[tokio::test]
    async fn refresh_ignores_ttl_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockApi::serving(sample_configs(), 5));
        let (cache, _store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);

        cache.get_configs().await.unwrap();
        assert_eq!(api.calls(), 1);

        // Data is fresh, but refresh must still hit the network.
        cache.refresh().await.unwrap();
        assert_eq!(api.calls(), 2);

        // And a restart sees what refresh persisted.
        let api2 = Arc::new(MockApi::offline());
        let (cache2, _store) = cache_with(api2.clone(), dir.path(), FallbackPolicy::Strict);
        assert_eq!(cache2.get_configs().await.unwrap(), sample_configs());
        assert_eq!(api2.calls(), 0);
    }

    #[tokio::test]
    async fn clear_purges_state_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockApi::serving(sample_configs(), 4));
        let (cache, store) = cache_with(api.clone(), dir.path(), FallbackPolicy::Strict);

        cache.get_configs().await.unwrap();
        cache.clear().await.unwrap();

        let persisted: Option<serde_json::Value> = store.get(keys::SELECTOR_CACHE).await.unwrap();
        assert!(persisted.is_none());

        // Next access re-initializes from the network.
        cache.get_configs().await.unwrap();
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn get_config_matches_exact_name() {
        let api = Arc::new(MockApi::serving(sample_configs(), 1));
        let dir = tempfile::tempdir().unwrap();
        let (cache, _store) = cache_with(api, dir.path(), FallbackPolicy::Strict);

        let found = cache.get_config("claude").await.unwrap();
        assert_eq!(found.map(|c| c.input_selector), Some(".editor".to_string()));

        let missing = cache.get_config("claud").await.unwrap();
        assert!(missing.is_none());
    }
}
