use std::sync::Arc;

use chrono::Utc;
use promptdock_api::PromptApi;
use promptdock_core::{
    AuthState, CachedPromptSet, Error, PromptDraft, PromptFilter, RateLimitInfo, Request, Response,
    Result, Settings, UsageRecord,
};
use promptdock_selectors::SelectorCache;
use promptdock_storage::{keys, StateStore};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::notify::Notifier;

/// Log a refresh failure without surfacing it to a user. Rate limits during
/// background work are a warning, never a notification.
pub fn log_refresh_failure(op: &str, error: &Error) {
    match error {
        Error::RateLimited(info) => {
            warn!(op, retry_after = info.retry_after, "Background refresh rate limited")
        }
        _ => warn!(op, error = %error, "Background refresh failed"),
    }
}

/// Single entry point for typed cross-process requests. Constructed once at
/// process start with its collaborators injected; shared via `Arc`.
pub struct Dispatcher {
    api: Arc<dyn PromptApi>,
    store: Arc<StateStore>,
    selectors: Arc<SelectorCache>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn PromptApi>,
        store: Arc<StateStore>,
        selectors: Arc<SelectorCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            store,
            selectors,
            notifier,
        }
    }

    /// Handle one request. Total: every path terminates in a structured
    /// response, no error crosses the process boundary. Rate limits raised
    /// here are user-initiated and therefore notify.
    pub async fn dispatch(&self, request: Request) -> Response {
        let kind = request.kind();
        debug!(kind, "Dispatching request");

        match self.handle(request).await {
            Ok(data) => Response::ok(data),
            Err(Error::RateLimited(info)) => {
                warn!(kind, retry_after = info.retry_after, "Request rate limited");
                self.notify_rate_limit(&info).await;
                Response::rate_limited(&info)
            }
            Err(e) => {
                warn!(kind, error = %e, "Request failed");
                Response::err(e.to_string())
            }
        }
    }

    async fn handle(&self, request: Request) -> Result<Value> {
        match request {
            Request::GetAuthState => to_value(self.auth_state().await?),
            Request::ValidateToken { token } => self.handle_validate_token(token).await,
            Request::Logout => self.handle_logout().await,
            Request::GetPrompts { filter } => self.handle_get_prompts(filter).await,
            Request::SavePrompt { draft } => self.handle_save_prompt(draft).await,
            Request::InsertPrompt { prompt_id, context } => {
                self.handle_insert_prompt(prompt_id, context).await
            }
            Request::CopyPrompt { prompt_id } => self.handle_copy_prompt(prompt_id).await,
            Request::MarkSuccess { prompt_id } => self.handle_mark_success(prompt_id).await,
            Request::ImprovePrompt { content, target_llm } => {
                self.handle_improve_prompt(content, target_llm).await
            }
            Request::UpdateSettings { settings } => self.handle_update_settings(settings).await,
            Request::SyncData => self.handle_sync_data().await,
            Request::GetSelectorConfigs => to_value(self.selectors.get_configs().await?),
            Request::GetSettings => to_value(self.settings().await),
        }
    }

    pub async fn auth_state(&self) -> Result<AuthState> {
        Ok(self
            .store
            .get::<AuthState>(keys::AUTH_STATE)
            .await?
            .unwrap_or_default())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth_state()
            .await
            .map(|s| s.is_authenticated)
            .unwrap_or(false)
    }

    pub async fn settings(&self) -> Settings {
        self.store
            .get::<Settings>(keys::SETTINGS)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    async fn handle_validate_token(&self, token: String) -> Result<Value> {
        self.api.set_token(Some(&token));
        let mut state = match self.api.validate_token(&token).await {
            Ok(state) => state,
            Err(e) => {
                self.api.set_token(None);
                return Err(e);
            }
        };
        state.is_authenticated = true;
        state.token = Some(token);
        self.store.set(keys::AUTH_STATE, &state).await?;

        // Follow-up refreshes fan out independently: one failing must not
        // stop the others, and none of them fails the validation itself.
        let (prompts, theme, instructions, selectors) = futures::join!(
            self.refresh_prompts(),
            self.refresh_theme(),
            self.refresh_custom_instructions(),
            self.selectors.refresh(),
        );
        for (op, result) in [
            ("prompts", prompts.map(|_| ())),
            ("theme", theme),
            ("customInstructions", instructions),
            ("selectors", selectors),
        ] {
            if let Err(e) = result {
                log_refresh_failure(op, &e);
            }
        }

        to_value(self.auth_state().await?)
    }

    async fn handle_logout(&self) -> Result<Value> {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Remote logout failed, clearing local session anyway");
        }
        self.api.set_token(None);
        self.store.remove(keys::AUTH_STATE).await?;
        self.store.remove(keys::PROMPT_CACHE).await?;
        Ok(Value::Null)
    }

    async fn handle_get_prompts(&self, filter: PromptFilter) -> Result<Value> {
        match self.api.get_prompts(&filter).await {
            Ok(prompts) => {
                // Only an unfiltered fetch may replace the cache wholesale.
                if filter.is_empty() {
                    self.replace_prompt_cache(prompts.clone()).await;
                }
                to_value(prompts)
            }
            Err(e @ Error::RateLimited(_)) => Err(e),
            Err(e) => {
                if self.settings().await.cache_enabled {
                    if let Ok(Some(cached)) =
                        self.store.get::<CachedPromptSet>(keys::PROMPT_CACHE).await
                    {
                        warn!(error = %e, "Backend unreachable, serving cached prompts");
                        let prompts: Vec<_> = cached
                            .prompts
                            .into_iter()
                            .filter(|p| filter.matches(p))
                            .collect();
                        return to_value(prompts);
                    }
                }
                Err(e)
            }
        }
    }

    async fn handle_save_prompt(&self, draft: PromptDraft) -> Result<Value> {
        let prompt = self.api.create_prompt(&draft).await?;

        let mut cached = self
            .store
            .get::<CachedPromptSet>(keys::PROMPT_CACHE)
            .await
            .ok()
            .flatten()
            .unwrap_or(CachedPromptSet {
                prompts: Vec::new(),
                fetched_at: 0,
            });
        cached.prompts.push(prompt.clone());
        if let Err(e) = self.store.set(keys::PROMPT_CACHE, &cached).await {
            warn!(error = %e, "Failed to extend prompt cache");
        }

        to_value(prompt)
    }

    async fn handle_insert_prompt(
        &self,
        prompt_id: String,
        context: Option<String>,
    ) -> Result<Value> {
        self.record_usage_intent(&prompt_id, context.as_deref().unwrap_or("insert"), None)
            .await;
        let prompt = self.api.get_prompt(&prompt_id).await?;
        to_value(prompt)
    }

    async fn handle_copy_prompt(&self, prompt_id: String) -> Result<Value> {
        self.record_usage_intent(&prompt_id, "copy", None).await;
        let prompt = self.api.get_prompt(&prompt_id).await?;
        Ok(json!({ "content": prompt.content }))
    }

    async fn handle_mark_success(&self, prompt_id: String) -> Result<Value> {
        self.record_usage_intent(&prompt_id, "insert", Some(true))
            .await;
        Ok(Value::Null)
    }

    async fn handle_improve_prompt(
        &self,
        content: String,
        target_llm: Option<String>,
    ) -> Result<Value> {
        let improved = self
            .api
            .improve_prompt(&content, target_llm.as_deref())
            .await?;
        Ok(json!({ "improved": improved }))
    }

    async fn handle_update_settings(&self, settings: Settings) -> Result<Value> {
        self.store.set(keys::SETTINGS, &settings).await?;
        to_value(settings)
    }

    async fn handle_sync_data(&self) -> Result<Value> {
        // Both refreshes run to completion regardless of the other's outcome;
        // the first failure is what the caller sees.
        let (prompts, instructions) = futures::join!(
            self.refresh_prompts(),
            self.refresh_custom_instructions()
        );
        let synced = prompts?;
        instructions?;
        Ok(json!({ "syncedPrompts": synced }))
    }

    /// Usage telemetry is recorded before the primary effect. A telemetry
    /// failure is logged and swallowed; the action still goes through.
    async fn record_usage_intent(&self, prompt_id: &str, context: &str, success: Option<bool>) {
        let usage = UsageRecord {
            prompt_id: prompt_id.to_string(),
            context: context.to_string(),
            success,
        };
        if let Err(e) = self.api.record_usage(&usage).await {
            warn!(prompt_id, context, error = %e, "Usage telemetry failed, continuing");
        }
    }

    /// Replace the cached prompt list from the backend. Returns the number
    /// of prompts fetched.
    pub async fn refresh_prompts(&self) -> Result<usize> {
        let prompts = self.api.get_prompts(&PromptFilter::default()).await?;
        let count = prompts.len();
        self.replace_prompt_cache(prompts).await;
        Ok(count)
    }

    /// Fold freshly synced custom instructions into the stored auth state.
    pub async fn refresh_custom_instructions(&self) -> Result<()> {
        let user = self.api.get_user_profile().await?;
        let mut state = self.auth_state().await?;
        state.user = Some(user);
        self.store.set(keys::AUTH_STATE, &state).await
    }

    /// Pull account-level settings and adopt the remote theme.
    pub async fn refresh_theme(&self) -> Result<()> {
        let remote = self.api.get_user_settings().await?;
        if remote.theme.is_empty() {
            return Ok(());
        }
        let mut settings = self.settings().await;
        settings.theme = remote.theme;
        self.store.set(keys::SETTINGS, &settings).await
    }

    async fn replace_prompt_cache(&self, prompts: Vec<promptdock_core::Prompt>) {
        let set = CachedPromptSet {
            prompts,
            fetched_at: Utc::now().timestamp(),
        };
        if let Err(e) = self.store.set(keys::PROMPT_CACHE, &set).await {
            warn!(error = %e, "Failed to persist prompt cache");
        }
    }

    async fn notify_rate_limit(&self, info: &RateLimitInfo) {
        let minutes = info.minutes_until_reset(Utc::now().timestamp());
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        let body = format!("Too many requests right now. Retry in {} {}.", minutes, unit);
        if let Err(e) = self.notifier.notify("PromptDock", &body).await {
            warn!(error = %e, "Failed to raise rate-limit notification");
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(Into::into)
}
