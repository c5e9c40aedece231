use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use promptdock_core::{
    AuthState, Error, Prompt, PromptDraft, PromptFilter, RateLimitInfo, Result, SelectorPayload,
    UsageRecord, User, UserSettings,
};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::warn;

/// Typed surface of the backend. The background process owns one client;
/// everything else reaches the network through this trait.
#[async_trait]
pub trait PromptApi: Send + Sync {
    /// Install or clear the bearer token used by subsequent calls.
    fn set_token(&self, token: Option<&str>);

    async fn validate_token(&self, token: &str) -> Result<AuthState>;
    async fn logout(&self) -> Result<()>;
    async fn get_prompts(&self, filter: &PromptFilter) -> Result<Vec<Prompt>>;
    async fn get_prompt(&self, id: &str) -> Result<Prompt>;
    async fn create_prompt(&self, draft: &PromptDraft) -> Result<Prompt>;
    async fn record_usage(&self, usage: &UsageRecord) -> Result<()>;
    async fn improve_prompt(&self, content: &str, target_llm: Option<&str>) -> Result<String>;
    async fn get_user_settings(&self) -> Result<UserSettings>;
    async fn get_user_profile(&self) -> Result<User>;
    async fn get_selectors(&self) -> Result<SelectorPayload>;
}

pub struct HttpApiClient {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using default");
                Client::new()
            });
        Self {
            http,
            base_url: base_url.into(),
            token: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().map(|t| t.clone()).unwrap_or(None)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let request = match self.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| Error::Api(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers().clone();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(Error::RateLimited(rate_limit_from(&headers, &body)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Api(format!("HTTP {}: {}", status, body)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Api(format!("failed to decode response: {}", e)))
    }
}

/// Build structured rate-limit metadata from a 429, preferring the
/// standard headers and falling back to the JSON body fields.
fn rate_limit_from(headers: &HeaderMap, body: &Value) -> RateLimitInfo {
    fn header_num<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
    }

    RateLimitInfo {
        limit: header_num(headers, "x-ratelimit-limit")
            .or_else(|| body.get("limit").and_then(Value::as_u64).map(|v| v as u32))
            .unwrap_or(0),
        remaining: header_num(headers, "x-ratelimit-remaining")
            .or_else(|| body.get("remaining").and_then(Value::as_u64).map(|v| v as u32))
            .unwrap_or(0),
        reset: header_num(headers, "x-ratelimit-reset")
            .or_else(|| body.get("reset").and_then(Value::as_i64))
            .unwrap_or(0),
        retry_after: header_num(headers, "retry-after")
            .or_else(|| body.get("retryAfter").and_then(Value::as_u64))
            .unwrap_or(60),
    }
}

#[async_trait]
impl PromptApi for HttpApiClient {
    fn set_token(&self, token: Option<&str>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token.map(str::to_string);
        }
    }

    async fn validate_token(&self, token: &str) -> Result<AuthState> {
        self.get_json(
            self.http
                .post(self.url("/auth/validate"))
                .json(&json!({ "token": token })),
        )
        .await
    }

    async fn logout(&self) -> Result<()> {
        self.send(self.http.post(self.url("/auth/logout"))).await?;
        Ok(())
    }

    async fn get_prompts(&self, filter: &PromptFilter) -> Result<Vec<Prompt>> {
        let mut request = self.http.get(self.url("/prompts"));
        if let Some(folder) = &filter.folder {
            request = request.query(&[("folder", folder)]);
        }
        if let Some(tag) = &filter.tag {
            request = request.query(&[("tag", tag)]);
        }
        if let Some(search) = &filter.search {
            request = request.query(&[("search", search)]);
        }
        self.get_json(request).await
    }

    async fn get_prompt(&self, id: &str) -> Result<Prompt> {
        self.get_json(self.http.get(self.url(&format!("/prompts/{}", id))))
            .await
    }

    async fn create_prompt(&self, draft: &PromptDraft) -> Result<Prompt> {
        self.get_json(self.http.post(self.url("/prompts")).json(draft))
            .await
    }

    async fn record_usage(&self, usage: &UsageRecord) -> Result<()> {
        self.send(self.http.post(self.url("/usage")).json(usage))
            .await?;
        Ok(())
    }

    async fn improve_prompt(&self, content: &str, target_llm: Option<&str>) -> Result<String> {
        let body: Value = self
            .get_json(self.http.post(self.url("/prompts/improve")).json(&json!({
                "content": content,
                "targetLlm": target_llm,
            })))
            .await?;
        body.get("improved")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Api("improve response missing 'improved' field".to_string()))
    }

    async fn get_user_settings(&self) -> Result<UserSettings> {
        self.get_json(self.http.get(self.url("/user/settings"))).await
    }

    async fn get_user_profile(&self) -> Result<User> {
        self.get_json(self.http.get(self.url("/user/profile"))).await
    }

    async fn get_selectors(&self) -> Result<SelectorPayload> {
        self.get_json(self.http.get(self.url("/selectors"))).await
    }
}
