use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::error::RateLimitInfo;
use crate::types::{PromptDraft, PromptFilter};

/// Typed cross-process request. The tagged representation matches the wire
/// shape `{type, payload}` used by UI surfaces and page agents; anything
/// that fails to parse into a variant is rejected at the boundary before
/// reaching business logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetAuthState,
    ValidateToken {
        token: String,
    },
    Logout,
    GetPrompts {
        #[serde(default)]
        filter: PromptFilter,
    },
    SavePrompt {
        draft: PromptDraft,
    },
    #[serde(rename_all = "camelCase")]
    InsertPrompt {
        prompt_id: String,
        #[serde(default)]
        context: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CopyPrompt {
        prompt_id: String,
    },
    #[serde(rename_all = "camelCase")]
    MarkSuccess {
        prompt_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ImprovePrompt {
        content: String,
        #[serde(default)]
        target_llm: Option<String>,
    },
    UpdateSettings {
        settings: Settings,
    },
    SyncData,
    GetSelectorConfigs,
    GetSettings,
}

impl Request {
    /// Stable kind label used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetAuthState => "GET_AUTH_STATE",
            Request::ValidateToken { .. } => "VALIDATE_TOKEN",
            Request::Logout => "LOGOUT",
            Request::GetPrompts { .. } => "GET_PROMPTS",
            Request::SavePrompt { .. } => "SAVE_PROMPT",
            Request::InsertPrompt { .. } => "INSERT_PROMPT",
            Request::CopyPrompt { .. } => "COPY_PROMPT",
            Request::MarkSuccess { .. } => "MARK_SUCCESS",
            Request::ImprovePrompt { .. } => "IMPROVE_PROMPT",
            Request::UpdateSettings { .. } => "UPDATE_SETTINGS",
            Request::SyncData => "SYNC_DATA",
            Request::GetSelectorConfigs => "GET_SELECTOR_CONFIGS",
            Request::GetSettings => "GET_SETTINGS",
        }
    }
}

/// The single response shape every request resolves to. `rate_limited` and
/// `retry_after` are only present on rate-limit failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    /// Seconds until a retry is worthwhile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            rate_limited: None,
            retry_after: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            rate_limited: None,
            retry_after: None,
        }
    }

    pub fn rate_limited(info: &RateLimitInfo) -> Self {
        Self {
            success: false,
            data: None,
            error: Some("rate limit exceeded".to_string()),
            rate_limited: Some(true),
            retry_after: Some(info.retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape_round_trips() {
        let raw = r#"{"type":"VALIDATE_TOKEN","payload":{"token":"tok-1"}}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        assert!(matches!(req, Request::ValidateToken { ref token } if token == "tok-1"));

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["type"], "VALIDATE_TOKEN");
        assert_eq!(back["payload"]["token"], "tok-1");
    }

    #[test]
    fn unit_requests_need_no_payload() {
        let req: Request = serde_json::from_str(r#"{"type":"GET_AUTH_STATE"}"#).unwrap();
        assert!(matches!(req, Request::GetAuthState));

        let req: Request = serde_json::from_str(r#"{"type":"SYNC_DATA"}"#).unwrap();
        assert!(matches!(req, Request::SyncData));
    }

    #[test]
    fn payload_fields_are_camel_case() {
        let raw = r#"{"type":"INSERT_PROMPT","payload":{"promptId":"p1","context":"chatgpt"}}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        match req {
            Request::InsertPrompt { prompt_id, context } => {
                assert_eq!(prompt_id, "p1");
                assert_eq!(context.as_deref(), Some("chatgpt"));
            }
            other => panic!("parsed as {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let parsed = serde_json::from_str::<Request>(r#"{"type":"DROP_TABLES"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let info = RateLimitInfo {
            limit: 60,
            remaining: 0,
            reset: 0,
            retry_after: 90,
        };
        let resp = Response::rate_limited(&info);
        assert!(!resp.success);
        assert_eq!(resp.rate_limited, Some(true));
        assert_eq!(resp.retry_after, Some(90));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["rateLimited"], true);
        assert!(json.get("data").is_none());
    }
}
