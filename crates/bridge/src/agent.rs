use std::collections::HashMap;

use async_trait::async_trait;
use promptdock_core::{
    AuthState, Prompt, PromptVariable, Request, Response, SelectorConfig, Settings,
};
use tracing::debug;

use crate::modal::declared_default;
use crate::page::{detect_site, PageDom};
use crate::template::{substitute, with_custom_instructions};

/// Page-side handle to the background process. One response per request;
/// dropping interest in a response does not cancel the work behind it.
#[async_trait]
pub trait MessagePort: Send + Sync {
    async fn request(&self, request: Request) -> Response;
}

/// Resolves a prompt's declared variables, usually by driving a
/// `VariableModal`. `None` means the user dismissed the dialog.
#[async_trait]
pub trait VariablePrompter: Send + Sync {
    async fn resolve(&self, variables: &[PromptVariable]) -> Option<HashMap<String, String>>;
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// The page matched no selector configuration.
    #[error("no supported LLM page detected")]
    LlmNotDetected,
    /// A page was detected but the content could not be written into it.
    #[error("insertion failed: {0}")]
    InsertionFailed(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Content was written into the page input.
    Inserted,
    /// Auto-insert is off; the resolved content is handed back instead.
    Prepared(String),
    /// The user dismissed the variable dialog. No action was taken.
    Cancelled,
}

/// Per-page agent driving the insert flow: detect the site, resolve
/// variables, assemble the content, write it into the page.
pub struct InsertAgent<P: MessagePort> {
    port: P,
}

impl<P: MessagePort> InsertAgent<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub async fn insert(
        &self,
        page: &mut dyn PageDom,
        prompter: &dyn VariablePrompter,
        prompt: &Prompt,
    ) -> Result<InsertOutcome, InsertError> {
        let configs = self.selector_configs().await?;
        let config = detect_site(page, &configs).ok_or(InsertError::LlmNotDetected)?;
        debug!(site = %config.name, prompt_id = %prompt.id, "Insert target detected");

        let settings = self.settings().await;
        let values = if prompt.variables.is_empty() {
            HashMap::new()
        } else if settings.show_variable_prompt {
            match prompter.resolve(&prompt.variables).await {
                Some(values) => values,
                None => return Ok(InsertOutcome::Cancelled),
            }
        } else {
            prompt
                .variables
                .iter()
                .map(|v| (v.name.clone(), declared_default(v)))
                .collect()
        };

        let mut content = substitute(&prompt.content, &values);
        if !prompt.skip_custom_instructions {
            if let Some(instructions) = self.custom_instructions().await {
                content = with_custom_instructions(&instructions, &content);
            }
        }

        if !settings.auto_insert {
            return Ok(InsertOutcome::Prepared(content));
        }
        if page.set_input(&config.input_selector, &content) {
            Ok(InsertOutcome::Inserted)
        } else {
            Err(InsertError::InsertionFailed(format!(
                "input '{}' did not accept content",
                config.input_selector
            )))
        }
    }

    /// Without a config set there is nothing to match the page against, so
    /// a failed fetch reads as "not detected" rather than a distinct error.
    async fn selector_configs(&self) -> Result<Vec<SelectorConfig>, InsertError> {
        let response = self.port.request(Request::GetSelectorConfigs).await;
        if !response.success {
            return Err(InsertError::LlmNotDetected);
        }
        response
            .data
            .and_then(|data| serde_json::from_value::<Vec<SelectorConfig>>(data).ok())
            .filter(|configs| !configs.is_empty())
            .ok_or(InsertError::LlmNotDetected)
    }

    async fn settings(&self) -> Settings {
        let response = self.port.request(Request::GetSettings).await;
        response
            .data
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default()
    }

    async fn custom_instructions(&self) -> Option<String> {
        let response = self.port.request(Request::GetAuthState).await;
        let state: AuthState = response
            .data
            .and_then(|data| serde_json::from_value(data).ok())?;
        state
            .user
            .and_then(|u| u.custom_instructions)
            .filter(|s| !s.trim().is_empty())
    }
}
