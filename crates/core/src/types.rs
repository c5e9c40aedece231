use serde::{Deserialize, Serialize};

/// Authenticated user profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// Auth state owned by the store: created on token validation, updated on
/// profile sync, cleared on logout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    #[default]
    Text,
    Number,
    Select,
}

/// A template placeholder declared by a prompt, rendered as one form
/// control in the variable dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVariable {
    pub name: String,
    #[serde(default)]
    pub kind: VariableKind,
    #[serde(default, rename = "default")]
    pub default_value: Option<String>,
    /// Choices for `select` variables.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub variables: Vec<PromptVariable>,
    /// When set, the user's custom instructions are not prepended on insert.
    #[serde(default)]
    pub skip_custom_instructions: bool,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields accepted when creating a new prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFilter {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl PromptFilter {
    pub fn is_empty(&self) -> bool {
        self.folder.is_none() && self.tag.is_none() && self.search.is_none()
    }

    /// Local evaluation of the filter, used when serving the offline cache.
    pub fn matches(&self, prompt: &Prompt) -> bool {
        if let Some(folder) = &self.folder {
            if prompt.folder.as_deref() != Some(folder.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !prompt.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !prompt.title.to_lowercase().contains(&needle)
                && !prompt.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// The locally cached prompt list. Replaced wholesale on every sync so
/// concurrent dispatches never observe a partially updated set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPromptSet {
    pub prompts: Vec<Prompt>,
    /// Unix seconds of the fetch that produced this set.
    pub fetched_at: i64,
}

/// How to locate and interact with a target page's input and send controls.
/// Keyed by unique `name`; immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    pub name: String,
    pub input_selector: String,
    pub button_insert_selector: String,
    pub send_button_selector: String,
}

/// Versioned selector set as served by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorPayload {
    pub configs: Vec<SelectorConfig>,
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub prompt_id: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Account-level settings synced from the backend (currently the theme).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub theme: String,
}
