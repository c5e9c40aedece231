use serde::{Deserialize, Serialize};

/// Persisted extension settings. Every field carries a serde default so
/// settings written by older versions keep deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Insert resolved prompts directly into the page input. When off, the
    /// content is handed back to the caller instead.
    #[serde(default = "default_true")]
    pub auto_insert: bool,
    /// Show the variable dialog for prompts that declare variables. When
    /// off, declared defaults are used as-is.
    #[serde(default = "default_true")]
    pub show_variable_prompt: bool,
    /// Serve the cached prompt list when the backend is unreachable.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Minimum seconds between two scheduled prompt syncs.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
}

fn default_api_url() -> String {
    "https://api.promptdock.dev/v1".to_string()
}

fn default_theme() -> String {
    "system".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            theme: default_theme(),
            auto_insert: default_true(),
            show_variable_prompt: default_true(),
            cache_enabled: default_true(),
            sync_interval_secs: default_sync_interval(),
        }
    }
}
