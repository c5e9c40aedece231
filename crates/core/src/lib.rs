pub mod config;
pub mod error;
pub mod message;
pub mod paths;
pub mod types;

pub use config::Settings;
pub use error::{Error, RateLimitInfo, Result};
pub use message::{Request, Response};
pub use paths::Paths;
pub use types::{
    AuthState, CachedPromptSet, Prompt, PromptDraft, PromptFilter, PromptVariable, SelectorConfig,
    SelectorPayload, UsageRecord, User, UserSettings, VariableKind,
};
