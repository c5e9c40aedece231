pub mod client;

pub use client::{HttpApiClient, PromptApi};
